pub mod assets;
pub mod config;
pub mod database;
pub mod errors;
pub mod ingestor;
pub mod models;
pub mod repositories;
pub mod roster;
pub mod services;
pub mod utils;
pub mod web;
