//! Domain models shared by the import pipeline, the stores and the web layer

pub mod import;
pub mod operation;
pub mod roster;

pub use import::*;
pub use operation::*;
pub use roster::*;
