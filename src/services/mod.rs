//! Request-level services shared by the web handlers

pub mod rate_limiter;

pub use rate_limiter::ImportRateLimiter;
