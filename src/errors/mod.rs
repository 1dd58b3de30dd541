//! Error handling for the import service

pub mod types;

pub use types::*;

/// Convenience type alias for application results
pub type AppResult<T> = Result<T, AppError>;

/// Convenience type alias for repository results
pub type RepositoryResult<T> = Result<T, RepositoryError>;

/// Convenience type alias for import job results
pub type ImportResult<T> = Result<T, ImportError>;
