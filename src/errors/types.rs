//! Error type definitions for the import service
//!
//! Errors are layered: storage problems surface as [`RepositoryError`],
//! whole-job import failures as [`ImportError`], request-level problems as
//! [`WebError`], and [`AppError`] ties them together. Row-level validation
//! failures are not errors here; they are collected as data in the job result.

use thiserror::Error;

use crate::models::ValidationError;

/// Top-level application error type
#[derive(Error, Debug)]
pub enum AppError {
    /// Database-related errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Repository layer errors
    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),

    /// Whole-job import failures
    #[error("Import error: {0}")]
    Import(#[from] ImportError),

    /// Web layer errors
    #[error("Web error: {0}")]
    Web(#[from] WebError),

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Repository layer specific errors
#[derive(Error, Debug)]
pub enum RepositoryError {
    /// Database connection failures
    #[error("Database connection failed: {message}")]
    ConnectionFailed { message: String },

    /// SQL query execution failures
    #[error("Query failed: {query} - {message}")]
    QueryFailed { query: String, message: String },

    /// Data serialization/deserialization failures
    #[error("Serialization failed: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    /// Membership query issued with more keys than the store accepts
    #[error("Membership query too large: {size} keys (max {max})")]
    MembershipQueryTooLarge { size: usize, max: usize },

    /// Write group larger than the store can commit atomically
    #[error("Write group too large: {size} records (max {max})")]
    WriteGroupTooLarge { size: usize, max: usize },

    /// Migration failures
    #[error("Migration failed: {version} - {message}")]
    MigrationFailed { version: String, message: String },
}

/// Failures that abort an entire import job
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("File too large: {size} bytes (max {max} bytes)")]
    FileTooLarge { size: usize, max: usize },

    #[error("The file is empty")]
    EmptyFile,

    #[error("Unable to read file: {message}")]
    UnreadableFile { message: String },

    /// Delimited text that could not be parsed, with the offending rows
    #[error("The file could not be parsed ({} errors)", errors.len())]
    CsvParse { errors: Vec<ValidationError> },

    #[error("The workbook contains no worksheets")]
    NoWorksheet,

    #[error("Header row not found in the first {scanned} rows of sheet '{sheet}'")]
    HeaderRowNotFound { sheet: String, scanned: usize },

    #[error("Missing required columns: {}", columns.join(", "))]
    MissingColumns { columns: Vec<String> },

    #[error("Too many rows: {found} found (max {max})")]
    TooManyRows { found: usize, max: usize },

    /// A write group failed; earlier groups remain committed
    #[error("Failed to save write group {chunk_index}: {message} ({committed} records were already saved)")]
    ChunkCommitFailed {
        chunk_index: usize,
        committed: usize,
        message: String,
    },
}

/// Web layer specific errors
#[derive(Error, Debug)]
pub enum WebError {
    /// Invalid request format
    #[error("Invalid request: {message}")]
    InvalidRequest { message: String },

    /// Missing required header
    #[error("Missing required header: {header}")]
    MissingHeader { header: String },

    /// Invalid or unknown credentials
    #[error("Invalid authentication: {message}")]
    InvalidAuth { message: String },

    /// Request payload too large
    #[error("Payload exceeds the {max_size} byte request limit")]
    PayloadTooLarge { max_size: usize },

    /// Caller exceeded the import quota
    #[error("Rate limited: retry after {retry_after} seconds")]
    RateLimited { retry_after: u64 },
}

impl AppError {
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }
}

impl RepositoryError {
    pub fn query_failed<Q: Into<String>, M: Into<String>>(query: Q, message: M) -> Self {
        Self::QueryFailed {
            query: query.into(),
            message: message.into(),
        }
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(error: sqlx::Error) -> Self {
        match error {
            sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
                Self::ConnectionFailed {
                    message: error.to_string(),
                }
            }
            other => Self::QueryFailed {
                query: "sqlx".to_string(),
                message: other.to_string(),
            },
        }
    }
}

impl ImportError {
    pub fn unreadable<S: Into<String>>(message: S) -> Self {
        Self::UnreadableFile {
            message: message.into(),
        }
    }
}

impl WebError {
    pub fn invalid_request<S: Into<String>>(message: S) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }

    pub fn invalid_auth<S: Into<String>>(message: S) -> Self {
        Self::InvalidAuth {
            message: message.into(),
        }
    }

    pub fn missing_header<S: Into<String>>(header: S) -> Self {
        Self::MissingHeader {
            header: header.into(),
        }
    }
}
