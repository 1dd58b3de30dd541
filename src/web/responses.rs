//! HTTP response types and error mapping

use axum::{
    http::{header::RETRY_AFTER, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::error;

use crate::errors::{AppError, ImportError, WebError};
use crate::models::{ImportJobResult, ValidationError};

/// Body returned by the import endpoint, for success and failure alike
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImportResponse {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<ValidationError>>,
}

impl ImportResponse {
    pub fn completed(result: ImportJobResult) -> Self {
        Self {
            success: true,
            message: format!(
                "Import completed. {} operations created.",
                result.created_count
            ),
            created: Some(result.created_count),
            errors: (!result.errors.is_empty()).then_some(result.errors),
        }
    }

    pub fn failed<S: Into<String>>(message: S) -> Self {
        Self {
            success: false,
            message: message.into(),
            created: None,
            errors: None,
        }
    }
}

impl IntoResponse for ImportResponse {
    fn into_response(self) -> Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        (status, Json(self)).into_response()
    }
}

/// Standard wrapper for the read-only endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    pub timestamp: chrono::DateTime<chrono::Utc>,
}

impl<T> ApiResponse<T>
where
    T: Serialize,
{
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            timestamp: chrono::Utc::now(),
        }
    }
}

pub fn ok<T: Serialize>(data: T) -> impl IntoResponse {
    (StatusCode::OK, Json(ApiResponse::success(data)))
}

/// Convert AppError to appropriate HTTP response
pub fn handle_error(error: AppError) -> Response {
    let mut retry_after = None;

    let (status, body) = match error {
        AppError::Web(web_error) => match web_error {
            WebError::MissingHeader { .. } | WebError::InvalidAuth { .. } => (
                StatusCode::UNAUTHORIZED,
                ImportResponse::failed(format!("Unauthorized: {}", web_error)),
            ),
            WebError::InvalidRequest { message } => {
                (StatusCode::BAD_REQUEST, ImportResponse::failed(message))
            }
            WebError::PayloadTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ImportResponse::failed(web_error.to_string()),
            ),
            WebError::RateLimited { retry_after: seconds } => {
                retry_after = Some(seconds);
                (
                    StatusCode::TOO_MANY_REQUESTS,
                    ImportResponse::failed(format!(
                        "Too many imports. Try again in {} seconds.",
                        seconds
                    )),
                )
            }
        },
        AppError::Import(import_error) => match import_error {
            ImportError::FileTooLarge { .. } => (
                StatusCode::PAYLOAD_TOO_LARGE,
                ImportResponse::failed(import_error.to_string()),
            ),
            ImportError::CsvParse { errors } => (
                StatusCode::BAD_REQUEST,
                ImportResponse {
                    errors: Some(errors),
                    ..ImportResponse::failed("The CSV file could not be parsed")
                },
            ),
            ImportError::ChunkCommitFailed { committed, .. } => {
                error!("{}", import_error);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    ImportResponse {
                        created: Some(committed),
                        ..ImportResponse::failed(import_error.to_string())
                    },
                )
            }
            other => (
                StatusCode::BAD_REQUEST,
                ImportResponse::failed(other.to_string()),
            ),
        },
        AppError::Database(e) => {
            error!("Database error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ImportResponse::failed("Database operation failed"),
            )
        }
        AppError::Repository(e) => {
            error!("Repository error: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                ImportResponse::failed("Data access failed"),
            )
        }
        AppError::Configuration { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ImportResponse::failed(format!("Configuration error: {}", message)),
        ),
        AppError::Internal { message } => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ImportResponse::failed(format!("Internal error: {}", message)),
        ),
    };

    let mut response = (status, Json(body)).into_response();
    if let Some(seconds) = retry_after {
        if let Ok(value) = HeaderValue::from_str(&seconds.to_string()) {
            response.headers_mut().insert(RETRY_AFTER, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_completed_response_omits_empty_errors() {
        let response = ImportResponse::completed(ImportJobResult {
            created_count: 3,
            errors: Vec::new(),
        });
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["created"], 3);
        assert_eq!(json["message"], "Import completed. 3 operations created.");
        assert!(json.get("errors").is_none());
    }

    #[test]
    fn test_status_mapping() {
        let cases = vec![
            (
                AppError::from(WebError::invalid_auth("bad")),
                StatusCode::UNAUTHORIZED,
            ),
            (
                AppError::from(ImportError::EmptyFile),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ImportError::TooManyRows { found: 2, max: 1 }),
                StatusCode::BAD_REQUEST,
            ),
            (
                AppError::from(ImportError::FileTooLarge { size: 2, max: 1 }),
                StatusCode::PAYLOAD_TOO_LARGE,
            ),
            (
                AppError::from(WebError::RateLimited { retry_after: 10 }),
                StatusCode::TOO_MANY_REQUESTS,
            ),
            (
                AppError::from(ImportError::ChunkCommitFailed {
                    chunk_index: 1,
                    committed: 500,
                    message: "quota".to_string(),
                }),
                StatusCode::INTERNAL_SERVER_ERROR,
            ),
        ];

        for (error, expected) in cases {
            assert_eq!(handle_error(error).status(), expected);
        }
    }

    #[test]
    fn test_rate_limited_sets_retry_after() {
        let response = handle_error(WebError::RateLimited { retry_after: 42 }.into());
        assert_eq!(response.headers().get(RETRY_AFTER).unwrap(), "42");
    }
}
