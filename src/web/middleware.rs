use axum::{
    extract::Request,
    http::{header::CONTENT_LENGTH, HeaderMap, HeaderName, HeaderValue, Method, Uri},
    middleware::Next,
    response::Response,
};
use std::time::Instant;
use tracing::{info, warn};

pub const REQUEST_ID_HEADER: HeaderName = HeaderName::from_static("x-request-id");

/// Declared body size, which for an import is roughly the upload size
pub fn declared_body_size(headers: &HeaderMap) -> Option<u64> {
    headers
        .get(CONTENT_LENGTH)?
        .to_str()
        .ok()?
        .trim()
        .parse()
        .ok()
}

/// Request logging middleware
///
/// Logs each request with its body size and timing, and echoes the request
/// id back in `x-request-id` so a caller can quote it when an import fails.
pub async fn request_logging_middleware(
    method: Method,
    uri: Uri,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let request_id = uuid::Uuid::new_v4().to_string();
    let body_bytes = declared_body_size(request.headers()).unwrap_or(0);

    info!(
        method = %method,
        uri = %uri,
        request_id = %request_id,
        body_bytes,
        "HTTP request started"
    );

    let mut response = next.run(request).await;
    let status = response.status().as_u16();
    let duration_ms = start.elapsed().as_millis();

    if status >= 400 {
        warn!(
            method = %method,
            uri = %uri,
            status,
            request_id = %request_id,
            body_bytes,
            duration_ms,
            "HTTP request rejected"
        );
    } else {
        info!(
            method = %method,
            uri = %uri,
            status,
            request_id = %request_id,
            duration_ms,
            "HTTP request completed"
        );
    }

    if let Ok(value) = HeaderValue::from_str(&request_id) {
        response.headers_mut().insert(REQUEST_ID_HEADER, value);
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declared_body_size() {
        let mut headers = HeaderMap::new();
        assert_eq!(declared_body_size(&headers), None);

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("2048"));
        assert_eq!(declared_body_size(&headers), Some(2048));

        headers.insert(CONTENT_LENGTH, HeaderValue::from_static("lots"));
        assert_eq!(declared_body_size(&headers), None);
    }
}
