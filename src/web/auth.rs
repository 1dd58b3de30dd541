use async_trait::async_trait;
use axum::http::{header::AUTHORIZATION, HeaderMap};
use std::collections::BTreeMap;

use crate::config::AuthConfig;
use crate::errors::WebError;

/// Turns a bearer token into the caller's account id
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<String, WebError>;
}

/// Fixed token table read from `[auth]` in the config file
#[derive(Debug, Clone, Default)]
pub struct StaticTokenVerifier {
    tokens: BTreeMap<String, String>,
}

impl StaticTokenVerifier {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            tokens: config.tokens.clone(),
        }
    }

    pub fn with_token<T: Into<String>, C: Into<String>>(mut self, token: T, caller_id: C) -> Self {
        self.tokens.insert(token.into(), caller_id.into());
        self
    }
}

#[async_trait]
impl TokenVerifier for StaticTokenVerifier {
    async fn verify(&self, token: &str) -> Result<String, WebError> {
        self.tokens
            .get(token)
            .cloned()
            .ok_or_else(|| WebError::invalid_auth("unknown token"))
    }
}

/// Extract the token from an `Authorization: Bearer <token>` header
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, WebError> {
    let value = headers
        .get(AUTHORIZATION)
        .ok_or_else(|| WebError::missing_header(AUTHORIZATION.as_str()))?
        .to_str()
        .map_err(|_| WebError::invalid_auth("authorization header is not valid text"))?;

    let token = value
        .strip_prefix("Bearer ")
        .or_else(|| value.strip_prefix("bearer "))
        .map(str::trim)
        .unwrap_or_default();

    if token.is_empty() {
        return Err(WebError::invalid_auth("bearer token not provided"));
    }
    Ok(token)
}

/// Verify the request's bearer token and return the caller id
pub async fn authenticate(
    verifier: &dyn TokenVerifier,
    headers: &HeaderMap,
) -> Result<String, WebError> {
    let token = bearer_token(headers)?;
    verifier.verify(token).await
}
