use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Mutex;
use tracing::warn;

use crate::errors::WebError;

/// Sliding-window import quota keyed by caller id
#[derive(Clone)]
pub struct ImportRateLimiter {
    max_per_window: Option<u32>,
    window: Duration,
    history: Arc<Mutex<HashMap<String, VecDeque<Instant>>>>,
}

impl ImportRateLimiter {
    pub fn new(max_per_window: Option<u32>, window: Duration) -> Self {
        Self {
            max_per_window,
            window,
            history: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn per_hour(max_per_hour: Option<u32>) -> Self {
        Self::new(max_per_hour, Duration::from_secs(3600))
    }

    pub fn unlimited() -> Self {
        Self::new(None, Duration::from_secs(3600))
    }

    /// Record an import attempt, or fail when the caller is over quota
    pub async fn check_and_record(&self, caller_id: &str) -> Result<(), WebError> {
        self.check_at(caller_id, Instant::now()).await
    }

    async fn check_at(&self, caller_id: &str, now: Instant) -> Result<(), WebError> {
        let Some(max) = self.max_per_window else {
            return Ok(());
        };

        let mut history = self.history.lock().await;
        history.retain(|_, attempts| {
            while attempts
                .front()
                .is_some_and(|oldest| now.saturating_duration_since(*oldest) >= self.window)
            {
                attempts.pop_front();
            }
            !attempts.is_empty()
        });

        let attempts = history.entry(caller_id.to_string()).or_default();

        if attempts.len() >= max as usize {
            let retry_after = attempts
                .front()
                .map(|oldest| {
                    self.window
                        .saturating_sub(now.saturating_duration_since(*oldest))
                        .as_secs()
                        .max(1)
                })
                .unwrap_or(1);
            warn!(
                "Import quota exceeded for caller {} ({} per {:?})",
                caller_id, max, self.window
            );
            return Err(WebError::RateLimited { retry_after });
        }

        attempts.push_back(now);
        Ok(())
    }

    /// Callers with an attempt still inside the window
    pub async fn tracked_callers(&self) -> usize {
        self.history.lock().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_unlimited_never_rejects() {
        let limiter = ImportRateLimiter::unlimited();
        for _ in 0..50 {
            assert!(limiter.check_and_record("agent-1").await.is_ok());
        }
    }

    #[tokio::test]
    async fn test_quota_is_per_caller() {
        let limiter = ImportRateLimiter::per_hour(Some(2));
        assert!(limiter.check_and_record("agent-1").await.is_ok());
        assert!(limiter.check_and_record("agent-1").await.is_ok());
        assert!(matches!(
            limiter.check_and_record("agent-1").await,
            Err(WebError::RateLimited { retry_after }) if retry_after > 0
        ));
        assert!(limiter.check_and_record("agent-2").await.is_ok());
    }

    #[tokio::test]
    async fn test_window_expiry_frees_quota() {
        let limiter = ImportRateLimiter::new(Some(1), Duration::from_secs(60));
        let start = Instant::now();
        assert!(limiter.check_at("agent-1", start).await.is_ok());
        assert!(limiter
            .check_at("agent-1", start + Duration::from_secs(30))
            .await
            .is_err());
        assert!(limiter
            .check_at("agent-1", start + Duration::from_secs(61))
            .await
            .is_ok());
    }

    #[tokio::test]
    async fn test_expired_callers_are_forgotten() {
        let limiter = ImportRateLimiter::new(Some(5), Duration::from_secs(60));
        let start = Instant::now();
        for caller in ["agent-1", "agent-2", "agent-3"] {
            limiter.check_at(caller, start).await.unwrap();
        }
        assert_eq!(limiter.tracked_callers().await, 3);

        limiter
            .check_at("agent-4", start + Duration::from_secs(61))
            .await
            .unwrap();
        assert_eq!(limiter.tracked_callers().await, 1);
    }
}
