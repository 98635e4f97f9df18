//! Rate limiter for login attempts
//!
//! Failed logins are counted per username (case-insensitive); five failures
//! within fifteen minutes block further attempts until the window slides.

use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;
use tokio::sync::RwLock;

const MAX_FAILED_ATTEMPTS: usize = 5;
const WINDOW_MINUTES: i64 = 15;

/// Login rate limiter
pub struct LoginRateLimiter {
    attempts: RwLock<HashMap<String, Vec<DateTime<Utc>>>>,
    max_attempts: usize,
    window: Duration,
}

impl LoginRateLimiter {
    pub fn new() -> Self {
        Self::with_limits(MAX_FAILED_ATTEMPTS, Duration::minutes(WINDOW_MINUTES))
    }

    pub fn with_limits(max_attempts: usize, window: Duration) -> Self {
        Self {
            attempts: RwLock::new(HashMap::new()),
            max_attempts,
            window,
        }
    }

    /// Whether the login name has used up its failed attempts
    pub async fn is_limited(&self, login: &str) -> bool {
        let mut attempts = self.attempts.write().await;
        let cutoff = Utc::now() - self.window;

        let entry = attempts.entry(login.to_lowercase()).or_default();
        entry.retain(|time| *time > cutoff);
        entry.len() >= self.max_attempts
    }

    pub async fn record_failure(&self, login: &str) {
        let mut attempts = self.attempts.write().await;
        attempts
            .entry(login.to_lowercase())
            .or_default()
            .push(Utc::now());
    }

    /// Reset on successful login
    pub async fn clear(&self, login: &str) {
        self.attempts.write().await.remove(&login.to_lowercase());
    }

    /// Drop expired entries; called periodically from the cleanup task
    pub async fn cleanup(&self) {
        let cutoff = Utc::now() - self.window;
        let mut attempts = self.attempts.write().await;
        attempts.retain(|_, times| {
            times.retain(|time| *time > cutoff);
            !times.is_empty()
        });
    }

    #[cfg(test)]
    async fn tracked(&self) -> usize {
        self.attempts.read().await.len()
    }
}

impl Default for LoginRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}
