//! Fixed-window limits on token issuance.
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, warn};

use crate::domain::{KeyTtl, KeyValueStore, RateLimitDecision, RateLimiter};
use crate::utils::keys;

/// Counts issuances per user in fixed windows aligned to the epoch.
///
/// The counter's expiry is set on the first increment of a window, and set
/// again by any later increment that finds the counter without one. Two
/// concurrent first requests may both set it, so a window can occasionally
/// outlive its nominal length; it never lives forever. When the counter
/// store cannot be reached the limiter fails open.
pub struct FixedWindowRateLimiter {
    store: Arc<dyn KeyValueStore>,
    max_per_window: u32,
    window_secs: u64,
}

impl FixedWindowRateLimiter {
    pub fn new(store: Arc<dyn KeyValueStore>, max_per_window: u32, window_secs: u64) -> Self {
        Self {
            store,
            max_per_window,
            window_secs: window_secs.max(1),
        }
    }

    fn window_key(&self, user_id: &str) -> String {
        let window = Utc::now().timestamp().div_euclid(self.window_secs as i64);
        keys::rate_limit(user_id, window)
    }

    async fn set_expiry(&self, user_id: &str, key: &str) {
        if let Err(e) = self.store.expire(key, self.window_secs).await {
            warn!(user_id, error = %e, action = "rate_limit", "failed to set rate limit window expiry");
        }
    }
}

#[async_trait]
impl RateLimiter for FixedWindowRateLimiter {
    async fn check(&self, user_id: &str) -> RateLimitDecision {
        let key = self.window_key(user_id);

        let count = match self.store.incr(&key).await {
            Ok(count) => count,
            Err(e) => {
                warn!(user_id, error = %e, action = "rate_limit", "rate limit store unavailable, skipping limit");
                return RateLimitDecision::Allowed;
            }
        };

        if count == 1 {
            self.set_expiry(user_id, &key).await;
        } else {
            // a counter whose first EXPIRE was lost would never reset
            match self.store.ttl(&key).await {
                Ok(KeyTtl::Persistent) => {
                    debug!(user_id, "rate limit window has no expiry, setting it");
                    self.set_expiry(user_id, &key).await;
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(user_id, error = %e, action = "rate_limit", "failed to read rate limit window expiry");
                }
            }
        }

        if count > i64::from(self.max_per_window) {
            RateLimitDecision::Limited
        } else {
            RateLimitDecision::Allowed
        }
    }
}

#[derive(Clone, Debug)]
pub struct NoopRateLimiter;

#[async_trait]
impl RateLimiter for NoopRateLimiter {
    async fn check(&self, _user_id: &str) -> RateLimitDecision {
        RateLimitDecision::Allowed
    }
}
