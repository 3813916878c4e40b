//! The rate limiter is an external collaborator per the spec's scope: the
//! orchestrator only ever talks to it through the [`RateLimiter`] trait.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum RateLimitDecision {
    Allowed,
    Denied { message: String },
}

#[async_trait]
pub trait RateLimiter: Send + Sync {
    async fn check(&self, user_id: &str) -> RateLimitDecision;
}

struct Bucket {
    window_start: Instant,
    count: u32,
}

/// Fixed-window per-user token bucket: `max_requests` per `window`.
pub struct InMemoryRateLimiter {
    window: Duration,
    max_requests: u32,
    buckets: RwLock<HashMap<String, Bucket>>,
}

impl InMemoryRateLimiter {
    pub fn new(window: Duration, max_requests: u32) -> Self {
        Self {
            window,
            max_requests,
            buckets: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl RateLimiter for InMemoryRateLimiter {
    async fn check(&self, user_id: &str) -> RateLimitDecision {
        let now = Instant::now();
        let mut buckets = self.buckets.write().unwrap();
        let bucket = buckets.entry(user_id.to_string()).or_insert(Bucket {
            window_start: now,
            count: 0,
        });

        if now.duration_since(bucket.window_start) >= self.window {
            bucket.window_start = now;
            bucket.count = 0;
        }

        if bucket.count >= self.max_requests {
            return RateLimitDecision::Denied {
                message: format!(
                    "Rate limit exceeded: max {} requests per {:?}. Please wait.",
                    self.max_requests, self.window
                ),
            };
        }

        bucket.count += 1;
        RateLimitDecision::Allowed
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn allows_up_to_the_limit_then_denies() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 2);
        assert_eq!(limiter.check("u1").await, RateLimitDecision::Allowed);
        assert_eq!(limiter.check("u1").await, RateLimitDecision::Allowed);
        assert!(matches!(
            limiter.check("u1").await,
            RateLimitDecision::Denied { .. }
        ));
    }

    #[tokio::test]
    async fn tracks_users_independently() {
        let limiter = InMemoryRateLimiter::new(Duration::from_secs(60), 1);
        assert_eq!(limiter.check("u1").await, RateLimitDecision::Allowed);
        assert_eq!(limiter.check("u2").await, RateLimitDecision::Allowed);
    }
}
