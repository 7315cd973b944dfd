use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;

/// Sliding-window request counter keyed by caller identity (IP). In-memory
/// only; a multi-instance deployment needs a shared store instead.
#[derive(Clone)]
pub struct RateLimiter {
    requests: Arc<RwLock<HashMap<String, Vec<Instant>>>>,
    max_requests: usize,
    window: Duration,
}

impl RateLimiter {
    pub fn new(max_requests: usize, window_secs: u64) -> Self {
        Self {
            requests: Arc::new(RwLock::new(HashMap::new())),
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub async fn check(&self, identifier: &str) -> bool {
        let now = Instant::now();
        let mut requests = self.requests.write().await;

        let history = requests.entry(identifier.to_string()).or_default();
        history.retain(|&stamp| now.duration_since(stamp) < self.window);

        if history.len() < self.max_requests {
            history.push(now);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn blocks_after_the_limit_within_one_window() {
        let limiter = RateLimiter::new(2, 60);

        assert!(limiter.check("10.0.0.1").await);
        assert!(limiter.check("10.0.0.1").await);
        assert!(!limiter.check("10.0.0.1").await);

        // independent identity, independent budget
        assert!(limiter.check("10.0.0.2").await);
    }

    #[tokio::test]
    async fn window_expiry_frees_the_budget() {
        let limiter = RateLimiter::new(1, 1);
        assert!(limiter.check("ip").await);
        assert!(!limiter.check("ip").await);
        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(limiter.check("ip").await);
    }
}
