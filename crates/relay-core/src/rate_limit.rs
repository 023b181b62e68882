//! Per-client sliding-window rate limiting

use dashmap::DashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

pub const DEFAULT_WINDOW: Duration = Duration::from_millis(60_000);
pub const DEFAULT_MAX_REQUESTS: usize = 30;

/// A sliding-window rate limiter that tracks per-client request counts.
///
/// Each client gets their own window of timestamps. Every request is
/// recorded, including ones that end up over the limit, so a client that
/// keeps hammering stays limited until it backs off for a full window.
#[derive(Clone)]
pub struct RateLimiter {
    /// Per-client sliding windows of request timestamps
    windows: Arc<DashMap<String, VecDeque<Instant>>>,
    /// Maximum requests allowed per window
    max_requests: usize,
    /// Duration of the sliding window
    window: Duration,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_REQUESTS, DEFAULT_WINDOW)
    }
}

impl RateLimiter {
    pub fn new(max_requests: usize, window: Duration) -> Self {
        Self {
            windows: Arc::new(DashMap::new()),
            max_requests,
            window,
        }
    }

    pub fn max_requests(&self) -> usize {
        self.max_requests
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Record a request from `client_id` and report whether it is over the limit.
    ///
    /// Returns `true` when the client has made more than `max_requests`
    /// requests inside the trailing window (this one included).
    pub fn check(&self, client_id: &str) -> bool {
        self.check_at(client_id, Instant::now())
    }

    fn check_at(&self, client_id: &str, now: Instant) -> bool {
        let cutoff = now.checked_sub(self.window);

        let mut entry = self.windows.entry(client_id.to_string()).or_default();
        let timestamps = entry.value_mut();

        if let Some(cutoff) = cutoff {
            while timestamps.front().is_some_and(|&t| t <= cutoff) {
                timestamps.pop_front();
            }
        }
        timestamps.push_back(now);

        let count = timestamps.len();
        if count > self.max_requests {
            warn!(
                "Rate limit exceeded for client '{}': {} requests in {:?} (limit: {})",
                client_id, count, self.window, self.max_requests,
            );
            return true;
        }
        false
    }

    /// Drop clients with no request inside the current window.
    ///
    /// Returns how many clients were evicted.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let Some(cutoff) = now.checked_sub(self.window) else {
            return 0;
        };
        let before = self.windows.len();
        self.windows
            .retain(|_, timestamps| timestamps.back().is_some_and(|&t| t > cutoff));
        let evicted = before.saturating_sub(self.windows.len());
        if evicted > 0 {
            debug!("Rate limiter swept {} idle clients", evicted);
        }
        evicted
    }

    /// Number of clients currently holding a window
    pub fn tracked_clients(&self) -> usize {
        self.windows.len()
    }

    /// Run [`RateLimiter::sweep`] on a fixed interval until the task is aborted
    pub fn spawn_sweeper(&self, every: Duration) -> JoinHandle<()> {
        let limiter = self.clone();
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(every);
            // First tick completes immediately
            ticker.tick().await;
            loop {
                ticker.tick().await;
                limiter.sweep();
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allows_within_limit() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));

        for _ in 0..5 {
            assert!(!limiter.check("client1"));
        }
    }

    #[test]
    fn test_limits_request_after_max() {
        let limiter = RateLimiter::new(3, Duration::from_secs(60));

        assert!(!limiter.check("client1"));
        assert!(!limiter.check("client1"));
        assert!(!limiter.check("client1"));
        assert!(limiter.check("client1"));
    }

    #[test]
    fn test_default_limits() {
        let limiter = RateLimiter::default();
        assert_eq!(limiter.max_requests(), 30);
        assert_eq!(limiter.window(), Duration::from_millis(60_000));

        for _ in 0..30 {
            assert!(!limiter.check("10.0.0.1"));
        }
        assert!(limiter.check("10.0.0.1"));
    }

    #[test]
    fn test_independent_per_client() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));

        assert!(!limiter.check("client1"));
        assert!(!limiter.check("client1"));
        assert!(limiter.check("client1"));

        // client2 has its own window
        assert!(!limiter.check("client2"));
        assert!(!limiter.check("client2"));
        assert!(limiter.check("client2"));
    }

    #[test]
    fn test_limited_requests_are_still_recorded() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        let start = Instant::now();

        assert!(!limiter.check_at("c", start));
        assert!(limiter.check_at("c", start + Duration::from_secs(30)));

        // The first request has aged out, but the limited one at +30s has not
        assert!(limiter.check_at("c", start + Duration::from_secs(61)));
        assert!(!limiter.check_at("c", start + Duration::from_secs(200)));
    }

    #[test]
    fn test_window_expiry() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let start = Instant::now();

        assert!(!limiter.check_at("client1", start));
        assert!(!limiter.check_at("client1", start + Duration::from_secs(1)));

        // Both earlier requests are outside the window
        assert!(!limiter.check_at("client1", start + Duration::from_secs(62)));
        assert!(!limiter.check_at("client1", start + Duration::from_secs(63)));
        assert!(limiter.check_at("client1", start + Duration::from_secs(64)));
    }

    #[test]
    fn test_window_expiry_real_clock() {
        let limiter = RateLimiter::new(2, Duration::from_millis(50));

        assert!(!limiter.check("client1"));
        assert!(!limiter.check("client1"));
        assert!(limiter.check("client1"));

        std::thread::sleep(Duration::from_millis(60));

        assert!(!limiter.check("client1"));
    }

    #[test]
    fn test_clone_shares_state() {
        let limiter = RateLimiter::new(2, Duration::from_secs(60));
        let limiter2 = limiter.clone();

        assert!(!limiter.check("client1"));
        assert!(!limiter2.check("client1"));
        assert!(limiter.check("client1"));
    }

    #[test]
    fn test_many_clients() {
        let limiter = RateLimiter::new(1, Duration::from_secs(60));
        for i in 0..100 {
            let client = format!("client_{}", i);
            assert!(!limiter.check(&client));
        }
        assert_eq!(limiter.tracked_clients(), 100);
    }

    #[test]
    fn test_sweep_evicts_idle_clients() {
        let limiter = RateLimiter::new(5, Duration::from_secs(60));
        let start = Instant::now();

        limiter.check_at("idle", start);
        limiter.check_at("active", start);
        limiter.check_at("active", start + Duration::from_secs(50));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(70)), 1);
        assert_eq!(limiter.tracked_clients(), 1);
        assert!(limiter.windows.contains_key("active"));

        assert_eq!(limiter.sweep_at(start + Duration::from_secs(200)), 1);
        assert_eq!(limiter.tracked_clients(), 0);
    }

    #[tokio::test]
    async fn test_sweeper_task_runs() {
        let limiter = RateLimiter::new(5, Duration::from_millis(10));
        limiter.check("old");
        assert_eq!(limiter.tracked_clients(), 1);

        let handle = limiter.spawn_sweeper(Duration::from_millis(20));
        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(limiter.tracked_clients(), 0);
        handle.abort();
    }
}
