//! Rate Limiting Infrastructure
//!
//! In-process sliding-window admission control, keyed by
//! `(route, caller_key)`.
//!
//! Every bucket holds the raw hit timestamps (epoch milliseconds) that are
//! still inside the window. A check prunes the bucket with a filter, then
//! either records the hit or rejects with a retry-after hint. Rejected
//! calls are never recorded.
//!
//! State is per process. N replicas behind a load balancer admit up to
//! N times the configured limit.

use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use dashmap::DashMap;
use tokio::task::JoinHandle;

/// Rate limit policy for one route
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Maximum admissions inside one window (>= 1)
    pub max_requests: u32,
    /// Sliding window length (> 0)
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: 10,
            window: Duration::from_secs(60),
        }
    }
}

impl RateLimitConfig {
    pub fn new(max_requests: u32, window_secs: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_secs(window_secs),
        }
    }

    pub fn from_millis(max_requests: u32, window_ms: u64) -> Self {
        Self {
            max_requests,
            window: Duration::from_millis(window_ms),
        }
    }

    pub fn window_ms(&self) -> i64 {
        self.window.as_millis() as i64
    }

    /// Window rounded up to whole seconds, for the policy header
    pub fn window_secs(&self) -> u64 {
        self.window.as_millis().div_ceil(1000) as u64
    }
}

/// Outcome of an admission check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    Admitted,
    Rejected {
        /// Seconds until the oldest recorded hit leaves the window
        retry_after_secs: u64,
        limit: u32,
        window_ms: i64,
    },
}

impl RateLimitDecision {
    pub fn is_admitted(&self) -> bool {
        matches!(self, RateLimitDecision::Admitted)
    }
}

#[derive(Debug, Default)]
struct Bucket {
    hits: Vec<i64>,
    /// Window used by the most recent check, for the sweeper
    window_ms: i64,
    /// Most recent admitted hit
    last_hit_ms: i64,
}

impl Bucket {
    fn prune(&mut self, now_ms: i64, window_ms: i64) {
        self.hits.retain(|&ts| now_ms - ts < window_ms);
    }
}

type BucketKey = (String, String);

/// Sliding-window admission controller
///
/// Create one per process and share it behind an `Arc`. Buckets are created
/// lazily on the first check for a `(route, caller_key)` pair and are only
/// removed by [`AdmissionController::sweep_at`] (or the background sweeper).
#[derive(Debug, Default)]
pub struct AdmissionController {
    buckets: DashMap<BucketKey, Bucket>,
    sweeper: Mutex<Option<JoinHandle<()>>>,
}

impl AdmissionController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check admission against wall-clock time
    pub fn check(
        &self,
        caller_key: &str,
        route: &str,
        policy: &RateLimitConfig,
    ) -> RateLimitDecision {
        self.check_at(now_ms(), caller_key, route, policy)
    }

    /// Check admission at an explicit time (epoch ms)
    pub fn check_at(
        &self,
        now_ms: i64,
        caller_key: &str,
        route: &str,
        policy: &RateLimitConfig,
    ) -> RateLimitDecision {
        let window_ms = policy.window_ms();

        let mut bucket = self
            .buckets
            .entry((route.to_string(), caller_key.to_string()))
            .or_default();

        bucket.window_ms = window_ms;
        bucket.prune(now_ms, window_ms);

        if bucket.hits.len() >= policy.max_requests as usize {
            let oldest = bucket.hits.iter().copied().min().unwrap_or(now_ms);
            let remaining_ms = window_ms - (now_ms - oldest);
            let retry_after_secs = (remaining_ms.max(1) as u64).div_ceil(1000);

            tracing::warn!(
                route = route,
                caller = caller_key,
                limit = policy.max_requests,
                window_ms = window_ms,
                retry_after_secs = retry_after_secs,
                "Admission rejected"
            );

            return RateLimitDecision::Rejected {
                retry_after_secs,
                limit: policy.max_requests,
                window_ms,
            };
        }

        bucket.hits.push(now_ms);
        bucket.last_hit_ms = now_ms;
        RateLimitDecision::Admitted
    }

    /// Number of allocated buckets, empty ones included
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Drop buckets that have been empty for at least `idle_windows` windows
    ///
    /// Returns the number of buckets removed.
    pub fn sweep_at(&self, now_ms: i64, idle_windows: u32) -> usize {
        let before = self.buckets.len();

        self.buckets.retain(|_, bucket| {
            bucket.prune(now_ms, bucket.window_ms);
            if !bucket.hits.is_empty() {
                return true;
            }
            let empty_since = bucket.last_hit_ms + bucket.window_ms;
            now_ms - empty_since < bucket.window_ms * i64::from(idle_windows)
        });

        before.saturating_sub(self.buckets.len())
    }

    /// Run [`sweep_at`](Self::sweep_at) every `interval` in the background
    ///
    /// Replaces any sweeper started earlier. The task holds only a weak
    /// reference and exits once the controller is dropped.
    pub fn start_sweeper(self: &Arc<Self>, interval: Duration, idle_windows: u32) {
        let weak: Weak<Self> = Arc::downgrade(self);

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
            // First tick completes immediately
            ticker.tick().await;

            loop {
                ticker.tick().await;
                let Some(controller) = weak.upgrade() else {
                    break;
                };
                let removed = controller.sweep_at(now_ms(), idle_windows);
                if removed > 0 {
                    tracing::debug!(
                        removed = removed,
                        remaining = controller.bucket_count(),
                        "Swept idle rate limit buckets"
                    );
                }
            }
        });

        let previous = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(handle);
        if let Some(previous) = previous {
            previous.abort();
        }
    }

    /// Stop the sweeper and drop every bucket
    pub fn dispose(&self) {
        if let Some(handle) = self
            .sweeper
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
        {
            handle.abort();
        }
        self.buckets.clear();
    }
}

pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

#[cfg(test)]
mod tests {
    use super::*;

    const ROUTE: &str = "projects:submit";

    fn policy(limit: u32, window_ms: u64) -> RateLimitConfig {
        RateLimitConfig::from_millis(limit, window_ms)
    }

    #[test]
    fn test_admits_up_to_limit_then_rejects() {
        let rl = AdmissionController::new();
        let p = policy(3, 10_000);

        for _ in 0..3 {
            assert!(rl.check_at(1_000, "user:a", ROUTE, &p).is_admitted());
        }

        match rl.check_at(1_000, "user:a", ROUTE, &p) {
            RateLimitDecision::Rejected {
                retry_after_secs,
                limit,
                window_ms,
            } => {
                assert_eq!(retry_after_secs, 10);
                assert_eq!(limit, 3);
                assert_eq!(window_ms, 10_000);
            }
            RateLimitDecision::Admitted => panic!("fourth call should be rejected"),
        }
    }

    #[test]
    fn test_retry_after_rounds_up() {
        let rl = AdmissionController::new();
        let p = policy(1, 10_000);

        assert!(rl.check_at(0, "ip:10.0.0.1", ROUTE, &p).is_admitted());
        // 10_000 - 8_500 = 1_500 ms left => 2 s
        assert_eq!(
            rl.check_at(8_500, "ip:10.0.0.1", ROUTE, &p),
            RateLimitDecision::Rejected {
                retry_after_secs: 2,
                limit: 1,
                window_ms: 10_000
            }
        );
    }

    #[test]
    fn test_window_recovery() {
        let rl = AdmissionController::new();
        let p = policy(2, 1_000);

        assert!(rl.check_at(0, "user:a", ROUTE, &p).is_admitted());
        assert!(rl.check_at(10, "user:a", ROUTE, &p).is_admitted());
        assert!(!rl.check_at(999, "user:a", ROUTE, &p).is_admitted());

        // The hit at t=0 is exactly one window old and is dropped
        assert!(rl.check_at(1_000, "user:a", ROUTE, &p).is_admitted());
        assert!(!rl.check_at(1_000, "user:a", ROUTE, &p).is_admitted());
    }

    #[test]
    fn test_rejection_does_not_consume_quota() {
        let rl = AdmissionController::new();
        let p = policy(1, 1_000);

        assert!(rl.check_at(0, "user:a", ROUTE, &p).is_admitted());
        for t in [100, 200, 500, 900] {
            assert!(!rl.check_at(t, "user:a", ROUTE, &p).is_admitted());
        }
        // Had rejections been recorded this would still be blocked
        assert!(rl.check_at(1_000, "user:a", ROUTE, &p).is_admitted());
    }

    #[test]
    fn test_route_isolation() {
        let rl = AdmissionController::new();
        let p = policy(1, 60_000);

        assert!(rl.check_at(0, "user:a", "tasks:list", &p).is_admitted());
        assert!(rl.check_at(0, "user:a", "projects:submit", &p).is_admitted());
        assert!(!rl.check_at(0, "user:a", "tasks:list", &p).is_admitted());
    }

    #[test]
    fn test_caller_isolation() {
        let rl = AdmissionController::new();
        let p = policy(1, 60_000);

        assert!(rl.check_at(0, "user:a", ROUTE, &p).is_admitted());
        assert!(rl.check_at(0, "user:b", ROUTE, &p).is_admitted());
    }

    #[test]
    fn test_key_composition_is_collision_free() {
        let rl = AdmissionController::new();
        let p = policy(1, 60_000);

        // "a:b" + "c" and "a" + "b:c" would collide under naive concatenation
        assert!(rl.check_at(0, "c", "a:b", &p).is_admitted());
        assert!(rl.check_at(0, "b:c", "a", &p).is_admitted());
        assert_eq!(rl.bucket_count(), 2);
    }

    #[test]
    fn test_out_of_order_timestamps_are_pruned_by_filter() {
        let rl = AdmissionController::new();
        let p = policy(3, 1_000);

        assert!(rl.check_at(500, "user:a", ROUTE, &p).is_admitted());
        // Clock stepped backwards
        assert!(rl.check_at(100, "user:a", ROUTE, &p).is_admitted());
        assert!(rl.check_at(600, "user:a", ROUTE, &p).is_admitted());

        // At 1_200 only the hit at 100 has expired, even though it sits in the middle
        assert!(rl.check_at(1_200, "user:a", ROUTE, &p).is_admitted());
        match rl.check_at(1_200, "user:a", ROUTE, &p) {
            RateLimitDecision::Rejected {
                retry_after_secs, ..
            } => {
                // Oldest retained is 500: 1_000 - 700 = 300 ms => 1 s
                assert_eq!(retry_after_secs, 1);
            }
            RateLimitDecision::Admitted => panic!("bucket should be full"),
        }
    }

    #[test]
    fn test_sweep_removes_only_long_idle_buckets() {
        let rl = AdmissionController::new();
        let p = policy(5, 1_000);

        rl.check_at(0, "user:idle", ROUTE, &p);
        rl.check_at(2_500, "user:recent", ROUTE, &p);
        assert_eq!(rl.bucket_count(), 2);

        // idle: empty since 1_000, idle for 2_000 >= 2 windows
        // recent: still holds a hit
        assert_eq!(rl.sweep_at(3_000, 2), 1);
        assert_eq!(rl.bucket_count(), 1);

        // recent: empty since 3_500, only 500 ms idle
        assert_eq!(rl.sweep_at(4_000, 2), 0);
        assert_eq!(rl.sweep_at(5_500, 2), 1);
        assert_eq!(rl.bucket_count(), 0);
    }

    #[test]
    fn test_sweep_keeps_quota_semantics() {
        let rl = AdmissionController::new();
        let p = policy(1, 1_000);

        assert!(rl.check_at(0, "user:a", ROUTE, &p).is_admitted());
        rl.sweep_at(500, 1);
        assert!(!rl.check_at(500, "user:a", ROUTE, &p).is_admitted());
    }

    #[test]
    fn test_dispose_clears_buckets() {
        let rl = AdmissionController::new();
        rl.check_at(0, "user:a", ROUTE, &policy(1, 1_000));
        rl.dispose();
        assert_eq!(rl.bucket_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_background_sweeper_runs() {
        let rl = Arc::new(AdmissionController::new());
        // Hit far in the past so the bucket is already idle
        rl.check_at(0, "user:a", ROUTE, &policy(1, 1_000));

        rl.start_sweeper(Duration::from_secs(30), 2);
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::task::yield_now().await;

        assert_eq!(rl.bucket_count(), 0);
        rl.dispose();
    }

    #[test]
    fn test_config_helpers() {
        let config = RateLimitConfig::default();
        assert_eq!(config.max_requests, 10);
        assert_eq!(config.window_ms(), 60_000);
        assert_eq!(config.window_secs(), 60);
        assert_eq!(RateLimitConfig::from_millis(1, 1_500).window_secs(), 2);
    }
}
