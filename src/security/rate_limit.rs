//! Fixed-window rate limiting for API routes.
//!
//! Counters are keyed by `client:segment`, where `segment` is the second path
//! segment of the API route. A window opens on the first request for a key and
//! closes `window` later; the next request after that starts a fresh window
//! with a count of one. Bursts of up to twice the ceiling are possible across a
//! window boundary.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;

use crate::config::RateLimitConfig;

/// Counter state for one key.
#[derive(Debug, Clone, Copy)]
struct Window {
    count: u32,
    started: Instant,
}

/// Storage for rate limit counters.
///
/// Implementations must make `hit` atomic per key: concurrent calls for the
/// same key may not lose increments.
pub trait RateLimitStore: Send + Sync {
    /// Record one request for `key` at `now` and return the count in the
    /// current window, including this request.
    fn hit(&self, key: &str, now: Instant, window: Duration) -> u32;

    /// Number of tracked keys.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Process-local counter store.
///
/// Entries are never evicted; memory grows with the number of distinct
/// client/route pairs seen since startup.
#[derive(Default)]
pub struct MemoryStore {
    windows: DashMap<String, Window>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl RateLimitStore for MemoryStore {
    fn hit(&self, key: &str, now: Instant, window: Duration) -> u32 {
        // The entry guard holds the shard lock for the whole read-modify-write.
        let mut entry = self.windows.entry(key.to_string()).or_insert(Window {
            count: 0,
            started: now,
        });

        if now.saturating_duration_since(entry.started) >= window {
            entry.count = 0;
            entry.started = now;
        }
        entry.count = entry.count.saturating_add(1);
        entry.count
    }

    fn len(&self) -> usize {
        self.windows.len()
    }
}

/// Which ceiling applies to a route.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteClass {
    /// Anonymous API namespace (`/api/public`).
    Public,
    /// Every other API route.
    Standard,
}

/// Fixed-window rate limiter over an injected store.
#[derive(Clone)]
pub struct RateLimiter {
    store: Arc<dyn RateLimitStore>,
    window: Duration,
    public_max: u32,
    standard_max: u32,
}

impl RateLimiter {
    pub fn new(config: &RateLimitConfig, store: Arc<dyn RateLimitStore>) -> Self {
        Self {
            store,
            window: Duration::from_millis(config.window_ms),
            public_max: config.public_max_requests,
            standard_max: config.max_requests,
        }
    }

    /// Count a request and report whether it is within the ceiling.
    pub fn check_and_increment(&self, client: &str, route_key: &str, class: RouteClass) -> bool {
        self.check_at(client, route_key, class, Instant::now())
    }

    /// Same as [`check_and_increment`](Self::check_and_increment) with an explicit clock.
    pub fn check_at(&self, client: &str, route_key: &str, class: RouteClass, now: Instant) -> bool {
        let key = format!("{client}:{route_key}");
        let count = self.store.hit(&key, now, self.window);
        count <= self.ceiling(class)
    }

    pub fn ceiling(&self, class: RouteClass) -> u32 {
        match class {
            RouteClass::Public => self.public_max,
            RouteClass::Standard => self.standard_max,
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn tracked_keys(&self) -> usize {
        self.store.len()
    }
}
