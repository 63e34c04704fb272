//! Fixed-window rate limiting.
//!
//! # Design Decisions
//! - `RateLimiter` is a trait so the in-memory store can be swapped for a
//!   shared backend without touching the gateway
//! - The default store is a `DashMap`: same-key updates serialize on the
//!   entry's shard lock, different keys in other shards never wait
//! - Rejected requests still count, so hammering cannot reset a window
//! - Fixed windows let up to 2x the limit through across a window boundary.
//!   This is accepted, not a bug.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::http::{header, HeaderMap};
use dashmap::DashMap;
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::config::RateLimitPartition;
use crate::observability::metrics;
use crate::security::clock::{Clock, SystemClock};

/// Limit applied to one key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitPolicy {
    pub window: Duration,
    pub max_requests: u32,
}

/// Result of a rate limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitDecision {
    /// Request is allowed
    Allowed {
        /// Remaining requests in current window
        remaining: u32,
    },
    /// Request is over the limit
    Limited {
        /// Time until the window resets
        retry_after: Duration,
    },
}

impl RateLimitDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, RateLimitDecision::Allowed { .. })
    }
}

/// Check-and-increment by key.
pub trait RateLimiter: Send + Sync {
    fn check<'a>(&'a self, key: &'a str, policy: RateLimitPolicy) -> BoxFuture<'a, RateLimitDecision>;
}

/// Counter for one key.
#[derive(Debug, Clone, Copy)]
pub struct RateLimitEntry {
    pub count: u32,
    pub window_start: Instant,
}

/// Process-local rate limiter.
pub struct InMemoryRateLimiter {
    entries: DashMap<String, RateLimitEntry>,
    clock: Arc<dyn Clock>,
}

impl InMemoryRateLimiter {
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: DashMap::new(),
            clock,
        }
    }

    /// Synchronous check-and-increment.
    pub fn check_now(&self, key: &str, policy: RateLimitPolicy) -> RateLimitDecision {
        let now = self.clock.now();

        // The entry guard holds the shard write lock for the whole
        // read-increment-compare-write sequence.
        let mut entry = self
            .entries
            .entry(key.to_string())
            .or_insert(RateLimitEntry {
                count: 0,
                window_start: now,
            });

        let elapsed = now.saturating_duration_since(entry.window_start);
        if entry.count == 0 || elapsed > policy.window {
            *entry = RateLimitEntry {
                count: 1,
                window_start: now,
            };
            return RateLimitDecision::Allowed {
                remaining: policy.max_requests.saturating_sub(1),
            };
        }

        entry.count = entry.count.saturating_add(1);
        if entry.count > policy.max_requests {
            let remaining = policy.window.saturating_sub(elapsed);
            let secs = remaining.as_millis().div_ceil(1000).max(1) as u64;
            return RateLimitDecision::Limited {
                retry_after: Duration::from_secs(secs),
            };
        }

        RateLimitDecision::Allowed {
            remaining: policy.max_requests - entry.count,
        }
    }

    /// Drop entries whose window started more than `stale_after` ago.
    /// Returns how many were removed.
    pub fn sweep(&self, stale_after: Duration) -> usize {
        let now = self.clock.now();
        let before = self.entries.len();
        self.entries
            .retain(|_, entry| now.saturating_duration_since(entry.window_start) <= stale_after);
        before.saturating_sub(self.entries.len())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Current counter for `key`, if any.
    pub fn entry(&self, key: &str) -> Option<RateLimitEntry> {
        self.entries.get(key).map(|r| *r.value())
    }
}

impl Default for InMemoryRateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter for InMemoryRateLimiter {
    fn check<'a>(&'a self, key: &'a str, policy: RateLimitPolicy) -> BoxFuture<'a, RateLimitDecision> {
        let decision = self.check_now(key, policy);
        futures_util::future::ready(decision).boxed()
    }
}

/// Periodically sweep stale entries until shutdown.
pub fn spawn_sweeper(
    limiter: Arc<InMemoryRateLimiter>,
    interval: Duration,
    stale_after: Duration,
    mut shutdown: broadcast::Receiver<()>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately.
        ticker.tick().await;

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let removed = limiter.sweep(stale_after);
                    let remaining = limiter.len();
                    metrics::record_rate_limit_entries(remaining);
                    if removed > 0 {
                        tracing::debug!(removed, remaining, "Swept stale rate-limit entries");
                    }
                }
                _ = shutdown.recv() => {
                    tracing::debug!("Rate-limit sweeper stopping");
                    break;
                }
            }
        }
    })
}

const FORWARDED_FOR: &str = "x-forwarded-for";
const REAL_IP: &str = "x-real-ip";
const CF_CONNECTING_IP: &str = "cf-connecting-ip";

/// Apparent client IP from forwarding headers, defaulting to loopback.
pub fn client_ip(headers: &HeaderMap) -> String {
    let header_str = |name: &str| headers.get(name).and_then(|v| v.to_str().ok());

    let candidates = [
        header_str(FORWARDED_FOR).and_then(|v| v.split(',').next()),
        header_str(REAL_IP),
        header_str(CF_CONNECTING_IP),
    ];

    candidates
        .into_iter()
        .flatten()
        .map(str::trim)
        .find(|v| !v.is_empty() && !v.eq_ignore_ascii_case("unknown"))
        .unwrap_or("127.0.0.1")
        .to_string()
}

/// Key a request is counted under, before route namespacing.
pub fn partition_key(partition: RateLimitPartition, headers: &HeaderMap) -> String {
    match partition {
        RateLimitPartition::ByIp => client_ip(headers),
        RateLimitPartition::ByToken => headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("anonymous")
            .to_string(),
    }
}
