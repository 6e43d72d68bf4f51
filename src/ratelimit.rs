// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Fixed-window request limiter keyed by session.
//!
//! Each key gets `limit` requests per window. Windows start on the first
//! request and reset lazily on the first request after they elapse; there is
//! no background sweep. The tables live in process memory only and are
//! bounded by an LRU, so this is a coarse abuse brake per instance and not a
//! security boundary: separate instances keep separate counters.
//!
//! Session and anonymous keys live in separate tables. Anonymous keys are
//! cheap to mint, so they may only ever evict other anonymous buckets.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Duration, Utc};
use lru::LruCache;

/// Length of one rate-limit window.
pub const WINDOW: Duration = Duration::seconds(60);

/// Wall-clock source, injectable for tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Real wall clock.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Per-key counter.
#[derive(Debug, Clone)]
struct RateLimitBucket {
    count: u32,
    window_reset_at: DateTime<Utc>,
}

/// Requests left in the current window after an allowed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateAllowance {
    pub remaining: u32,
}

/// Rejection carrying the time until the window resets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("rate limit exceeded, retry in {retry_after_secs}s")]
pub struct RateLimited {
    pub retry_after_secs: u64,
}

/// Who a request is counted against.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum RateKey {
    /// Verified session address
    Session(String),
    /// Caller without a session, by client address when known
    Anonymous(String),
}

impl RateKey {
    pub fn as_str(&self) -> &str {
        match self {
            RateKey::Session(key) | RateKey::Anonymous(key) => key,
        }
    }
}

type BucketTable = Mutex<LruCache<String, RateLimitBucket>>;

pub struct RateLimiter {
    sessions: BucketTable,
    anonymous: BucketTable,
    limit: u32,
    window: Duration,
    clock: Arc<dyn Clock>,
}

impl RateLimiter {
    /// Create a limiter allowing `limit` requests per [`WINDOW`] for at most
    /// `capacity` distinct keys of each kind.
    pub fn new(limit: u32, capacity: usize, clock: Arc<dyn Clock>) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            anonymous: Mutex::new(LruCache::new(capacity)),
            limit,
            window: WINDOW,
            clock,
        }
    }

    pub fn limit(&self) -> u32 {
        self.limit
    }

    /// Count one request for `key`.
    pub fn check(&self, key: &RateKey) -> Result<RateAllowance, RateLimited> {
        let table = match key {
            RateKey::Session(_) => &self.sessions,
            RateKey::Anonymous(_) => &self.anonymous,
        };
        let now = self.clock.now();

        // A poisoned table means a bug elsewhere; deny rather than panic.
        let Ok(mut buckets) = table.lock() else {
            return Err(RateLimited {
                retry_after_secs: self.window.num_seconds().unsigned_abs(),
            });
        };

        let bucket = buckets.get_or_insert_mut(key.as_str().to_string(), || RateLimitBucket {
            count: 0,
            window_reset_at: now + self.window,
        });

        if now >= bucket.window_reset_at {
            bucket.count = 0;
            bucket.window_reset_at = now + self.window;
        }

        if bucket.count >= self.limit {
            let wait = (bucket.window_reset_at - now).num_seconds().max(1);
            return Err(RateLimited {
                retry_after_secs: wait.unsigned_abs(),
            });
        }

        bucket.count += 1;
        Ok(RateAllowance {
            remaining: self.limit - bucket.count,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ManualClock;

    fn limiter(limit: u32, capacity: usize) -> (RateLimiter, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::default());
        (RateLimiter::new(limit, capacity, clock.clone()), clock)
    }

    fn session(key: &str) -> RateKey {
        RateKey::Session(key.to_string())
    }

    fn anon(key: &str) -> RateKey {
        RateKey::Anonymous(key.to_string())
    }

    #[test]
    fn allows_up_to_limit_then_denies() {
        let (limiter, _clock) = limiter(50, 16);
        for i in 0..50 {
            let allowance = limiter.check(&session("0xabc")).unwrap();
            assert_eq!(allowance.remaining, 49 - i);
        }
        let denied = limiter.check(&session("0xabc")).unwrap_err();
        assert_eq!(denied.retry_after_secs, 60);
    }

    #[test]
    fn window_resets_lazily_after_expiry() {
        let (limiter, clock) = limiter(2, 16);
        let key = session("k");
        limiter.check(&key).unwrap();
        limiter.check(&key).unwrap();
        assert!(limiter.check(&key).is_err());

        clock.advance(Duration::seconds(59));
        assert_eq!(limiter.check(&key).unwrap_err().retry_after_secs, 1);

        clock.advance(Duration::seconds(1));
        assert_eq!(limiter.check(&key).unwrap().remaining, 1);
    }

    #[test]
    fn keys_are_independent() {
        let (limiter, _clock) = limiter(1, 16);
        limiter.check(&session("a")).unwrap();
        assert!(limiter.check(&session("a")).is_err());
        assert!(limiter.check(&session("b")).is_ok());
    }

    #[test]
    fn session_and_anonymous_keys_do_not_collide() {
        let (limiter, _clock) = limiter(1, 16);
        limiter.check(&session("x")).unwrap();
        assert!(limiter.check(&anon("x")).is_ok());
        assert!(limiter.check(&session("x")).is_err());
    }

    #[test]
    fn eviction_starts_a_fresh_window() {
        let (limiter, _clock) = limiter(1, 1);
        limiter.check(&anon("a")).unwrap();
        limiter.check(&anon("b")).unwrap();
        // "a" was evicted by "b".
        assert!(limiter.check(&anon("a")).is_ok());
    }

    #[test]
    fn anonymous_churn_cannot_evict_sessions() {
        let (limiter, _clock) = limiter(1, 4);
        limiter.check(&session("0xowner")).unwrap();

        for i in 0..64 {
            limiter.check(&anon(&format!("anon:10.0.0.{i}"))).unwrap();
        }

        assert!(limiter.check(&session("0xowner")).is_err());
    }
}
