//! Staleness policy for cached customer data.
//!
//! A pure decision over `CacheMetadata`: absent metadata is always stale,
//! present metadata is stale once its age exceeds the caller's threshold.
//! The policy is parameterized so read-path and warm-up callers can pick
//! the tradeoff appropriate to their cost.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Consider cached data stale for the read path after 5 minutes.
/// A stale read still returns immediately but schedules a background refresh.
pub const READ_REFRESH_MINUTES: i64 = 5;

/// Warm-up threshold of 10 minutes.
/// Warm-up is a blocking fetch, so it tolerates slightly older data than
/// the read path before paying for a round trip.
pub const WARM_UP_MINUTES: i64 = 10;

/// Metadata written alongside the cached record set.
///
/// `record_count` always equals the length of the record set it was written
/// with - the two are written together by the coordinator, never
/// independently.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheMetadata {
    pub last_updated_at: DateTime<Utc>,
    pub owner_id: i64,
    pub record_count: usize,
}

/// Decide whether cached data is stale under the given threshold.
/// Absent metadata is stale (conservative default).
pub fn is_stale(metadata: Option<&CacheMetadata>, max_age_minutes: i64, now: DateTime<Utc>) -> bool {
    match metadata {
        None => true,
        Some(meta) => now - meta.last_updated_at > Duration::minutes(max_age_minutes),
    }
}

/// Source of the current time, injected so tests can control staleness.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

impl<C: Clock + ?Sized> Clock for std::sync::Arc<C> {
    fn now(&self) -> DateTime<Utc> {
        (**self).now()
    }
}

/// Production clock backed by the system time.
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Tests
// ============================================================================
