//! Sync coordinator and lifecycle for the customer cache.
//!
//! `CustomerCache` owns the durable store and the single in-flight fetch
//! slot. Callers get cached data back immediately whenever it exists;
//! freshness is handled by fire-and-forget background resyncs, and any
//! number of concurrent callers converge on one remote call.
//!
//! Nothing here returns an error across the public boundary: a remote or
//! storage failure always degrades to "best available local data".

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use futures::future::{BoxFuture, Shared};
use futures::FutureExt;
use tokio::sync::{broadcast, Mutex};
use tracing::{debug, info, trace, warn};

use crate::models::{Customer, CustomerFilters, CustomerListResponse};

use super::events::CacheUpdate;
use super::staleness::{
    is_stale, CacheMetadata, Clock, SystemClock, READ_REFRESH_MINUTES, WARM_UP_MINUTES,
};
use super::store::{CachedData, DurableStore};

// ============================================================================
// Constants
// ============================================================================

/// Page size used for a full resync.
/// Large enough to pull the whole practical customer list in one round trip.
pub const FULL_SYNC_PAGE_SIZE: u32 = 500;

/// Durable-store namespace holding the customer dataset.
const NAMESPACE: &str = "customers";

/// Store entry holding the serialized record set (with capture timestamp).
const RECORDS_KEY: &str = "records";

/// Store entry holding the serialized metadata.
const META_KEY: &str = "meta";

/// Buffer size for the cache-updated broadcast channel.
/// 64 events of lag before a slow subscriber starts missing updates.
const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Remote source of truth for the customer list.
///
/// Assumed idempotent and safe to retry; the coordinator asks for a bulk
/// page so one call returns the full dataset.
pub trait CustomerSource: Send + Sync {
    fn fetch_list(
        &self,
        operator_id: i64,
        filters: CustomerFilters,
    ) -> BoxFuture<'_, Result<CustomerListResponse>>;
}

impl<S: CustomerSource + ?Sized> CustomerSource for Arc<S> {
    fn fetch_list(
        &self,
        operator_id: i64,
        filters: CustomerFilters,
    ) -> BoxFuture<'_, Result<CustomerListResponse>> {
        (**self).fetch_list(operator_id, filters)
    }
}

/// Offline-first cache for one operator's customer list.
///
/// Construct once at application start with the store, remote source and
/// clock, then share clones across the UI. All state-changing operations
/// broadcast a [`CacheUpdate`]; subscribe with [`CustomerCache::subscribe`].
#[derive(Clone)]
pub struct CustomerCache {
    pub(crate) inner: Arc<CacheInner>,
}

pub(crate) struct CacheInner {
    pub(crate) store: Box<dyn DurableStore>,
    pub(crate) source: Box<dyn CustomerSource>,
    pub(crate) clock: Box<dyn Clock>,
    /// Set once warm-up has run this session; reset only by `clear`.
    warmed_up: AtomicBool,
    /// The single in-flight fetch-and-cache operation, shared by every
    /// caller that arrives while it is pending.
    in_flight: Mutex<Option<Shared<BoxFuture<'static, Vec<Customer>>>>>,
    events: broadcast::Sender<CacheUpdate>,
}

impl CustomerCache {
    /// Create a cache with the system clock.
    pub fn new(
        store: impl DurableStore + 'static,
        source: impl CustomerSource + 'static,
    ) -> Self {
        Self::with_clock(store, source, SystemClock)
    }

    /// Create a cache with an injected clock (tests, simulations).
    pub fn with_clock(
        store: impl DurableStore + 'static,
        source: impl CustomerSource + 'static,
        clock: impl Clock + 'static,
    ) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(CacheInner {
                store: Box::new(store),
                source: Box::new(source),
                clock: Box::new(clock),
                warmed_up: AtomicBool::new(false),
                in_flight: Mutex::new(None),
                events,
            }),
        }
    }

    /// Get the customer list, serving cached data whenever possible.
    ///
    /// With a non-empty cached set and `force_refresh` false this returns
    /// immediately; if the cache is stale a background resync is scheduled
    /// first. With no cache (or `force_refresh` true) it blocks on a
    /// fetch-and-cache, falling back to whatever the store holds if the
    /// remote call fails.
    pub async fn get_or_fetch(
        &self,
        operator_id: i64,
        filters: &CustomerFilters,
        force_refresh: bool,
    ) -> Vec<Customer> {
        if !force_refresh {
            if let Some(records) = self.inner.read_records() {
                if !records.is_empty() {
                    let meta = self.inner.read_metadata();
                    if is_stale(meta.as_ref(), READ_REFRESH_MINUTES, self.inner.clock.now()) {
                        debug!("Cached customers are stale, scheduling background refresh");
                        self.refresh_in_background(operator_id, filters.clone());
                    }
                    return records;
                }
            }
        }
        self.inner.fetch_and_cache(operator_id, filters.clone()).await
    }

    /// Schedule a fire-and-forget resync.
    ///
    /// Never blocks the caller; failures are logged and swallowed since
    /// nothing awaits this path.
    pub fn refresh_in_background(&self, operator_id: i64, filters: CustomerFilters) {
        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            let records = inner.fetch_and_cache(operator_id, filters).await;
            debug!(count = records.len(), "Background customer refresh finished");
        });
    }

    /// One-time session warm-up: pre-populate the cache unless it is
    /// already fresh enough. Idempotent until [`CustomerCache::clear`].
    pub async fn warm_up(&self, operator_id: i64) {
        if self.inner.warmed_up.swap(true, Ordering::SeqCst) {
            debug!("Customer cache already warmed up this session");
            return;
        }
        let meta = self.inner.read_metadata();
        if !is_stale(meta.as_ref(), WARM_UP_MINUTES, self.inner.clock.now()) {
            debug!("Customer cache fresh enough, skipping warm-up fetch");
            return;
        }
        info!(operator_id, "Warming up customer cache");
        self.inner
            .fetch_and_cache(operator_id, CustomerFilters::default())
            .await;
    }

    /// Drop the entire cached dataset and reset the warm-up flag.
    ///
    /// Call on logout or operator change - the dataset is owner-scoped and
    /// must never leak across sessions. An in-flight resync is not
    /// cancelled; if it completes afterwards the next staleness check
    /// simply resyncs again.
    pub fn clear(&self) {
        info!("Clearing customer cache");
        self.inner.store.delete(NAMESPACE);
        self.inner.warmed_up.store(false, Ordering::SeqCst);
    }

    /// Subscribe to cache-updated events.
    pub fn subscribe(&self) -> broadcast::Receiver<CacheUpdate> {
        self.inner.events.subscribe()
    }

    /// Read-only view of the cache metadata, if any exists.
    pub fn metadata(&self) -> Option<CacheMetadata> {
        self.inner.read_metadata()
    }

    /// Human-readable age of the cached record set ("just now", "5m ago"),
    /// for status lines next to the list. `None` when nothing is cached.
    pub fn cache_age(&self) -> Option<String> {
        self.inner.read_envelope().map(|cached| cached.age_display())
    }
}

impl CacheInner {
    /// Run a fetch-and-cache, coalescing with any operation already in
    /// flight: the second caller awaits the first caller's future instead
    /// of issuing a duplicate remote call.
    pub(crate) async fn fetch_and_cache(
        self: &Arc<Self>,
        operator_id: i64,
        filters: CustomerFilters,
    ) -> Vec<Customer> {
        let fut = {
            let mut slot = self.in_flight.lock().await;
            match slot.as_ref() {
                Some(pending) => {
                    debug!("Customer fetch already in flight, awaiting shared result");
                    pending.clone()
                }
                None => {
                    let inner = Arc::clone(self);
                    let fut = async move {
                        let records = inner.full_resync(operator_id, filters).await;
                        // Clear the slot before handing out results so the
                        // next fetch request starts a new operation.
                        *inner.in_flight.lock().await = None;
                        records
                    }
                    .boxed()
                    .shared();
                    *slot = Some(fut.clone());
                    fut
                }
            }
        };
        fut.await
    }

    /// Fetch the full dataset in one bulk call, replace the stored snapshot
    /// and broadcast. On failure, falls back to the last-known store
    /// contents (possibly empty) instead of propagating the error.
    async fn full_resync(&self, operator_id: i64, filters: CustomerFilters) -> Vec<Customer> {
        let bulk = CustomerFilters {
            page: 1,
            page_size: FULL_SYNC_PAGE_SIZE,
            ..filters
        };
        match self.source.fetch_list(operator_id, bulk).await {
            Ok(response) => {
                let records = response.customers;
                self.write_snapshot(&records, operator_id);
                info!(count = records.len(), operator_id, "Customer cache resynced from API");
                self.notify(CacheUpdate::Resynced {
                    records: records.clone(),
                });
                records
            }
            Err(e) => {
                warn!(error = %e, operator_id, "Customer list fetch failed, serving last-known data");
                self.read_records().unwrap_or_default()
            }
        }
    }

    fn read_envelope(&self) -> Option<CachedData<Vec<Customer>>> {
        let raw = self.store.read(NAMESPACE, RECORDS_KEY)?;
        match serde_json::from_str(&raw) {
            Ok(cached) => Some(cached),
            Err(e) => {
                debug!(error = %e, "Corrupt cached record set, treating as miss");
                None
            }
        }
    }

    pub(crate) fn read_records(&self) -> Option<Vec<Customer>> {
        self.read_envelope().map(|cached| cached.data)
    }

    pub(crate) fn read_metadata(&self) -> Option<CacheMetadata> {
        let raw = self.store.read(NAMESPACE, META_KEY)?;
        match serde_json::from_str::<CacheMetadata>(&raw) {
            Ok(meta) => Some(meta),
            Err(e) => {
                debug!(error = %e, "Corrupt cache metadata, treating as miss");
                None
            }
        }
    }

    /// Write record set and metadata together so metadata never claims
    /// freshness for data that was never stored.
    pub(crate) fn write_snapshot(&self, records: &[Customer], owner_id: i64) {
        let now = self.clock.now();
        let envelope = CachedData {
            data: records,
            cached_at: now,
        };
        match serde_json::to_string(&envelope) {
            Ok(raw) => self.store.write(NAMESPACE, RECORDS_KEY, &raw),
            Err(e) => {
                warn!(error = %e, "Failed to serialize customer records, skipping snapshot");
                return;
            }
        }
        let meta = CacheMetadata {
            last_updated_at: now,
            owner_id,
            record_count: records.len(),
        };
        match serde_json::to_string(&meta) {
            Ok(raw) => self.store.write(NAMESPACE, META_KEY, &raw),
            Err(e) => warn!(error = %e, "Failed to serialize cache metadata"),
        }
    }

    pub(crate) fn notify(&self, update: CacheUpdate) {
        if self.events.send(update).is_err() {
            trace!("No subscribers for cache update");
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::super::testutil::{customer, ManualClock, StubSource};
    use super::super::store::MemoryStore;
    use super::*;
    use chrono::Duration as ChronoDuration;
    use chrono::Utc;
    use std::sync::atomic::Ordering::SeqCst;

    fn cache_with(
        source: &Arc<StubSource>,
        clock: &Arc<ManualClock>,
    ) -> CustomerCache {
        CustomerCache::with_clock(MemoryStore::new(), Arc::clone(source), Arc::clone(clock))
    }

    #[tokio::test]
    async fn test_first_fetch_populates_cache_and_metadata() {
        let source = Arc::new(StubSource::with_customers(vec![
            customer(1, "Ada"),
            customer(2, "Grace"),
        ]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(records.len(), 2);
        assert_eq!(source.calls.load(SeqCst), 1);

        let meta = cache.metadata().expect("metadata written with records");
        assert_eq!(meta.record_count, 2);
        assert_eq!(meta.owner_id, 7);
    }

    #[tokio::test]
    async fn test_fresh_cache_serves_without_remote_call() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        let first = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        let second = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;

        assert_eq!(first, second);
        assert_eq!(source.calls.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn test_stale_cache_returns_immediately_and_refreshes_in_background() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        clock.advance(ChronoDuration::minutes(READ_REFRESH_MINUTES + 1));
        source.set_customers(vec![customer(1, "Ada"), customer(2, "Grace")]);

        // Stale read still returns the old snapshot synchronously
        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(records.len(), 1);

        // ...but a background resync lands shortly after
        for _ in 0..100 {
            if source.calls.load(SeqCst) == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        assert_eq!(source.calls.load(SeqCst), 2);
        assert_eq!(cache.metadata().unwrap().record_count, 2);
    }

    #[tokio::test]
    async fn test_concurrent_fetches_coalesce_to_one_remote_call() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        source.set_delay_ms(20);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        let filters = CustomerFilters::default();
        let (a, b) = tokio::join!(
            cache.get_or_fetch(7, &filters, true),
            cache.get_or_fetch(7, &filters, true),
        );

        assert_eq!(a, b);
        assert_eq!(source.calls.load(SeqCst), 1);

        // The slot is cleared on completion, so a later fetch goes out again
        cache.get_or_fetch(7, &filters, true).await;
        assert_eq!(source.calls.load(SeqCst), 2);
    }

    #[tokio::test]
    async fn test_fetch_failure_falls_back_to_cached_data() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        source.set_failing(true);

        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), true)
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].first_name, "Ada");
    }

    #[tokio::test]
    async fn test_fetch_failure_with_empty_cache_returns_empty() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        source.set_failing(true);
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert!(records.is_empty());
    }

    #[tokio::test]
    async fn test_warm_up_is_idempotent_within_session() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache.warm_up(7).await;
        cache.warm_up(7).await;
        assert_eq!(source.calls.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_up_skips_fetch_when_cache_is_fresh() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(source.calls.load(SeqCst), 1);

        // Fresh under the warm-up threshold: no second fetch even though
        // the warm-up flag was not yet set
        clock.advance(ChronoDuration::minutes(WARM_UP_MINUTES - 1));
        cache.warm_up(7).await;
        assert_eq!(source.calls.load(SeqCst), 1);
    }

    #[tokio::test]
    async fn test_warm_up_fetches_again_after_clear() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache.warm_up(7).await;
        cache.clear();
        cache.warm_up(7).await;
        assert_eq!(source.calls.load(SeqCst), 2);
    }

    #[tokio::test]
    async fn test_clear_drops_records_and_metadata() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert!(cache.metadata().is_some());

        cache.clear();
        assert!(cache.metadata().is_none());
        assert!(cache.lookup(1).is_none());
    }

    #[tokio::test]
    async fn test_resync_broadcasts_api_event() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);
        let mut updates = cache.subscribe();

        cache
            .get_or_fetch(7, &CustomerFilters::default(), true)
            .await;

        let update = updates.try_recv().expect("resync event broadcast");
        assert_eq!(update.source(), "api");
        match update {
            CacheUpdate::Resynced { records } => assert_eq!(records.len(), 1),
            other => panic!("unexpected update: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_corrupt_store_entries_fall_back_to_blocking_fetch() {
        let store = Arc::new(MemoryStore::new());
        store.write(NAMESPACE, RECORDS_KEY, "not json at all");
        store.write(NAMESPACE, META_KEY, "{\"broken\":");

        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache =
            CustomerCache::with_clock(Arc::clone(&store), Arc::clone(&source), Arc::clone(&clock));

        // Garbage entries read as misses rather than errors
        assert!(cache.metadata().is_none());
        assert!(cache.cache_age().is_none());

        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(source.calls.load(SeqCst), 1);

        // The resync replaced the corrupt entries with a valid snapshot
        assert_eq!(cache.metadata().unwrap().record_count, 1);
    }

    #[tokio::test]
    async fn test_cache_age_tracks_snapshot_presence() {
        let source = Arc::new(StubSource::with_customers(vec![customer(1, "Ada")]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        assert!(cache.cache_age().is_none());
        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(cache.cache_age().as_deref(), Some("just now"));

        cache.clear();
        assert!(cache.cache_age().is_none());
    }

    #[tokio::test]
    async fn test_empty_cached_set_triggers_blocking_fetch() {
        let source = Arc::new(StubSource::with_customers(vec![]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&source, &clock);

        // First call caches an empty set
        cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        source.set_customers(vec![customer(1, "Ada")]);

        // An empty cached set does not count as "cached data present"
        let records = cache
            .get_or_fetch(7, &CustomerFilters::default(), false)
            .await;
        assert_eq!(records.len(), 1);
        assert_eq!(source.calls.load(SeqCst), 2);
    }
}
