//! Incremental local mutations against the cached customer set.
//!
//! These are best-effort optimistic patches with no server reconciliation:
//! the cache does not know whether the mutation it mirrors actually
//! succeeded remotely. Callers must invoke them only after a confirmed
//! remote write, and fall back to a full resync if local and remote state
//! are suspected to have diverged.

use tracing::debug;

use crate::models::{Customer, CustomerFilters};

use super::events::CacheUpdate;
use super::sync::CustomerCache;

impl CustomerCache {
    /// Replace a cached record in place, or prepend it if the key is new.
    /// Rewrites the snapshot (bumping the metadata timestamp) and
    /// broadcasts a `create` or `update` event.
    pub fn upsert(&self, record: Customer) {
        let mut records = self.inner.read_records().unwrap_or_default();
        let owner_id = self
            .inner
            .read_metadata()
            .map(|meta| meta.owner_id)
            .unwrap_or(record.operator_id);

        let update = if let Some(existing) = records.iter_mut().find(|c| c.id == record.id) {
            *existing = record.clone();
            CacheUpdate::Updated { record }
        } else {
            records.insert(0, record.clone());
            CacheUpdate::Created { record }
        };

        debug!(source = update.source(), count = records.len(), "Applying local customer patch");
        self.inner.write_snapshot(&records, owner_id);
        self.inner.notify(update);
    }

    /// Remove a record from the cached set by key. A missing key is a
    /// no-op and emits nothing.
    pub fn remove(&self, id: i64) {
        let Some(mut records) = self.inner.read_records() else {
            return;
        };
        let Some(owner_id) = self.inner.read_metadata().map(|meta| meta.owner_id) else {
            return;
        };

        let before = records.len();
        records.retain(|c| c.id != id);
        if records.len() == before {
            debug!(id, "Customer not in cache, nothing to remove");
            return;
        }

        self.inner.write_snapshot(&records, owner_id);
        self.inner.notify(CacheUpdate::Deleted { id });
    }

    /// Cache-only record lookup by key. Never triggers a fetch; returns
    /// `None` when no cache exists.
    pub fn lookup(&self, id: i64) -> Option<Customer> {
        self.inner
            .read_records()?
            .into_iter()
            .find(|c| c.id == id)
    }

    /// Run a filtered list query purely against the cached data, with the
    /// same filter/sort/paginate semantics as the remote API.
    pub fn query_local(&self, filters: &CustomerFilters) -> Vec<Customer> {
        let records = self.inner.read_records().unwrap_or_default();
        filters.apply(&records)
    }
}

// ============================================================================
// Tests
// ============================================================================
