//! Customer list cache: durable storage, staleness policy, sync
//! coordination, local mutations and change notification.
//!
//! The entry point is [`CustomerCache`], constructed once at application
//! start with a [`DurableStore`], a [`CustomerSource`] and a [`Clock`].
//! UI layers call `get_or_fetch`/`query_local` for reads, `upsert`/`remove`
//! to mirror confirmed remote writes, and `subscribe` to re-render on
//! changes. `warm_up` pre-populates on session start; `clear` wipes the
//! owner-scoped dataset on logout.

pub mod events;
pub mod mutate;
pub mod staleness;
pub mod store;
pub mod sync;

#[cfg(test)]
pub(crate) mod testutil;

pub use events::CacheUpdate;
pub use staleness::{
    is_stale, CacheMetadata, Clock, SystemClock, READ_REFRESH_MINUTES, WARM_UP_MINUTES,
};
pub use store::{CachedData, DurableStore, FileStore, MemoryStore};
pub use sync::{CustomerCache, CustomerSource, FULL_SYNC_PAGE_SIZE};
