//! bookcache - offline-first customer list cache for the booking portal.
//!
//! Keeps an operator's customer list available for instant rendering while
//! the portal API remains the source of truth. The cache serves whatever
//! it has immediately, refreshes stale data in the background, coalesces
//! concurrent fetches into a single remote call, and applies single-record
//! edits locally so one edit never forces a full resync.
//!
//! Typical wiring at application start:
//!
//! ```no_run
//! use bookcache::{ApiClient, Config, CustomerCache, FileStore};
//!
//! # fn main() -> anyhow::Result<()> {
//! let config = Config::load()?;
//! let store = FileStore::new(config.cache_dir()?);
//! let api = ApiClient::from_config(&config)?.with_token("jwt-from-login".to_string());
//! let cache = CustomerCache::new(store, api);
//! # Ok(())
//! # }
//! ```
//!
//! Local `upsert`/`remove` are optimistic patches, not authoritative
//! merges: call them only after a confirmed remote write, and force a
//! refresh through `get_or_fetch` if local and remote state may have
//! diverged.

pub mod api;
pub mod cache;
pub mod config;
pub mod models;

pub use api::{ApiClient, ApiError};
pub use cache::{
    CacheMetadata, CacheUpdate, CachedData, Clock, CustomerCache, CustomerSource, DurableStore,
    FileStore, MemoryStore, SystemClock,
};
pub use config::Config;
pub use models::{
    Customer, CustomerFilters, CustomerListResponse, CustomerStatus, Pagination, SortDirection,
    SortField,
};
