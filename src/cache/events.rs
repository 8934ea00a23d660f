//! Broadcast events emitted on every state-changing cache operation.

use crate::models::Customer;

/// Update event for cache subscribers.
///
/// The variant tells subscribers whether the whole list changed (a full
/// resync) or a single record did, so they can re-render minimally.
#[derive(Debug, Clone)]
pub enum CacheUpdate {
    /// The full record set was replaced from the API.
    Resynced { records: Vec<Customer> },
    /// A record was added locally after a confirmed remote create.
    Created { record: Customer },
    /// A record was replaced locally after a confirmed remote update.
    Updated { record: Customer },
    /// A record was removed locally after a confirmed remote delete.
    Deleted { id: i64 },
}

impl CacheUpdate {
    /// Source discriminator for subscribers that switch on a string tag.
    pub fn source(&self) -> &'static str {
        match self {
            CacheUpdate::Resynced { .. } => "api",
            CacheUpdate::Created { .. } => "create",
            CacheUpdate::Updated { .. } => "update",
            CacheUpdate::Deleted { .. } => "delete",
        }
    }
}
