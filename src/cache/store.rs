//! Durable storage backends for the customer cache.
//!
//! The `DurableStore` trait is the only seam between the cache and the
//! machine it runs on: entries are namespaced string blobs, and every
//! failure mode (missing directory, quota, bad JSON) is absorbed here and
//! surfaces to the rest of the system as a cache miss. A cache must never
//! be less available than having no cache at all.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// A serialized value together with the moment it was captured.
///
/// This is the on-disk header for the record set entry; the metadata entry
/// carries its own timestamp.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CachedData<T> {
    pub data: T,
    pub cached_at: DateTime<Utc>,
}

impl<T> CachedData<T> {
    pub fn age_minutes(&self) -> i64 {
        (Utc::now() - self.cached_at).num_minutes()
    }

    /// Human-readable age for status lines ("just now", "5m ago", "2h ago").
    /// Hours and days round to the nearest unit.
    pub fn age_display(&self) -> String {
        let minutes = self.age_minutes();
        if minutes < 1 {
            // Also covers clock skew (negative ages)
            return "just now".to_string();
        }
        if minutes < 60 {
            return format!("{}m ago", minutes);
        }
        if minutes < 1440 {
            return format!("{}h ago", (minutes + 30) / 60);
        }
        format!("{}d ago", (minutes + 720) / 1440)
    }
}

/// Namespaced durable key-value storage.
///
/// Contract: `read` returns `None` for anything it cannot produce - a
/// missing entry, an unavailable backend, an I/O error. `write` and
/// `delete` succeed silently or log and give up; they never propagate
/// failures to the caller.
pub trait DurableStore: Send + Sync {
    fn read(&self, namespace: &str, key: &str) -> Option<String>;
    fn write(&self, namespace: &str, key: &str, value: &str);
    /// Remove every entry in the namespace.
    fn delete(&self, namespace: &str);
}

// Lets tests hold a handle to a store they have handed to the cache.
impl<S: DurableStore + ?Sized> DurableStore for Arc<S> {
    fn read(&self, namespace: &str, key: &str) -> Option<String> {
        (**self).read(namespace, key)
    }

    fn write(&self, namespace: &str, key: &str, value: &str) {
        (**self).write(namespace, key, value)
    }

    fn delete(&self, namespace: &str) {
        (**self).delete(namespace)
    }
}

/// File-backed store: one JSON file per entry under a namespace directory.
///
/// If the root directory cannot be created at construction time the store
/// marks itself unavailable and every operation becomes a no-op, degrading
/// the cache to "always fetch".
pub struct FileStore {
    /// None when the backing directory could not be created.
    root: Option<PathBuf>,
}

impl FileStore {
    pub fn new(root: PathBuf) -> Self {
        match std::fs::create_dir_all(&root) {
            Ok(()) => Self { root: Some(root) },
            Err(e) => {
                warn!(path = %root.display(), error = %e, "Cache directory unavailable, running without durable storage");
                Self { root: None }
            }
        }
    }

    /// Whether a backing directory is actually available.
    pub fn is_available(&self) -> bool {
        self.root.is_some()
    }

    fn entry_path(&self, namespace: &str, key: &str) -> Option<PathBuf> {
        self.root
            .as_ref()
            .map(|root| root.join(namespace).join(format!("{}.json", key)))
    }
}

impl DurableStore for FileStore {
    fn read(&self, namespace: &str, key: &str) -> Option<String> {
        let path = self.entry_path(namespace, key)?;
        if !path.exists() {
            return None;
        }
        match std::fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(e) => {
                debug!(namespace = namespace, key = key, error = %e, "Failed to read cache entry, treating as miss");
                None
            }
        }
    }

    fn write(&self, namespace: &str, key: &str, value: &str) {
        let Some(path) = self.entry_path(namespace, key) else {
            return;
        };
        if let Some(parent) = path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                warn!(namespace = namespace, error = %e, "Failed to create cache namespace directory");
                return;
            }
        }
        match std::fs::write(&path, value) {
            Ok(()) => debug!(namespace = namespace, key = key, bytes = value.len(), "Cache entry written"),
            Err(e) => warn!(namespace = namespace, key = key, error = %e, "Failed to write cache entry"),
        }
    }

    fn delete(&self, namespace: &str) {
        let Some(root) = self.root.as_ref() else {
            return;
        };
        let dir = root.join(namespace);
        match std::fs::remove_dir_all(&dir) {
            Ok(()) => debug!(namespace = namespace, "Cache namespace deleted"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(namespace = namespace, error = %e, "Failed to delete cache namespace"),
        }
    }
}

/// In-memory store for tests and storage-less environments.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl DurableStore for MemoryStore {
    fn read(&self, namespace: &str, key: &str) -> Option<String> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.get(&(namespace.to_string(), key.to_string())).cloned()
    }

    fn write(&self, namespace: &str, key: &str, value: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert((namespace.to_string(), key.to_string()), value.to_string());
    }

    fn delete(&self, namespace: &str) {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.retain(|(ns, _), _| ns != namespace);
    }
}

// ============================================================================
// Tests
// ============================================================================
