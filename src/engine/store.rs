//! Key-value store contract for room snapshots, plus an in-memory backend.

use std::collections::HashMap;
use std::future::Future;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use crate::engine::error::StoreError;

/// Store key for a room, case-normalized.
pub fn room_key(room_id: &str) -> String {
    format!("room:{}", room_id.to_ascii_uppercase())
}

/// Opaque byte store with per-key expiry.
pub trait GameStore: Send + Sync + 'static {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Write only if the stored bytes still equal `expected`. Returns whether
    /// the write happened.
    ///
    /// The default is a plain read-compare-write; backends with a native
    /// compare-and-set should override it.
    fn set_if_unchanged(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move {
            let current = self.get(key).await?;
            if current.as_deref() != expected {
                return Ok(false);
            }
            self.set(key, value, ttl).await?;
            Ok(true)
        }
    }
}

struct Entry {
    value: Vec<u8>,
    expires_at: Instant,
}

/// Process-local store. Compare-and-set is atomic under one lock.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn with_entries<T>(
        &self,
        f: impl FnOnce(&mut HashMap<String, Entry>) -> T,
    ) -> Result<T, StoreError> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".into()))?;
        let now = Instant::now();
        entries.retain(|_, e| e.expires_at > now);
        Ok(f(&mut entries))
    }

    /// Remaining lifetime of a key, if present.
    pub fn ttl_remaining(&self, key: &str) -> Option<Duration> {
        self.with_entries(|entries| {
            entries
                .get(key)
                .map(|e| e.expires_at.saturating_duration_since(Instant::now()))
        })
        .ok()
        .flatten()
    }

    pub fn len(&self) -> usize {
        self.with_entries(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl GameStore for MemoryStore {
    fn get(&self, key: &str) -> impl Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.with_entries(|entries| entries.get(key).map(|e| e.value.clone()))
        }
    }

    fn set(
        &self,
        key: &str,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<(), StoreError>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.with_entries(|entries| {
                entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
            })
        }
    }

    fn set_if_unchanged(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        value: Vec<u8>,
        ttl: Duration,
    ) -> impl Future<Output = Result<bool, StoreError>> + Send {
        async move {
            tokio::task::yield_now().await;
            self.with_entries(|entries| {
                let current = entries.get(key).map(|e| e.value.as_slice());
                if current != expected {
                    return false;
                }
                entries.insert(
                    key.to_string(),
                    Entry {
                        value,
                        expires_at: Instant::now() + ttl,
                    },
                );
                true
            })
        }
    }
}
