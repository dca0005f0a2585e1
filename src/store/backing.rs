//! Backing-store boundary for warm start and shutdown flush.
//!
//! A backing store is an opaque string-keyed byte store. The cache only ever
//! lists keys by pattern, reads, and writes; it never deletes.

use dashmap::DashMap;

use super::StoreResult;

/// Key-value store holding persisted cache entries.
pub trait BackingStore: Send + Sync {
    /// Read a value. `Ok(None)` if the key does not exist.
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>>;

    /// Insert or replace a value.
    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()>;

    /// Keys matching `pattern`: an exact key, or a prefix followed by `*`.
    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>>;
}

/// Whether `key` matches a key pattern (exact, or prefix ending in `*`).
pub fn pattern_matches(pattern: &str, key: &str) -> bool {
    match pattern.strip_suffix('*') {
        Some(prefix) => key.starts_with(prefix),
        None => key == pattern,
    }
}

/// In-memory backing store using a sharded hashmap.
///
/// All data is lost on process exit; useful for tests and for sharing warm
/// entries between engines within one process.
#[derive(Debug, Default)]
pub struct MemBackingStore {
    data: DashMap<String, Vec<u8>>,
}

impl MemBackingStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored keys.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl BackingStore for MemBackingStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.data.get(key).map(|v| v.value().clone()))
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        self.data.insert(key.to_string(), value.to_vec());
        Ok(())
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        Ok(self
            .data
            .iter()
            .filter(|entry| pattern_matches(pattern, entry.key()))
            .map(|entry| entry.key().clone())
            .collect())
    }
}

/// Backing store whose operations fail on demand, over an in-memory map.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct FailingBackingStore {
    pub(crate) inner: MemBackingStore,
    /// Every `keys_matching` call fails.
    pub(crate) fail_listing: bool,
    /// Reads of keys containing this text fail.
    pub(crate) fail_reads_of: Option<String>,
    /// Every `put` fails.
    pub(crate) fail_writes: bool,
}

#[cfg(test)]
impl FailingBackingStore {
    fn failure(operation: &str, key: &str) -> crate::error::StoreError {
        crate::error::StoreError::Redb {
            message: format!("{operation} of {key} failed: injected"),
        }
    }
}

#[cfg(test)]
impl BackingStore for FailingBackingStore {
    fn get(&self, key: &str) -> StoreResult<Option<Vec<u8>>> {
        match &self.fail_reads_of {
            Some(text) if key.contains(text.as_str()) => Err(Self::failure("get", key)),
            _ => self.inner.get(key),
        }
    }

    fn put(&self, key: &str, value: &[u8]) -> StoreResult<()> {
        if self.fail_writes {
            return Err(Self::failure("put", key));
        }
        self.inner.put(key, value)
    }

    fn keys_matching(&self, pattern: &str) -> StoreResult<Vec<String>> {
        if self.fail_listing {
            return Err(Self::failure("keys_matching", pattern));
        }
        self.inner.keys_matching(pattern)
    }
}
