//! Ordered-key cache stores.
//!
//! A [`KeyStore`] indexes [`CacheEntry`] records by their sat-delta key and
//! answers "K nearest keys" queries, optionally restricted to entries whose
//! variable count does not exceed a limit. The same generic structure holds
//! models (SatEntry) and unsat cores (UnsatEntry).
//!
//! Entries are persisted through the [`backing::BackingStore`] boundary:
//!
//! - [`backing::MemBackingStore`]: process-local concurrent hashmap (DashMap)
//! - [`durable::DurableStore`]: ACID transactions on disk (redb)

pub mod backing;
pub mod durable;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::{Arc, RwLock};

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::solution::{Core, Model};

use self::backing::BackingStore;

/// Result type for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Payload kinds a [`KeyStore`] can hold.
pub trait Payload: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Key segment separating this payload kind in the backing store.
    const KIND: &'static str;
}

impl Payload for Model {
    const KIND: &'static str = "sat";
}

impl Payload for Core {
    const KIND: &'static str = "unsat";
}

/// A cached solver answer indexed by sat-delta.
///
/// Key and size are fixed at creation; entries are never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<P> {
    key: f64,
    size: usize,
    payload: P,
}

impl<P> CacheEntry<P> {
    pub fn new(key: f64, size: usize, payload: P) -> Self {
        Self { key, size, payload }
    }

    /// The sat-delta this entry is indexed under.
    pub fn key(&self) -> f64 {
        self.key
    }

    /// Number of distinct variables of the originating expression.
    pub fn size(&self) -> usize {
        self.size
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }
}

/// Model entries (SatEntry).
pub type SatEntry = CacheEntry<Model>;
/// Unsat-core entries (UnsatEntry).
pub type UnsatEntry = CacheEntry<Core>;

/// Totally ordered f64 key.
#[derive(Debug, Clone, Copy)]
struct DeltaKey(f64);

impl PartialEq for DeltaKey {
    fn eq(&self, other: &Self) -> bool {
        self.0.total_cmp(&other.0) == Ordering::Equal
    }
}

impl Eq for DeltaKey {}

impl PartialOrd for DeltaKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for DeltaKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug)]
struct Slot<P> {
    seq: u64,
    entry: Arc<CacheEntry<P>>,
}

#[derive(Debug)]
struct Inner<P> {
    /// Key → entries with that key, oldest first.
    buckets: BTreeMap<DeltaKey, Vec<Slot<P>>>,
    next_seq: u64,
    len: usize,
}

impl<P> Default for Inner<P> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            next_seq: 0,
            len: 0,
        }
    }
}

/// Outcome of flushing a store to its backing store.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushReport {
    pub written: usize,
    pub dropped: usize,
}

/// Sat-delta ordered store of cache entries.
///
/// Insertions take the write lock; nearest-K extraction takes the read lock,
/// so lookups run concurrently with each other but never with an insertion.
#[derive(Debug)]
pub struct KeyStore<P: Payload> {
    inner: RwLock<Inner<P>>,
}

impl<P: Payload> KeyStore<P> {
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
        }
    }

    /// Insert an entry, returning its insertion sequence number.
    pub fn insert(&self, entry: CacheEntry<P>) -> u64 {
        let mut inner = self.inner.write().expect("key store lock poisoned");
        let seq = inner.next_seq;
        inner.next_seq += 1;
        inner.len += 1;
        inner
            .buckets
            .entry(DeltaKey(entry.key))
            .or_default()
            .push(Slot {
                seq,
                entry: Arc::new(entry),
            });
        seq
    }

    pub fn len(&self) -> usize {
        self.inner.read().expect("key store lock poisoned").len
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry held in memory. The backing store is not touched.
    pub fn clear(&self) {
        *self.inner.write().expect("key store lock poisoned") = Inner::default();
    }

    /// Up to `k` entries closest to `key`, nearest first.
    ///
    /// With `max_size`, entries whose size exceeds it are skipped. Equal
    /// distances resolve by insertion order, oldest first.
    pub fn nearest(&self, key: f64, k: usize, max_size: Option<usize>) -> Vec<Arc<CacheEntry<P>>> {
        let inner = self.inner.read().expect("key store lock poisoned");
        let query = DeltaKey(key);
        let mut below = inner.buckets.range(..=query).rev().peekable();
        let mut above = inner
            .buckets
            .range((Bound::Excluded(query), Bound::Unbounded))
            .peekable();

        let fits = |slot: &&Slot<P>| max_size.is_none_or(|max| slot.entry.size <= max);
        let mut out = Vec::with_capacity(k);
        while out.len() < k {
            let down = below.peek().map(|(b, _)| key - b.0);
            let up = above.peek().map(|(a, _)| a.0 - key);
            let group: Vec<&Slot<P>> = match (down, up) {
                (None, None) => break,
                (Some(_), None) => below.next().map(|(_, s)| s.iter().collect()).unwrap_or_default(),
                (None, Some(_)) => above.next().map(|(_, s)| s.iter().collect()).unwrap_or_default(),
                (Some(d), Some(u)) => match d.total_cmp(&u) {
                    Ordering::Less => below.next().map(|(_, s)| s.iter().collect()).unwrap_or_default(),
                    Ordering::Greater => above.next().map(|(_, s)| s.iter().collect()).unwrap_or_default(),
                    Ordering::Equal => {
                        let mut both: Vec<&Slot<P>> = Vec::new();
                        if let Some((_, s)) = below.next() {
                            both.extend(s.iter());
                        }
                        if let Some((_, s)) = above.next() {
                            both.extend(s.iter());
                        }
                        both.sort_by_key(|slot| slot.seq);
                        both
                    }
                },
            };
            out.extend(
                group
                    .into_iter()
                    .filter(fits)
                    .take(k - out.len())
                    .map(|slot| Arc::clone(&slot.entry)),
            );
        }
        out
    }

    /// All entries in insertion order.
    pub fn entries(&self) -> Vec<Arc<CacheEntry<P>>> {
        let inner = self.inner.read().expect("key store lock poisoned");
        let mut slots: Vec<&Slot<P>> = inner.buckets.values().flatten().collect();
        slots.sort_by_key(|slot| slot.seq);
        slots.into_iter().map(|slot| Arc::clone(&slot.entry)).collect()
    }

    /// Backing-store key prefix for this payload kind.
    pub fn key_prefix(prefix: &str) -> String {
        format!("{prefix}:{}:", P::KIND)
    }

    /// Load every entry stored under this payload kind's prefix.
    ///
    /// Failures degrade instead of propagating: an unreadable key set loads
    /// nothing, and unreadable or undecodable entries are skipped.
    pub fn warm_load(&self, backing: &dyn BackingStore, prefix: &str) -> usize {
        let key_prefix = Self::key_prefix(prefix);
        let mut keys = match backing.keys_matching(&format!("{key_prefix}*")) {
            Ok(keys) => keys,
            Err(e) => {
                tracing::warn!(error = %e, prefix = %key_prefix, "listing cache entries failed, starting cold");
                return 0;
            }
        };
        keys.sort();

        let mut loaded = 0;
        for key in keys {
            let bytes = match backing.get(&key) {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "reading cache entry failed, skipping");
                    continue;
                }
            };
            match decode::<P>(&bytes) {
                Ok(entry) => {
                    self.insert(entry);
                    loaded += 1;
                }
                Err(e) => tracing::warn!(error = %e, key = %key, "decoding cache entry failed, skipping"),
            }
        }
        loaded
    }

    /// Write every entry to the backing store under `"{prefix}:{kind}:{seq}"`.
    ///
    /// Sequence numbers restart from zero in insertion order, so flushing a
    /// warm-loaded store rewrites the keys it was loaded from. Failed writes
    /// are logged and counted as dropped.
    pub fn flush(&self, backing: &dyn BackingStore, prefix: &str) -> FlushReport {
        let key_prefix = Self::key_prefix(prefix);
        let mut report = FlushReport::default();
        for (seq, entry) in self.entries().iter().enumerate() {
            let key = format!("{key_prefix}{seq:020}");
            let written = encode(entry.as_ref()).and_then(|bytes| backing.put(&key, &bytes));
            match written {
                Ok(()) => report.written += 1,
                Err(e) => {
                    tracing::warn!(error = %e, key = %key, "writing cache entry failed, dropped");
                    report.dropped += 1;
                }
            }
        }
        report
    }
}

impl<P: Payload> Default for KeyStore<P> {
    fn default() -> Self {
        Self::new()
    }
}

fn encode<P: Payload>(entry: &CacheEntry<P>) -> StoreResult<Vec<u8>> {
    bincode::serialize(entry).map_err(|e| StoreError::Serialization {
        message: format!("failed to encode cache entry: {e}"),
    })
}

fn decode<P: Payload>(bytes: &[u8]) -> StoreResult<CacheEntry<P>> {
    bincode::deserialize(bytes).map_err(|e| StoreError::Serialization {
        message: format!("failed to decode cache entry: {e}"),
    })
}
