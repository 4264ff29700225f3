//! Time-bounded memoization keyed by fingerprint
//!
//! - An entry is valid iff `now - inserted_at < ttl`
//! - Expired entries read as a miss and are replaced on the next write
//! - No background sweeping; `purge_expired` exists for explicit reclaim
//! - Size is capped: inserting a new key at capacity evicts the least
//!   recently used entry
//!
//! All state sits behind one mutex. Lookups are O(1) in the map plus
//! O(log n) to refresh recency.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

use chrono::{DateTime, Duration, Utc};

use super::clock::Clock;
use super::fingerprint::QueryFingerprint;

/// Largest TTL chrono can represent; longer TTLs are clamped
const MAX_TTL_SECONDS: u64 = (i64::MAX / 1000) as u64;

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup<V> {
    /// Valid entry found
    Hit(V),
    /// Absent or expired
    Miss,
}

impl<V> CacheLookup<V> {
    pub fn is_hit(&self) -> bool {
        matches!(self, CacheLookup::Hit(_))
    }
}

/// One memoized value
#[derive(Debug, Clone)]
pub struct CacheEntry<V> {
    pub fingerprint: QueryFingerprint,
    pub payload: V,
    pub inserted_at: DateTime<Utc>,
    pub ttl_seconds: u64,
}

impl<V> CacheEntry<V> {
    /// Valid iff strictly less than `ttl_seconds` have elapsed
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        let secs = self.ttl_seconds.min(MAX_TTL_SECONDS) as i64;
        let ttl = Duration::seconds(secs);
        now - self.inserted_at < ttl
    }
}

/// Passive counters; never influence caching decisions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub insertions: u64,
    pub evictions: u64,
}

struct Slot<V> {
    entry: CacheEntry<V>,
    tick: u64,
}

struct CacheInner<V> {
    entries: HashMap<QueryFingerprint, Slot<V>>,
    /// tick -> key, oldest first
    recency: BTreeMap<u64, QueryFingerprint>,
    next_tick: u64,
    stats: CacheStats,
}

impl<V> CacheInner<V> {
    fn touch(&mut self, fingerprint: &QueryFingerprint) {
        let tick = self.next_tick;
        if let Some(slot) = self.entries.get_mut(fingerprint) {
            self.recency.remove(&slot.tick);
            slot.tick = tick;
            self.recency.insert(tick, *fingerprint);
            self.next_tick += 1;
        }
    }

    fn insert(&mut self, entry: CacheEntry<V>, capacity: usize) {
        let key = entry.fingerprint;
        let tick = self.next_tick;
        self.next_tick += 1;

        if let Some(old) = self.entries.remove(&key) {
            self.recency.remove(&old.tick);
        } else {
            while self.entries.len() >= capacity {
                let Some((_, victim)) = self.recency.pop_first() else {
                    break;
                };
                self.entries.remove(&victim);
                self.stats.evictions += 1;
            }
        }

        self.entries.insert(key, Slot { entry, tick });
        self.recency.insert(tick, key);
        self.stats.insertions += 1;
    }
}

/// TTL cache with LRU capacity bound
pub struct ResultCache<V> {
    inner: Mutex<CacheInner<V>>,
    clock: Arc<dyn Clock>,
    capacity: usize,
}

impl<V: Clone> ResultCache<V> {
    /// Create a cache holding at most `capacity` entries (minimum 1)
    pub fn new(capacity: usize, clock: Arc<dyn Clock>) -> Self {
        Self {
            inner: Mutex::new(CacheInner {
                entries: HashMap::with_capacity(capacity.min(1024)),
                recency: BTreeMap::new(),
                next_tick: 0,
                stats: CacheStats::default(),
            }),
            clock,
            capacity: capacity.max(1),
        }
    }

    fn lock(&self) -> MutexGuard<'_, CacheInner<V>> {
        // Every mutation completes before the guard drops, so a poisoned
        // lock still holds a consistent map.
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Look up a valid entry
    pub fn get(&self, fingerprint: &QueryFingerprint) -> CacheLookup<V> {
        let now = self.clock.now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        let payload = match inner.entries.get(fingerprint) {
            Some(slot) if slot.entry.is_valid_at(now) => slot.entry.payload.clone(),
            _ => {
                inner.stats.misses += 1;
                return CacheLookup::Miss;
            }
        };

        inner.touch(fingerprint);
        inner.stats.hits += 1;
        CacheLookup::Hit(payload)
    }

    /// Insert or overwrite, resetting the entry's clock
    pub fn put(&self, fingerprint: QueryFingerprint, payload: V, ttl_seconds: u64) {
        let entry = CacheEntry {
            fingerprint,
            payload,
            inserted_at: self.clock.now(),
            ttl_seconds,
        };
        self.lock().insert(entry, self.capacity);
    }

    /// Insert unless a valid entry already exists; returns whichever value is
    /// stored afterwards.
    ///
    /// Used after a miss was computed outside the lock: if a concurrent caller
    /// filled the slot meanwhile, its value wins and nothing is overwritten.
    pub fn put_if_vacant(&self, fingerprint: QueryFingerprint, payload: V, ttl_seconds: u64) -> V {
        let now = self.clock.now();
        let mut guard = self.lock();
        let inner = &mut *guard;

        if let Some(slot) = inner.entries.get(&fingerprint) {
            if slot.entry.is_valid_at(now) {
                let existing = slot.entry.payload.clone();
                inner.touch(&fingerprint);
                return existing;
            }
        }

        let entry = CacheEntry {
            fingerprint,
            payload: payload.clone(),
            inserted_at: now,
            ttl_seconds,
        };
        inner.insert(entry, self.capacity);
        payload
    }

    /// Remove one entry; returns whether it was present
    pub fn remove(&self, fingerprint: &QueryFingerprint) -> bool {
        let mut inner = self.lock();
        match inner.entries.remove(fingerprint) {
            Some(slot) => {
                inner.recency.remove(&slot.tick);
                true
            }
            None => false,
        }
    }

    /// Drop every expired entry; returns how many were removed
    pub fn purge_expired(&self) -> usize {
        let now = self.clock.now();
        let mut inner = self.lock();

        let expired: Vec<(QueryFingerprint, u64)> = inner
            .entries
            .iter()
            .filter(|(_, slot)| !slot.entry.is_valid_at(now))
            .map(|(key, slot)| (*key, slot.tick))
            .collect();

        for (key, tick) in &expired {
            inner.entries.remove(key);
            inner.recency.remove(tick);
        }
        expired.len()
    }

    /// Drop everything (statistics are kept)
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.entries.clear();
        inner.recency.clear();
    }

    /// Number of stored entries, expired ones included
    pub fn len(&self) -> usize {
        self.lock().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        self.lock().stats.clone()
    }
}
