//! In-memory, type-scoped entity cache.
//!
//! Two kinds of entries are kept, see [`EntryKind`]:
//! - `Entity` entries hold the last value fetched directly by id, keyed by
//!   entity type and id.
//! - `Collection` entries are the members of an exhaustive listing of a
//!   type. A type's listing is stored as one snapshot and replaced as a
//!   whole, so readers see either the previous listing or the new one,
//!   never a mix.
//!
//! The two kinds never answer for each other: [`TypeCache::get`] only sees
//! entity entries and [`TypeCache::get_collection`] only sees listings.
//! Invalidating an id removes its entity entry and leaves any listed copy in
//! place until the listing expires.
//!
//! Every entry expires a fixed time after insertion regardless of access.
//! Expiry is checked on access. Values are immutable snapshots shared
//! through `Arc`, so concurrent readers never observe a partial write.

use std::any::Any;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tracing::{debug, trace};

use crate::config::DEFAULT_CACHE_TTL_MINUTES;

/// A value the cache can hold.
pub trait Cacheable: Clone + Send + Sync + 'static {
    /// Entity type name; scopes the cache keys.
    const TYPE_NAME: &'static str;

    /// The backend id of this value.
    fn id(&self) -> u32;
}

/// What an entry stands for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// The current known value for one id.
    Entity,
    /// One member of a complete listing of its type.
    Collection,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    type_name: &'static str,
    id: String,
}

impl CacheKey {
    fn new(type_name: &'static str, id: u32) -> Self {
        Self {
            type_name,
            id: id.to_string(),
        }
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.id)
    }
}

/// A cached value with its expiry metadata.
struct CacheEntry {
    value: Arc<dyn Any + Send + Sync>,
    cached_at: Instant,
    expires_at: Instant,
}

impl CacheEntry {
    fn new<T: Cacheable>(value: T, ttl: Duration) -> Self {
        let now = Instant::now();
        Self {
            value: Arc::new(value),
            cached_at: now,
            expires_at: now + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn age(&self) -> Duration {
        self.cached_at.elapsed()
    }

    fn downcast<T: Cacheable>(&self) -> Option<T> {
        self.value.downcast_ref::<T>().cloned()
    }
}

/// A complete listing of one type, in listing order.
struct CollectionSnapshot {
    /// A `Vec<T>` for the type the snapshot is keyed under.
    members: Arc<dyn Any + Send + Sync>,
    len: usize,
    cached_at: Instant,
    expires_at: Instant,
}

impl CollectionSnapshot {
    fn new<T: Cacheable>(members: Vec<T>, cached_at: Instant, ttl: Duration) -> Self {
        Self {
            len: members.len(),
            members: Arc::new(members),
            cached_at,
            expires_at: cached_at + ttl,
        }
    }

    fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }

    fn members<T: Cacheable>(&self) -> Option<Vec<T>> {
        self.members.downcast_ref::<Vec<T>>().cloned()
    }
}

/// Thread-safe cache of remote entities, scoped by type.
pub struct TypeCache {
    entries: DashMap<CacheKey, CacheEntry>,
    collections: DashMap<&'static str, Arc<CollectionSnapshot>>,
    ttl: Duration,
}

impl fmt::Debug for TypeCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypeCache")
            .field("entries", &self.entries.len())
            .field("collections", &self.collections.len())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl Default for TypeCache {
    fn default() -> Self {
        Self::new(Duration::from_secs(u64::from(DEFAULT_CACHE_TTL_MINUTES) * 60))
    }
}

impl TypeCache {
    /// Create a cache whose entries live for `ttl` after insertion.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: DashMap::new(),
            collections: DashMap::new(),
            ttl,
        }
    }

    /// Entry lifetime.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Get the entity entry for `id`, if present and not expired.
    pub fn get<T: Cacheable>(&self, id: u32) -> Option<T> {
        let key = CacheKey::new(T::TYPE_NAME, id);

        match self.entries.get(&key) {
            None => {
                trace!(key = %key, "Cache miss");
                return None;
            }
            Some(entry) if !entry.is_expired() => {
                trace!(key = %key, age = ?entry.age(), "Cache hit");
                return entry.downcast::<T>();
            }
            Some(_) => {}
        }

        if self.entries.remove_if(&key, |_, e| e.is_expired()).is_some() {
            debug!(key = %key, "Evicted expired cache entry");
        }
        None
    }

    /// Get the cached listing of `T`, in listing order.
    ///
    /// Returns an empty list when no listing is cached; an empty result does
    /// not mean the remote collection is empty. A listing expires as a whole.
    pub fn get_collection<T: Cacheable>(&self) -> Vec<T> {
        let snapshot = match self.collections.get(T::TYPE_NAME) {
            Some(snapshot) => Arc::clone(snapshot.value()),
            None => {
                trace!(entity = T::TYPE_NAME, "Collection cache miss");
                return Vec::new();
            }
        };

        if snapshot.is_expired() {
            // Only the snapshot seen here goes; a listing cached meanwhile stays.
            let evicted = self
                .collections
                .remove_if(T::TYPE_NAME, |_, current| Arc::ptr_eq(current, &snapshot));
            if evicted.is_some() {
                debug!(entity = T::TYPE_NAME, evicted = snapshot.len, "Evicted expired collection");
            }
            return Vec::new();
        }

        trace!(
            entity = T::TYPE_NAME,
            count = snapshot.len,
            age = ?snapshot.cached_at.elapsed(),
            "Collection cache hit"
        );
        snapshot.members::<T>().unwrap_or_default()
    }

    /// Insert or fully replace the entry for `id`.
    ///
    /// A `Collection` put replaces the member with the same id in the cached
    /// listing, or appends it, without extending the listing's lifetime. With
    /// no listing cached it starts one holding just this value.
    pub fn put<T: Cacheable>(&self, id: u32, value: T, kind: EntryKind) {
        match kind {
            EntryKind::Entity => {
                let key = CacheKey::new(T::TYPE_NAME, id);
                trace!(key = %key, "Caching entry");
                self.entries.insert(key, CacheEntry::new(value, self.ttl));
            }
            EntryKind::Collection => {
                trace!(entity = T::TYPE_NAME, id, "Caching collection member");
                match self.collections.entry(T::TYPE_NAME) {
                    Entry::Occupied(mut occupied) => {
                        let current = occupied.get();
                        let mut members = current.members::<T>().unwrap_or_default();
                        match members.iter_mut().find(|member| member.id() == id) {
                            Some(slot) => *slot = value,
                            None => members.push(value),
                        }
                        let cached_at = current.cached_at;
                        occupied.insert(Arc::new(CollectionSnapshot::new(members, cached_at, self.ttl)));
                    }
                    Entry::Vacant(vacant) => {
                        vacant.insert(Arc::new(CollectionSnapshot::new(
                            vec![value],
                            Instant::now(),
                            self.ttl,
                        )));
                    }
                }
            }
        }
    }

    /// Cache a complete listing of `T`, replacing any previous listing.
    pub fn put_all<T: Cacheable>(&self, items: &[T]) {
        let snapshot = CollectionSnapshot::new(items.to_vec(), Instant::now(), self.ttl);
        self.collections.insert(T::TYPE_NAME, Arc::new(snapshot));
        debug!(entity = T::TYPE_NAME, count = items.len(), "Cached collection");
    }

    /// Remove the entity entry for `id`.
    ///
    /// A cached listing containing the same id is left alone.
    pub fn remove<T: Cacheable>(&self, id: u32) {
        let key = CacheKey::new(T::TYPE_NAME, id);
        if self.entries.remove(&key).is_some() {
            debug!(key = %key, "Invalidated cache entry");
        }
    }

    /// Remove every entry of every type.
    pub fn clear(&self) {
        self.entries.clear();
        self.collections.clear();
        debug!("Cleared cache");
    }

    /// Remove every expired entry. Returns how many were removed, counting
    /// each member of an expired listing.
    pub fn purge_expired(&self) -> usize {
        let mut purged = 0;
        self.entries.retain(|_, entry| {
            let expired = entry.is_expired();
            purged += usize::from(expired);
            !expired
        });
        self.collections.retain(|_, snapshot| {
            let expired = snapshot.is_expired();
            if expired {
                purged += snapshot.len;
            }
            !expired
        });
        if purged > 0 {
            debug!(purged, "Purged expired cache entries");
        }
        purged
    }

    /// Number of entries, expired or not, counting each listed member.
    pub fn len(&self) -> usize {
        self.entries.len() + self.collections.iter().map(|s| s.value().len).sum::<usize>()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Get cache statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = CacheStats {
            entity_entries: 0,
            collection_entries: 0,
            expired_entries: 0,
            ttl_seconds: self.ttl.as_secs(),
        };
        for entry in self.entries.iter() {
            stats.entity_entries += 1;
            if entry.value().is_expired() {
                stats.expired_entries += 1;
            }
        }
        for snapshot in self.collections.iter() {
            stats.collection_entries += snapshot.value().len;
            if snapshot.value().is_expired() {
                stats.expired_entries += snapshot.value().len;
            }
        }
        stats
    }
}

/// Cache statistics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheStats {
    /// Entries cached by direct fetch.
    pub entity_entries: usize,
    /// Entries cached as members of a listing.
    pub collection_entries: usize,
    /// Entries past their expiry that have not been evicted yet.
    pub expired_entries: usize,
    /// TTL in seconds.
    pub ttl_seconds: u64,
}

impl CacheStats {
    /// Total number of entries.
    pub fn total(&self) -> usize {
        self.entity_entries + self.collection_entries
    }
}
