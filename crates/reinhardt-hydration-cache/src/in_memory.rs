//! In-memory cache implementation

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use parking_lot::RwLock;
use reinhardt_hydrator::{CachedValue, HydrationCache, HydrationResult};

use crate::entry::CacheEntry;
use crate::statistics::{CacheEntryInfo, CacheStatistics};

/// In-memory cache backend
///
/// Expired entries are dropped when they are read and by
/// [`InMemoryCache::cleanup_expired`]. Clones share the same store.
#[derive(Clone, Default)]
pub struct InMemoryCache {
	store: Arc<RwLock<HashMap<String, CacheEntry>>>,
	default_ttl: Option<Duration>,
	hits: Arc<AtomicU64>,
	misses: Arc<AtomicU64>,
	writes: Arc<AtomicU64>,
}

impl InMemoryCache {
	/// Create a new in-memory cache
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydration_cache::InMemoryCache;
	///
	/// let cache = InMemoryCache::new();
	/// assert!(cache.list_keys().is_empty());
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Set a default TTL for all cache entries
	///
	/// Every write restarts the TTL, so an entry that keeps being read
	/// through `Hydrator::hydrate_cached` stays alive.
	pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
		self.default_ttl = Some(ttl);
		self
	}

	pub fn default_ttl(&self) -> Option<Duration> {
		self.default_ttl
	}

	/// Stores `value` with an explicit TTL, `None` meaning it never expires.
	pub fn insert_with_ttl<T: Any + Send + Sync>(&self, key: &str, value: T, ttl: Option<Duration>) {
		self.insert_entry(key, CacheEntry::new(Arc::new(value), ttl));
	}

	/// Reads a value stored under `key` as `T`.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydration_cache::InMemoryCache;
	///
	/// let cache = InMemoryCache::new();
	/// cache.insert_with_ttl("answer", 42u32, None);
	///
	/// assert_eq!(cache.get_as::<u32>("answer").as_deref(), Some(&42));
	/// assert!(cache.get_as::<String>("answer").is_none());
	/// ```
	pub fn get_as<T: Any + Send + Sync>(&self, key: &str) -> Option<Arc<T>> {
		self.lookup(key).and_then(|value| value.downcast::<T>().ok())
	}

	pub fn has_key(&self, key: &str) -> bool {
		self.store.read().get(key).is_some_and(|entry| !entry.is_expired())
	}

	/// Removes `key`, returning whether it was present.
	pub fn delete(&self, key: &str) -> bool {
		self.store.write().remove(key).is_some()
	}

	pub fn clear(&self) {
		self.store.write().clear();
	}

	/// Clean up expired entries
	///
	/// Returns the number of entries removed.
	pub fn cleanup_expired(&self) -> usize {
		let mut store = self.store.write();
		let before = store.len();
		store.retain(|_, entry| !entry.is_expired());
		let removed = before - store.len();
		if removed > 0 {
			tracing::debug!(removed, "dropped expired hydration cache entries");
		}
		removed
	}

	/// Get cache statistics
	pub fn get_statistics(&self) -> CacheStatistics {
		let hits = self.hits.load(Ordering::Relaxed);
		let misses = self.misses.load(Ordering::Relaxed);
		CacheStatistics {
			hits,
			misses,
			total_requests: hits + misses,
			writes: self.writes.load(Ordering::Relaxed),
			entry_count: self.store.read().len() as u64,
		}
	}

	/// List all keys in the cache
	///
	/// Expired entries that have not been cleaned up yet are included.
	pub fn list_keys(&self) -> Vec<String> {
		self.store.read().keys().cloned().collect()
	}

	/// Inspect a cache entry
	pub fn inspect_entry(&self, key: &str) -> Option<CacheEntryInfo> {
		let store = self.store.read();
		let entry = store.get(key)?;
		Some(CacheEntryInfo {
			key: key.to_string(),
			has_expiry: entry.expires_at.is_some(),
			ttl_seconds: entry.ttl_seconds(),
		})
	}

	fn insert_entry(&self, key: &str, entry: CacheEntry) {
		self.writes.fetch_add(1, Ordering::Relaxed);
		self.store.write().insert(key.to_string(), entry);
	}

	/// Removes `key` only if the stored entry is still expired under the write lock.
	fn evict_if_expired(&self, key: &str) -> bool {
		let mut store = self.store.write();
		if store.get(key).is_some_and(CacheEntry::is_expired) {
			store.remove(key);
			return true;
		}
		false
	}

	fn lookup(&self, key: &str) -> Option<CachedValue> {
		let found = {
			let store = self.store.read();
			store.get(key).map(|entry| (entry.is_expired(), entry.value.clone()))
		};
		match found {
			Some((false, value)) => {
				self.hits.fetch_add(1, Ordering::Relaxed);
				Some(value)
			}
			Some((true, _)) => {
				self.evict_if_expired(key);
				self.misses.fetch_add(1, Ordering::Relaxed);
				tracing::trace!(key, "hydration cache entry expired");
				None
			}
			None => {
				self.misses.fetch_add(1, Ordering::Relaxed);
				None
			}
		}
	}
}

impl HydrationCache for InMemoryCache {
	fn get(&self, key: &str) -> HydrationResult<Option<CachedValue>> {
		Ok(self.lookup(key))
	}

	fn set(&self, key: &str, value: CachedValue) -> HydrationResult<()> {
		self.insert_entry(key, CacheEntry::new(value, self.default_ttl));
		Ok(())
	}
}
