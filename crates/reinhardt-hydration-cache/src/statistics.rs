//! Counters and per-key snapshots reported by [`InMemoryCache`](crate::InMemoryCache).

/// Snapshot of one stored hydration result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntryInfo {
	pub key: String,
	pub has_expiry: bool,
	/// Whole seconds left before the entry expires, `None` for entries kept forever.
	pub ttl_seconds: Option<u64>,
}

/// Lookup and write counters of a hydration cache.
///
/// Misses count absent keys and entries found expired on read. Writes count
/// every `set`, so the write-back after a cache hit is included.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_hydration_cache::InMemoryCache;
/// use reinhardt_hydrator::HydrationCache;
///
/// let cache = InMemoryCache::new();
/// cache.set("post_1", Arc::new(1u32)).unwrap();
/// cache.get("post_1").unwrap();
/// cache.get("post_2").unwrap();
///
/// let stats = cache.get_statistics();
/// assert_eq!((stats.hits, stats.misses, stats.writes), (1, 1, 1));
/// assert_eq!(stats.hit_rate(), 0.5);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStatistics {
	pub hits: u64,
	pub misses: u64,
	/// `hits + misses`.
	pub total_requests: u64,
	pub writes: u64,
	/// Stored entries, expired ones not yet evicted included.
	pub entry_count: u64,
}

impl CacheStatistics {
	/// Share of lookups served from the cache, `0.0` before the first lookup.
	pub fn hit_rate(&self) -> f64 {
		self.share_of_requests(self.hits)
	}

	/// Share of lookups that had to hydrate from the producer.
	pub fn miss_rate(&self) -> f64 {
		self.share_of_requests(self.misses)
	}

	fn share_of_requests(&self, count: u64) -> f64 {
		match self.total_requests {
			0 => 0.0,
			total => count as f64 / total as f64,
		}
	}
}
