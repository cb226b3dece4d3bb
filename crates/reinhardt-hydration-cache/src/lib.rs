//! In-memory cache backend for Reinhardt hydration.
//!
//! [`InMemoryCache`] implements [`HydrationCache`] so it can back
//! `Hydrator::hydrate_cached` and `Hydrator::hydrate_set_cached`:
//!
//! ```ignore
//! let hydrator = Hydrator::builder(locator)
//! 	.cache(Arc::new(InMemoryCache::new().with_default_ttl(Duration::from_secs(60))))
//! 	.build();
//! ```
//!
//! Entries are stored type-erased, so hydrated values that hold live
//! handles (such as lazy proxies) can be cached as they are.
//!
//! [`HydrationCache`]: reinhardt_hydrator::HydrationCache

mod entry;
pub mod in_memory;
pub mod statistics;

pub use in_memory::InMemoryCache;
pub use statistics::{CacheEntryInfo, CacheStatistics};
