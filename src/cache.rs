//! Hydration cache module.
//!
//! In-memory backend for `Hydrator::hydrate_cached`.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reinhardt_hydration::cache::{CacheStatistics, InMemoryCache};
//! ```

pub use reinhardt_hydrator::{CachedValue, HydrationCache, clean_cache_key};

#[cfg(feature = "cache")]
pub use reinhardt_hydration_cache::*;
