//! Cache interface for memoized hydration results.
//!
//! Hydrated values hold live handles (a lazy proxy carries its locator), so
//! entries are stored type-erased rather than serialized.

use std::any::Any;
use std::sync::Arc;

use md5::{Digest, Md5};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::HydrationResult;

/// A stored hydration result.
pub type CachedValue = Arc<dyn Any + Send + Sync>;

/// Longest key handed to a cache backend. Longer keys are hashed.
pub const MAX_KEY_LENGTH: usize = 200;

/// Backend used by `Hydrator::hydrate_cached` and `Hydrator::hydrate_set_cached`.
pub trait HydrationCache: Send + Sync {
	fn get(&self, key: &str) -> HydrationResult<Option<CachedValue>>;

	fn set(&self, key: &str, value: CachedValue) -> HydrationResult<()>;
}

impl<C: HydrationCache + ?Sized> HydrationCache for Arc<C> {
	fn get(&self, key: &str) -> HydrationResult<Option<CachedValue>> {
		(**self).get(key)
	}

	fn set(&self, key: &str, value: CachedValue) -> HydrationResult<()> {
		(**self).set(key, value)
	}
}

static RESERVED: Lazy<Regex> =
	Lazy::new(|| Regex::new(r"[{}()/\\@:\s]").expect("Invalid reserved key regex pattern"));

/// Normalizes a caller-supplied key for use with a cache backend.
///
/// Reserved characters (`{}()/\@:`) and whitespace become `_`. Keys longer
/// than [`MAX_KEY_LENGTH`] are replaced by `hydrate_` plus their MD5 digest.
///
/// # Examples
///
/// ```
/// use reinhardt_hydrator::clean_cache_key;
///
/// assert_eq!(clean_cache_key("user:{42} (admin)"), "user__42___admin_");
/// assert_eq!(clean_cache_key(&"x".repeat(500)).len(), "hydrate_".len() + 32);
/// ```
pub fn clean_cache_key(key: &str) -> String {
	let cleaned = RESERVED.replace_all(key, "_");
	if cleaned.len() <= MAX_KEY_LENGTH {
		return cleaned.into_owned();
	}
	let digest = Md5::digest(cleaned.as_bytes());
	format!("hydrate_{}", hex::encode(digest))
}
