//! Internal cache entry structure

use std::time::{Duration, SystemTime};

use reinhardt_hydrator::CachedValue;

/// Cache entry with expiration
#[derive(Clone)]
pub(crate) struct CacheEntry {
	pub(crate) value: CachedValue,
	pub(crate) expires_at: Option<SystemTime>,
}

impl CacheEntry {
	pub(crate) fn new(value: CachedValue, ttl: Option<Duration>) -> Self {
		let expires_at = ttl.map(|d| SystemTime::now() + d);
		Self { value, expires_at }
	}

	pub(crate) fn is_expired(&self) -> bool {
		match self.expires_at {
			Some(expires_at) => SystemTime::now() > expires_at,
			None => false,
		}
	}

	/// Whole seconds left before expiry, `None` for entries that never expire.
	pub(crate) fn ttl_seconds(&self) -> Option<u64> {
		self.expires_at.map(|expires_at| {
			expires_at
				.duration_since(SystemTime::now())
				.map(|left| left.as_secs())
				.unwrap_or(0)
		})
	}
}
