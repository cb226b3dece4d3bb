//! Hydrator settings.
//!
//! Settings can be built in code or read from TOML:
//!
//! ```toml
//! proxy_dir = "target/hydration-proxies"
//! release = "2024.06"
//! coercion = "strict"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::coerce::CoercionMode;
use crate::error::HydrationResult;

/// Configuration of a [`Hydrator`](crate::Hydrator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HydratorSettings {
	/// Where proxy artifacts are persisted. `None` keeps them in memory only.
	pub proxy_dir: Option<PathBuf>,
	/// Release stamp mixed into proxy fingerprints.
	pub release: String,
	/// Handling of malformed primitive input.
	pub coercion: CoercionMode,
}

impl Default for HydratorSettings {
	fn default() -> Self {
		Self {
			proxy_dir: None,
			release: env!("CARGO_PKG_VERSION").to_string(),
			coercion: CoercionMode::default(),
		}
	}
}

impl HydratorSettings {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn with_proxy_dir(mut self, dir: impl Into<PathBuf>) -> Self {
		self.proxy_dir = Some(dir.into());
		self
	}

	pub fn with_release(mut self, release: impl Into<String>) -> Self {
		self.release = release.into();
		self
	}

	pub fn with_coercion(mut self, mode: CoercionMode) -> Self {
		self.coercion = mode;
		self
	}

	/// Parses settings from a TOML document. Missing keys keep their defaults.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::{CoercionMode, HydratorSettings};
	///
	/// let settings = HydratorSettings::from_toml_str("coercion = \"strict\"").unwrap();
	/// assert_eq!(settings.coercion, CoercionMode::Strict);
	/// assert!(settings.proxy_dir.is_none());
	/// ```
	pub fn from_toml_str(source: &str) -> HydrationResult<Self> {
		Ok(toml::from_str(source)?)
	}

	/// Reads settings from a TOML file.
	pub fn from_path(path: impl AsRef<Path>) -> HydrationResult<Self> {
		let source = std::fs::read_to_string(path.as_ref())?;
		let settings = Self::from_toml_str(&source)?;
		tracing::debug!(path = %path.as_ref().display(), "loaded hydrator settings");
		Ok(settings)
	}
}
