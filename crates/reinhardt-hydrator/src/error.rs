//! Error types for hydration.
//!
//! Configuration problems (missing dependencies, unknown resolver methods,
//! values a setter cannot accept) are fatal and surface here. Malformed
//! primitive input is not an error unless strict coercion is enabled.

use thiserror::Error;

/// Errors that can occur while hydrating records.
#[derive(Debug, Error)]
pub enum HydrationError {
	/// The locator could not find the requested dependency.
	#[error("Dependency not found: {0}")]
	DependencyNotFound(String),

	/// A dependency was found but does not expose the requested method.
	#[error("Unknown method {dependency}::{method}")]
	UnknownMethod {
		/// Dependency the method was looked up on.
		dependency: String,
		/// Method that was requested.
		method: String,
	},

	/// A setter received a value it cannot convert into the field type.
	#[error("Invalid value for field {field}: expected {expected}, found {found}")]
	InvalidFieldValue {
		/// Field being assigned.
		field: String,
		/// Expected Rust type.
		expected: String,
		/// Kind of value that was provided.
		found: String,
	},

	/// Strict coercion rejected a malformed primitive.
	#[error("Cannot coerce field {field} to {value_type}: {value}")]
	Coercion {
		/// Field being coerced.
		field: String,
		/// Declared value type.
		value_type: String,
		/// Raw input that failed to coerce.
		value: String,
	},

	/// An explicit assignment targeted a field without a setter.
	#[error("Field {0} has no setter")]
	MissingSetter(String),

	/// A resolver or locator reference could not be parsed.
	#[error("Invalid resolver reference: {0}")]
	InvalidResolver(String),

	/// A proxy artifact could not be produced or loaded.
	#[error("Proxy artifact error for {target}: {message}")]
	ProxyArtifact {
		/// Target type the proxy belongs to.
		target: String,
		/// What went wrong.
		message: String,
	},

	/// The hydration cache backend failed.
	#[error("Cache error: {0}")]
	Cache(String),

	/// Settings could not be loaded.
	#[error("Settings error: {0}")]
	Settings(String),

	/// I/O operation failed.
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),

	/// JSON serialization/deserialization error.
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),

	/// A dependency method failed. The inner error is passed through untouched.
	#[error(transparent)]
	Resolver(Box<dyn std::error::Error + Send + Sync>),
}

impl HydrationError {
	/// Wraps an error raised inside a dependency method.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::HydrationError;
	///
	/// let err = HydrationError::resolver(std::io::Error::other("backend down"));
	/// assert_eq!(err.to_string(), "backend down");
	/// ```
	pub fn resolver<E>(error: E) -> Self
	where
		E: std::error::Error + Send + Sync + 'static,
	{
		Self::Resolver(Box::new(error))
	}
}

impl From<toml::de::Error> for HydrationError {
	fn from(error: toml::de::Error) -> Self {
		Self::Settings(error.to_string())
	}
}

/// Result type alias for hydration operations.
pub type HydrationResult<T> = Result<T, HydrationError>;
