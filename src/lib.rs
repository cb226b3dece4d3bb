//! # Reinhardt Hydration
//!
//! Metadata-driven record hydration for Rust, inspired by Django's model loading.
//!
//! Loosely typed records (database rows, decoded request bodies, cached
//! payloads) are turned into typed values according to per-field metadata
//! declared with `#[derive(Hydrate)]`. Fields can be renamed, coerced,
//! filtered, computed by a dependency, or resolved lazily on first read.
//!
//! ## Core Principles
//!
//! - **Declarative**: field behavior lives next to the field, in attributes
//! - **Explicit dependencies**: resolvers go through a [`Locator`] handed to the
//!   [`Hydrator`], never through a global
//! - **Resolve once**: a lazy field calls its resolver at most once per instance
//!
//! ## Feature Flags
//!
//! - `full` (default) - All features enabled
//! - `macros` - `#[derive(Hydrate)]`
//! - `locator` - [`ServiceContainer`](locator::ServiceContainer)
//! - `cache` - [`InMemoryCache`](cache::InMemoryCache)
//!
//! Types deriving `Hydrate` through this facade name it with
//! `#[hydrate(crate = "reinhardt_hydration::hydrator")]`.
//!
//! ## Quick Example
//!
//! ```rust,no_run
//! use reinhardt_hydration::prelude::*;
//! use serde_json::json;
//! use std::sync::Arc;
//!
//! #[derive(Debug, Default, Clone, Hydrate)]
//! #[hydrate(crate = "reinhardt_hydration::hydrator")]
//! struct Post {
//! 	id: i64,
//! 	#[hydrate(field = "body_text", filter = "trim")]
//! 	body: String,
//! 	#[hydrate(field = "author_id", resolver = "@users::name", lazy)]
//! 	author: String,
//! }
//!
//! let container = ServiceContainer::new();
//! container.register_service(
//! 	"users",
//! 	MethodTable::new("users").method("name", |_| Ok(FieldValue::from("ada"))),
//! );
//! let hydrator = Hydrator::builder(Arc::new(container))
//! 	.cache(Arc::new(InMemoryCache::new()))
//! 	.build();
//!
//! let row = json!({"id": 1, "body_text": "  hello  ", "author_id": 7});
//! let mut post = hydrator
//! 	.hydrate::<Post>(row.as_object())?
//! 	.expect("non-empty row");
//! assert_eq!(post.body, "hello");
//! assert_eq!(post.get("author", |p| p.author.clone())?, "ada");
//! # Ok::<(), HydrationError>(())
//! ```

// Module re-exports
pub mod cache;
pub mod hydrator;
#[cfg(feature = "locator")]
pub mod locator;

// Re-export the engine at crate root
pub use reinhardt_hydrator::{
	Dependency, FieldSpec, FieldValue, FilterKind, FromFieldValue, HydrationError, HydrationResult,
	Hydrator, HydratorBuilder, HydratorSettings, Locator, MethodTable, Proxy, Record, ResolverInput,
	ResolverRef, TypeMetadata,
};

// Trait, plus the derive macro when `macros` is enabled
pub use reinhardt_hydrator::Hydrate;

#[cfg(feature = "locator")]
pub use reinhardt_locator::ServiceContainer;

#[cfg(feature = "cache")]
pub use reinhardt_hydration_cache::InMemoryCache;

/// Prelude module for convenient imports
///
/// Import everything commonly needed with:
/// ```rust,no_run
/// use reinhardt_hydration::prelude::*;
/// ```
pub mod prelude {
	// Engine - always available
	pub use crate::{
		Dependency, FieldValue, FromFieldValue, Hydrate, HydrationError, HydrationResult, Hydrator,
		HydratorSettings, Locator, MethodTable, Proxy, Record, ResolverInput,
	};

	#[cfg(feature = "locator")]
	pub use crate::ServiceContainer;

	#[cfg(feature = "cache")]
	pub use crate::InMemoryCache;
}
