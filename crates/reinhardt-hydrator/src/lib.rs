//! Metadata-driven record hydration for Reinhardt.
//!
//! A [`Hydrator`] turns loosely typed records (database rows, decoded request
//! bodies) into typed values according to per-field metadata:
//!
//! - **Field metadata**: source key, declared type, date format, filter,
//!   custom resolver and laziness, declared with `#[derive(Hydrate)]`
//! - **Coercion and filters**: best-effort primitive casts followed by
//!   `trim`, `json_decode`, `explode` or `array_from_string`
//! - **Custom resolvers**: `Dependency::method` references resolved through a
//!   [`Locator`]
//! - **Lazy fields**: resolved on first read through a [`Proxy`], at most once
//!   per instance
//!
//! # Quick Start
//!
//! ```ignore
//! use reinhardt_hydrator::{Hydrate, Hydrator};
//!
//! #[derive(Default, Hydrate)]
//! struct Post {
//! 	id: i64,
//! 	#[hydrate(field = "body_text", filter = "trim")]
//! 	body: String,
//! 	#[hydrate(resolver = "@users::find", lazy)]
//! 	author: Option<Arc<User>>,
//! }
//!
//! let hydrator = Hydrator::new(Arc::new(container));
//! let mut post = hydrator.hydrate::<Post>(&row)?.expect("non-empty row");
//! let author = post.get("author", |p| p.author.clone())?;
//! ```
//!
//! # Features
//!
//! - `macros` - `#[derive(Hydrate)]` (enabled by default)

pub mod cache;
pub mod coerce;
pub mod error;
pub mod filter;
pub mod hydrator;
pub mod locator;
pub mod metadata;
pub mod proxy;
pub mod settings;
pub mod value;

pub use cache::{CachedValue, HydrationCache, clean_cache_key};
pub use coerce::CoercionMode;
pub use error::{HydrationError, HydrationResult};
pub use filter::FilterKind;
pub use hydrator::{Hydrator, HydratorBuilder};
pub use locator::{Dependency, EmptyLocator, Locator, MethodTable, ResolverInput, resolve_dependency};
pub use metadata::{
	DependencyTarget, FieldSpec, Hydrate, ResolverRef, SELF_KEY, Setter, SetterFn, TypeMetadata, ValueType,
	metadata_for,
};
pub use proxy::{Fingerprint, LazyAccessor, LazyBinding, Lookup, Proxy, ProxyGenerator, ProxySpec};
pub use settings::HydratorSettings;
pub use value::{ConversionError, FieldValue, FromFieldValue, Record};

// Re-export derive macro when available
#[cfg(feature = "macros")]
pub use reinhardt_hydrator_macros::Hydrate;
