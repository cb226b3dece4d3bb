//! Dependency locator module.
//!
//! Provides the [`ServiceContainer`](reinhardt_locator::ServiceContainer)
//! custom resolvers and type-level lookups are resolved through.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reinhardt_hydration::locator::ServiceContainer;
//! ```

#[cfg(feature = "locator")]
pub use reinhardt_locator::*;
