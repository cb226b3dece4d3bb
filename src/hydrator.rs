//! Hydration engine module.
//!
//! Field metadata, primitive coercion, filters, lazy proxies and the
//! [`Hydrator`](reinhardt_hydrator::Hydrator) itself.
//!
//! # Examples
//!
//! ```rust,no_run
//! use reinhardt_hydration::hydrator::{Hydrator, HydratorSettings, ProxyGenerator};
//! ```

pub use reinhardt_hydrator::*;
