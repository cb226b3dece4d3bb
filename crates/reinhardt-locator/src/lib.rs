//! Service container for Reinhardt hydration.
//!
//! [`ServiceContainer`] implements the hydrator's [`Locator`] trait. Resolver
//! references name either a registered type (autowiring) or a service:
//!
//! ```
//! use reinhardt_hydrator::{FieldValue, Locator, MethodTable, ResolverInput};
//! use reinhardt_locator::ServiceContainer;
//! use serde_json::json;
//!
//! let container = ServiceContainer::new();
//! container.register_service(
//! 	"users",
//! 	MethodTable::new("users").method("find", |input| {
//! 		Ok(FieldValue::from(input.value().and_then(|v| v.as_i64()).unwrap_or_default()))
//! 	}),
//! );
//!
//! let users = container.resolve_by_name("users").unwrap();
//! let found = users.call("find", ResolverInput::Value(&json!(5))).unwrap();
//! assert_eq!(found, FieldValue::Int(5));
//! ```
//!
//! [`Locator`]: reinhardt_hydrator::Locator

pub mod container;

pub use container::ServiceContainer;
