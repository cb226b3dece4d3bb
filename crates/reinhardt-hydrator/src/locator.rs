//! Dependency lookup used by custom resolvers, lazy fields and record lookups.
//!
//! The engine never reaches for a global container: a [`Locator`] is passed
//! to the [`Hydrator`](crate::Hydrator) and carried by every lazy proxy.

use std::any::Any;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::error::{HydrationError, HydrationResult};
use crate::metadata::{DependencyTarget, ResolverRef};
use crate::value::FieldValue;

/// The single argument handed to a dependency method.
#[derive(Clone, Copy)]
pub enum ResolverInput<'a> {
	/// Raw value taken from the record.
	Value(&'a Value),
	/// The instance being hydrated, for `"$this"` fields.
	Instance(&'a dyn Any),
}

impl<'a> ResolverInput<'a> {
	pub fn value(&self) -> Option<&'a Value> {
		match *self {
			Self::Value(value) => Some(value),
			Self::Instance(_) => None,
		}
	}

	/// Downcasts the instance argument.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::ResolverInput;
	///
	/// let id = 7_i64;
	/// let input = ResolverInput::Instance(&id);
	/// assert_eq!(input.instance::<i64>(), Some(&7));
	/// assert!(input.value().is_none());
	/// ```
	pub fn instance<T: Any>(&self) -> Option<&'a T> {
		match *self {
			Self::Instance(instance) => instance.downcast_ref::<T>(),
			Self::Value(_) => None,
		}
	}

	/// The raw value as a [`FieldValue`], `Null` for instance input.
	pub fn to_field_value(&self) -> FieldValue {
		self.value().map_or(FieldValue::Null, FieldValue::from)
	}
}

impl fmt::Debug for ResolverInput<'_> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Value(value) => f.debug_tuple("Value").field(value).finish(),
			Self::Instance(_) => f.write_str("Instance(..)"),
		}
	}
}

/// A service whose methods can be called by name.
pub trait Dependency: Send + Sync {
	/// Invokes `method` with a single argument.
	///
	/// Errors raised by the method itself are returned unchanged.
	fn call(&self, method: &str, input: ResolverInput<'_>) -> HydrationResult<FieldValue>;
}

/// Resolves dependencies by type or by service name.
pub trait Locator: Send + Sync {
	/// Autowires a dependency by its type name.
	fn resolve_by_type(&self, type_name: &str) -> HydrationResult<Arc<dyn Dependency>>;

	/// Looks up a dependency registered under a service name.
	fn resolve_by_name(&self, name: &str) -> HydrationResult<Arc<dyn Dependency>>;

	/// Whether `type_name` can be autowired.
	fn has_type(&self, type_name: &str) -> bool {
		let _ = type_name;
		false
	}
}

/// A locator with nothing registered.
#[derive(Debug, Clone, Copy, Default)]
pub struct EmptyLocator;

impl Locator for EmptyLocator {
	fn resolve_by_type(&self, type_name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		Err(HydrationError::DependencyNotFound(type_name.to_string()))
	}

	fn resolve_by_name(&self, name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		Err(HydrationError::DependencyNotFound(name.to_string()))
	}
}

impl<L: Locator + ?Sized> Locator for Arc<L> {
	fn resolve_by_type(&self, type_name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		(**self).resolve_by_type(type_name)
	}

	fn resolve_by_name(&self, name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		(**self).resolve_by_name(name)
	}

	fn has_type(&self, type_name: &str) -> bool {
		(**self).has_type(type_name)
	}
}

/// Finds the dependency a target points at.
///
/// `Auto` targets are autowired when the locator knows the type and looked up
/// by service name otherwise.
pub fn resolve_dependency(
	locator: &dyn Locator,
	target: &DependencyTarget,
) -> HydrationResult<Arc<dyn Dependency>> {
	match target {
		DependencyTarget::Type(name) => locator.resolve_by_type(name),
		DependencyTarget::Service(name) => locator.resolve_by_name(name),
		DependencyTarget::Auto(name) if locator.has_type(name) => locator.resolve_by_type(name),
		DependencyTarget::Auto(name) => locator.resolve_by_name(name),
	}
}

impl ResolverRef {
	/// Resolves the dependency and calls the referenced method.
	pub fn invoke(&self, locator: &dyn Locator, input: ResolverInput<'_>) -> HydrationResult<FieldValue> {
		let dependency = resolve_dependency(locator, &self.target)?;
		tracing::trace!(resolver = %self, "invoking resolver");
		dependency.call(&self.method, input)
	}
}

type Method = Box<dyn Fn(ResolverInput<'_>) -> HydrationResult<FieldValue> + Send + Sync>;

/// A [`Dependency`] assembled from named closures.
///
/// # Examples
///
/// ```
/// use reinhardt_hydrator::{Dependency, FieldValue, MethodTable, ResolverInput};
/// use serde_json::json;
///
/// let users = MethodTable::new("Users")
/// 	.method("display_name", |input| {
/// 		let id = input.value().and_then(|v| v.as_i64()).unwrap_or_default();
/// 		Ok(FieldValue::from(format!("user #{id}")))
/// 	});
///
/// let name = users.call("display_name", ResolverInput::Value(&json!(3))).unwrap();
/// assert_eq!(name, FieldValue::from("user #3"));
/// assert!(users.call("missing", ResolverInput::Value(&json!(3))).is_err());
/// ```
pub struct MethodTable {
	name: String,
	methods: HashMap<String, Method>,
}

impl MethodTable {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			methods: HashMap::new(),
		}
	}

	/// Registers a method. A later registration under the same name replaces it.
	pub fn method<F>(mut self, name: impl Into<String>, method: F) -> Self
	where
		F: Fn(ResolverInput<'_>) -> HydrationResult<FieldValue> + Send + Sync + 'static,
	{
		self.methods.insert(name.into(), Box::new(method));
		self
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn has_method(&self, name: &str) -> bool {
		self.methods.contains_key(name)
	}
}

impl Dependency for MethodTable {
	fn call(&self, method: &str, input: ResolverInput<'_>) -> HydrationResult<FieldValue> {
		let Some(method_fn) = self.methods.get(method) else {
			return Err(HydrationError::UnknownMethod {
				dependency: self.name.clone(),
				method: method.to_string(),
			});
		};
		method_fn(input)
	}
}

impl fmt::Debug for MethodTable {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut methods: Vec<&str> = self.methods.keys().map(String::as_str).collect();
		methods.sort_unstable();
		f.debug_struct("MethodTable")
			.field("name", &self.name)
			.field("methods", &methods)
			.finish()
	}
}
