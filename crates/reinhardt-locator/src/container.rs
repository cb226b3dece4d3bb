//! Type- and name-keyed dependency registry.

use std::any::type_name;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};

use reinhardt_hydrator::{Dependency, HydrationError, HydrationResult, Locator};

type Factory = Arc<dyn Fn() -> HydrationResult<Arc<dyn Dependency>> + Send + Sync>;

#[derive(Clone)]
enum Registration {
	Instance(Arc<dyn Dependency>),
	/// Built on first resolution, then replaced by the instance.
	Factory(Factory),
}

type Registry = Arc<RwLock<HashMap<String, Registration>>>;

/// Holds the dependencies resolver references point at.
///
/// Types are registered under both their full path
/// (`my_app::repo::UserRepository`) and their last segment
/// (`UserRepository`), so either spelling works in a resolver reference.
/// Clones share the same registry.
#[derive(Clone, Default)]
pub struct ServiceContainer {
	types: Registry,
	services: Registry,
}

impl ServiceContainer {
	/// Creates an empty container.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_locator::ServiceContainer;
	///
	/// let container = ServiceContainer::new();
	/// assert!(container.is_empty());
	/// ```
	pub fn new() -> Self {
		Self::default()
	}

	/// Registers `dependency` for autowiring by its type name.
	pub fn register_type<D: Dependency + 'static>(&self, dependency: D) {
		self.insert_type::<D>(Registration::Instance(Arc::new(dependency)));
	}

	/// Registers a dependency for autowiring, built with `D::default()` on
	/// first use and shared afterwards.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::{Dependency, FieldValue, HydrationResult, Locator, ResolverInput};
	/// use reinhardt_locator::ServiceContainer;
	///
	/// #[derive(Default)]
	/// struct Clock;
	///
	/// impl Dependency for Clock {
	/// 	fn call(&self, _method: &str, _input: ResolverInput<'_>) -> HydrationResult<FieldValue> {
	/// 		Ok(FieldValue::Int(0))
	/// 	}
	/// }
	///
	/// let container = ServiceContainer::new();
	/// container.autowire::<Clock>();
	/// assert!(container.has_type("Clock"));
	/// ```
	pub fn autowire<D: Dependency + Default + 'static>(&self) {
		let factory: Factory =
			Arc::new(|| -> HydrationResult<Arc<dyn Dependency>> { Ok(Arc::new(D::default())) });
		self.insert_type::<D>(Registration::Factory(factory));
	}

	/// Registers a dependency under an explicit type name.
	pub fn register_type_as(&self, type_name: impl Into<String>, dependency: Arc<dyn Dependency>) {
		write(&self.types).insert(type_name.into(), Registration::Instance(dependency));
	}

	/// Registers a named service.
	pub fn register_service(&self, name: impl Into<String>, dependency: impl Dependency + 'static) {
		self.register_service_arc(name, Arc::new(dependency));
	}

	pub fn register_service_arc(&self, name: impl Into<String>, dependency: Arc<dyn Dependency>) {
		let name = name.into();
		tracing::debug!(service = %name, "registering service");
		write(&self.services).insert(name, Registration::Instance(dependency));
	}

	/// Registers a named service built by `factory` on first use.
	///
	/// A failing factory is retried on the next resolution.
	pub fn register_factory<F>(&self, name: impl Into<String>, factory: F)
	where
		F: Fn() -> HydrationResult<Arc<dyn Dependency>> + Send + Sync + 'static,
	{
		write(&self.services).insert(name.into(), Registration::Factory(Arc::new(factory)));
	}

	pub fn has_service(&self, name: &str) -> bool {
		read(&self.services).contains_key(name)
	}

	/// Number of registrations, counting each type once.
	pub fn len(&self) -> usize {
		let types = read(&self.types);
		let mut seen: Vec<*const ()> = Vec::new();
		let mut distinct = 0;
		for registration in types.values() {
			let ptr = match registration {
				Registration::Instance(instance) => Arc::as_ptr(instance) as *const (),
				Registration::Factory(factory) => Arc::as_ptr(factory) as *const (),
			};
			if seen.contains(&ptr) {
				continue;
			}
			seen.push(ptr);
			distinct += 1;
		}
		distinct + read(&self.services).len()
	}

	pub fn is_empty(&self) -> bool {
		read(&self.types).is_empty() && read(&self.services).is_empty()
	}

	/// Removes every registration.
	pub fn clear(&self) {
		write(&self.types).clear();
		write(&self.services).clear();
	}

	fn insert_type<D: 'static>(&self, registration: Registration) {
		let full = type_name::<D>();
		let short = short_type_name(full);
		tracing::debug!(type_name = full, "registering type");
		let mut types = write(&self.types);
		if short != full {
			types.insert(short.to_string(), registration.clone());
		}
		types.insert(full.to_string(), registration);
	}
}

impl Locator for ServiceContainer {
	fn resolve_by_type(&self, type_name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		resolve(&self.types, type_name)
	}

	fn resolve_by_name(&self, name: &str) -> HydrationResult<Arc<dyn Dependency>> {
		resolve(&self.services, name)
	}

	fn has_type(&self, type_name: &str) -> bool {
		read(&self.types).contains_key(type_name.trim_start_matches("::"))
	}
}

impl fmt::Debug for ServiceContainer {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		let mut types: Vec<String> = read(&self.types).keys().cloned().collect();
		let mut services: Vec<String> = read(&self.services).keys().cloned().collect();
		types.sort_unstable();
		services.sort_unstable();
		f.debug_struct("ServiceContainer")
			.field("types", &types)
			.field("services", &services)
			.finish()
	}
}

fn read(registry: &Registry) -> std::sync::RwLockReadGuard<'_, HashMap<String, Registration>> {
	registry.read().unwrap_or_else(PoisonError::into_inner)
}

fn write(registry: &Registry) -> std::sync::RwLockWriteGuard<'_, HashMap<String, Registration>> {
	registry.write().unwrap_or_else(PoisonError::into_inner)
}

fn resolve(registry: &Registry, key: &str) -> HydrationResult<Arc<dyn Dependency>> {
	let key = key.trim_start_matches("::");
	let factory = match read(registry).get(key) {
		Some(Registration::Instance(instance)) => return Ok(instance.clone()),
		Some(Registration::Factory(factory)) => factory.clone(),
		None => return Err(HydrationError::DependencyNotFound(key.to_string())),
	};

	let instance = factory()?;
	let mut entries = write(registry);
	// Aliases of the same factory share the built instance.
	for registration in entries.values_mut() {
		if let Registration::Factory(existing) = registration
			&& Arc::ptr_eq(existing, &factory)
		{
			*registration = Registration::Instance(instance.clone());
		}
	}
	tracing::trace!(dependency = key, "built dependency from factory");
	Ok(instance)
}

/// Last path segment of a type name, ignoring generic arguments.
fn short_type_name(full: &str) -> &str {
	let base = full.split('<').next().unwrap_or(full);
	match base.rfind("::") {
		Some(index) => &full[index + 2..],
		None => full,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use reinhardt_hydrator::{FieldValue, ResolverInput};
	use rstest::rstest;

	#[derive(Default)]
	struct Echo;

	impl Dependency for Echo {
		fn call(&self, method: &str, _input: ResolverInput<'_>) -> HydrationResult<FieldValue> {
			Ok(FieldValue::from(method))
		}
	}

	#[rstest]
	#[case("alloc::string::String", "String")]
	#[case("my_app::Repo<my_app::User>", "Repo<my_app::User>")]
	#[case("Plain", "Plain")]
	fn short_names(#[case] full: &str, #[case] expected: &str) {
		assert_eq!(short_type_name(full), expected);
	}

	#[rstest]
	fn types_resolve_by_short_and_full_name() {
		// Arrange
		let container = ServiceContainer::new();

		// Act
		container.register_type(Echo);

		// Assert
		assert!(container.has_type("Echo"));
		assert!(container.has_type(type_name::<Echo>()));
		assert!(container.resolve_by_type("Echo").is_ok());
		assert_eq!(container.len(), 1);
	}

	#[rstest]
	fn poisoned_lock_is_recovered() {
		// Arrange
		let container = ServiceContainer::new();
		let poisoned = container.clone();
		let _ = std::thread::spawn(move || {
			let _guard = poisoned.services.write().unwrap();
			panic!("poison the registry");
		})
		.join();

		// Act
		container.register_service("echo", Echo);

		// Assert
		assert!(container.has_service("echo"));
	}
}
