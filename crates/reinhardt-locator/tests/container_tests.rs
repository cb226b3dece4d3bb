//! Resolving hydrator dependencies through the service container.

use reinhardt_hydrator::{
	Dependency, DependencyTarget, FieldValue, HydrationError, HydrationResult, Locator, MethodTable,
	ResolverInput, ResolverRef, resolve_dependency,
};
use reinhardt_locator::ServiceContainer;
use rstest::*;
use serde_json::json;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

static BUILT: AtomicUsize = AtomicUsize::new(0);

struct UserRepository;

impl Default for UserRepository {
	fn default() -> Self {
		BUILT.fetch_add(1, Ordering::SeqCst);
		Self
	}
}

impl Dependency for UserRepository {
	fn call(&self, method: &str, input: ResolverInput<'_>) -> HydrationResult<FieldValue> {
		match method {
			"find" => Ok(FieldValue::from(format!(
				"user {}",
				input.value().and_then(|v| v.as_i64()).unwrap_or_default()
			))),
			other => Err(HydrationError::UnknownMethod {
				dependency: "UserRepository".into(),
				method: other.into(),
			}),
		}
	}
}

#[fixture]
fn container() -> ServiceContainer {
	ServiceContainer::new()
}

#[rstest]
fn test_autowired_type_is_built_once(container: ServiceContainer) {
	// Arrange
	container.autowire::<UserRepository>();
	let before = BUILT.load(Ordering::SeqCst);
	let reference = ResolverRef::parse("UserRepository::find").unwrap();

	// Act
	let first = reference.invoke(&container, ResolverInput::Value(&json!(1))).unwrap();
	let second = reference.invoke(&container, ResolverInput::Value(&json!(2))).unwrap();
	let by_full_path = container.resolve_by_type(std::any::type_name::<UserRepository>());

	// Assert
	assert_eq!(first, FieldValue::from("user 1"));
	assert_eq!(second, FieldValue::from("user 2"));
	assert!(by_full_path.is_ok());
	assert_eq!(BUILT.load(Ordering::SeqCst) - before, 1);
	assert_eq!(container.len(), 1);
}

#[rstest]
fn test_auto_target_falls_back_to_service(container: ServiceContainer) {
	// Arrange
	container.register_service(
		"tags",
		MethodTable::new("tags").method("count", |_| Ok(FieldValue::Int(3))),
	);

	// Act
	let dependency = resolve_dependency(&container, &DependencyTarget::Auto("tags".into())).unwrap();

	// Assert
	assert_eq!(
		dependency.call("count", ResolverInput::Value(&json!(null))).unwrap(),
		FieldValue::Int(3)
	);
}

#[rstest]
fn test_missing_dependency_names_the_target(container: ServiceContainer) {
	// Act
	let by_type = container.resolve_by_type("Nowhere").err();
	let by_name = container.resolve_by_name("nobody").err();

	// Assert
	assert!(matches!(by_type, Some(HydrationError::DependencyNotFound(name)) if name == "Nowhere"));
	assert!(matches!(by_name, Some(HydrationError::DependencyNotFound(name)) if name == "nobody"));
}

#[rstest]
fn test_failing_factory_is_retried(container: ServiceContainer) {
	// Arrange
	let attempts = Arc::new(AtomicUsize::new(0));
	let counter = attempts.clone();
	container.register_factory("flaky", move || {
		if counter.fetch_add(1, Ordering::SeqCst) == 0 {
			return Err(HydrationError::DependencyNotFound("flaky backend".into()));
		}
		Ok(Arc::new(MethodTable::new("flaky")) as Arc<dyn Dependency>)
	});

	// Act
	let first = container.resolve_by_name("flaky");
	let second = container.resolve_by_name("flaky");
	let third = container.resolve_by_name("flaky");

	// Assert
	assert!(first.is_err());
	assert!(second.is_ok());
	assert!(third.is_ok());
	assert_eq!(attempts.load(Ordering::SeqCst), 2);
}

#[rstest]
fn test_clones_share_registrations(container: ServiceContainer) {
	// Arrange
	let shared = container.clone();

	// Act
	shared.register_type_as("Clock", Arc::new(MethodTable::new("clock")));

	// Assert
	assert!(container.has_type("Clock"));
	container.clear();
	assert!(shared.is_empty());
}
