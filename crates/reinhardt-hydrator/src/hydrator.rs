//! The hydration engine.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::cache::{CachedValue, HydrationCache, clean_cache_key};
use crate::coerce::coerce;
use crate::error::HydrationResult;
use crate::locator::{Locator, ResolverInput, resolve_dependency};
use crate::metadata::{FieldSpec, Hydrate, metadata_for};
use crate::proxy::{LazyBinding, ProxyGenerator};
use crate::settings::HydratorSettings;
use crate::value::{FieldValue, Record};

/// Populates [`Hydrate`] types from records.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use reinhardt_hydrator::{EmptyLocator, Hydrate, Hydrator, Record};
/// use serde_json::json;
///
/// #[derive(Debug, Default, Hydrate)]
/// struct User {
/// 	id: i64,
/// 	name: String,
/// }
///
/// let hydrator = Hydrator::new(Arc::new(EmptyLocator));
/// let record: Record = serde_json::from_value(json!({ "id": "1", "name": "test" })).unwrap();
///
/// let user = hydrator.hydrate::<User>(&record).unwrap().unwrap();
/// assert_eq!(user.id, 1);
/// assert_eq!(user.name, "test");
/// ```
#[derive(Clone)]
pub struct Hydrator {
	locator: Arc<dyn Locator>,
	cache: Option<Arc<dyn HydrationCache>>,
	proxies: Arc<ProxyGenerator>,
	settings: HydratorSettings,
}

impl Hydrator {
	/// Creates a hydrator with default settings and no cache.
	pub fn new(locator: Arc<dyn Locator>) -> Self {
		Self::builder(locator).build()
	}

	pub fn builder(locator: Arc<dyn Locator>) -> HydratorBuilder {
		HydratorBuilder {
			locator,
			cache: None,
			proxies: None,
			settings: HydratorSettings::default(),
		}
	}

	pub fn locator(&self) -> &Arc<dyn Locator> {
		&self.locator
	}

	pub fn settings(&self) -> &HydratorSettings {
		&self.settings
	}

	pub fn proxies(&self) -> &Arc<ProxyGenerator> {
		&self.proxies
	}

	pub fn has_cache(&self) -> bool {
		self.cache.is_some()
	}

	/// Hydrates one record.
	///
	/// Returns `None` for a missing or empty record. Types with lazy fields
	/// come back as a [`Proxy`](crate::Proxy) holding the record for later
	/// resolution.
	pub fn hydrate<'r, T: Hydrate>(
		&self,
		record: impl Into<Option<&'r Record>>,
	) -> HydrationResult<Option<T::Output>> {
		let Some(record) = record.into() else {
			return Ok(None);
		};
		if record.is_empty() {
			return Ok(None);
		}

		let metadata = metadata_for::<T>();
		let binding = if metadata.has_lazy_fields() {
			let spec = self.proxies.proxy_for(&*metadata)?;
			Some(LazyBinding::new(
				record.clone(),
				self.locator.clone(),
				spec,
				metadata.clone(),
			))
		} else {
			None
		};
		tracing::debug!(
			target_type = metadata.type_name(),
			fields = metadata.fields().len(),
			proxied = binding.is_some(),
			"hydrating record"
		);

		let mut instance = T::default();
		for spec in metadata.fields() {
			self.hydrate_field(&mut instance, spec, record)?;
		}
		Ok(Some(T::assemble(instance, binding)))
	}

	fn hydrate_field<T: Hydrate>(
		&self,
		instance: &mut T,
		spec: &FieldSpec<T>,
		record: &Record,
	) -> HydrationResult<()> {
		let self_reference = spec.is_self_reference();
		let raw = record.get(&spec.source_key).filter(|value| !value.is_null());
		if raw.is_none() && !self_reference {
			tracing::trace!(field = %spec.name, key = %spec.source_key, "no value in record, skipping");
			return Ok(());
		}
		if spec.lazy {
			return Ok(());
		}

		let value = match (&spec.resolver, raw) {
			(Some(resolver), _) if self_reference => {
				resolver.invoke(&*self.locator, ResolverInput::Instance(&*instance))?
			}
			(Some(resolver), Some(raw)) => resolver.invoke(&*self.locator, ResolverInput::Value(raw))?,
			(None, Some(raw)) if !self_reference => coerce(
				&spec.name,
				raw,
				&spec.value_type,
				spec.date_format.as_deref(),
				self.settings.coercion,
			)?,
			_ => return Ok(()),
		};
		let value = match spec.filter {
			Some(filter) => filter.apply(value),
			None => value,
		};
		if value.is_null() {
			return Ok(());
		}

		match &spec.setter {
			Some(setter) => (setter.apply)(instance, value),
			None => {
				tracing::trace!(field = %spec.name, "field has no setter, leaving it unset");
				Ok(())
			}
		}
	}

	/// Hydrates each record in order. Missing and empty records yield `None`
	/// in the same position.
	pub fn hydrate_set<'r, T, I, R>(&self, records: I) -> HydrationResult<Vec<Option<T::Output>>>
	where
		T: Hydrate,
		I: IntoIterator<Item = R>,
		R: Into<Option<&'r Record>>,
	{
		records
			.into_iter()
			.map(|record| self.hydrate::<T>(record))
			.collect()
	}

	/// Hydrates a record, memoized under `key` when a cache is configured.
	///
	/// `producer` only runs on a cache miss. A cached `None` counts as a miss.
	/// The entry is written back on every call, refreshing its expiry.
	pub fn hydrate_cached<T, F, R>(&self, key: &str, producer: F) -> HydrationResult<Option<T::Output>>
	where
		T: Hydrate,
		T::Output: Clone + Sync,
		F: FnOnce() -> R,
		R: Into<Option<Record>>,
	{
		let produce = |producer: F| -> HydrationResult<Option<T::Output>> {
			let record: Option<Record> = producer().into();
			self.hydrate::<T>(record.as_ref())
		};
		let Some(cache) = &self.cache else {
			return produce(producer);
		};
		let key = clean_cache_key(key);

		let cached = cache
			.get(&key)?
			.and_then(|value| value.downcast::<Option<T::Output>>().ok())
			.filter(|value| value.is_some());
		let value = match cached {
			Some(hit) => {
				tracing::debug!(%key, "hydration cache hit");
				hit
			}
			None => Arc::new(produce(producer)?),
		};
		cache.set(&key, value.clone() as CachedValue)?;
		Ok((*value).clone())
	}

	/// Hydrates a list of records, memoized under `key` when a cache is
	/// configured. An empty cached list counts as a miss.
	pub fn hydrate_set_cached<T, F, I, R>(
		&self,
		key: &str,
		producer: F,
	) -> HydrationResult<Vec<Option<T::Output>>>
	where
		T: Hydrate,
		T::Output: Clone + Sync,
		F: FnOnce() -> I,
		I: IntoIterator<Item = R>,
		R: Into<Option<Record>>,
	{
		let produce = |producer: F| -> HydrationResult<Vec<Option<T::Output>>> {
			let records: Vec<Option<Record>> = producer().into_iter().map(Into::into).collect();
			self.hydrate_set::<T, _, _>(records.iter().map(Option::as_ref))
		};
		let Some(cache) = &self.cache else {
			return produce(producer);
		};
		let key = clean_cache_key(key);

		let cached = cache
			.get(&key)?
			.and_then(|value| value.downcast::<Vec<Option<T::Output>>>().ok())
			.filter(|value| !value.is_empty());
		let value = match cached {
			Some(hit) => {
				tracing::debug!(%key, "hydration cache hit");
				hit
			}
			None => Arc::new(produce(producer)?),
		};
		cache.set(&key, value.clone() as CachedValue)?;
		Ok((*value).clone())
	}

	/// Calls the type-level lookup declared with `#[hydrate(locator(...))]`.
	///
	/// Returns `None` when the type declares no lookup or the lookup yields null.
	pub fn lookup_record<T: Hydrate>(&self, field: &Value) -> HydrationResult<Option<FieldValue>> {
		let metadata = metadata_for::<T>();
		let Some(lookup) = metadata.locator() else {
			return Ok(None);
		};
		let dependency = resolve_dependency(&*self.locator, &lookup.target)?;
		let value = dependency.call(&lookup.method, ResolverInput::Value(field))?;
		Ok((!value.is_null()).then_some(value))
	}
}

impl fmt::Debug for Hydrator {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Hydrator")
			.field("cache", &self.cache.is_some())
			.field("proxies", &self.proxies)
			.field("settings", &self.settings)
			.finish_non_exhaustive()
	}
}

/// Builder for [`Hydrator`].
pub struct HydratorBuilder {
	locator: Arc<dyn Locator>,
	cache: Option<Arc<dyn HydrationCache>>,
	proxies: Option<Arc<ProxyGenerator>>,
	settings: HydratorSettings,
}

impl HydratorBuilder {
	pub fn cache(mut self, cache: Arc<dyn HydrationCache>) -> Self {
		self.cache = Some(cache);
		self
	}

	pub fn settings(mut self, settings: HydratorSettings) -> Self {
		self.settings = settings;
		self
	}

	/// Shares a proxy generator between hydrators. Defaults to one built
	/// from the settings.
	pub fn proxy_generator(mut self, proxies: Arc<ProxyGenerator>) -> Self {
		self.proxies = Some(proxies);
		self
	}

	pub fn build(self) -> Hydrator {
		let proxies = self
			.proxies
			.unwrap_or_else(|| Arc::new(ProxyGenerator::from_settings(&self.settings)));
		Hydrator {
			locator: self.locator,
			cache: self.cache,
			proxies,
			settings: self.settings,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::coerce::CoercionMode;
	use crate::error::HydrationError;
	use crate::filter::FilterKind;
	use crate::locator::{Dependency, EmptyLocator, MethodTable};
	use crate::metadata::{ResolverRef, SELF_KEY, TypeMetadata};
	use crate::value::FromFieldValue;
	use parking_lot::Mutex;
	use rstest::{fixture, rstest};
	use serde_json::json;
	use std::collections::HashMap;
	use std::sync::atomic::{AtomicUsize, Ordering};

	#[derive(Debug, Default, Clone, PartialEq)]
	struct Account {
		id: i64,
		email: String,
		tags: Vec<String>,
		label: String,
		untouched: i64,
	}

	macro_rules! setter {
		($field:ident) => {
			|target: &mut Account, value: FieldValue| {
				target.$field =
					FromFieldValue::from_field_value(value).map_err(|e| e.for_field(stringify!($field)))?;
				Ok(())
			}
		};
	}

	impl Hydrate for Account {
		type Output = Self;

		fn metadata() -> TypeMetadata<Self> {
			TypeMetadata::new("Account")
				.field(FieldSpec::new("id").with_type_name("i64").with_setter("set_id", setter!(id)))
				.field(
					FieldSpec::new("email")
						.with_type_name("String")
						.with_filter(FilterKind::Trim)
						.with_setter("set_email", setter!(email)),
				)
				.field(
					FieldSpec::new("tags")
						.with_filter(FilterKind::Explode)
						.with_setter("set_tags", setter!(tags)),
				)
				.field(
					FieldSpec::new("label")
						.with_source_key(SELF_KEY)
						.with_resolver(ResolverRef::service("labels", "for_account"))
						.with_setter("set_label", setter!(label)),
				)
				.field(FieldSpec::new("untouched").with_type_name("i64"))
				.with_locator(ResolverRef::service("accounts", "find"))
		}

		fn assemble(instance: Self, _lazy: Option<LazyBinding<Self>>) -> Self::Output {
			instance
		}
	}

	struct Services;

	impl Locator for Services {
		fn resolve_by_type(&self, type_name: &str) -> HydrationResult<Arc<dyn Dependency>> {
			Err(HydrationError::DependencyNotFound(type_name.to_string()))
		}

		fn resolve_by_name(&self, name: &str) -> HydrationResult<Arc<dyn Dependency>> {
			match name {
				"labels" => Ok(Arc::new(MethodTable::new("labels").method("for_account", |input| {
					let account = input.instance::<Account>().cloned().unwrap_or_default();
					Ok(FieldValue::from(format!("#{} {}", account.id, account.email)))
				}))),
				"accounts" => Ok(Arc::new(MethodTable::new("accounts").method("find", |input| {
					Ok(match input.value().and_then(Value::as_i64) {
						Some(1) => FieldValue::from("first"),
						_ => FieldValue::Null,
					})
				}))),
				other => Err(HydrationError::DependencyNotFound(other.to_string())),
			}
		}
	}

	#[derive(Default)]
	struct MapCache {
		entries: Mutex<HashMap<String, CachedValue>>,
		writes: AtomicUsize,
	}

	impl HydrationCache for MapCache {
		fn get(&self, key: &str) -> HydrationResult<Option<CachedValue>> {
			Ok(self.entries.lock().get(key).cloned())
		}

		fn set(&self, key: &str, value: CachedValue) -> HydrationResult<()> {
			self.writes.fetch_add(1, Ordering::SeqCst);
			self.entries.lock().insert(key.to_string(), value);
			Ok(())
		}
	}

	#[fixture]
	fn hydrator() -> Hydrator {
		Hydrator::new(Arc::new(Services))
	}

	fn record(value: Value) -> Record {
		match value {
			Value::Object(map) => map,
			_ => Record::new(),
		}
	}

	#[rstest]
	fn populates_fields_in_declaration_order(hydrator: Hydrator) {
		// Arrange
		let row = record(json!({
			"id": "5",
			"email": "  ada@example.com ",
			"tags": "a,b,,c",
			"untouched": 9,
		}));

		// Act
		let account = hydrator.hydrate::<Account>(&row).unwrap().unwrap();

		// Assert
		assert_eq!(account.id, 5);
		assert_eq!(account.email, "ada@example.com");
		assert_eq!(account.tags, vec!["a", "b", "c"]);
		assert_eq!(account.label, "#5 ada@example.com");
		assert_eq!(account.untouched, 0);
	}

	#[rstest]
	fn missing_and_null_values_leave_defaults(hydrator: Hydrator) {
		// Arrange
		let row = record(json!({ "id": null, "other": 1 }));

		// Act
		let account = hydrator.hydrate::<Account>(&row).unwrap().unwrap();

		// Assert
		assert_eq!(account.id, 0);
		assert!(account.tags.is_empty());
		assert_eq!(account.label, "#0 ");
	}

	#[rstest]
	fn absent_and_empty_records_hydrate_to_none(hydrator: Hydrator) {
		assert!(hydrator.hydrate::<Account>(None::<&Record>).unwrap().is_none());
		assert!(hydrator.hydrate::<Account>(&Record::new()).unwrap().is_none());
	}

	#[rstest]
	fn sets_keep_positions_of_missing_records(hydrator: Hydrator) {
		// Arrange
		let rows = vec![
			Some(record(json!({ "id": 1 }))),
			None,
			Some(Record::new()),
			Some(record(json!({ "id": 4 }))),
		];

		// Act
		let accounts = hydrator
			.hydrate_set::<Account, _, _>(rows.iter().map(Option::as_ref))
			.unwrap();

		// Assert
		let ids: Vec<Option<i64>> = accounts.iter().map(|a| a.as_ref().map(|a| a.id)).collect();
		assert_eq!(ids, vec![Some(1), None, None, Some(4)]);
	}

	#[rstest]
	fn strict_mode_rejects_malformed_numbers() {
		// Arrange
		let hydrator = Hydrator::builder(Arc::new(Services))
			.settings(HydratorSettings::new().with_coercion(CoercionMode::Strict))
			.build();
		let row = record(json!({ "id": "five" }));

		// Act
		let result = hydrator.hydrate::<Account>(&row);

		// Assert
		assert!(matches!(result, Err(HydrationError::Coercion { field, .. }) if field == "id"));
	}

	#[rstest]
	fn resolver_failures_propagate() {
		// Arrange
		let hydrator = Hydrator::new(Arc::new(EmptyLocator));
		let row = record(json!({ "id": 1 }));

		// Act
		let result = hydrator.hydrate::<Account>(&row);

		// Assert
		assert!(matches!(result, Err(HydrationError::DependencyNotFound(name)) if name == "labels"));
	}

	#[rstest]
	fn cached_hydration_runs_producer_once() {
		// Arrange
		let cache = Arc::new(MapCache::default());
		let hydrator = Hydrator::builder(Arc::new(Services)).cache(cache.clone()).build();
		let produced = AtomicUsize::new(0);
		let producer = || {
			produced.fetch_add(1, Ordering::SeqCst);
			record(json!({ "id": 3 }))
		};

		// Act
		let first = hydrator.hydrate_cached::<Account, _, _>("account:{3}", producer).unwrap();
		let second = hydrator.hydrate_cached::<Account, _, _>("account:{3}", producer).unwrap();

		// Assert
		assert_eq!(first, second);
		assert_eq!(first.map(|a| a.id), Some(3));
		assert_eq!(produced.load(Ordering::SeqCst), 1);
		assert_eq!(cache.writes.load(Ordering::SeqCst), 2);
		assert!(cache.entries.lock().contains_key("account__3_"));
	}

	#[rstest]
	fn cached_none_is_a_miss() {
		// Arrange
		let cache = Arc::new(MapCache::default());
		let hydrator = Hydrator::builder(Arc::new(Services)).cache(cache.clone()).build();
		let produced = AtomicUsize::new(0);

		// Act
		for _ in 0..2 {
			hydrator
				.hydrate_cached::<Account, _, _>("empty", || {
					produced.fetch_add(1, Ordering::SeqCst);
					None::<Record>
				})
				.unwrap();
		}

		// Assert
		assert_eq!(produced.load(Ordering::SeqCst), 2);
	}

	#[rstest]
	fn cached_sets_are_memoized(hydrator: Hydrator) {
		// Arrange
		let cache = Arc::new(MapCache::default());
		let cached = Hydrator::builder(Arc::new(Services)).cache(cache).build();
		let produced = AtomicUsize::new(0);
		let producer = || {
			produced.fetch_add(1, Ordering::SeqCst);
			vec![record(json!({ "id": 1 })), record(json!({ "id": 2 }))]
		};

		// Act
		let first = cached.hydrate_set_cached::<Account, _, _, _>("all", producer).unwrap();
		let second = cached.hydrate_set_cached::<Account, _, _, _>("all", producer).unwrap();
		let uncached = hydrator.hydrate_set_cached::<Account, _, _, _>("all", producer).unwrap();

		// Assert
		assert_eq!(first, second);
		assert_eq!(first, uncached);
		assert_eq!(produced.load(Ordering::SeqCst), 2);
	}

	#[rstest]
	fn lookup_record_uses_type_level_locator(hydrator: Hydrator) {
		assert_eq!(
			hydrator.lookup_record::<Account>(&json!(1)).unwrap(),
			Some(FieldValue::from("first"))
		);
		assert_eq!(hydrator.lookup_record::<Account>(&json!(2)).unwrap(), None);
	}
}
