//! Field metadata for hydratable types.
//!
//! A [`TypeMetadata`] describes how each declared field of a type is read from
//! a record. It is normally produced by `#[derive(Hydrate)]` and memoized per
//! type by [`metadata_for`].

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use convert_case::{Case, Casing};
use once_cell::sync::Lazy;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};

use crate::error::{HydrationError, HydrationResult};
use crate::filter::FilterKind;
use crate::proxy::LazyBinding;
use crate::value::FieldValue;

/// Source key that refers to the instance being hydrated instead of the record.
pub const SELF_KEY: &str = "$this";

/// A type that can be populated from a [`Record`](crate::Record).
///
/// `Output` is the type handed back to callers: `Self` for plain types and
/// [`Proxy<Self>`](crate::Proxy) for types with lazy fields.
pub trait Hydrate: Default + Send + Sync + 'static {
	type Output: Send + 'static;

	/// Builds the field metadata. Called once per type, see [`metadata_for`].
	fn metadata() -> TypeMetadata<Self>;

	/// Wraps a freshly hydrated instance into the output type.
	fn assemble(instance: Self, lazy: Option<LazyBinding<Self>>) -> Self::Output;
}

/// Declared type of a field, as understood by primitive coercion.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum ValueType {
	#[default]
	Unspecified,
	Int,
	Float,
	Bool,
	String,
	/// Wall-clock date, coerced into [`FieldValue::DateTime`].
	DateTime,
	/// Zone-aware instant, coerced into [`FieldValue::Timestamp`].
	DateTimeImmutable,
	/// Any other named type. Values pass through untouched.
	Class(String),
}

impl ValueType {
	/// Parses a declared type name, returning the type and whether it is nullable.
	///
	/// Matching is case-insensitive. A leading `?` or an `Option<..>` wrapper
	/// marks the type nullable, leading namespace separators are ignored and
	/// only the last path segment is considered.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::ValueType;
	///
	/// assert_eq!(ValueType::parse("?int"), (ValueType::Int, true));
	/// assert_eq!(ValueType::parse("\\DateTimeImmutable"), (ValueType::DateTimeImmutable, false));
	/// assert_eq!(ValueType::parse("Option<chrono::NaiveDateTime>"), (ValueType::DateTime, true));
	/// assert_eq!(ValueType::parse("Owner"), (ValueType::Class("Owner".into()), false));
	/// ```
	pub fn parse(raw: &str) -> (Self, bool) {
		let compact: String = raw.chars().filter(|c| !c.is_whitespace()).collect();
		let mut name = compact.as_str();
		let mut nullable = false;
		if let Some(rest) = name.strip_prefix('?') {
			name = rest;
			nullable = true;
		}
		name = name.trim_start_matches('&');
		name = name.trim_start_matches('\\').trim_start_matches("::");

		let (base, generics) = match name.split_once('<') {
			Some((base, rest)) => (base, rest.strip_suffix('>')),
			None => (name, None),
		};
		let segment = base.rsplit(['\\', ':']).next().unwrap_or(base);
		let lowered = segment.to_ascii_lowercase();

		if lowered == "option"
			&& let Some(inner) = generics
		{
			let (inner_type, _) = Self::parse(inner);
			return (inner_type, true);
		}

		let value_type = match lowered.as_str() {
			"" | "mixed" => Self::Unspecified,
			"i8" | "i16" | "i32" | "i64" | "i128" | "isize" | "u8" | "u16" | "u32" | "u64" | "u128"
			| "usize" | "int" | "integer" => Self::Int,
			"f32" | "f64" | "float" | "double" => Self::Float,
			"bool" | "boolean" => Self::Bool,
			"string" | "str" => Self::String,
			"datetime" if generics.is_some() => Self::DateTimeImmutable,
			"datetime" | "datetimeinterface" | "naivedatetime" => Self::DateTime,
			"datetimeimmutable" => Self::DateTimeImmutable,
			_ => Self::Class(segment.to_string()),
		};
		(value_type, nullable)
	}

	pub fn is_date(&self) -> bool {
		matches!(self, Self::DateTime | Self::DateTimeImmutable)
	}
}

impl fmt::Display for ValueType {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Unspecified => f.write_str("mixed"),
			Self::Int => f.write_str("int"),
			Self::Float => f.write_str("float"),
			Self::Bool => f.write_str("bool"),
			Self::String => f.write_str("string"),
			Self::DateTime => f.write_str("datetime"),
			Self::DateTimeImmutable => f.write_str("datetime_immutable"),
			Self::Class(name) => f.write_str(name),
		}
	}
}

/// Which dependency a resolver reference points at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "name", rename_all = "snake_case")]
pub enum DependencyTarget {
	/// Always autowired by type.
	Type(String),
	/// Always looked up by service name.
	Service(String),
	/// Autowired when the locator knows the type, otherwise looked up by name.
	Auto(String),
}

impl DependencyTarget {
	pub fn name(&self) -> &str {
		match self {
			Self::Type(name) | Self::Service(name) | Self::Auto(name) => name,
		}
	}
}

/// A `dependency::method` pair used by custom resolvers and class-level lookups.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResolverRef {
	pub target: DependencyTarget,
	pub method: String,
}

impl ResolverRef {
	pub fn new(target: DependencyTarget, method: impl Into<String>) -> Self {
		Self {
			target,
			method: method.into(),
		}
	}

	/// Reference to a dependency autowired by type.
	pub fn class(name: impl Into<String>, method: impl Into<String>) -> Self {
		Self::new(DependencyTarget::Type(name.into()), method)
	}

	/// Reference to a named service.
	pub fn service(name: impl Into<String>, method: impl Into<String>) -> Self {
		Self::new(DependencyTarget::Service(name.into()), method)
	}

	/// Parses `"Dependency::method"`. A leading `@` names a service.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::{DependencyTarget, ResolverRef};
	///
	/// let by_type = ResolverRef::parse("repo::UserRepository::find").unwrap();
	/// assert_eq!(by_type.target, DependencyTarget::Auto("repo::UserRepository".into()));
	/// assert_eq!(by_type.method, "find");
	///
	/// let by_name = ResolverRef::parse("@users::find").unwrap();
	/// assert_eq!(by_name.target, DependencyTarget::Service("users".into()));
	/// ```
	pub fn parse(reference: &str) -> HydrationResult<Self> {
		let reference = reference.trim();
		let (dependency, method) = reference
			.rsplit_once("::")
			.filter(|(dependency, method)| !dependency.is_empty() && !method.is_empty())
			.ok_or_else(|| HydrationError::InvalidResolver(reference.to_string()))?;
		let target = match dependency.strip_prefix('@') {
			Some(service) => DependencyTarget::Service(service.to_string()),
			None => DependencyTarget::Auto(dependency.to_string()),
		};
		Ok(Self::new(target, method))
	}
}

impl fmt::Display for ResolverRef {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match &self.target {
			DependencyTarget::Service(name) => write!(f, "@{name}::{}", self.method),
			DependencyTarget::Type(name) | DependencyTarget::Auto(name) => {
				write!(f, "{name}::{}", self.method)
			}
		}
	}
}

/// Assigns a coerced value to one field of `T`.
pub type SetterFn<T> = fn(&mut T, FieldValue) -> HydrationResult<()>;

/// A named setter registered for a field.
pub struct Setter<T> {
	pub name: String,
	pub apply: SetterFn<T>,
}

impl<T> Clone for Setter<T> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			apply: self.apply,
		}
	}
}

impl<T> fmt::Debug for Setter<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Setter").field("name", &self.name).finish_non_exhaustive()
	}
}

/// How one field is read from a record.
pub struct FieldSpec<T> {
	pub name: String,
	/// Record key, `"$this"` for the instance itself.
	pub source_key: String,
	pub value_type: ValueType,
	pub nullable: bool,
	/// Explicit date format using `Y-m-d H:i:s` style codes.
	pub date_format: Option<String>,
	pub resolver: Option<ResolverRef>,
	pub filter: Option<FilterKind>,
	pub lazy: bool,
	pub setter: Option<Setter<T>>,
}

impl<T> FieldSpec<T> {
	/// Creates a spec with defaults: the source key is the snake-cased name.
	pub fn new(name: impl Into<String>) -> Self {
		let name = name.into();
		Self {
			source_key: name.to_case(Case::Snake),
			name,
			value_type: ValueType::Unspecified,
			nullable: false,
			date_format: None,
			resolver: None,
			filter: None,
			lazy: false,
			setter: None,
		}
	}

	pub fn with_source_key(mut self, key: impl Into<String>) -> Self {
		self.source_key = key.into();
		self
	}

	/// Sets the value type from a declared type name, see [`ValueType::parse`].
	pub fn with_type_name(mut self, type_name: &str) -> Self {
		let (value_type, nullable) = ValueType::parse(type_name);
		self.value_type = value_type;
		self.nullable = nullable;
		self
	}

	pub fn with_value_type(mut self, value_type: ValueType) -> Self {
		self.value_type = value_type;
		self
	}

	pub fn with_date_format(mut self, format: impl Into<String>) -> Self {
		self.date_format = Some(format.into());
		self
	}

	pub fn with_resolver(mut self, resolver: ResolverRef) -> Self {
		self.resolver = Some(resolver);
		self
	}

	pub fn with_filter(mut self, filter: FilterKind) -> Self {
		self.filter = Some(filter);
		self
	}

	pub fn lazy(mut self) -> Self {
		self.lazy = true;
		self
	}

	pub fn with_setter(mut self, name: impl Into<String>, apply: SetterFn<T>) -> Self {
		self.setter = Some(Setter {
			name: name.into(),
			apply,
		});
		self
	}

	pub fn is_self_reference(&self) -> bool {
		self.source_key == SELF_KEY
	}

	/// Lazy fields that have something to resolve them with.
	pub fn is_lazy_accessor(&self) -> bool {
		self.lazy && self.resolver.is_some() && !self.source_key.is_empty()
	}

	/// Conventional getter name, e.g. `get_other_data`.
	pub fn getter_name(&self) -> String {
		format!("get_{}", self.name.to_case(Case::Snake))
	}
}

impl<T> Clone for FieldSpec<T> {
	fn clone(&self) -> Self {
		Self {
			name: self.name.clone(),
			source_key: self.source_key.clone(),
			value_type: self.value_type.clone(),
			nullable: self.nullable,
			date_format: self.date_format.clone(),
			resolver: self.resolver.clone(),
			filter: self.filter,
			lazy: self.lazy,
			setter: self.setter.clone(),
		}
	}
}

impl<T> fmt::Debug for FieldSpec<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("FieldSpec")
			.field("name", &self.name)
			.field("source_key", &self.source_key)
			.field("value_type", &self.value_type)
			.field("nullable", &self.nullable)
			.field("date_format", &self.date_format)
			.field("resolver", &self.resolver)
			.field("filter", &self.filter)
			.field("lazy", &self.lazy)
			.field("setter", &self.setter)
			.finish()
	}
}

/// Ordered field specs plus type-level information for one hydratable type.
pub struct TypeMetadata<T> {
	type_name: String,
	type_path: String,
	source_file: String,
	manifest_dir: String,
	fields: Vec<FieldSpec<T>>,
	locator: Option<ResolverRef>,
}

impl<T: 'static> TypeMetadata<T> {
	pub fn new(type_name: impl Into<String>) -> Self {
		Self {
			type_name: type_name.into(),
			type_path: std::any::type_name::<T>().to_string(),
			source_file: String::new(),
			manifest_dir: String::new(),
			fields: Vec::new(),
			locator: None,
		}
	}

	/// Records where the type is declared, used for proxy fingerprints.
	///
	/// `file` is usually `file!()` and `manifest_dir` the declaring crate's
	/// `CARGO_MANIFEST_DIR`.
	pub fn with_source(mut self, file: impl Into<String>, manifest_dir: impl Into<String>) -> Self {
		self.source_file = file.into();
		self.manifest_dir = manifest_dir.into();
		self
	}

	/// Appends a field. Declaration order is hydration order.
	pub fn field(mut self, spec: FieldSpec<T>) -> Self {
		self.fields.push(spec);
		self
	}

	/// Sets the class-level lookup used by `Hydrator::lookup_record`.
	pub fn with_locator(mut self, locator: ResolverRef) -> Self {
		self.locator = Some(locator);
		self
	}

	pub fn type_name(&self) -> &str {
		&self.type_name
	}

	pub fn type_path(&self) -> &str {
		&self.type_path
	}

	pub fn source_file(&self) -> &str {
		&self.source_file
	}

	pub fn manifest_dir(&self) -> &str {
		&self.manifest_dir
	}

	pub fn fields(&self) -> &[FieldSpec<T>] {
		&self.fields
	}

	pub fn get_field(&self, name: &str) -> Option<&FieldSpec<T>> {
		self.fields.iter().find(|spec| spec.name == name)
	}

	pub fn locator(&self) -> Option<&ResolverRef> {
		self.locator.as_ref()
	}

	pub fn lazy_fields(&self) -> impl Iterator<Item = &FieldSpec<T>> {
		self.fields.iter().filter(|spec| spec.is_lazy_accessor())
	}

	pub fn has_lazy_fields(&self) -> bool {
		self.lazy_fields().next().is_some()
	}
}

impl<T> fmt::Debug for TypeMetadata<T> {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("TypeMetadata")
			.field("type_name", &self.type_name)
			.field("type_path", &self.type_path)
			.field("source_file", &self.source_file)
			.field("fields", &self.fields)
			.field("locator", &self.locator)
			.finish()
	}
}

/// Memoized metadata per type.
static METADATA_REGISTRY: Lazy<RwLock<HashMap<TypeId, Arc<dyn Any + Send + Sync>>>> =
	Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the metadata of `T`, building it on first use.
pub fn metadata_for<T: Hydrate>() -> Arc<TypeMetadata<T>> {
	let type_id = TypeId::of::<T>();
	if let Some(cached) = METADATA_REGISTRY
		.read()
		.get(&type_id)
		.and_then(|entry| entry.clone().downcast::<TypeMetadata<T>>().ok())
	{
		return cached;
	}

	let built = Arc::new(T::metadata());
	let mut registry = METADATA_REGISTRY.write();
	let entry = registry
		.entry(type_id)
		.or_insert_with(|| built.clone() as Arc<dyn Any + Send + Sync>);
	entry.clone().downcast::<TypeMetadata<T>>().unwrap_or(built)
}
