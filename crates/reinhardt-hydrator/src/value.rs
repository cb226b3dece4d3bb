//! Values flowing through the hydration pipeline.
//!
//! Source records are plain JSON maps. Every field value is turned into a
//! [`FieldValue`] before coercion and filtering, and converted back into the
//! concrete Rust field type by [`FromFieldValue`] when a setter runs.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde_json::{Map, Number, Value};
use std::any::Any;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;

use crate::coerce;
use crate::error::HydrationError;

/// One source row: string keys mapped to JSON values.
pub type Record = Map<String, Value>;

/// A value produced by coercion, filtering or a custom resolver.
#[derive(Clone)]
pub enum FieldValue {
	/// Absent value. Setters are never called with it.
	Null,
	Bool(bool),
	Int(i64),
	Float(f64),
	String(String),
	/// Wall-clock date and time without a zone.
	DateTime(NaiveDateTime),
	/// Zone-aware instant, normalised to UTC.
	Timestamp(DateTime<Utc>),
	List(Vec<FieldValue>),
	/// Ordered key/value entries, keys are unique.
	Map(Vec<(String, FieldValue)>),
	/// Arbitrary value returned by a dependency.
	Object(Arc<dyn Any + Send + Sync>),
}

impl FieldValue {
	/// Wraps an arbitrary value as an object.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::FieldValue;
	///
	/// let value = FieldValue::object(vec![1u8, 2, 3]);
	/// assert_eq!(value.kind(), "object");
	/// ```
	pub fn object<T: Any + Send + Sync>(value: T) -> Self {
		Self::Object(Arc::new(value))
	}

	pub fn is_null(&self) -> bool {
		matches!(self, Self::Null)
	}

	/// Loose truthiness: `null`, `false`, `0`, `0.0`, `""`, `"0"` and empty
	/// collections are falsy.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::FieldValue;
	///
	/// assert!(!FieldValue::String("0".into()).is_truthy());
	/// assert!(FieldValue::String("no".into()).is_truthy());
	/// assert!(!FieldValue::List(vec![]).is_truthy());
	/// ```
	pub fn is_truthy(&self) -> bool {
		match self {
			Self::Null => false,
			Self::Bool(b) => *b,
			Self::Int(n) => *n != 0,
			Self::Float(f) => *f != 0.0,
			Self::String(s) => !(s.is_empty() || s == "0"),
			Self::List(items) => !items.is_empty(),
			Self::Map(entries) => !entries.is_empty(),
			Self::DateTime(_) | Self::Timestamp(_) | Self::Object(_) => true,
		}
	}

	/// Short name of the variant, used in error messages.
	pub fn kind(&self) -> &'static str {
		match self {
			Self::Null => "null",
			Self::Bool(_) => "bool",
			Self::Int(_) => "int",
			Self::Float(_) => "float",
			Self::String(_) => "string",
			Self::DateTime(_) => "datetime",
			Self::Timestamp(_) => "timestamp",
			Self::List(_) => "list",
			Self::Map(_) => "map",
			Self::Object(_) => "object",
		}
	}

	/// String form of a scalar, `None` for collections and objects.
	///
	/// Booleans render as `"1"` and `""`.
	pub fn scalar_string(&self) -> Option<String> {
		match self {
			Self::Null => Some(String::new()),
			Self::Bool(true) => Some("1".to_string()),
			Self::Bool(false) => Some(String::new()),
			Self::Int(n) => Some(n.to_string()),
			Self::Float(f) => Some(f.to_string()),
			Self::String(s) => Some(s.clone()),
			Self::DateTime(dt) => Some(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
			Self::Timestamp(ts) => Some(ts.to_rfc3339()),
			Self::List(_) | Self::Map(_) | Self::Object(_) => None,
		}
	}

	/// Downcasts an object value and clones it out.
	///
	/// Handy for implementing [`FromFieldValue`] on resolver-produced types.
	pub fn object_cloned<T: Any + Clone>(&self) -> Result<T, ConversionError> {
		match self {
			Self::Object(obj) => obj
				.downcast_ref::<T>()
				.cloned()
				.ok_or_else(|| ConversionError::new::<T>("object")),
			other => Err(ConversionError::new::<T>(other.kind())),
		}
	}
}

impl fmt::Debug for FieldValue {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Null => f.write_str("Null"),
			Self::Bool(b) => f.debug_tuple("Bool").field(b).finish(),
			Self::Int(n) => f.debug_tuple("Int").field(n).finish(),
			Self::Float(x) => f.debug_tuple("Float").field(x).finish(),
			Self::String(s) => f.debug_tuple("String").field(s).finish(),
			Self::DateTime(dt) => f.debug_tuple("DateTime").field(dt).finish(),
			Self::Timestamp(ts) => f.debug_tuple("Timestamp").field(ts).finish(),
			Self::List(items) => f.debug_tuple("List").field(items).finish(),
			Self::Map(entries) => f.debug_tuple("Map").field(entries).finish(),
			Self::Object(_) => f.write_str("Object(..)"),
		}
	}
}

impl PartialEq for FieldValue {
	fn eq(&self, other: &Self) -> bool {
		match (self, other) {
			(Self::Null, Self::Null) => true,
			(Self::Bool(a), Self::Bool(b)) => a == b,
			(Self::Int(a), Self::Int(b)) => a == b,
			(Self::Float(a), Self::Float(b)) => a == b,
			(Self::String(a), Self::String(b)) => a == b,
			(Self::DateTime(a), Self::DateTime(b)) => a == b,
			(Self::Timestamp(a), Self::Timestamp(b)) => a == b,
			(Self::List(a), Self::List(b)) => a == b,
			(Self::Map(a), Self::Map(b)) => a == b,
			(Self::Object(a), Self::Object(b)) => Arc::ptr_eq(a, b),
			_ => false,
		}
	}
}

impl From<Value> for FieldValue {
	fn from(value: Value) -> Self {
		match value {
			Value::Null => Self::Null,
			Value::Bool(b) => Self::Bool(b),
			Value::Number(n) => match n.as_i64() {
				Some(i) => Self::Int(i),
				None => Self::Float(n.as_f64().unwrap_or_default()),
			},
			Value::String(s) => Self::String(s),
			Value::Array(items) => Self::List(items.into_iter().map(Self::from).collect()),
			Value::Object(map) => Self::Map(map.into_iter().map(|(k, v)| (k, Self::from(v))).collect()),
		}
	}
}

impl From<&Value> for FieldValue {
	fn from(value: &Value) -> Self {
		Self::from(value.clone())
	}
}

impl From<bool> for FieldValue {
	fn from(value: bool) -> Self {
		Self::Bool(value)
	}
}

impl From<i64> for FieldValue {
	fn from(value: i64) -> Self {
		Self::Int(value)
	}
}

impl From<f64> for FieldValue {
	fn from(value: f64) -> Self {
		Self::Float(value)
	}
}

impl From<&str> for FieldValue {
	fn from(value: &str) -> Self {
		Self::String(value.to_string())
	}
}

impl From<String> for FieldValue {
	fn from(value: String) -> Self {
		Self::String(value)
	}
}

impl<T: Into<FieldValue>> From<Option<T>> for FieldValue {
	fn from(value: Option<T>) -> Self {
		value.map_or(Self::Null, Into::into)
	}
}

/// A setter could not turn a [`FieldValue`] into the field's type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversionError {
	pub expected: String,
	pub found: String,
}

impl ConversionError {
	pub fn new<T: ?Sized>(found: impl Into<String>) -> Self {
		Self {
			expected: std::any::type_name::<T>().to_string(),
			found: found.into(),
		}
	}

	/// Attaches the field name, producing the error surfaced to callers.
	pub fn for_field(self, field: &str) -> HydrationError {
		HydrationError::InvalidFieldValue {
			field: field.to_string(),
			expected: self.expected,
			found: self.found,
		}
	}
}

impl fmt::Display for ConversionError {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		write!(f, "expected {}, found {}", self.expected, self.found)
	}
}

impl std::error::Error for ConversionError {}

/// Conversion from a pipeline value into a concrete field type.
///
/// Scalar conversions are lenient in the same way primitive coercion is:
/// numeric strings become numbers and any value has a truthiness. Integers
/// outside the target type's range saturate to its bounds.
pub trait FromFieldValue: Sized {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError>;
}

macro_rules! impl_from_field_value_int {
	($($ty:ty),* $(,)?) => {
		$(
			impl FromFieldValue for $ty {
				fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
					let wide = match &value {
						FieldValue::Int(n) => *n,
						FieldValue::Float(f) => *f as i64,
						FieldValue::Bool(b) => i64::from(*b),
						FieldValue::String(s) => coerce::int_from_str(s).0,
						other => return Err(ConversionError::new::<$ty>(other.kind())),
					};
					// Out of range saturates to the nearest bound.
					let clamped = i128::from(wide).clamp(<$ty>::MIN as i128, <$ty>::MAX as i128);
					Ok(clamped as $ty)
				}
			}
		)*
	};
}

impl_from_field_value_int!(i8, i16, i32, i64, isize, u8, u16, u32, u64, usize);

impl FromFieldValue for f64 {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::Float(f) => Ok(f),
			FieldValue::Int(n) => Ok(n as f64),
			FieldValue::Bool(b) => Ok(if b { 1.0 } else { 0.0 }),
			FieldValue::String(s) => Ok(coerce::float_from_str(&s).0),
			other => Err(ConversionError::new::<f64>(other.kind())),
		}
	}
}

impl FromFieldValue for f32 {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		f64::from_field_value(value).map(|f| f as f32)
	}
}

impl FromFieldValue for bool {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		Ok(value.is_truthy())
	}
}

impl FromFieldValue for String {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		let kind = value.kind();
		value
			.scalar_string()
			.ok_or_else(|| ConversionError::new::<String>(kind))
	}
}

impl FromFieldValue for NaiveDateTime {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::DateTime(dt) => Ok(dt),
			FieldValue::Timestamp(ts) => Ok(ts.naive_utc()),
			FieldValue::String(s) => coerce::parse_date(&s)
				.map(|parsed| parsed.naive)
				.ok_or_else(|| ConversionError::new::<NaiveDateTime>(format!("string {s:?}"))),
			other => Err(ConversionError::new::<NaiveDateTime>(other.kind())),
		}
	}
}

impl FromFieldValue for DateTime<Utc> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::Timestamp(ts) => Ok(ts),
			FieldValue::DateTime(dt) => Ok(dt.and_utc()),
			FieldValue::String(s) => coerce::parse_date(&s)
				.map(|parsed| parsed.utc)
				.ok_or_else(|| ConversionError::new::<DateTime<Utc>>(format!("string {s:?}"))),
			other => Err(ConversionError::new::<DateTime<Utc>>(other.kind())),
		}
	}
}

impl FromFieldValue for NaiveDate {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		NaiveDateTime::from_field_value(value)
			.map(|dt| dt.date())
			.map_err(|err| ConversionError::new::<NaiveDate>(err.found))
	}
}

impl FromFieldValue for Value {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		Ok(match value {
			FieldValue::Null => Value::Null,
			FieldValue::Bool(b) => Value::Bool(b),
			FieldValue::Int(n) => Value::Number(n.into()),
			FieldValue::Float(f) => Number::from_f64(f).map_or(Value::Null, Value::Number),
			FieldValue::String(s) => Value::String(s),
			FieldValue::DateTime(dt) => Value::String(dt.format("%Y-%m-%d %H:%M:%S").to_string()),
			FieldValue::Timestamp(ts) => Value::String(ts.to_rfc3339()),
			FieldValue::List(items) => Value::Array(
				items
					.into_iter()
					.map(Value::from_field_value)
					.collect::<Result<_, _>>()?,
			),
			FieldValue::Map(entries) => Value::Object(
				entries
					.into_iter()
					.map(|(k, v)| Value::from_field_value(v).map(|v| (k, v)))
					.collect::<Result<_, _>>()?,
			),
			FieldValue::Object(_) => return Err(ConversionError::new::<Value>("object")),
		})
	}
}

impl<V: FromFieldValue> FromFieldValue for Vec<V> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::List(items) => items.into_iter().map(V::from_field_value).collect(),
			FieldValue::Map(entries) => entries
				.into_iter()
				.map(|(_, v)| V::from_field_value(v))
				.collect(),
			other => Err(ConversionError::new::<Self>(other.kind())),
		}
	}
}

fn map_entries<V: FromFieldValue, M>(value: FieldValue) -> Result<Vec<(String, V)>, ConversionError> {
	match value {
		FieldValue::Map(entries) => entries
			.into_iter()
			.map(|(k, v)| V::from_field_value(v).map(|v| (k, v)))
			.collect(),
		FieldValue::List(items) => items
			.into_iter()
			.enumerate()
			.map(|(i, v)| V::from_field_value(v).map(|v| (i.to_string(), v)))
			.collect(),
		other => Err(ConversionError::new::<M>(other.kind())),
	}
}

impl<V: FromFieldValue> FromFieldValue for HashMap<String, V> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		map_entries::<V, Self>(value).map(|entries| entries.into_iter().collect())
	}
}

impl<V: FromFieldValue> FromFieldValue for BTreeMap<String, V> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		map_entries::<V, Self>(value).map(|entries| entries.into_iter().collect())
	}
}

impl<V: FromFieldValue> FromFieldValue for Option<V> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::Null => Ok(None),
			other => V::from_field_value(other).map(Some),
		}
	}
}

impl<T: Any + Send + Sync> FromFieldValue for Arc<T> {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		match value {
			FieldValue::Object(obj) => obj
				.downcast::<T>()
				.map_err(|_| ConversionError::new::<Self>("object of another type")),
			other => Err(ConversionError::new::<Self>(other.kind())),
		}
	}
}

impl FromFieldValue for FieldValue {
	fn from_field_value(value: FieldValue) -> Result<Self, ConversionError> {
		Ok(value)
	}
}
