//! Post-coercion filters.

use std::fmt;
use std::str::FromStr;

use crate::error::HydrationError;
use crate::value::FieldValue;

/// A transformation applied to a field value after coercion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKind {
	/// Strip surrounding whitespace.
	Trim,
	/// Parse a JSON string into a nested structure.
	JsonDecode,
	/// Split a comma-separated string into a list, dropping empty entries.
	Explode,
	/// Build a map from `key:value` tokens in a comma-separated string.
	KeyValuePairs,
}

impl FilterKind {
	/// All filters, in declaration order.
	pub const ALL: [FilterKind; 4] = [Self::Trim, Self::JsonDecode, Self::Explode, Self::KeyValuePairs];

	/// Looks up a filter by name. Hyphenated spellings are accepted.
	///
	/// # Examples
	///
	/// ```
	/// use reinhardt_hydrator::FilterKind;
	///
	/// assert_eq!(FilterKind::parse("json-decode"), Some(FilterKind::JsonDecode));
	/// assert_eq!(FilterKind::parse("array_from_string"), Some(FilterKind::KeyValuePairs));
	/// assert_eq!(FilterKind::parse("lowercase"), None);
	/// ```
	pub fn parse(name: &str) -> Option<Self> {
		match name.trim().to_ascii_lowercase().replace('-', "_").as_str() {
			"trim" => Some(Self::Trim),
			"json_decode" => Some(Self::JsonDecode),
			"explode" | "explode_to_list" => Some(Self::Explode),
			"array_from_string" | "key_value_pairs" => Some(Self::KeyValuePairs),
			_ => None,
		}
	}

	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Trim => "trim",
			Self::JsonDecode => "json_decode",
			Self::Explode => "explode",
			Self::KeyValuePairs => "array_from_string",
		}
	}

	/// Applies the filter.
	pub fn apply(&self, value: FieldValue) -> FieldValue {
		match self {
			Self::Trim => trim(value),
			Self::JsonDecode => json_decode(value),
			Self::Explode => explode(value),
			Self::KeyValuePairs => key_value_pairs(value),
		}
	}
}

impl FromStr for FilterKind {
	type Err = HydrationError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::parse(s).ok_or_else(|| HydrationError::Settings(format!("unknown filter `{s}`")))
	}
}

impl fmt::Display for FilterKind {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

fn trim(value: FieldValue) -> FieldValue {
	match value {
		FieldValue::String(s) => FieldValue::String(s.trim().to_string()),
		FieldValue::Null => FieldValue::Null,
		other => match other.scalar_string() {
			Some(s) => FieldValue::String(s.trim().to_string()),
			None => other,
		},
	}
}

fn json_decode(value: FieldValue) -> FieldValue {
	let text = match &value {
		FieldValue::String(s) => s.clone(),
		FieldValue::List(_) | FieldValue::Map(_) | FieldValue::Object(_) | FieldValue::Null => return value,
		other => match other.scalar_string() {
			Some(s) => s,
			None => return value,
		},
	};
	serde_json::from_str::<serde_json::Value>(&text).map_or(FieldValue::Null, FieldValue::from)
}

fn is_empty_string(value: &FieldValue) -> bool {
	matches!(value, FieldValue::String(s) if s.is_empty())
}

fn explode(value: FieldValue) -> FieldValue {
	if !value.is_truthy() {
		return FieldValue::List(Vec::new());
	}
	match value {
		FieldValue::List(items) => FieldValue::List(items.into_iter().filter(|v| !is_empty_string(v)).collect()),
		FieldValue::Map(entries) => FieldValue::Map(
			entries
				.into_iter()
				.filter(|(_, v)| !is_empty_string(v))
				.collect(),
		),
		other => {
			let text = other.scalar_string().unwrap_or_default();
			FieldValue::List(
				text.split(',')
					.filter(|part| !part.is_empty())
					.map(FieldValue::from)
					.collect(),
			)
		}
	}
}

fn key_value_pairs(value: FieldValue) -> FieldValue {
	let Some(text) = value.scalar_string() else {
		return value;
	};

	let mut entries: Vec<(String, FieldValue)> = Vec::new();
	let mut next_index: i64 = 0;
	for token in text.split(',') {
		let mut parts = token.split(':');
		let (key, val) = match (parts.next(), parts.next()) {
			(Some(key), Some(val)) => (key.to_string(), val),
			_ => (next_index.to_string(), token),
		};
		if let Ok(index) = key.parse::<i64>() {
			next_index = next_index.max(index + 1);
		}
		match entries.iter_mut().find(|(existing, _)| *existing == key) {
			Some((_, slot)) => *slot = FieldValue::from(val),
			None => entries.push((key, FieldValue::from(val))),
		}
	}

	entries.retain(|(_, v)| v.is_truthy());
	FieldValue::Map(entries)
}
