//! Primitive coercion by declared value type.
//!
//! Coercion is best-effort by default: a non-numeric string cast to an
//! integer yields `0`, an unparseable date leaves the field unset. Strict mode
//! turns both of those into [`HydrationError::Coercion`].

use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{HydrationError, HydrationResult};
use crate::metadata::ValueType;
use crate::value::FieldValue;

/// How malformed primitive input is treated.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoercionMode {
	/// Best-effort casts that never fail.
	#[default]
	Lenient,
	/// Reject non-numeric input for numeric fields and unparseable dates.
	Strict,
}

/// A parsed date in both of the shapes a field may ask for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct ParsedDate {
	/// Wall-clock time as written in the input.
	pub(crate) naive: NaiveDateTime,
	/// The same moment in UTC (naive input is taken as UTC).
	pub(crate) utc: DateTime<Utc>,
}

impl ParsedDate {
	fn from_naive(naive: NaiveDateTime) -> Self {
		Self {
			naive,
			utc: naive.and_utc(),
		}
	}

	fn from_offset(dt: DateTime<FixedOffset>) -> Self {
		Self {
			naive: dt.naive_local(),
			utc: dt.with_timezone(&Utc),
		}
	}
}

/// Coerces a raw record value according to `value_type`.
///
/// `field` is only used in strict-mode error messages.
pub(crate) fn coerce(
	field: &str,
	value: &Value,
	value_type: &ValueType,
	date_format: Option<&str>,
	mode: CoercionMode,
) -> HydrationResult<FieldValue> {
	let raw = FieldValue::from(value);
	match value_type {
		ValueType::Int => {
			let (n, numeric) = int_from_value(&raw);
			reject_if_strict(mode, numeric, field, value_type, value)?;
			Ok(FieldValue::Int(n))
		}
		ValueType::Float => {
			let (f, numeric) = float_from_value(&raw);
			reject_if_strict(mode, numeric, field, value_type, value)?;
			Ok(FieldValue::Float(f))
		}
		ValueType::Bool => Ok(FieldValue::Bool(bool_from_value(&raw))),
		ValueType::String => Ok(raw
			.scalar_string()
			.map_or(raw, FieldValue::String)),
		ValueType::DateTime | ValueType::DateTimeImmutable => {
			let text = raw.scalar_string().unwrap_or_default();
			let parsed = match date_format {
				Some(format) => parse_date_with_format(&text, format),
				None => parse_date(&text),
			};
			match parsed {
				Some(parsed) if *value_type == ValueType::DateTime => Ok(FieldValue::DateTime(parsed.naive)),
				Some(parsed) => Ok(FieldValue::Timestamp(parsed.utc)),
				None => {
					reject_if_strict(mode, false, field, value_type, value)?;
					Ok(FieldValue::Null)
				}
			}
		}
		ValueType::Unspecified | ValueType::Class(_) => Ok(raw),
	}
}

fn reject_if_strict(
	mode: CoercionMode,
	accepted: bool,
	field: &str,
	value_type: &ValueType,
	value: &Value,
) -> HydrationResult<()> {
	if accepted || mode == CoercionMode::Lenient {
		return Ok(());
	}
	Err(HydrationError::Coercion {
		field: field.to_string(),
		value_type: value_type.to_string(),
		value: value.to_string(),
	})
}

/// `yes`/`no` first, then plain truthiness.
fn bool_from_value(value: &FieldValue) -> bool {
	match value {
		FieldValue::String(s) if s == "yes" => true,
		FieldValue::String(s) if s == "no" => false,
		other => other.is_truthy(),
	}
}

fn int_from_value(value: &FieldValue) -> (i64, bool) {
	match value {
		FieldValue::Int(n) => (*n, true),
		FieldValue::Float(f) => (*f as i64, true),
		FieldValue::Bool(b) => (i64::from(*b), true),
		FieldValue::String(s) => int_from_str(s),
		FieldValue::Null => (0, false),
		other => (i64::from(other.is_truthy()), false),
	}
}

fn float_from_value(value: &FieldValue) -> (f64, bool) {
	match value {
		FieldValue::Float(f) => (*f, true),
		FieldValue::Int(n) => (*n as f64, true),
		FieldValue::Bool(b) => (if *b { 1.0 } else { 0.0 }, true),
		FieldValue::String(s) => float_from_str(s),
		FieldValue::Null => (0.0, false),
		other => (if other.is_truthy() { 1.0 } else { 0.0 }, false),
	}
}

/// Length of the leading numeric portion of `s` (after leading whitespace).
fn numeric_prefix(s: &str, allow_fraction: bool) -> &str {
	let bytes = s.as_bytes();
	let mut end = 0;
	if matches!(bytes.first(), Some(b'+' | b'-')) {
		end = 1;
	}
	let digits_start = end;
	while end < bytes.len() && bytes[end].is_ascii_digit() {
		end += 1;
	}
	let mut mantissa_digits = end - digits_start;
	if allow_fraction && end < bytes.len() && bytes[end] == b'.' {
		let frac_start = end + 1;
		let mut frac_end = frac_start;
		while frac_end < bytes.len() && bytes[frac_end].is_ascii_digit() {
			frac_end += 1;
		}
		if mantissa_digits > 0 || frac_end > frac_start {
			mantissa_digits += frac_end - frac_start;
			end = frac_end;
		}
	}
	if mantissa_digits == 0 {
		return "";
	}
	if end < bytes.len() && matches!(bytes[end], b'e' | b'E') {
		let mut exp_end = end + 1;
		if matches!(bytes.get(exp_end), Some(b'+' | b'-')) {
			exp_end += 1;
		}
		let exp_digits = exp_end;
		while exp_end < bytes.len() && bytes[exp_end].is_ascii_digit() {
			exp_end += 1;
		}
		if exp_end > exp_digits {
			end = exp_end;
		}
	}
	&s[..end]
}

/// Best-effort integer cast of a string.
///
/// Returns the value and whether the whole (trimmed) string was numeric.
/// Numeric strings in float or exponent notation are truncated toward zero.
pub(crate) fn int_from_str(s: &str) -> (i64, bool) {
	let trimmed = s.trim_start();
	let prefix = numeric_prefix(trimmed, true);
	let fully_numeric = !prefix.is_empty() && prefix.len() == trimmed.trim_end().len();
	let value = match prefix.parse::<i64>() {
		Ok(n) => n,
		Err(_) => prefix.parse::<f64>().map_or(0, |f| f as i64),
	};
	(value, fully_numeric)
}

/// Best-effort float cast of a string, see [`int_from_str`].
pub(crate) fn float_from_str(s: &str) -> (f64, bool) {
	let trimmed = s.trim_start();
	let prefix = numeric_prefix(trimmed, true);
	let fully_numeric = !prefix.is_empty() && prefix.len() == trimmed.trim_end().len();
	(prefix.parse::<f64>().unwrap_or(0.0), fully_numeric)
}

const NAIVE_LAYOUTS: &[&str] = &[
	"%Y-%m-%d %H:%M:%S%.f",
	"%Y-%m-%dT%H:%M:%S%.f",
	"%Y-%m-%d %H:%M",
	"%Y-%m-%dT%H:%M",
	"%Y/%m/%d %H:%M:%S",
	"%d/%m/%Y %H:%M:%S",
	"%d-%m-%Y %H:%M:%S",
];

const DATE_LAYOUTS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%d/%m/%Y", "%d-%m-%Y", "%Y%m%d"];

const OFFSET_LAYOUTS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%d %H:%M:%S%.f %z"];

/// General-purpose date parser used when no explicit format is declared.
///
/// # Examples
///
/// ```ignore
/// let parsed = parse_date("2021-01-01 00:00:00").unwrap();
/// assert_eq!(parsed.naive.to_string(), "2021-01-01 00:00:00");
/// ```
pub(crate) fn parse_date(input: &str) -> Option<ParsedDate> {
	let input = input.trim();
	if input.is_empty() {
		return None;
	}
	if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
		return Some(ParsedDate::from_offset(dt));
	}
	if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
		return Some(ParsedDate::from_offset(dt));
	}
	if let Some(dt) = OFFSET_LAYOUTS
		.iter()
		.find_map(|layout| DateTime::parse_from_str(input, layout).ok())
	{
		return Some(ParsedDate::from_offset(dt));
	}
	if let Some(naive) = NAIVE_LAYOUTS
		.iter()
		.find_map(|layout| NaiveDateTime::parse_from_str(input, layout).ok())
	{
		return Some(ParsedDate::from_naive(naive));
	}
	if let Some(date) = DATE_LAYOUTS
		.iter()
		.find_map(|layout| NaiveDate::parse_from_str(input, layout).ok())
	{
		return Some(ParsedDate::from_naive(date.and_time(NaiveTime::MIN)));
	}
	// "@1609459200" or a bare run of digits is a unix timestamp.
	let digits = input.strip_prefix('@').unwrap_or(input);
	if digits.len() >= 9 && digits.bytes().all(|b| b.is_ascii_digit()) {
		let secs = digits.parse::<i64>().ok()?;
		let utc = Utc.timestamp_opt(secs, 0).single()?;
		return Some(ParsedDate {
			naive: utc.naive_utc(),
			utc,
		});
	}
	None
}

/// Parses `input` with a PHP-style format such as `Y-m-d H:i:s`.
///
/// Formats without a time component produce midnight.
pub(crate) fn parse_date_with_format(input: &str, format: &str) -> Option<ParsedDate> {
	let pattern = translate_format(format);
	let input = input.trim();
	if pattern.has_offset {
		return DateTime::parse_from_str(input, &pattern.chrono)
			.ok()
			.map(ParsedDate::from_offset);
	}
	if pattern.has_time || pattern.has_timestamp {
		return NaiveDateTime::parse_from_str(input, &pattern.chrono)
			.ok()
			.map(ParsedDate::from_naive);
	}
	NaiveDate::parse_from_str(input, &pattern.chrono)
		.ok()
		.map(|date| ParsedDate::from_naive(date.and_time(NaiveTime::MIN)))
}

struct ChronoPattern {
	chrono: String,
	has_time: bool,
	has_offset: bool,
	has_timestamp: bool,
}

/// Translates PHP date format codes into a chrono pattern.
///
/// Format codes:
/// - Y, y: 4-digit and 2-digit year
/// - m, n: month; M, F: short and full month name
/// - d, j: day of month; D, l: short and full weekday name
/// - H, G: 24-hour; h, g: 12-hour; A, a: AM/PM
/// - i, s: minutes and seconds; u, v: micro- and milliseconds
/// - O, P: UTC offset; U: unix timestamp
/// - `\` escapes the next character; `!` and `|` are ignored
fn translate_format(format: &str) -> ChronoPattern {
	let mut pattern = ChronoPattern {
		chrono: String::with_capacity(format.len() * 2),
		has_time: false,
		has_offset: false,
		has_timestamp: false,
	};
	let mut chars = format.chars();
	while let Some(c) = chars.next() {
		let replacement = match c {
			'\\' => {
				if let Some(next) = chars.next() {
					push_literal(&mut pattern.chrono, next);
				}
				continue;
			}
			'!' | '|' => continue,
			'Y' => "%Y",
			'y' => "%y",
			'm' | 'n' => "%m",
			'M' => "%b",
			'F' => "%B",
			'd' | 'j' => "%d",
			'D' => "%a",
			'l' => "%A",
			'H' | 'G' => {
				pattern.has_time = true;
				"%H"
			}
			'h' | 'g' => {
				pattern.has_time = true;
				"%I"
			}
			'A' | 'a' => "%p",
			'i' => {
				pattern.has_time = true;
				"%M"
			}
			's' => {
				pattern.has_time = true;
				"%S"
			}
			'u' => "%6f",
			'v' => "%3f",
			'O' => {
				pattern.has_offset = true;
				"%z"
			}
			'P' => {
				pattern.has_offset = true;
				"%:z"
			}
			'U' => {
				pattern.has_timestamp = true;
				"%s"
			}
			other => {
				push_literal(&mut pattern.chrono, other);
				continue;
			}
		};
		pattern.chrono.push_str(replacement);
	}
	pattern
}

fn push_literal(out: &mut String, c: char) {
	if c == '%' {
		out.push_str("%%");
	} else {
		out.push(c);
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use rstest::rstest;
	use serde_json::json;

	fn midnight(y: i32, m: u32, d: u32) -> NaiveDateTime {
		NaiveDate::from_ymd_opt(y, m, d)
			.unwrap()
			.and_time(NaiveTime::MIN)
	}

	#[rstest]
	#[case("1", 1, true)]
	#[case("  42", 42, true)]
	#[case("-7", -7, true)]
	#[case("12abc", 12, false)]
	#[case("abc", 0, false)]
	#[case("", 0, false)]
	#[case("3.9", 3, true)]
	#[case("1e3", 1000, true)]
	#[case(".5", 0, true)]
	fn integer_casts_follow_numeric_prefix(#[case] input: &str, #[case] expected: i64, #[case] numeric: bool) {
		assert_eq!(int_from_str(input), (expected, numeric));
	}

	#[rstest]
	#[case("0.05", 0.05)]
	#[case("1.5kg", 1.5)]
	#[case("-2", -2.0)]
	#[case("nope", 0.0)]
	fn float_casts_follow_numeric_prefix(#[case] input: &str, #[case] expected: f64) {
		assert_eq!(float_from_str(input).0, expected);
	}

	#[rstest]
	#[case(json!("1"), true)]
	#[case(json!("yes"), true)]
	#[case(json!("0"), false)]
	#[case(json!("no"), false)]
	#[case(json!(""), false)]
	#[case(json!("false"), true)]
	#[case(json!(0), false)]
	#[case(json!(true), true)]
	fn booleans(#[case] raw: Value, #[case] expected: bool) {
		// Act
		let value = coerce("flag", &raw, &ValueType::Bool, None, CoercionMode::Lenient).unwrap();

		// Assert
		assert_eq!(value, FieldValue::Bool(expected));
	}

	#[rstest]
	fn lenient_int_degrades_to_zero() {
		// Act
		let value = coerce("id", &json!("abc"), &ValueType::Int, None, CoercionMode::Lenient).unwrap();

		// Assert
		assert_eq!(value, FieldValue::Int(0));
	}

	#[rstest]
	fn strict_int_rejects_garbage() {
		// Act
		let result = coerce("id", &json!("abc"), &ValueType::Int, None, CoercionMode::Strict);

		// Assert
		match result {
			Err(HydrationError::Coercion { field, value_type, .. }) => {
				assert_eq!(field, "id");
				assert_eq!(value_type, "int");
			}
			other => panic!("expected coercion error, got {other:?}"),
		}
	}

	#[rstest]
	fn strings_render_scalars() {
		assert_eq!(
			coerce("name", &json!(12), &ValueType::String, None, CoercionMode::Lenient).unwrap(),
			FieldValue::from("12")
		);
		assert_eq!(
			coerce("name", &json!(["a"]), &ValueType::String, None, CoercionMode::Lenient).unwrap(),
			FieldValue::List(vec![FieldValue::from("a")])
		);
	}

	#[rstest]
	#[case("2021-01-01 00:00:00", midnight(2021, 1, 1))]
	#[case("2021-01-01", midnight(2021, 1, 1))]
	#[case("2021-01-01T00:00:00", midnight(2021, 1, 1))]
	#[case("01/02/2021", midnight(2021, 2, 1))]
	#[case("1609459200", midnight(2021, 1, 1))]
	fn general_date_parser(#[case] input: &str, #[case] expected: NaiveDateTime) {
		assert_eq!(parse_date(input).map(|p| p.naive), Some(expected));
	}

	#[rstest]
	fn offsets_keep_wall_clock_and_normalise_utc() {
		// Act
		let parsed = parse_date("2021-01-01T02:00:00+02:00").unwrap();

		// Assert
		assert_eq!(parsed.naive, midnight(2021, 1, 1) + chrono::Duration::hours(2));
		assert_eq!(parsed.utc, midnight(2021, 1, 1).and_utc());
	}

	#[rstest]
	#[case("d/m/Y H:i:s", "31/12/2020 23:59:58", NaiveDate::from_ymd_opt(2020, 12, 31).unwrap().and_hms_opt(23, 59, 58).unwrap())]
	#[case("Y-m-d", "2021-03-04", midnight(2021, 3, 4))]
	#[case("!d.m.Y", "04.03.2021", midnight(2021, 3, 4))]
	#[case("Y-m-d\\TH:i", "2021-03-04T05:06", NaiveDate::from_ymd_opt(2021, 3, 4).unwrap().and_hms_opt(5, 6, 0).unwrap())]
	fn explicit_formats(#[case] format: &str, #[case] input: &str, #[case] expected: NaiveDateTime) {
		// Act
		let parsed = parse_date_with_format(input, format).map(|p| p.naive);

		// Assert
		assert_eq!(parsed, Some(expected));
	}

	#[rstest]
	fn date_types_pick_their_representation() {
		// Arrange
		let raw = json!("2021-01-01 00:00:00");

		// Act
		let mutable = coerce("d", &raw, &ValueType::DateTime, None, CoercionMode::Lenient).unwrap();
		let immutable = coerce("d", &raw, &ValueType::DateTimeImmutable, None, CoercionMode::Lenient).unwrap();

		// Assert
		assert_eq!(mutable, FieldValue::DateTime(midnight(2021, 1, 1)));
		assert_eq!(immutable, FieldValue::Timestamp(midnight(2021, 1, 1).and_utc()));
	}

	#[rstest]
	fn unparseable_dates_are_null_when_lenient_and_errors_when_strict() {
		// Arrange
		let raw = json!("not a date");

		// Act
		let lenient = coerce("d", &raw, &ValueType::DateTime, None, CoercionMode::Lenient).unwrap();
		let strict = coerce("d", &raw, &ValueType::DateTime, Some("Y-m-d"), CoercionMode::Strict);

		// Assert
		assert!(lenient.is_null());
		assert!(strict.is_err());
	}

	#[rstest]
	fn classes_and_unspecified_types_pass_through() {
		// Arrange
		let raw = json!({ "a": 1 });

		// Act
		let value = coerce("x", &raw, &ValueType::Class("Payload".into()), None, CoercionMode::Strict).unwrap();

		// Assert
		assert_eq!(value, FieldValue::Map(vec![("a".into(), FieldValue::Int(1))]));
	}
}
