//! Record value normalization service
//!
//! Converts loosely-typed stored values into canonical dates and numbers.
//! Records were written by several generations of the surrounding
//! application, so field names, date encodings and number formats vary.
//! Every assumption about record shape lives in this module; malformed
//! values normalize to `None` / `0.0` instead of failing.

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use regex::Regex;
use serde_json::Value;
use std::sync::LazyLock;

use crate::types::RawRecord;

/// Epoch numbers at or above this magnitude are milliseconds, below are seconds
const EPOCH_MILLIS_THRESHOLD: f64 = 1e11;

static THOUSANDS_COMMA: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d{1,3}(,\d{3})+$").expect("valid regex"));
static THOUSANDS_DOT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-+]?\d{1,3}(\.\d{3})+$").expect("valid regex"));

const NAIVE_DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const NAIVE_DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%d/%m/%Y"];

/// Anything that can be read as a point in time.
///
/// Covers store timestamp objects (via `serde_json::Value`), native chrono
/// values, date strings and epoch numbers. Absence is `None`, never an error.
pub trait DateLike {
    fn to_date(&self) -> Option<DateTime<Utc>>;
}

/// Normalize any date-like value to UTC.
///
/// # Examples
/// ```
/// use revtrack::services::normalizer::to_date;
///
/// assert!(to_date("2024-03-05").is_some());
/// assert!(to_date("not-a-date").is_none());
/// ```
pub fn to_date<T: DateLike + ?Sized>(value: &T) -> Option<DateTime<Utc>> {
    value.to_date()
}

impl DateLike for Value {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        match self {
            Value::Object(map) => timestamp_from_object(map),
            Value::String(s) => s.as_str().to_date(),
            Value::Number(n) => n.as_f64().and_then(from_epoch),
            Value::Null | Value::Bool(_) | Value::Array(_) => None,
        }
    }
}

impl DateLike for str {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        parse_date_str(self)
    }
}

impl DateLike for String {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        parse_date_str(self)
    }
}

impl<Tz: TimeZone> DateLike for DateTime<Tz> {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        Some(self.with_timezone(&Utc))
    }
}

impl DateLike for NaiveDateTime {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        Some(self.and_utc())
    }
}

impl DateLike for NaiveDate {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        self.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
    }
}

impl DateLike for i64 {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        from_epoch(*self as f64)
    }
}

impl DateLike for f64 {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        from_epoch(*self)
    }
}

impl<T: DateLike> DateLike for Option<T> {
    fn to_date(&self) -> Option<DateTime<Utc>> {
        self.as_ref().and_then(DateLike::to_date)
    }
}

/// Store timestamps arrive as `{seconds, nanoseconds}` (or the underscored
/// export form), sometimes wrapped as `{"$date": ...}`.
fn timestamp_from_object(map: &serde_json::Map<String, Value>) -> Option<DateTime<Utc>> {
    if let Some(inner) = map.get("$date") {
        return inner.to_date();
    }

    let seconds = map.get("seconds").or_else(|| map.get("_seconds"))?;
    let seconds = match seconds {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f as i64))?,
        Value::String(s) => s.trim().parse::<i64>().ok()?,
        _ => return None,
    };
    let nanos = map
        .get("nanoseconds")
        .or_else(|| map.get("_nanoseconds"))
        .and_then(Value::as_u64)
        .filter(|n| *n < 1_000_000_000)
        .unwrap_or(0);

    DateTime::from_timestamp(seconds, nanos as u32)
}

fn from_epoch(n: f64) -> Option<DateTime<Utc>> {
    if !n.is_finite() {
        return None;
    }
    let millis = if n.abs() >= EPOCH_MILLIS_THRESHOLD {
        n
    } else {
        n * 1000.0
    };
    DateTime::from_timestamp_millis(millis as i64)
}

fn parse_date_str(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim().trim_matches('"');
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in NAIVE_DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt.and_utc());
        }
    }

    NAIVE_DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
        .and_then(|d| d.to_date())
}

/// Normalize a number-like value. Never fails: anything unparseable is `0.0`.
pub fn to_number(value: &Value) -> f64 {
    match value {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => parse_number(s),
        _ => 0.0,
    }
}

/// Like [`to_number`], but distinguishes "no value" (absent, null, blank)
/// from a value that happens to be zero.
pub fn opt_number(value: Option<&Value>) -> Option<f64> {
    match value? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        other => Some(to_number(other)),
    }
}

/// Parse a currency/locale decorated number string.
///
/// Transformations:
/// - Strip currency symbols, quotes and whitespace: "R$ 1.234,50" → "1.234,50"
/// - Both separators present: the right-most one is the decimal point
/// - Lone comma: thousands when it forms exact 3-digit groups ("1,234"),
///   decimal otherwise ("12,50")
/// - Repeated dots in 3-digit groups are thousands ("1.234.567")
/// - A sign is kept only in leading position or after an exponent marker;
///   a sign after the digits ends the number ("50,00 - 10" → 50)
///
/// # Examples
/// ```
/// use revtrack::services::normalizer::parse_number;
///
/// assert_eq!(parse_number("R$ 1.234,50"), 1234.5);
/// assert_eq!(parse_number("$1,234.50"), 1234.5);
/// assert_eq!(parse_number("abc"), 0.0);
/// ```
pub fn parse_number(raw: &str) -> f64 {
    let mut cleaned = numeric_chars(raw);

    if !cleaned.chars().any(|c| c.is_ascii_digit()) {
        return 0.0;
    }

    match (cleaned.rfind('.'), cleaned.rfind(',')) {
        (Some(dot), Some(comma)) => {
            if comma > dot {
                cleaned = cleaned.replace('.', "").replace(',', ".");
            } else {
                cleaned = cleaned.replace(',', "");
            }
        }
        (None, Some(_)) => {
            if THOUSANDS_COMMA.is_match(&cleaned) {
                cleaned = cleaned.replace(',', "");
            } else {
                cleaned = cleaned.replace(',', ".");
            }
        }
        (Some(_), None) => {
            if THOUSANDS_DOT.is_match(&cleaned) && cleaned.matches('.').count() > 1 {
                cleaned = cleaned.replace('.', "");
            }
        }
        (None, None) => {}
    }

    cleaned
        .parse::<f64>()
        .ok()
        .filter(|f| f.is_finite())
        .unwrap_or(0.0)
}

/// Keep digits, separators, one leading sign and an exponent between digits
fn numeric_chars(raw: &str) -> String {
    let chars: Vec<char> = raw.chars().collect();
    let mut cleaned = String::with_capacity(raw.len());

    for (i, &c) in chars.iter().enumerate() {
        match c {
            '0'..='9' | '.' | ',' => cleaned.push(c),
            '-' | '+' => {
                let after_exponent = cleaned.ends_with(|p: char| p == 'e' || p == 'E');
                if cleaned.is_empty() || after_exponent {
                    cleaned.push(c);
                } else if cleaned.chars().any(|p| p.is_ascii_digit()) {
                    break;
                }
            }
            'e' | 'E' => {
                let after_digit = i > 0 && chars[i - 1].is_ascii_digit();
                let exponent_follows = match chars.get(i + 1) {
                    Some(n) if n.is_ascii_digit() => true,
                    Some('-' | '+') => chars.get(i + 2).is_some_and(|n| n.is_ascii_digit()),
                    _ => false,
                };
                if after_digit && exponent_follows {
                    cleaned.push(c);
                }
            }
            _ => {}
        }
    }

    cleaned
}

/// First alias present with a non-null value
pub fn field<'a>(record: &'a RawRecord, aliases: &[&str]) -> Option<&'a Value> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find(|v| !v.is_null())
}

/// Render a scalar as trimmed text; non-scalars become empty
pub fn text(value: Option<&Value>) -> String {
    match value {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        Some(Value::Bool(b)) => b.to_string(),
        _ => String::new(),
    }
}

pub fn text_field(record: &RawRecord, aliases: &[&str]) -> String {
    text(field(record, aliases))
}

pub fn number_field(record: &RawRecord, aliases: &[&str]) -> f64 {
    field(record, aliases).map(to_number).unwrap_or(0.0)
}

pub fn opt_number_field(record: &RawRecord, aliases: &[&str]) -> Option<f64> {
    aliases
        .iter()
        .find_map(|key| opt_number(record.get(*key)))
}

/// First alias that normalizes to a valid date.
///
/// A malformed value under one alias does not hide a valid one under another.
pub fn date_field(record: &RawRecord, aliases: &[&str]) -> Option<DateTime<Utc>> {
    aliases
        .iter()
        .filter_map(|key| record.get(*key))
        .find_map(DateLike::to_date)
}

/// Stable record identifier, whichever key the export used
pub fn record_id(record: &RawRecord) -> String {
    text_field(record, &["id", "_id", "docId", "uid"])
}
