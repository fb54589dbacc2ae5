//! Field-level validators.
//!
//! Each validator is a pure predicate over a JSON value. Missing fields are
//! represented as `Value::Null`; every predicate returns `false` (never
//! panics) for input of the wrong type.

use std::sync::LazyLock;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use regex::Regex;
use serde_json::Value;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static EMAIL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("valid regex"));

static PHONE_SEPARATORS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\s\-()]").expect("valid regex"));

static PHONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\+?[1-9][0-9]{0,15}$").expect("valid regex"));

static CURRENCY_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[$€£¥₹]?\s?([0-9]{1,3}(,[0-9]{3})+|[0-9]+)(\.[0-9]{2})?$").expect("valid regex")
});

/// Leading float prefix, the way a lenient numeric parse reads `"12.5kg"`.
static FLOAT_PREFIX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[-+]?([0-9]+\.?[0-9]*|\.[0-9]+)([eE][-+]?[0-9]+)?").expect("valid regex")
});

/// Accepted naive date/time layouts, tried in order after RFC 3339.
const DATE_TIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d"];

// ---------------------------------------------------------------------------
// Options
// ---------------------------------------------------------------------------

/// Inclusive numeric bounds. A missing bound is unbounded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min: Option<f64>,
    pub max: Option<f64>,
}

impl Bounds {
    pub fn new(min: Option<f64>, max: Option<f64>) -> Self {
        Self { min, max }
    }

    pub fn between(min: f64, max: f64) -> Self {
        Self::new(Some(min), Some(max))
    }

    pub fn at_least(min: f64) -> Self {
        Self::new(Some(min), None)
    }

    pub fn at_most(max: f64) -> Self {
        Self::new(None, Some(max))
    }

    /// Whether `value` lies within the bounds (both ends inclusive).
    pub fn contains(&self, value: f64) -> bool {
        value >= self.min.unwrap_or(f64::NEG_INFINITY) && value <= self.max.unwrap_or(f64::INFINITY)
    }
}

/// Inclusive date bounds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DateBounds {
    pub min: Option<NaiveDateTime>,
    pub max: Option<NaiveDateTime>,
}

impl DateBounds {
    pub fn new(min: Option<NaiveDateTime>, max: Option<NaiveDateTime>) -> Self {
        Self { min, max }
    }

    fn contains(&self, value: NaiveDateTime) -> bool {
        self.min.is_none_or(|min| value >= min) && self.max.is_none_or(|max| value <= max)
    }
}

// ---------------------------------------------------------------------------
// Validators
// ---------------------------------------------------------------------------

/// `local@domain.tld` with no whitespace, and no empty dot-separated label in
/// the local part (`a..b@x.com` and `.a@x.com` fail).
pub fn email(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    if !EMAIL_RE.is_match(s) || s.contains("..") {
        return false;
    }
    let local = s.split('@').next().unwrap_or_default();
    !local.starts_with('.') && !local.ends_with('.')
}

/// E.164-ish phone number after removing spaces, hyphens and parentheses.
///
/// This is not full ITU validation: it only checks for an optional `+`
/// followed by up to 16 digits without a leading zero.
pub fn phone(value: &Value) -> bool {
    let raw = match value {
        Value::String(s) => s.clone(),
        Value::Number(n) if n.is_u64() => n.to_string(),
        _ => return false,
    };
    let compact = PHONE_SEPARATORS_RE.replace_all(&raw, "");
    PHONE_RE.is_match(&compact)
}

/// Absolute `http` or `https` URL with a host.
pub fn url(value: &Value) -> bool {
    let Some(s) = value.as_str() else {
        return false;
    };
    match url::Url::parse(s.trim()) {
        Ok(parsed) => matches!(parsed.scheme(), "http" | "https") && parsed.has_host(),
        Err(_) => false,
    }
}

/// Parseable date, optionally within inclusive bounds.
pub fn date(value: &Value, bounds: Option<&DateBounds>) -> bool {
    match parse_date(value) {
        Some(parsed) => bounds.is_none_or(|b| b.contains(parsed)),
        None => false,
    }
}

/// Numeric value (or numeric-prefixed string) within inclusive bounds.
pub fn number_range(value: &Value, bounds: &Bounds) -> bool {
    parse_float(value).is_some_and(|n| bounds.contains(n))
}

/// String whose character count lies within inclusive bounds.
pub fn string_length(value: &Value, bounds: &Bounds) -> bool {
    value
        .as_str()
        .is_some_and(|s| bounds.contains(s.chars().count() as f64))
}

/// Present and non-blank.
///
/// Fails for `null`, empty or whitespace-only strings and empty arrays. Every
/// other value passes, including `false`, `0` and arrays of blanks.
pub fn required(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

/// Monetary amount: optional currency symbol, optional thousands separators,
/// optional two-digit cents. Non-negative JSON numbers pass.
pub fn currency(value: &Value) -> bool {
    match value {
        Value::String(s) => CURRENCY_RE.is_match(s.trim()),
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_finite() && f >= 0.0),
        _ => false,
    }
}

/// Number in `[0, 100]`; a trailing `%` on strings is tolerated.
pub fn percentage(value: &Value) -> bool {
    let parsed = match value {
        Value::String(s) => {
            let trimmed = s.trim();
            let digits = trimmed.strip_suffix('%').unwrap_or(trimmed).trim();
            digits.parse::<f64>().ok()
        }
        Value::Number(n) => n.as_f64(),
        _ => None,
    };
    parsed.is_some_and(|p| p.is_finite() && (0.0..=100.0).contains(&p))
}

/// String matching `pattern`.
pub fn pattern(value: &Value, pattern: &Regex) -> bool {
    value.as_str().is_some_and(|s| pattern.is_match(s))
}

/// Value equal to one of `allowed`.
pub fn one_of(value: &Value, allowed: &[Value]) -> bool {
    allowed.contains(value)
}

/// Whole number, either as a JSON integer or a string of digits.
pub fn integer(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_i64() || n.is_u64(),
        Value::String(s) => s.trim().parse::<i64>().is_ok(),
        _ => false,
    }
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

/// Parse a date from a string (RFC 3339, ISO date/time, `YYYY/MM/DD`) or an
/// integer epoch-millisecond timestamp.
pub fn parse_date(value: &Value) -> Option<NaiveDateTime> {
    match value {
        Value::String(s) => parse_date_str(s.trim()),
        Value::Number(n) => n
            .as_i64()
            .and_then(DateTime::from_timestamp_millis)
            .map(|dt| dt.naive_utc()),
        _ => None,
    }
}

/// Parse a date string; see [`parse_date`].
pub fn parse_date_str(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in DATE_TIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(s, format).ok())
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

/// Lenient float parse: JSON numbers, or the leading numeric prefix of a
/// string.
pub fn parse_float(value: &Value) -> Option<f64> {
    let parsed = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => FLOAT_PREFIX_RE
            .find(s.trim())
            .and_then(|m| m.as_str().parse::<f64>().ok()),
        _ => None,
    };
    parsed.filter(|f| f.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    // -- email ---------------------------------------------------------------

    #[test]
    fn email_accepts_plain_address() {
        assert!(email(&json!("test@example.com")));
        assert!(email(&json!("first.last+tag@sub.example.co")));
    }

    #[test]
    fn email_rejects_malformed() {
        assert!(!email(&json!("test..test@example.com")));
        assert!(!email(&json!(".test@example.com")));
        assert!(!email(&json!("no-at-sign.com")));
        assert!(!email(&json!("a b@example.com")));
        assert!(!email(&json!("a@example")));
    }

    #[test]
    fn email_rejects_non_strings() {
        assert!(!email(&Value::Null));
        assert!(!email(&json!(42)));
    }

    // -- phone ---------------------------------------------------------------

    #[test]
    fn phone_accepts_formatted_numbers() {
        assert!(phone(&json!("+1 (555) 123-4567")));
        assert!(phone(&json!("4915112345678")));
        assert!(phone(&json!(5551234)));
    }

    #[test]
    fn phone_rejects_leading_zero_and_letters() {
        assert!(!phone(&json!("0123456")));
        assert!(!phone(&json!("555-CALL-NOW")));
        assert!(!phone(&json!("+12345678901234567")));
        assert!(!phone(&Value::Null));
    }

    // -- url -----------------------------------------------------------------

    #[test]
    fn url_accepts_http_and_https() {
        assert!(url(&json!("https://example.com/path?q=1")));
        assert!(url(&json!("http://localhost:3000")));
    }

    #[test]
    fn url_rejects_other_schemes() {
        assert!(!url(&json!("ftp://example.com")));
        assert!(!url(&json!("javascript:alert(1)")));
        assert!(!url(&json!("not a url")));
        assert!(!url(&json!(1)));
    }

    // -- date ----------------------------------------------------------------

    #[test]
    fn date_accepts_common_layouts() {
        assert!(date(&json!("2024-03-01"), None));
        assert!(date(&json!("2024-03-01T10:30:00Z"), None));
        assert!(date(&json!("2024/03/01"), None));
        assert!(date(&json!(1_700_000_000_000_i64), None));
    }

    #[test]
    fn date_rejects_garbage() {
        assert!(!date(&json!("yesterday"), None));
        assert!(!date(&json!("2024-13-45"), None));
        assert!(!date(&Value::Null, None));
    }

    #[test]
    fn date_bounds_are_inclusive() {
        let bounds = DateBounds::new(
            parse_date_str("2024-01-01"),
            parse_date_str("2024-12-31"),
        );
        assert!(date(&json!("2024-01-01"), Some(&bounds)));
        assert!(date(&json!("2024-12-31"), Some(&bounds)));
        assert!(!date(&json!("2025-01-01"), Some(&bounds)));
        assert!(!date(&json!("2023-12-31"), Some(&bounds)));
    }

    // -- numeric -------------------------------------------------------------

    #[test]
    fn number_range_is_inclusive() {
        let bounds = Bounds::between(0.0, 10.0);
        assert!(number_range(&json!(0), &bounds));
        assert!(number_range(&json!("10"), &bounds));
        assert!(!number_range(&json!(10.01), &bounds));
        assert!(!number_range(&json!("abc"), &bounds));
    }

    #[test]
    fn number_range_defaults_to_unbounded() {
        assert!(number_range(&json!(-1e12), &Bounds::default()));
        assert!(number_range(&json!("12.5kg"), &Bounds::at_least(12.0)));
    }

    #[test]
    fn string_length_counts_characters() {
        let bounds = Bounds::between(2.0, 3.0);
        assert!(string_length(&json!("äöü"), &bounds));
        assert!(!string_length(&json!("a"), &bounds));
        assert!(!string_length(&json!(12), &bounds));
    }

    // -- required ------------------------------------------------------------

    #[test]
    fn required_rejects_blank_values() {
        assert!(!required(&Value::Null));
        assert!(!required(&json!("")));
        assert!(!required(&json!("   ")));
        assert!(!required(&json!([])));
    }

    #[test]
    fn required_accepts_falsy_but_present_values() {
        assert!(required(&json!(false)));
        assert!(required(&json!(0)));
        assert!(required(&json!([""])));
        assert!(required(&json!({})));
    }

    // -- currency / percentage ----------------------------------------------

    #[test]
    fn currency_formats() {
        assert!(currency(&json!("$1,234.56")));
        assert!(currency(&json!("1234")));
        assert!(currency(&json!("€ 99.00")));
        assert!(!currency(&json!("1,23.4")));
        assert!(!currency(&json!("12.345")));
        assert!(!currency(&json!("abc")));
    }

    #[test]
    fn non_ascii_digits_are_not_numbers() {
        assert!(!currency(&json!("\u{0661}\u{0662}\u{0663}")));
        assert!(!phone(&json!("+1\u{0662}\u{0663}\u{0664}")));
        assert!(!number_range(&json!("\u{0665}"), &Bounds::default()));
    }

    #[test]
    fn percentage_bounds_and_suffix() {
        assert!(percentage(&json!(0)));
        assert!(percentage(&json!("100%")));
        assert!(percentage(&json!("42.5 %")));
        assert!(!percentage(&json!(100.1)));
        assert!(!percentage(&json!("-1%")));
        assert!(!percentage(&json!("abc%")));
    }

    // -- misc ----------------------------------------------------------------

    #[test]
    fn pattern_and_one_of() {
        let re = Regex::new(r"^[A-Z]{3}$").unwrap();
        assert!(pattern(&json!("USD"), &re));
        assert!(!pattern(&json!("usd"), &re));
        assert!(one_of(&json!("b"), &[json!("a"), json!("b")]));
        assert!(!one_of(&json!("c"), &[json!("a"), json!("b")]));
    }

    #[test]
    fn integer_accepts_whole_numbers() {
        assert!(integer(&json!(7)));
        assert!(integer(&json!(" -12 ")));
        assert!(!integer(&json!(7.5)));
        assert!(!integer(&json!("7.5")));
    }
}
