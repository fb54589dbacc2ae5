//! Sanitization primitives.
//!
//! Every function here is total: any input, including `null`, numbers,
//! arrays and objects, yields a value of the documented type. Untrusted input
//! is transformed, never rejected.

use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use super::FORBIDDEN_KEYS;

// ---------------------------------------------------------------------------
// Patterns
// ---------------------------------------------------------------------------

static SCRIPT_BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<script\b[^>]*>(.*?)</script\s*>").expect("valid regex")
});

static TAG_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

/// A `<` that never closes swallows the rest of the input.
static UNTERMINATED_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"<[^>]*$").expect("valid regex"));

static JAVASCRIPT_URI_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)javascript\s*:").expect("valid regex"));

static EVENT_HANDLER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)on\w+\s*=").expect("valid regex"));

static SQL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"['";\\]"#).expect("valid regex"));

static SQL_KEYWORDS_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(SELECT|INSERT|UPDATE|DELETE|DROP|CREATE|ALTER|EXEC|UNION|SCRIPT)\b")
        .expect("valid regex")
});

static WHITESPACE_RUN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("valid regex"));

static CONTROL_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[\x00-\x1F\x7F]").expect("valid regex"));

/// Script bodies that look like they call into the page are dropped outright.
static CALL_LIKE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(alert|eval|function)\s*\(|\b(document|window|location)\b")
        .expect("valid regex")
});

/// First signed decimal number, optionally behind a currency symbol and with
/// `,` thousands separators.
static NUMBER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"([-+])?[$€£¥₹]?\s*(-)?((?:[0-9]{1,3}(?:,[0-9]{3})+|[0-9]+)(?:\.[0-9]+)?|\.[0-9]+)")
        .expect("valid regex")
});

// ---------------------------------------------------------------------------
// HTML
// ---------------------------------------------------------------------------

/// Strip markup from `input`. Non-string input yields `""`.
pub fn html(input: &Value) -> String {
    input.as_str().map(html_str).unwrap_or_default()
}

/// Strip script blocks, all remaining tags, `javascript:` prefixes and
/// `on*=` handler attributes, then trim.
///
/// Removal repeats until the text stops changing, so fragments that only
/// form a tag once their surroundings are removed are caught as well.
pub fn html_str(input: &str) -> String {
    let mut current = input.to_string();
    loop {
        let next = strip_markup_once(&current);
        if next == current {
            break;
        }
        current = next;
    }
    current.trim().to_string()
}

fn strip_markup_once(input: &str) -> String {
    let without_scripts = SCRIPT_BLOCK_RE.replace_all(input, "");
    let without_tags = TAG_RE.replace_all(&without_scripts, "");
    let without_open = UNTERMINATED_TAG_RE.replace_all(&without_tags, "");
    let without_uris = JAVASCRIPT_URI_RE.replace_all(&without_open, "");
    EVENT_HANDLER_RE.replace_all(&without_uris, "").into_owned()
}

// ---------------------------------------------------------------------------
// SQL
// ---------------------------------------------------------------------------

/// Heuristic SQL scrubbing. Non-string input yields `""`.
///
/// This is defense in depth only. It is not an injection guarantee and never
/// replaces parameterized queries at the persistence boundary.
pub fn sql(input: &Value) -> String {
    input.as_str().map(sql_str).unwrap_or_default()
}

/// Remove quotes, semicolons, backslashes and common SQL keywords.
pub fn sql_str(input: &str) -> String {
    let stripped = SQL_CHARS_RE.replace_all(input, "");
    let cleaned = SQL_KEYWORDS_RE.replace_all(&stripped, "");
    cleaned.trim().to_string()
}

// ---------------------------------------------------------------------------
// JSON
// ---------------------------------------------------------------------------

/// Normalise JSON through a parse/serialize round trip.
///
/// A string is parsed as JSON text (`"{}"` on parse failure); any other value
/// is treated as already structured. Keys in [`FORBIDDEN_KEYS`] are removed
/// at every depth.
pub fn json(input: &Value) -> String {
    match input {
        Value::String(raw) => json_str(raw),
        other => serialize_compact(strip_forbidden_keys(other.clone())),
    }
}

/// Parse `input` as JSON text and return its compact form, or `"{}"`.
pub fn json_str(input: &str) -> String {
    match serde_json::from_str::<Value>(input) {
        Ok(parsed) => serialize_compact(strip_forbidden_keys(parsed)),
        Err(_) => "{}".to_string(),
    }
}

fn serialize_compact(value: Value) -> String {
    serde_json::to_string(&value).unwrap_or_else(|_| "{}".to_string())
}

fn strip_forbidden_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(key, _)| !FORBIDDEN_KEYS.contains(&key.as_str()))
                .map(|(key, v)| (key, strip_forbidden_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_forbidden_keys).collect()),
        scalar => scalar,
    }
}

// ---------------------------------------------------------------------------
// Text
// ---------------------------------------------------------------------------

/// Clean free text. Non-string input yields `""`.
pub fn text(input: &Value) -> String {
    input.as_str().map(text_str).unwrap_or_default()
}

/// Remove control characters (tabs and newlines included), then collapse
/// whitespace and trim.
///
/// Embedded `<script>` blocks whose body looks like code (`alert(`, `eval(`,
/// `function(`, `document`, `window`, `location`) are dropped whole; other
/// script blocks lose their tags but keep their inner text. Other markup is
/// left alone. Applying `text_str` twice gives the same result as once.
pub fn text_str(input: &str) -> String {
    let stripped = CONTROL_CHARS_RE.replace_all(input, "");
    let mut current = WHITESPACE_RUN_RE.replace_all(&stripped, " ").into_owned();

    loop {
        let next = SCRIPT_BLOCK_RE
            .replace_all(&current, |caps: &regex::Captures<'_>| {
                let body = caps.get(1).map_or("", |m| m.as_str());
                if CALL_LIKE_RE.is_match(body) {
                    String::new()
                } else {
                    body.to_string()
                }
            })
            .into_owned();
        if next == current {
            break;
        }
        current = next;
    }

    let normalized = WHITESPACE_RUN_RE.replace_all(&current, " ");
    normalized.trim().to_string()
}

// ---------------------------------------------------------------------------
// Number
// ---------------------------------------------------------------------------

/// Extract a number. JSON numbers pass through; strings yield their first
/// signed decimal number; everything else (and non-finite values) yields `0`.
pub fn number(input: &Value) -> f64 {
    match input {
        Value::Number(n) => n.as_f64().filter(|f| f.is_finite()).unwrap_or(0.0),
        Value::String(s) => number_str(s),
        _ => 0.0,
    }
}

/// Extract the first signed decimal number from `input`, or `0`.
///
/// Accepts one leading currency symbol (`$ € £ ¥ ₹`) and `,` thousands
/// separators: `"$1,234.56"` is `1234.56`, `"-$5"` is `-5`.
pub fn number_str(input: &str) -> f64 {
    let Some(caps) = NUMBER_RE.captures(input) else {
        return 0.0;
    };
    let negative = caps.get(1).is_some_and(|m| m.as_str() == "-") || caps.get(2).is_some();
    let digits: String = caps
        .get(3)
        .map_or("", |m| m.as_str())
        .chars()
        .filter(|c| *c != ',')
        .collect();
    match digits.parse::<f64>() {
        Ok(value) if value.is_finite() => {
            if negative {
                -value
            } else {
                value
            }
        }
        _ => 0.0,
    }
}

/// Render a sanitized number as JSON, preferring an integer representation
/// when the value has no fractional part.
pub fn number_value(value: f64) -> Value {
    if value.fract() == 0.0 && value.abs() < 9_007_199_254_740_992.0 {
        Value::from(value as i64)
    } else {
        serde_json::Number::from_f64(value)
            .map(Value::Number)
            .unwrap_or_else(|| Value::from(0))
    }
}

// ---------------------------------------------------------------------------
// Email
// ---------------------------------------------------------------------------

/// Normalise an email address. Non-string input yields `""`.
pub fn email(input: &Value) -> String {
    input.as_str().map(email_str).unwrap_or_default()
}

/// Lowercase, trim and drop everything outside `[a-z0-9@._-]`.
pub fn email_str(input: &str) -> String {
    input
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '@' | '.' | '_' | '-'))
        .collect()
}
