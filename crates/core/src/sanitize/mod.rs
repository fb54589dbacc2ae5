//! Input sanitization.
//!
//! Sanitizers transform untrusted input into a safe form and never fail.
//! [`primitives`] holds the per-kind functions, [`structured`] walks nested
//! payloads (including ones with shared or cyclic references).

pub mod primitives;
pub mod structured;

use serde::{Deserialize, Serialize};
use serde_json::Value;

pub use primitives::{email, html, json, number, sql, text};
pub use structured::{sanitize_api_data, sanitize_json_value, ApiData};

/// Keys that are never copied into sanitized objects.
///
/// A JavaScript consumer that assigns through these names can pollute shared
/// prototypes, so they are dropped at every depth.
pub const FORBIDDEN_KEYS: &[&str] = &["__proto__", "constructor", "prototype"];

/// Which primitive to apply to a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SanitizerKind {
    Html,
    Sql,
    Json,
    Text,
    Number,
    Email,
}

impl SanitizerKind {
    /// All sanitizer kinds.
    pub const ALL: &'static [SanitizerKind] = &[
        SanitizerKind::Html,
        SanitizerKind::Sql,
        SanitizerKind::Json,
        SanitizerKind::Text,
        SanitizerKind::Number,
        SanitizerKind::Email,
    ];

    /// Apply this sanitizer. String kinds produce a JSON string, `Number`
    /// produces a JSON number.
    pub fn apply(self, input: &Value) -> Value {
        match self {
            SanitizerKind::Html => Value::String(html(input)),
            SanitizerKind::Sql => Value::String(sql(input)),
            SanitizerKind::Json => Value::String(json(input)),
            SanitizerKind::Text => Value::String(text(input)),
            SanitizerKind::Number => primitives::number_value(number(input)),
            SanitizerKind::Email => Value::String(email(input)),
        }
    }
}

/// A sanitized value together with whether sanitization changed it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sanitized<T> {
    pub value: T,
    pub was_modified: bool,
}

/// Sanitize `input` and report whether the output differs from the input.
///
/// A `null` fed to a string sanitizer comes back as `""` and therefore counts
/// as modified.
pub fn sanitize_tracked(kind: SanitizerKind, input: &Value) -> Sanitized<Value> {
    let value = kind.apply(input);
    let was_modified = &value != input;
    Sanitized {
        value,
        was_modified,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    // -- dispatch --------------------------------------------------------------

    #[test]
    fn apply_returns_documented_types() {
        for kind in SanitizerKind::ALL {
            for input in [Value::Null, json!(1), json!("x"), json!([1]), json!({"a": 1})] {
                let out = kind.apply(&input);
                match kind {
                    SanitizerKind::Number => assert!(out.is_number(), "{kind:?} on {input}"),
                    _ => assert!(out.is_string(), "{kind:?} on {input}"),
                }
            }
        }
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_value(SanitizerKind::Email).unwrap(), json!("email"));
    }

    // -- tracking ------------------------------------------------------------

    #[test]
    fn tracked_reports_unchanged_input() {
        let result = sanitize_tracked(SanitizerKind::Email, &json!("a@b.com"));
        assert_eq!(result.value, json!("a@b.com"));
        assert!(!result.was_modified);
    }

    #[test]
    fn tracked_reports_modified_input() {
        let result = sanitize_tracked(SanitizerKind::Email, &json!(" A@B.COM "));
        assert_eq!(result.value, json!("a@b.com"));
        assert!(result.was_modified);
    }

    #[test]
    fn tracked_number_keeps_integer_identity() {
        let result = sanitize_tracked(SanitizerKind::Number, &json!(5));
        assert!(!result.was_modified);
    }

    // -- properties ------------------------------------------------------------

    proptest! {
        #[test]
        fn html_output_never_contains_script_or_handlers(s in ".*") {
            let out = primitives::html_str(&s);
            prop_assert!(!out.to_lowercase().contains("<script"));
            let handler = regex::Regex::new(r"(?i)on\w+=").unwrap();
            prop_assert!(!handler.is_match(&out));
        }

        #[test]
        fn html_output_for_markup_heavy_input(s in "[<>a-z /=\"'()]{0,64}") {
            let out = primitives::html_str(&s).to_lowercase();
            prop_assert!(!out.contains("<script"));
        }

        #[test]
        fn text_is_idempotent(s in ".*") {
            let once = primitives::text_str(&s);
            prop_assert_eq!(primitives::text_str(&once), once);
        }

        #[test]
        fn text_is_idempotent_for_script_like_input(s in "[<>/a-z() \t\n\u{1}]{0,64}") {
            let once = primitives::text_str(&s);
            prop_assert_eq!(primitives::text_str(&once), once);
        }

        #[test]
        fn number_is_always_finite(s in ".*") {
            prop_assert!(primitives::number_str(&s).is_finite());
        }

        #[test]
        fn email_output_uses_allowed_alphabet(s in ".*") {
            let out = primitives::email_str(&s);
            prop_assert!(out.chars().all(|c| c.is_ascii_lowercase()
                || c.is_ascii_digit()
                || matches!(c, '@' | '.' | '_' | '-')));
        }
    }
}
