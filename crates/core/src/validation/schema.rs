//! Composable validation schemas.
//!
//! A [`ValidationSchema`] maps field names to ordered rule lists. Every rule
//! of every field is evaluated on each call to
//! [`validate`](ValidationSchema::validate), so all violated messages are
//! collected rather than just the first. Results are recomputed from scratch
//! per call; the schema itself holds no per-call state and can be shared
//! behind an `Arc`.
//!
//! # Sanitized output
//!
//! Alongside the error map, `validate` produces a sanitized copy of the
//! record. The sanitizer for each field is picked in this order:
//!
//! 1. an explicit [`sanitize_as`](ValidationSchema::sanitize_as) entry;
//! 2. the field naming convention, unless disabled with
//!    [`without_naming_convention`](ValidationSchema::without_naming_convention):
//!    names containing `email` use the email sanitizer, `phone`/`url`/`link`
//!    the text sanitizer, `amount`/`price`/`revenue` the number sanitizer
//!    (case-insensitive substring match, first match wins);
//! 3. the runtime type: strings get text sanitization, arrays and objects the
//!    structured sanitizer, other scalars pass through.
//!
//! Callers that rely on the convention must name their fields accordingly.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;

use super::check::Check;
use super::rules::Severity;
use crate::sanitize::{self, SanitizerKind, FORBIDDEN_KEYS};
use crate::types::Record;

/// Predicate over a field value and the whole record it belongs to.
pub type Predicate = Arc<dyn Fn(&Value, &Record) -> bool + Send + Sync>;

/// Field name fragments and the sanitizer they select.
const NAMING_CONVENTION: &[(&str, SanitizerKind)] = &[
    ("email", SanitizerKind::Email),
    ("phone", SanitizerKind::Text),
    ("url", SanitizerKind::Text),
    ("link", SanitizerKind::Text),
    ("amount", SanitizerKind::Number),
    ("price", SanitizerKind::Number),
    ("revenue", SanitizerKind::Number),
];

// ---------------------------------------------------------------------------
// Rule
// ---------------------------------------------------------------------------

/// One validation rule attached to a field.
#[derive(Clone)]
pub struct Rule {
    name: String,
    predicate: Predicate,
    message: String,
    severity: Severity,
}

impl Rule {
    /// Build a rule from an arbitrary predicate.
    pub fn new(
        name: impl Into<String>,
        predicate: impl Fn(&Value, &Record) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            predicate: Arc::new(predicate),
            message: message.into(),
            severity: Severity::Error,
        }
    }

    /// Build a rule from a built-in check.
    pub fn from_check(check: Check, message: impl Into<String>) -> Self {
        let name = check.name();
        Self::new(name, move |value, _| check.test(value), message)
    }

    /// Downgrade the rule to a warning: reported, but never invalidating.
    pub fn warning(mut self) -> Self {
        self.severity = Severity::Warning;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn severity(&self) -> Severity {
        self.severity
    }

    pub fn passes(&self, value: &Value, record: &Record) -> bool {
        (self.predicate)(value, record)
    }
}

impl fmt::Debug for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("name", &self.name)
            .field("message", &self.message)
            .field("severity", &self.severity)
            .finish_non_exhaustive()
    }
}

// ---------------------------------------------------------------------------
// Outcome
// ---------------------------------------------------------------------------

/// Result of validating one record.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidationOutcome {
    pub is_valid: bool,
    /// Field name to every violated error-severity message, in rule order.
    pub errors: BTreeMap<String, Vec<String>>,
    /// Field name to every violated warning-severity message.
    pub warnings: BTreeMap<String, Vec<String>>,
    /// Sanitized copy of the input record.
    pub sanitized_data: Record,
}

impl ValidationOutcome {
    /// Error messages for one field (empty when the field passed).
    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    /// First error message for one field, the one a form usually displays.
    pub fn first_error(&self, field: &str) -> Option<&str> {
        self.field_errors(field).first().map(String::as_str)
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Named collection of per-field validation rules.
#[derive(Debug, Clone)]
pub struct ValidationSchema {
    rules: BTreeMap<String, Vec<Rule>>,
    sanitizers: BTreeMap<String, SanitizerKind>,
    naming_convention: bool,
}

impl Default for ValidationSchema {
    fn default() -> Self {
        Self {
            rules: BTreeMap::new(),
            sanitizers: BTreeMap::new(),
            naming_convention: true,
        }
    }
}

impl ValidationSchema {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append checks to `name`'s rule list.
    ///
    /// `messages[i]` overrides the message of `checks[i]`; checks without a
    /// matching message use [`Check::default_message`].
    pub fn field(
        mut self,
        name: &str,
        checks: impl IntoIterator<Item = Check>,
        messages: &[&str],
    ) -> Self {
        for (i, check) in checks.into_iter().enumerate() {
            let message = messages
                .get(i)
                .map_or_else(|| check.default_message(name), |m| (*m).to_string());
            self.push_rule(name, Rule::from_check(check, message));
        }
        self
    }

    /// Append one rule to `name`'s rule list.
    pub fn add_rule(mut self, name: &str, rule: Rule) -> Self {
        self.push_rule(name, rule);
        self
    }

    /// Append one built-in check with an explicit message.
    pub fn add_check(self, name: &str, check: Check, message: impl Into<String>) -> Self {
        self.add_rule(name, Rule::from_check(check, message))
    }

    /// Append a custom rule. The predicate also receives the whole record, so
    /// cross-field constraints can be expressed.
    pub fn custom(
        self,
        name: &str,
        predicate: impl Fn(&Value, &Record) -> bool + Send + Sync + 'static,
        message: impl Into<String>,
    ) -> Self {
        self.add_rule(name, Rule::new("custom", predicate, message))
    }

    /// Pin the sanitizer used for `field` in the sanitized output.
    pub fn sanitize_as(mut self, field: &str, kind: SanitizerKind) -> Self {
        self.sanitizers.insert(field.to_string(), kind);
        self
    }

    /// Stop inferring sanitizers from field names; only explicit entries and
    /// runtime types are used.
    pub fn without_naming_convention(mut self) -> Self {
        self.naming_convention = false;
        self
    }

    pub(crate) fn push_rule(&mut self, name: &str, rule: Rule) {
        self.rules.entry(name.to_string()).or_default().push(rule);
    }

    /// Field names that carry at least one rule.
    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.rules.keys().map(String::as_str)
    }

    /// Rules attached to `field`, in evaluation order.
    pub fn rules_for(&self, field: &str) -> &[Rule] {
        self.rules.get(field).map_or(&[], Vec::as_slice)
    }

    /// Validate a whole record.
    pub fn validate(&self, data: &Record) -> ValidationOutcome {
        let mut errors: BTreeMap<String, Vec<String>> = BTreeMap::new();
        let mut warnings: BTreeMap<String, Vec<String>> = BTreeMap::new();

        for (field, rules) in &self.rules {
            let value = data.get(field).unwrap_or(&Value::Null);
            for rule in rules {
                if rule.passes(value, data) {
                    continue;
                }
                let bucket = match rule.severity {
                    Severity::Error => &mut errors,
                    Severity::Warning => &mut warnings,
                };
                bucket
                    .entry(field.clone())
                    .or_default()
                    .push(rule.message.clone());
            }
        }

        let sanitized_data = self.sanitize(data);

        tracing::debug!(
            fields = self.rules.len(),
            invalid_fields = errors.len(),
            warning_fields = warnings.len(),
            "Validated record"
        );

        ValidationOutcome {
            is_valid: errors.is_empty(),
            errors,
            warnings,
            sanitized_data,
        }
    }

    /// Validate a single field against `value`, with `rest` supplying the
    /// other fields for cross-field rules. Returns the error messages.
    pub fn validate_field(&self, field: &str, value: &Value, rest: &Record) -> Vec<String> {
        let rules = self.rules_for(field);
        if rules.is_empty() {
            return Vec::new();
        }
        let mut record = rest.clone();
        record.insert(field.to_string(), value.clone());

        rules
            .iter()
            .filter(|rule| rule.severity == Severity::Error && !rule.passes(value, &record))
            .map(|rule| rule.message.clone())
            .collect()
    }

    /// Produce the sanitized copy of `data`. Forbidden keys are dropped.
    pub fn sanitize(&self, data: &Record) -> Record {
        data.iter()
            .filter(|(key, _)| !FORBIDDEN_KEYS.contains(&key.as_str()))
            .map(|(key, value)| (key.clone(), self.sanitize_field(key, value)))
            .collect()
    }

    /// The sanitizer that will be applied to `field`, if one is selected by
    /// an explicit entry or the naming convention.
    pub fn sanitizer_for(&self, field: &str) -> Option<SanitizerKind> {
        if let Some(kind) = self.sanitizers.get(field) {
            return Some(*kind);
        }
        if !self.naming_convention {
            return None;
        }
        let lowered = field.to_ascii_lowercase();
        NAMING_CONVENTION
            .iter()
            .find(|(fragment, _)| lowered.contains(fragment))
            .map(|(_, kind)| *kind)
    }

    fn sanitize_field(&self, field: &str, value: &Value) -> Value {
        if let Some(kind) = self.sanitizer_for(field) {
            return kind.apply(value);
        }
        match value {
            Value::String(_) => SanitizerKind::Text.apply(value),
            Value::Number(_) => SanitizerKind::Number.apply(value),
            Value::Array(_) | Value::Object(_) => sanitize::sanitize_json_value(value),
            Value::Bool(_) | Value::Null => value.clone(),
        }
    }
}
