//! Declarative rule definitions.
//!
//! Rules can be stored as data (JSON config, a settings table) and compiled
//! into a [`ValidationSchema`]. Apart from `required`, every rule type passes
//! on an absent or `null` value, so presence is enforced only where a
//! `required` rule asks for it.

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::check::Check;
use super::schema::{Rule, ValidationSchema};
use super::validators::{self, Bounds, DateBounds};
use crate::error::CoreError;

/// Rule types understood by [`ValidationSchema::from_definitions`].
pub const RULE_TYPES: &[&str] = &[
    "required",
    "type_check",
    "email",
    "phone",
    "url",
    "date",
    "min_length",
    "max_length",
    "min_value",
    "max_value",
    "enum_values",
    "regex_pattern",
    "currency",
    "percentage",
    "integer",
];

/// Whether a rule violation blocks the record or is informational.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    #[default]
    Error,
    Warning,
}

/// A validation rule expressed as data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleDefinition {
    pub field_name: String,
    pub rule_type: String,
    #[serde(default)]
    pub config: Value,
    /// Falls back to the check's default message when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(default)]
    pub severity: Severity,
}

impl ValidationSchema {
    /// Compile stored rule definitions into a schema.
    ///
    /// Unknown rule types, invalid regex patterns and malformed config are
    /// rejected with [`CoreError::Validation`] instead of silently passing.
    pub fn from_definitions(definitions: &[RuleDefinition]) -> Result<Self, CoreError> {
        let mut schema = ValidationSchema::new();
        for def in definitions {
            let rule = compile(def)?;
            schema.push_rule(&def.field_name, rule);
        }
        tracing::debug!(rules = definitions.len(), "Compiled rule definitions");
        Ok(schema)
    }
}

fn compile(def: &RuleDefinition) -> Result<Rule, CoreError> {
    let field = def.field_name.as_str();

    let rule = match def.rule_type.as_str() {
        "required" => {
            let message = message_for(def, || Check::Required.default_message(field));
            Rule::from_check(Check::Required, message)
        }
        "type_check" => {
            let expected = def
                .config
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("string")
                .to_string();
            if !matches!(
                expected.as_str(),
                "string" | "number" | "integer" | "float" | "boolean" | "array" | "object"
            ) {
                return Err(invalid(def, format!("unsupported type '{expected}'")));
            }
            let message = message_for(def, || format!("{field} must be of type {expected}"));
            Rule::new(
                "type_check",
                move |value, _| value.is_null() || matches_type(value, &expected),
                message,
            )
        }
        "min_length" => {
            let min = config_f64(def, "min")?;
            optional(def, Check::StringLength(Bounds::at_least(min)))
        }
        "max_length" => {
            let max = config_f64(def, "max")?;
            optional(def, Check::StringLength(Bounds::at_most(max)))
        }
        "min_value" => {
            let min = config_f64(def, "min")?;
            optional(def, Check::NumberRange(Bounds::at_least(min)))
        }
        "max_value" => {
            let max = config_f64(def, "max")?;
            optional(def, Check::NumberRange(Bounds::at_most(max)))
        }
        "enum_values" => {
            let values = def
                .config
                .get("values")
                .and_then(Value::as_array)
                .ok_or_else(|| invalid(def, "config.values must be an array".to_string()))?;
            optional(def, Check::OneOf(values.clone()))
        }
        "regex_pattern" => {
            let pattern = def
                .config
                .get("pattern")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(def, "config.pattern must be a string".to_string()))?;
            let re = Regex::new(pattern)
                .map_err(|e| invalid(def, format!("invalid pattern: {e}")))?;
            optional(def, Check::Pattern(re))
        }
        "date" => {
            let bounds = date_bounds(def)?;
            optional(def, Check::Date(bounds))
        }
        "email" => optional(def, Check::Email),
        "phone" => optional(def, Check::Phone),
        "url" => optional(def, Check::Url),
        "currency" => optional(def, Check::Currency),
        "percentage" => optional(def, Check::Percentage),
        "integer" => optional(def, Check::Integer),
        other => return Err(invalid(def, format!("unknown rule type '{other}'"))),
    };

    Ok(match def.severity {
        Severity::Error => rule,
        Severity::Warning => rule.warning(),
    })
}

/// Wrap a check so it passes on absent values.
fn optional(def: &RuleDefinition, check: Check) -> Rule {
    let message = message_for(def, || check.default_message(&def.field_name));
    let name = check.name();
    Rule::new(
        name,
        move |value, _| value.is_null() || check.test(value),
        message,
    )
}

fn message_for(def: &RuleDefinition, default: impl FnOnce() -> String) -> String {
    def.error_message.clone().unwrap_or_else(default)
}

fn matches_type(value: &Value, expected: &str) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" | "float" => value.is_number(),
        "boolean" => value.is_boolean(),
        "array" => value.is_array(),
        "object" => value.is_object(),
        _ => false,
    }
}

fn config_f64(def: &RuleDefinition, key: &str) -> Result<f64, CoreError> {
    def.config
        .get(key)
        .and_then(Value::as_f64)
        .ok_or_else(|| invalid(def, format!("config.{key} must be a number")))
}

fn date_bounds(def: &RuleDefinition) -> Result<Option<DateBounds>, CoreError> {
    let parse = |key: &str| -> Result<_, CoreError> {
        match def.config.get(key) {
            None | Some(Value::Null) => Ok(None),
            Some(raw) => validators::parse_date(raw)
                .map(Some)
                .ok_or_else(|| invalid(def, format!("config.{key} is not a date"))),
        }
    };
    let min = parse("min")?;
    let max = parse("max")?;
    Ok((min.is_some() || max.is_some()).then(|| DateBounds::new(min, max)))
}

fn invalid(def: &RuleDefinition, reason: String) -> CoreError {
    CoreError::Validation(format!(
        "Rule '{}' on field '{}': {reason}",
        def.rule_type, def.field_name
    ))
}
