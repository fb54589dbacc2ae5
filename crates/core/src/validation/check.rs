//! Named built-in checks with default messages.

use std::fmt::Write as _;

use regex::Regex;
use serde_json::Value;

use super::validators::{self, Bounds, DateBounds};

/// A built-in validator together with its options.
///
/// Lets a schema be declared from data instead of closures, and supplies a
/// readable default message for each kind.
#[derive(Debug, Clone)]
pub enum Check {
    Required,
    Email,
    Phone,
    Url,
    Date(Option<DateBounds>),
    NumberRange(Bounds),
    StringLength(Bounds),
    Currency,
    Percentage,
    Pattern(Regex),
    OneOf(Vec<Value>),
    Integer,
}

impl Check {
    /// Stable identifier, used as the rule name in reports.
    pub fn name(&self) -> &'static str {
        match self {
            Check::Required => "required",
            Check::Email => "email",
            Check::Phone => "phone",
            Check::Url => "url",
            Check::Date(_) => "date",
            Check::NumberRange(_) => "number_range",
            Check::StringLength(_) => "string_length",
            Check::Currency => "currency",
            Check::Percentage => "percentage",
            Check::Pattern(_) => "pattern",
            Check::OneOf(_) => "one_of",
            Check::Integer => "integer",
        }
    }

    /// Run the underlying validator.
    pub fn test(&self, value: &Value) -> bool {
        match self {
            Check::Required => validators::required(value),
            Check::Email => validators::email(value),
            Check::Phone => validators::phone(value),
            Check::Url => validators::url(value),
            Check::Date(bounds) => validators::date(value, bounds.as_ref()),
            Check::NumberRange(bounds) => validators::number_range(value, bounds),
            Check::StringLength(bounds) => validators::string_length(value, bounds),
            Check::Currency => validators::currency(value),
            Check::Percentage => validators::percentage(value),
            Check::Pattern(re) => validators::pattern(value, re),
            Check::OneOf(allowed) => validators::one_of(value, allowed),
            Check::Integer => validators::integer(value),
        }
    }

    /// Message used when a schema author does not supply one.
    pub fn default_message(&self, field: &str) -> String {
        match self {
            Check::Required => format!("{field} is required"),
            Check::Email => format!("{field} must be a valid email address"),
            Check::Phone => format!("{field} must be a valid phone number"),
            Check::Url => format!("{field} must be a valid http(s) URL"),
            Check::Date(None) => format!("{field} must be a valid date"),
            Check::Date(Some(bounds)) => {
                let mut msg = format!("{field} must be a valid date");
                if let Some(min) = bounds.min {
                    let _ = write!(msg, " on or after {}", min.format("%Y-%m-%d"));
                }
                if let Some(max) = bounds.max {
                    if bounds.min.is_some() {
                        msg.push_str(" and");
                    }
                    let _ = write!(msg, " on or before {}", max.format("%Y-%m-%d"));
                }
                msg
            }
            Check::NumberRange(bounds) => match (bounds.min, bounds.max) {
                (Some(min), Some(max)) => format!("{field} must be between {min} and {max}"),
                (Some(min), None) => format!("{field} must be at least {min}"),
                (None, Some(max)) => format!("{field} must be at most {max}"),
                (None, None) => format!("{field} must be a number"),
            },
            Check::StringLength(bounds) => match (bounds.min, bounds.max) {
                (Some(min), Some(max)) => {
                    format!("{field} must be between {min} and {max} characters")
                }
                (Some(min), None) => format!("{field} must be at least {min} characters"),
                (None, Some(max)) => format!("{field} must be at most {max} characters"),
                (None, None) => format!("{field} must be text"),
            },
            Check::Currency => format!("{field} must be a valid amount"),
            Check::Percentage => format!("{field} must be a percentage between 0 and 100"),
            Check::Pattern(_) => format!("{field} has an invalid format"),
            Check::OneOf(allowed) => {
                let options: Vec<String> = allowed
                    .iter()
                    .map(|v| v.as_str().map_or_else(|| v.to_string(), str::to_string))
                    .collect();
                format!("{field} must be one of: {}", options.join(", "))
            }
            Check::Integer => format!("{field} must be a whole number"),
        }
    }
}
