//! Per-form validation state.

use std::collections::BTreeMap;
use std::sync::Arc;

use serde_json::Value;

use super::schema::{ValidationOutcome, ValidationSchema};
use crate::types::Record;

/// Holds the current error map of one form on top of a shared schema.
///
/// Each form owns its own state; several forms can share one schema.
#[derive(Debug, Clone)]
pub struct FormValidation {
    schema: Arc<ValidationSchema>,
    errors: BTreeMap<String, Vec<String>>,
}

impl FormValidation {
    pub fn new(schema: Arc<ValidationSchema>) -> Self {
        Self {
            schema,
            errors: BTreeMap::new(),
        }
    }

    pub fn schema(&self) -> &ValidationSchema {
        &self.schema
    }

    /// Validate the whole form, replacing the stored errors.
    pub fn validate(&mut self, data: &Record) -> ValidationOutcome {
        let outcome = self.schema.validate(data);
        self.errors = outcome.errors.clone();
        outcome
    }

    /// Validate one field as the user edits it. Only that field's entry in
    /// the error map changes. Returns whether the field is now valid.
    pub fn validate_field(&mut self, field: &str, value: &Value, rest: &Record) -> bool {
        let messages = self.schema.validate_field(field, value, rest);
        if messages.is_empty() {
            self.errors.remove(field);
            true
        } else {
            self.errors.insert(field.to_string(), messages);
            false
        }
    }

    pub fn clear_errors(&mut self) {
        self.errors.clear();
    }

    pub fn clear_field_error(&mut self, field: &str) {
        self.errors.remove(field);
    }

    pub fn errors(&self) -> &BTreeMap<String, Vec<String>> {
        &self.errors
    }

    pub fn field_errors(&self, field: &str) -> &[String] {
        self.errors.get(field).map_or(&[], Vec::as_slice)
    }

    /// True when no field currently has errors.
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }
}
