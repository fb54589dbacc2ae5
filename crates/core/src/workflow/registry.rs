//! Node type registry: the config keys each node type declares, the values
//! the builder offers for them, and validation of node configs.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use super::model::{NodeType, WorkflowNode};

/// Trigger events a workflow can start from.
pub const TRIGGER_TYPES: &[&str] = &[
    "Contact Created",
    "Deal Stage Changed",
    "Email Opened",
    "Form Submitted",
    "Date Based",
    "Lead Score Changed",
];

pub const CONDITION_TYPES: &[&str] = &[
    "Field Value",
    "Lead Score",
    "Deal Amount",
    "Tag",
    "Email Activity",
];

pub const CONDITION_OPERATORS: &[&str] =
    &["equals", "not_equals", "greater_than", "less_than", "contains"];

pub const ACTION_TYPES: &[&str] = &[
    "Send Email",
    "Create Task",
    "Update Field",
    "Add Tag",
    "Notify Team",
    "Assign Owner",
];

pub const DELAY_UNITS: &[&str] = &["minutes", "hours", "days", "weeks"];

pub const INTEGRATIONS: &[&str] = &[
    "Salesforce",
    "HubSpot",
    "Slack",
    "Mailchimp",
    "Zapier",
    "Google Sheets",
];

/// Constraint on a single config value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "values", rename_all = "snake_case")]
pub enum FieldRule {
    /// Must equal one of the listed strings.
    OneOf(Vec<String>),
    /// Any non-blank string, or any non-null scalar.
    NonEmpty,
    /// Number (or numeric string) strictly greater than zero.
    PositiveNumber,
    /// Number (or numeric string) greater than or equal to zero.
    NonNegativeNumber,
}

/// One declared config key of a node type.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigField {
    pub key: String,
    pub rule: FieldRule,
    pub required: bool,
    /// Only enforced when another config key holds the given value.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub when: Option<(String, String)>,
}

impl ConfigField {
    pub fn required(key: &str, rule: FieldRule) -> Self {
        Self {
            key: key.to_string(),
            rule,
            required: true,
            when: None,
        }
    }

    pub fn optional(key: &str, rule: FieldRule) -> Self {
        Self {
            required: false,
            ..Self::required(key, rule)
        }
    }

    /// Restrict the field to configs where `key == value`.
    pub fn when(mut self, key: &str, value: &str) -> Self {
        self.when = Some((key.to_string(), value.to_string()));
        self
    }

    fn applies_to(&self, node: &WorkflowNode) -> bool {
        match &self.when {
            Some((key, expected)) => node.config_str(key) == Some(expected.as_str()),
            None => true,
        }
    }

    fn check(&self, node: &WorkflowNode) -> Option<String> {
        let label = &node.name;
        let value = match node.config.get(&self.key) {
            None | Some(Value::Null) => {
                return self
                    .required
                    .then(|| format!("Node '{label}': {} is required", self.key));
            }
            Some(Value::String(s)) if s.trim().is_empty() => {
                return self
                    .required
                    .then(|| format!("Node '{label}': {} is required", self.key));
            }
            Some(value) => value,
        };

        let ok = match &self.rule {
            FieldRule::OneOf(allowed) => value
                .as_str()
                .is_some_and(|s| allowed.iter().any(|a| a == s)),
            FieldRule::NonEmpty => !matches!(value, Value::Array(a) if a.is_empty()),
            FieldRule::PositiveNumber => numeric(value).is_some_and(|n| n > 0.0),
            FieldRule::NonNegativeNumber => numeric(value).is_some_and(|n| n >= 0.0),
        };
        if ok {
            return None;
        }

        Some(match &self.rule {
            FieldRule::OneOf(allowed) => format!(
                "Node '{label}': {} must be one of: {}",
                self.key,
                allowed.join(", ")
            ),
            FieldRule::NonEmpty => format!("Node '{label}': {} is required", self.key),
            FieldRule::PositiveNumber => {
                format!("Node '{label}': {} must be a positive number", self.key)
            }
            FieldRule::NonNegativeNumber => {
                format!("Node '{label}': {} must not be negative", self.key)
            }
        })
    }
}

/// Strict numeric reading of a config value: a JSON number or a string that
/// parses completely as one.
fn numeric(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// Declared config fields for every node type.
#[derive(Debug, Clone)]
pub struct NodeTypeRegistry {
    fields: HashMap<NodeType, Vec<ConfigField>>,
}

impl Default for NodeTypeRegistry {
    fn default() -> Self {
        let one_of = |values: &[&str]| FieldRule::OneOf(values.iter().map(|v| v.to_string()).collect());

        let mut fields = HashMap::new();
        fields.insert(
            NodeType::Trigger,
            vec![ConfigField::required("triggerType", one_of(TRIGGER_TYPES))],
        );
        fields.insert(
            NodeType::Condition,
            vec![
                ConfigField::required("conditionType", one_of(CONDITION_TYPES)),
                ConfigField::required("operator", one_of(CONDITION_OPERATORS)),
                ConfigField::required("value", FieldRule::NonEmpty),
            ],
        );
        fields.insert(
            NodeType::Action,
            vec![
                ConfigField::required("actionType", one_of(ACTION_TYPES)),
                ConfigField::required("template", FieldRule::NonEmpty)
                    .when("actionType", "Send Email"),
                ConfigField::optional("delay", FieldRule::NonNegativeNumber)
                    .when("actionType", "Send Email"),
            ],
        );
        fields.insert(
            NodeType::Delay,
            vec![
                ConfigField::required("duration", FieldRule::PositiveNumber),
                ConfigField::required("unit", one_of(DELAY_UNITS)),
            ],
        );
        fields.insert(
            NodeType::Integration,
            vec![
                ConfigField::required("integration", one_of(INTEGRATIONS)),
                ConfigField::required("operation", FieldRule::NonEmpty),
            ],
        );
        Self { fields }
    }
}

impl NodeTypeRegistry {
    /// A registry with no declared fields; every config is accepted.
    pub fn empty() -> Self {
        Self {
            fields: HashMap::new(),
        }
    }

    /// Declare an extra field for `node_type`.
    pub fn with_field(mut self, node_type: NodeType, field: ConfigField) -> Self {
        self.fields.entry(node_type).or_default().push(field);
        self
    }

    pub fn fields(&self, node_type: NodeType) -> &[ConfigField] {
        self.fields.get(&node_type).map_or(&[], Vec::as_slice)
    }

    /// Values the builder offers for `key` on `node_type`. Empty when the key
    /// is free-form or undeclared.
    pub fn options(&self, node_type: NodeType, key: &str) -> &[String] {
        self.fields(node_type)
            .iter()
            .find(|f| f.key == key)
            .and_then(|f| match &f.rule {
                FieldRule::OneOf(values) => Some(values.as_slice()),
                _ => None,
            })
            .unwrap_or(&[])
    }

    /// Check a node's config against its type's declared fields.
    pub fn validate_config(&self, node: &WorkflowNode) -> Vec<String> {
        self.fields(node.node_type)
            .iter()
            .filter(|field| field.applies_to(node))
            .filter_map(|field| field.check(node))
            .collect()
    }
}
