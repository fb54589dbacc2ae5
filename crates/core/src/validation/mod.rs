pub mod check;
pub mod form;
pub mod rules;
pub mod schema;
pub mod validators;

pub use check::Check;
pub use form::FormValidation;
pub use rules::{RuleDefinition, Severity, RULE_TYPES};
pub use schema::{Predicate, Rule, ValidationOutcome, ValidationSchema};
pub use validators::{Bounds, DateBounds};
