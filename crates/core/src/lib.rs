//! Domain core: input sanitization, record validation and the workflow
//! automation model. Pure logic with no I/O.

pub mod error;
pub mod hashing;
pub mod sanitize;
pub mod types;
pub mod validation;
pub mod workflow;
