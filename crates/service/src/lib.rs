//! Async service layer for workflows: the store contract, its HTTP and
//! in-memory implementations, and the builder session that saves through
//! them.

pub mod builder;
pub mod config;
pub mod contract;
pub mod error;
pub mod http;
pub mod memory;
pub mod telemetry;

pub use builder::{BuilderMode, WorkflowBuilder};
pub use config::ServiceConfig;
pub use contract::WorkflowStore;
pub use error::{ServiceError, ServiceResult};
pub use http::HttpWorkflowStore;
pub use memory::InMemoryWorkflowStore;
