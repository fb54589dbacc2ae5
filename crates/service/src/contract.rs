//! The workflow persistence and execution contract.

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crmflow_core::workflow::{
    validate_workflow, ExecutionOutcome, NodeTypeRegistry, Workflow, WorkflowPatch,
    WorkflowValidation,
};

use crate::error::{ServiceError, ServiceResult};

/// Persistence and execution collaborator for workflows.
///
/// Every call takes a [`CancellationToken`]; a token that is already
/// cancelled, or is cancelled while the call is in flight, resolves to
/// [`ServiceError::Cancelled`]. Concurrent calls against the same workflow
/// are not serialised here.
#[async_trait]
pub trait WorkflowStore: Send + Sync {
    async fn list_workflows(&self, cancel: &CancellationToken) -> ServiceResult<Vec<Workflow>>;

    async fn get_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<Workflow>;

    /// Persist a new workflow. The store assigns the id and timestamps.
    async fn create_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow>;

    async fn update_workflow(
        &self,
        id: &str,
        patch: &WorkflowPatch,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow>;

    async fn delete_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()>;

    async fn execute_workflow(
        &self,
        id: &str,
        context: &Value,
        cancel: &CancellationToken,
    ) -> ServiceResult<ExecutionOutcome>;

    /// Validate a workflow. Runs locally with the default registry unless a
    /// store delegates it.
    async fn validate_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<WorkflowValidation> {
        if cancel.is_cancelled() {
            return Err(ServiceError::Cancelled);
        }
        Ok(validate_workflow(workflow, &NodeTypeRegistry::default()))
    }
}

#[async_trait]
impl<T: WorkflowStore + ?Sized> WorkflowStore for Arc<T> {
    async fn list_workflows(&self, cancel: &CancellationToken) -> ServiceResult<Vec<Workflow>> {
        (**self).list_workflows(cancel).await
    }

    async fn get_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<Workflow> {
        (**self).get_workflow(id, cancel).await
    }

    async fn create_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        (**self).create_workflow(workflow, cancel).await
    }

    async fn update_workflow(
        &self,
        id: &str,
        patch: &WorkflowPatch,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        (**self).update_workflow(id, patch, cancel).await
    }

    async fn delete_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        (**self).delete_workflow(id, cancel).await
    }

    async fn execute_workflow(
        &self,
        id: &str,
        context: &Value,
        cancel: &CancellationToken,
    ) -> ServiceResult<ExecutionOutcome> {
        (**self).execute_workflow(id, context, cancel).await
    }

    async fn validate_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<WorkflowValidation> {
        (**self).validate_workflow(workflow, cancel).await
    }
}

/// Run `fut` unless `cancel` fires first.
pub async fn cancellable<T, F>(cancel: &CancellationToken, fut: F) -> ServiceResult<T>
where
    F: Future<Output = ServiceResult<T>>,
{
    if cancel.is_cancelled() {
        return Err(ServiceError::Cancelled);
    }
    tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!("Workflow service call cancelled");
            Err(ServiceError::Cancelled)
        }
        result = fut => result,
    }
}
