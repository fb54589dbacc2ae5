//! In-process workflow store.
//!
//! Holds workflows in insertion order and runs executions locally by walking
//! the execution plan. Used by tests and by tooling that has no collaborator
//! to talk to.

use std::collections::VecDeque;

use async_trait::async_trait;
use chrono::Utc;
use indexmap::IndexMap;
use serde_json::{json, Value};
use tokio::sync::{Mutex, RwLock};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crmflow_core::error::CoreError;
use crmflow_core::types::WorkflowId;
use crmflow_core::workflow::{
    validate_workflow, ExecutionOutcome, ExecutionPlan, NodeTypeRegistry, Workflow,
    WorkflowPatch, WorkflowValidation,
};

use crate::contract::{cancellable, WorkflowStore};
use crate::error::{ServiceError, ServiceResult};

/// A collaborator failure queued by [`InMemoryWorkflowStore::inject_failure`].
#[derive(Debug, Clone)]
struct InjectedFailure {
    status: u16,
    body: String,
}

/// [`WorkflowStore`] keeping everything in memory.
#[derive(Debug, Default)]
pub struct InMemoryWorkflowStore {
    workflows: RwLock<IndexMap<WorkflowId, Workflow>>,
    registry: NodeTypeRegistry,
    failures: Mutex<VecDeque<InjectedFailure>>,
    executions: Mutex<Vec<(WorkflowId, Value)>>,
}

impl InMemoryWorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and execute against a custom node registry.
    pub fn with_registry(registry: NodeTypeRegistry) -> Self {
        Self {
            registry,
            ..Self::default()
        }
    }

    /// Make the next call fail with [`ServiceError::Api`]. Failures queue up
    /// and are consumed one per call.
    pub async fn inject_failure(&self, status: u16, body: impl Into<String>) {
        self.failures.lock().await.push_back(InjectedFailure {
            status,
            body: body.into(),
        });
    }

    /// Every executed `(workflow id, context)` pair, in order.
    pub async fn executions(&self) -> Vec<(WorkflowId, Value)> {
        self.executions.lock().await.clone()
    }

    pub async fn len(&self) -> usize {
        self.workflows.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.workflows.read().await.is_empty()
    }

    async fn take_failure(&self) -> ServiceResult<()> {
        match self.failures.lock().await.pop_front() {
            Some(InjectedFailure { status, body }) => Err(ServiceError::Api { status, body }),
            None => Ok(()),
        }
    }

    fn not_found(id: &str) -> ServiceError {
        CoreError::NotFound {
            entity: "workflow",
            id: id.to_string(),
        }
        .into()
    }
}

#[async_trait]
impl WorkflowStore for InMemoryWorkflowStore {
    async fn list_workflows(&self, cancel: &CancellationToken) -> ServiceResult<Vec<Workflow>> {
        cancellable(cancel, async {
            self.take_failure().await?;
            Ok::<_, ServiceError>(self.workflows.read().await.values().cloned().collect())
        })
        .await
    }

    async fn get_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<Workflow> {
        cancellable(cancel, async {
            self.take_failure().await?;
            self.workflows
                .read()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| Self::not_found(id))
        })
        .await
    }

    async fn create_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        cancellable(cancel, async {
            self.take_failure().await?;
            let id = format!("wf_{}", Uuid::new_v4().simple());
            let now = Utc::now();
            let mut stored = workflow.clone();
            stored.id = Some(id.clone());
            stored.created_at = Some(now);
            stored.updated_at = Some(now);
            self.workflows.write().await.insert(id.clone(), stored.clone());
            tracing::debug!(workflow_id = %id, "Stored new workflow");
            Ok::<_, ServiceError>(stored)
        })
        .await
    }

    async fn update_workflow(
        &self,
        id: &str,
        patch: &WorkflowPatch,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        cancellable(cancel, async {
            self.take_failure().await?;
            let mut workflows = self.workflows.write().await;
            let current = workflows.get_mut(id).ok_or_else(|| Self::not_found(id))?;
            let mut updated = current.clone();
            patch.apply(&mut updated)?;
            *current = updated.clone();
            Ok::<_, ServiceError>(updated)
        })
        .await
    }

    async fn delete_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        cancellable(cancel, async {
            self.take_failure().await?;
            self.workflows
                .write()
                .await
                .shift_remove(id)
                .map(|_| ())
                .ok_or_else(|| Self::not_found(id))
        })
        .await
    }

    async fn execute_workflow(
        &self,
        id: &str,
        context: &Value,
        cancel: &CancellationToken,
    ) -> ServiceResult<ExecutionOutcome> {
        cancellable(cancel, async {
            self.take_failure().await?;
            let workflow = self
                .workflows
                .read()
                .await
                .get(id)
                .cloned()
                .ok_or_else(|| Self::not_found(id))?;

            if !workflow.is_active() {
                return Err(ServiceError::Inactive { id: id.to_string() });
            }

            let validation = validate_workflow(&workflow, &self.registry);
            if !validation.is_valid {
                return Err(ServiceError::InvalidWorkflow(validation.errors));
            }

            let plan = ExecutionPlan::for_workflow(&workflow)?;
            let steps = plan.steps(&workflow);
            for step in &steps {
                tracing::debug!(workflow_id = %id, node_id = %step.node_id, name = %step.name, "Executing step");
            }
            self.executions
                .lock()
                .await
                .push((id.to_string(), context.clone()));

            Ok(ExecutionOutcome::succeeded(
                format!("Executed {} steps", steps.len()),
                steps,
            )
            .with_diagnostic("plan", json!(plan.order))
            .with_diagnostic("context", context.clone()))
        })
        .await
    }

    async fn validate_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<WorkflowValidation> {
        cancellable(cancel, async {
            Ok::<_, ServiceError>(validate_workflow(workflow, &self.registry))
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use crmflow_core::types::Record;
    use crmflow_core::workflow::{ConnectMode, NodePatch, NodeType, WorkflowStatus};

    fn runnable() -> Workflow {
        let mut wf = Workflow::new("Onboarding");
        let t = wf.add_node(NodeType::Trigger).unwrap();
        let a = wf.add_node(NodeType::Action).unwrap();
        let mut tc = Record::new();
        tc.insert("triggerType".into(), json!("Contact Created"));
        wf.update_node(&t, NodePatch::config(tc)).unwrap();
        let mut ac = Record::new();
        ac.insert("actionType".into(), json!("Assign Owner"));
        wf.update_node(&a, NodePatch::config(ac)).unwrap();
        wf.connect_nodes(&t, &a, ConnectMode::Strict).unwrap();
        wf
    }

    // -- crud ------------------------------------------------------------------

    #[tokio::test]
    async fn create_assigns_id_and_timestamps() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        let created = store.create_workflow(&runnable(), &cancel).await.unwrap();
        let id = created.id.clone().unwrap();
        assert!(id.starts_with("wf_"));
        assert!(created.created_at.is_some());
        assert_eq!(store.get_workflow(&id, &cancel).await.unwrap(), created);
        assert_eq!(store.list_workflows(&cancel).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn update_enforces_transitions() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        let id = store
            .create_workflow(&runnable(), &cancel)
            .await
            .unwrap()
            .id
            .unwrap();
        let result = store
            .update_workflow(&id, &WorkflowPatch::status(WorkflowStatus::Inactive), &cancel)
            .await;
        assert_matches!(
            result,
            Err(ServiceError::Core(CoreError::InvalidTransition { .. }))
        );
        let stored = store.get_workflow(&id, &cancel).await.unwrap();
        assert_eq!(stored.status(), WorkflowStatus::Draft);
    }

    #[tokio::test]
    async fn delete_unknown_is_not_found() {
        let store = InMemoryWorkflowStore::new();
        let result = store
            .delete_workflow("wf_missing", &CancellationToken::new())
            .await;
        assert!(result.unwrap_err().is_not_found());
    }

    // -- execute ---------------------------------------------------------------

    #[tokio::test]
    async fn execute_fails_fast_when_inactive() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        let id = store
            .create_workflow(&runnable(), &cancel)
            .await
            .unwrap()
            .id
            .unwrap();
        let result = store.execute_workflow(&id, &json!({}), &cancel).await;
        assert_matches!(result, Err(ServiceError::Inactive { id: got }) if got == id);
        assert!(store.executions().await.is_empty());
    }

    #[tokio::test]
    async fn execute_walks_plan() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        let id = store
            .create_workflow(&runnable(), &cancel)
            .await
            .unwrap()
            .id
            .unwrap();
        store
            .update_workflow(&id, &WorkflowPatch::status(WorkflowStatus::Active), &cancel)
            .await
            .unwrap();

        let outcome = store
            .execute_workflow(&id, &json!({"contactId": 1}), &cancel)
            .await
            .unwrap();
        assert!(outcome.success);
        assert_eq!(outcome.steps.len(), 2);
        assert_eq!(outcome.diagnostics["plan"].as_array().unwrap().len(), 2);
        assert_eq!(store.executions().await, vec![(id, json!({"contactId": 1}))]);
    }

    // -- failure injection and cancellation ------------------------------------

    #[tokio::test]
    async fn injected_failure_is_consumed_once() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        store.inject_failure(503, "maintenance").await;
        assert_matches!(
            store.list_workflows(&cancel).await,
            Err(ServiceError::Api { status: 503, .. })
        );
        assert!(store.list_workflows(&cancel).await.is_ok());
    }

    #[tokio::test]
    async fn cancelled_token_leaves_store_untouched() {
        let store = InMemoryWorkflowStore::new();
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert_matches!(
            store.create_workflow(&runnable(), &cancel).await,
            Err(ServiceError::Cancelled)
        );
        assert!(store.is_empty().await);
    }
}
