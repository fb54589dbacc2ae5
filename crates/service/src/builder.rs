//! Builder session: an in-memory draft plus the store it is saved to.
//!
//! Graph edits only touch the draft. Store-backed operations (`save`,
//! `activate`, `deactivate`, `load`, `delete`) are atomic from the builder's
//! point of view: the draft and mode change only after the store call
//! succeeds, so a failed call leaves the session exactly as it was.

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crmflow_core::error::CoreError;
use crmflow_core::types::{NodeId, WorkflowId};
use crmflow_core::workflow::{
    validate_integrations, validate_workflow, ConnectMode, ExecutionOutcome, ExecutionRequest,
    IntegrationCatalog, NodePatch, NodeType, NodeTypeRegistry, Workflow, WorkflowNode,
    WorkflowPatch, WorkflowStatus, WorkflowValidation,
};

use crate::contract::WorkflowStore;
use crate::error::{ServiceError, ServiceResult};

/// Whether the draft has been persisted yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BuilderMode {
    /// New workflow; `save` creates it.
    Building,
    /// Existing workflow; `save` updates it.
    Editing { id: WorkflowId },
}

pub struct WorkflowBuilder<S> {
    store: S,
    registry: NodeTypeRegistry,
    integrations: Option<IntegrationCatalog>,
    draft: Workflow,
    mode: BuilderMode,
    saved_hash: Option<String>,
}

impl<S: WorkflowStore> WorkflowBuilder<S> {
    /// Start building a new, empty workflow.
    pub fn new(store: S) -> Self {
        Self {
            store,
            registry: NodeTypeRegistry::default(),
            integrations: None,
            draft: Workflow::default(),
            mode: BuilderMode::Building,
            saved_hash: None,
        }
    }

    pub fn with_registry(mut self, registry: NodeTypeRegistry) -> Self {
        self.registry = registry;
        self
    }

    /// Also require integration nodes to use connected integrations.
    pub fn with_integrations(mut self, catalog: IntegrationCatalog) -> Self {
        self.integrations = Some(catalog);
        self
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn registry(&self) -> &NodeTypeRegistry {
        &self.registry
    }

    pub fn draft(&self) -> &Workflow {
        &self.draft
    }

    pub fn mode(&self) -> &BuilderMode {
        &self.mode
    }

    /// True when the draft differs from what was last saved or loaded.
    pub fn is_dirty(&self) -> bool {
        self.saved_hash.as_deref() != Some(self.draft.content_hash().as_str())
    }

    // -- details ---------------------------------------------------------------

    pub fn set_name(&mut self, name: impl Into<String>) {
        self.draft.name = name.into();
    }

    pub fn set_description(&mut self, description: impl Into<String>) {
        self.draft.description = description.into();
    }

    pub fn set_category(&mut self, category: impl Into<String>) {
        self.draft.category = category.into();
    }

    // -- graph editing ---------------------------------------------------------

    pub fn add_node(&mut self, node_type: NodeType) -> ServiceResult<NodeId> {
        Ok(self.draft.add_node(node_type)?)
    }

    pub fn update_node(&mut self, id: &str, patch: NodePatch) -> ServiceResult<()> {
        Ok(self.draft.update_node(id, patch)?)
    }

    pub fn delete_node(&mut self, id: &str) -> ServiceResult<WorkflowNode> {
        Ok(self.draft.delete_node(id)?)
    }

    /// Connect two nodes, rejecting invalid endpoints immediately.
    pub fn connect_nodes(&mut self, from: &str, to: &str) -> ServiceResult<String> {
        self.connect_nodes_with(from, to, ConnectMode::Strict)
    }

    pub fn connect_nodes_with(
        &mut self,
        from: &str,
        to: &str,
        mode: ConnectMode,
    ) -> ServiceResult<String> {
        Ok(self.draft.connect_nodes(from, to, mode)?)
    }

    pub fn disconnect(&mut self, connection_id: &str) -> ServiceResult<()> {
        self.draft.disconnect(connection_id)?;
        Ok(())
    }

    // -- validation ------------------------------------------------------------

    /// Local, authoritative validation of the draft.
    pub fn validate(&self) -> WorkflowValidation {
        let mut result = validate_workflow(&self.draft, &self.registry);
        if let Some(catalog) = &self.integrations {
            result
                .errors
                .extend(validate_integrations(&self.draft, catalog));
            result.is_valid = result.errors.is_empty();
        }
        result
    }

    fn ensure_valid(&self) -> ServiceResult<()> {
        let validation = self.validate();
        if validation.is_valid {
            Ok(())
        } else {
            tracing::warn!(
                errors = validation.errors.len(),
                "Workflow failed validation"
            );
            Err(ServiceError::InvalidWorkflow(validation.errors))
        }
    }

    fn saved_id(&self) -> ServiceResult<&str> {
        match &self.mode {
            BuilderMode::Editing { id } => Ok(id.as_str()),
            BuilderMode::Building => Err(CoreError::Conflict(
                "Workflow must be saved first".to_string(),
            )
            .into()),
        }
    }

    // -- store-backed operations ---------------------------------------------

    /// Validate and persist the draft: create when building, update when
    /// editing. Returns the stored workflow, which becomes the new draft.
    pub async fn save(&mut self, cancel: &CancellationToken) -> ServiceResult<&Workflow> {
        self.ensure_valid()?;

        let mut payload = self.draft.clone();
        payload.trigger_type = payload.primary_trigger_type().map(str::to_string);

        let saved = match &self.mode {
            BuilderMode::Building => self.store.create_workflow(&payload, cancel).await?,
            BuilderMode::Editing { id } => {
                self.store
                    .update_workflow(id, &WorkflowPatch::from_workflow(&payload), cancel)
                    .await?
            }
        };

        let id = saved.id.clone().ok_or_else(|| {
            CoreError::Internal("Workflow store returned a workflow without an id".to_string())
        })?;
        tracing::info!(workflow_id = %id, nodes = saved.nodes.len(), "Workflow saved");

        self.saved_hash = Some(saved.content_hash());
        self.draft = saved;
        self.mode = BuilderMode::Editing { id };
        Ok(&self.draft)
    }

    /// Open an existing workflow for editing. The current draft is replaced
    /// only if the load succeeds.
    pub async fn load(&mut self, id: &str, cancel: &CancellationToken) -> ServiceResult<&Workflow> {
        let loaded = self.store.get_workflow(id, cancel).await?;
        self.saved_hash = Some(loaded.content_hash());
        self.mode = BuilderMode::Editing {
            id: loaded.id.clone().unwrap_or_else(|| id.to_string()),
        };
        self.draft = loaded;
        Ok(&self.draft)
    }

    /// Enable a saved, valid workflow so it can be executed.
    pub async fn activate(&mut self, cancel: &CancellationToken) -> ServiceResult<()> {
        self.ensure_valid()?;
        self.transition(WorkflowStatus::Active, cancel).await
    }

    pub async fn deactivate(&mut self, cancel: &CancellationToken) -> ServiceResult<()> {
        self.transition(WorkflowStatus::Inactive, cancel).await
    }

    async fn transition(
        &mut self,
        next: WorkflowStatus,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        let id = self.saved_id()?.to_string();
        self.draft.status().validate_transition(next)?;

        let updated = self
            .store
            .update_workflow(&id, &WorkflowPatch::status(next), cancel)
            .await?;

        self.draft.force_status(updated.status());
        self.draft.updated_at = updated.updated_at;
        tracing::info!(workflow_id = %id, status = %updated.status(), "Workflow status changed");
        Ok(())
    }

    /// Run the saved workflow with `context`. Fails fast when the workflow is
    /// unsaved, has unsaved edits, or is inactive or invalid; nothing is sent
    /// to the store then.
    pub async fn execute(
        &self,
        context: Value,
        cancel: &CancellationToken,
    ) -> ServiceResult<ExecutionOutcome> {
        let id = self.saved_id()?;
        if self.is_dirty() {
            return Err(CoreError::Conflict(
                "Workflow has unsaved changes; save before executing".to_string(),
            )
            .into());
        }
        if !self.draft.is_active() {
            return Err(ServiceError::Inactive { id: id.to_string() });
        }
        let request = ExecutionRequest::prepare(&self.draft, context, &self.registry)?;

        let outcome = self
            .store
            .execute_workflow(&request.workflow_id, &request.context, cancel)
            .await?;
        tracing::info!(
            workflow_id = %request.workflow_id,
            success = outcome.success,
            "Workflow executed"
        );
        Ok(outcome)
    }

    /// Delete the saved workflow and start over with an empty draft.
    pub async fn delete(&mut self, cancel: &CancellationToken) -> ServiceResult<()> {
        let id = self.saved_id()?.to_string();
        self.store.delete_workflow(&id, cancel).await?;
        tracing::info!(workflow_id = %id, "Workflow deleted");
        self.draft = Workflow::default();
        self.mode = BuilderMode::Building;
        self.saved_hash = None;
        Ok(())
    }
}
