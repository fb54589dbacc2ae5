//! HTTP client for a remote workflow collaborator.
//!
//! Every response body is wrapped in the `{ "data": ... }` envelope.

use async_trait::async_trait;
use reqwest::{Method, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;

use crmflow_core::error::CoreError;
use crmflow_core::workflow::{ExecutionOutcome, Workflow, WorkflowPatch, WorkflowValidation};

use crate::config::ServiceConfig;
use crate::contract::{cancellable, WorkflowStore};
use crate::error::{ServiceError, ServiceResult};

/// Standard `{ "data": T }` response envelope.
#[derive(Debug, Deserialize)]
struct DataResponse<T> {
    data: T,
}

/// [`WorkflowStore`] backed by the collaborator's REST API.
#[derive(Debug, Clone)]
pub struct HttpWorkflowStore {
    client: reqwest::Client,
    api_url: String,
    api_token: Option<String>,
}

impl HttpWorkflowStore {
    /// Build a client with the configured timeout.
    pub fn new(config: &ServiceConfig) -> ServiceResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;
        Ok(Self {
            client,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            api_token: config.api_token.clone(),
        })
    }

    /// Reuse an existing [`reqwest::Client`] (connection pooling).
    pub fn with_client(client: reqwest::Client, api_url: impl Into<String>) -> Self {
        let api_url: String = api_url.into();
        Self {
            client,
            api_url: api_url.trim_end_matches('/').to_string(),
            api_token: None,
        }
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.api_token = Some(token.into());
        self
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    // ---- private helpers ----

    /// Build a request for `segments` below the base URL. Each segment is
    /// percent-encoded, so an id can never step into another route.
    fn request(&self, method: Method, segments: &[&str]) -> ServiceResult<RequestBuilder> {
        let url = self.endpoint(segments)?;
        let builder = self.client.request(method, url);
        Ok(match &self.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        })
    }

    fn endpoint(&self, segments: &[&str]) -> ServiceResult<Url> {
        let mut url = Url::parse(&self.api_url).map_err(|e| {
            CoreError::Validation(format!("Invalid workflow API URL '{}': {e}", self.api_url))
        })?;
        url.path_segments_mut()
            .map_err(|()| {
                CoreError::Validation(format!(
                    "Workflow API URL '{}' cannot take a path",
                    self.api_url
                ))
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Ids that would vanish or climb a level once placed in a path.
    fn workflow_id(id: &str) -> ServiceResult<&str> {
        if matches!(id, "" | "." | "..") {
            return Err(CoreError::Validation(format!("Invalid workflow id '{id}'")).into());
        }
        Ok(id)
    }

    /// Send and decode the enveloped JSON body.
    async fn send<T: DeserializeOwned>(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> ServiceResult<T> {
        cancellable(cancel, async {
            let response = request.send().await?;
            Self::parse_response(response).await
        })
        .await
    }

    /// Send and only check the status code.
    async fn send_no_content(
        &self,
        request: RequestBuilder,
        cancel: &CancellationToken,
    ) -> ServiceResult<()> {
        cancellable(cancel, async {
            let response = request.send().await?;
            Self::ensure_success(response).await?;
            Ok(())
        })
        .await
    }

    /// Ensure the response has a success status code, or turn it into
    /// [`ServiceError::Api`] carrying the status and body text.
    async fn ensure_success(response: reqwest::Response) -> ServiceResult<reqwest::Response> {
        let status = response.status();
        if !status.is_success() {
            let url = response.url().to_string();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            tracing::warn!(status = status.as_u16(), %url, "Workflow service returned an error");
            return Err(ServiceError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(response: reqwest::Response) -> ServiceResult<T> {
        let response = Self::ensure_success(response).await?;
        let bytes = response.bytes().await?;
        let envelope: DataResponse<T> = serde_json::from_slice(&bytes)?;
        Ok(envelope.data)
    }
}

#[async_trait]
impl WorkflowStore for HttpWorkflowStore {
    async fn list_workflows(&self, cancel: &CancellationToken) -> ServiceResult<Vec<Workflow>> {
        tracing::debug!(api_url = %self.api_url, "Listing workflows");
        self.send(self.request(Method::GET, &["workflows"])?, cancel)
            .await
    }

    async fn get_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<Workflow> {
        tracing::debug!(workflow_id = %id, "Fetching workflow");
        let request = self.request(Method::GET, &["workflows", Self::workflow_id(id)?])?;
        self.send(request, cancel).await
    }

    async fn create_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        tracing::debug!(name = %workflow.name, nodes = workflow.nodes.len(), "Creating workflow");
        let request = self.request(Method::POST, &["workflows"])?.json(workflow);
        self.send(request, cancel).await
    }

    async fn update_workflow(
        &self,
        id: &str,
        patch: &WorkflowPatch,
        cancel: &CancellationToken,
    ) -> ServiceResult<Workflow> {
        tracing::debug!(workflow_id = %id, "Updating workflow");
        let request = self
            .request(Method::PUT, &["workflows", Self::workflow_id(id)?])?
            .json(patch);
        self.send(request, cancel).await
    }

    async fn delete_workflow(&self, id: &str, cancel: &CancellationToken) -> ServiceResult<()> {
        tracing::debug!(workflow_id = %id, "Deleting workflow");
        let request = self.request(Method::DELETE, &["workflows", Self::workflow_id(id)?])?;
        self.send_no_content(request, cancel).await
    }

    async fn execute_workflow(
        &self,
        id: &str,
        context: &Value,
        cancel: &CancellationToken,
    ) -> ServiceResult<ExecutionOutcome> {
        tracing::debug!(workflow_id = %id, "Submitting workflow for execution");
        let request = self
            .request(Method::POST, &["workflows", Self::workflow_id(id)?, "execute"])?
            .json(&json!({ "context": context }));
        self.send(request, cancel).await
    }

    async fn validate_workflow(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
    ) -> ServiceResult<WorkflowValidation> {
        let request = self
            .request(Method::POST, &["workflows", "validate"])?
            .json(workflow);
        self.send(request, cancel).await
    }
}
