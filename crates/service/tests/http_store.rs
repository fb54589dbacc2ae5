//! Integration tests for the HTTP workflow store against a stub collaborator.

mod common;

use std::time::Duration;

use assert_matches::assert_matches;
use serde_json::json;
use tokio_util::sync::CancellationToken;

use common::{build_lead_nurture, spawn_stub};
use crmflow_core::error::CoreError;
use crmflow_core::workflow::{Workflow, WorkflowPatch, WorkflowStatus};
use crmflow_service::{
    HttpWorkflowStore, ServiceConfig, ServiceError, WorkflowBuilder, WorkflowStore,
};

async fn store() -> (HttpWorkflowStore, common::SharedStub) {
    let (api_url, stub) = spawn_stub().await;
    let config = ServiceConfig {
        api_url,
        request_timeout_secs: 5,
        api_token: Some("test-token".into()),
    };
    (HttpWorkflowStore::new(&config).unwrap(), stub)
}

// ---------------------------------------------------------------------------
// Test: CRUD round trip through the envelope
// ---------------------------------------------------------------------------

#[tokio::test]
async fn create_get_list_delete() {
    let (store, stub) = store().await;
    let cancel = CancellationToken::new();

    let created = store
        .create_workflow(&Workflow::new("Remote"), &cancel)
        .await
        .unwrap();
    let id = created.id.clone().unwrap();
    assert_eq!(id, "wf_stub_1");
    assert!(created.created_at.is_some());

    let fetched = store.get_workflow(&id, &cancel).await.unwrap();
    assert_eq!(fetched.name, "Remote");
    assert_eq!(store.list_workflows(&cancel).await.unwrap().len(), 1);
    assert_eq!(
        stub.lock().await.authorization.as_deref(),
        Some("Bearer test-token")
    );

    store.delete_workflow(&id, &cancel).await.unwrap();
    assert!(stub.lock().await.workflows.is_empty());
}

#[tokio::test]
async fn missing_workflow_maps_to_api_error() {
    let (store, _) = store().await;
    let result = store
        .get_workflow("wf_nope", &CancellationToken::new())
        .await;
    assert_matches!(
        result,
        Err(ServiceError::Api { status: 404, ref body }) if body.contains("wf_nope")
    );
    assert!(result.unwrap_err().is_not_found());
}

// ---------------------------------------------------------------------------
// Test: ids are path segments, never path syntax
// ---------------------------------------------------------------------------

#[tokio::test]
async fn ids_with_slashes_stay_in_one_segment() {
    let (store, stub) = store().await;
    let cancel = CancellationToken::new();
    store
        .create_workflow(&Workflow::new("Remote"), &cancel)
        .await
        .unwrap();

    // Unencoded, this would resolve to the list route.
    let result = store.get_workflow("x/../../workflows", &cancel).await;
    assert_matches!(
        result,
        Err(ServiceError::Api { status: 404, ref body }) if body.contains("x/../../workflows")
    );

    let result = store.delete_workflow("wf_stub_1/..", &cancel).await;
    assert!(result.unwrap_err().is_not_found());
    assert_eq!(stub.lock().await.workflows.len(), 1);
}

#[tokio::test]
async fn dot_segment_ids_are_rejected_locally() {
    let (store, stub) = store().await;
    let cancel = CancellationToken::new();
    for id in ["", ".", ".."] {
        assert_matches!(
            store.execute_workflow(id, &json!({}), &cancel).await,
            Err(ServiceError::Core(CoreError::Validation(_)))
        );
    }
    assert!(stub.lock().await.executions.is_empty());
}

// ---------------------------------------------------------------------------
// Test: status update keeps is_active in sync on the wire
// ---------------------------------------------------------------------------

#[tokio::test]
async fn status_patch_sends_is_active() {
    let (store, stub) = store().await;
    let cancel = CancellationToken::new();
    let id = store
        .create_workflow(&Workflow::new("Remote"), &cancel)
        .await
        .unwrap()
        .id
        .unwrap();

    let updated = store
        .update_workflow(&id, &WorkflowPatch::status(WorkflowStatus::Active), &cancel)
        .await
        .unwrap();
    assert!(updated.is_active());
    assert_eq!(stub.lock().await.workflows[&id]["is_active"], true);
}

// ---------------------------------------------------------------------------
// Test: execute posts the context and keeps extra fields as diagnostics
// ---------------------------------------------------------------------------

#[tokio::test]
async fn execute_posts_context() {
    let (store, stub) = store().await;
    let outcome = store
        .execute_workflow("wf_stub_9", &json!({"dealId": 3}), &CancellationToken::new())
        .await
        .unwrap();

    assert!(outcome.success);
    assert_eq!(outcome.diagnostics["run_id"], "run_1");
    assert_eq!(
        stub.lock().await.executions,
        vec![("wf_stub_9".to_string(), json!({"dealId": 3}))]
    );
}

// ---------------------------------------------------------------------------
// Test: validation is delegated to the collaborator
// ---------------------------------------------------------------------------

#[tokio::test]
async fn validate_is_delegated() {
    let (store, _) = store().await;
    let result = store
        .validate_workflow(&Workflow::new("x"), &CancellationToken::new())
        .await
        .unwrap();
    assert!(!result.is_valid);
    assert_eq!(result.errors, ["Remote validation rejected the workflow"]);
}

// ---------------------------------------------------------------------------
// Test: cancellation aborts an in-flight request
// ---------------------------------------------------------------------------

#[tokio::test]
async fn cancellation_aborts_slow_request() {
    let (store, _) = store().await;
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let result = store.get_workflow("slow", &cancel).await;
    assert_matches!(result, Err(ServiceError::Cancelled));
}

// ---------------------------------------------------------------------------
// Test: the builder works over HTTP too
// ---------------------------------------------------------------------------

#[tokio::test]
async fn builder_saves_and_activates_over_http() {
    let (store, stub) = store().await;
    let cancel = CancellationToken::new();
    let mut builder = WorkflowBuilder::new(store);
    build_lead_nurture(&mut builder);

    builder.save(&cancel).await.unwrap();
    builder.activate(&cancel).await.unwrap();
    let outcome = builder.execute(json!({"leadId": 5}), &cancel).await.unwrap();

    assert!(outcome.success);
    let stub = stub.lock().await;
    let stored = &stub.workflows["wf_stub_1"];
    assert_eq!(stored["status"], "active");
    assert_eq!(stored["trigger_type"], "Lead Score Changed");
    assert_eq!(stored["nodes"].as_array().unwrap().len(), 3);
}

#[tokio::test]
async fn shared_client_without_token_sends_no_auth() {
    let (api_url, stub) = spawn_stub().await;
    let store = HttpWorkflowStore::with_client(reqwest::Client::new(), format!("{api_url}/"));
    assert_eq!(store.api_url(), api_url);

    store
        .list_workflows(&CancellationToken::new())
        .await
        .unwrap();
    assert_eq!(stub.lock().await.authorization, None);
}
