//! Shared fixtures for the service integration tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::sync::Mutex;

use crmflow_core::types::Record;
use crmflow_core::workflow::{NodePatch, NodeType};
use crmflow_service::{WorkflowBuilder, WorkflowStore};

// ---------------------------------------------------------------------------
// Builder fixtures
// ---------------------------------------------------------------------------

pub fn config(value: Value) -> NodePatch {
    NodePatch::config(value.as_object().cloned().unwrap_or_else(Record::new))
}

/// Fill `builder` with a valid trigger -> condition -> send email graph.
pub fn build_lead_nurture<S: WorkflowStore>(builder: &mut WorkflowBuilder<S>) {
    builder.set_name("Lead nurture");
    builder.set_category("Sales");
    let trigger = builder.add_node(NodeType::Trigger).unwrap();
    let condition = builder.add_node(NodeType::Condition).unwrap();
    let email = builder.add_node(NodeType::Action).unwrap();
    builder
        .update_node(&trigger, config(json!({"triggerType": "Lead Score Changed"})))
        .unwrap();
    builder
        .update_node(
            &condition,
            config(json!({"conditionType": "Lead Score", "operator": "greater_than", "value": 70})),
        )
        .unwrap();
    builder
        .update_node(
            &email,
            config(json!({"actionType": "Send Email", "template": "hot-lead"})),
        )
        .unwrap();
    builder.connect_nodes(&trigger, &condition).unwrap();
    builder.connect_nodes(&condition, &email).unwrap();
}

// ---------------------------------------------------------------------------
// Stub collaborator
// ---------------------------------------------------------------------------

/// What the stub has seen and stored.
#[derive(Default)]
pub struct StubState {
    pub workflows: HashMap<String, Value>,
    pub executions: Vec<(String, Value)>,
    pub authorization: Option<String>,
    next_id: u32,
}

pub type SharedStub = Arc<Mutex<StubState>>;

/// Start the stub on an ephemeral port. Returns the base URL and the state.
pub async fn spawn_stub() -> (String, SharedStub) {
    let state: SharedStub = Arc::default();
    let app = Router::new()
        .route("/api/v1/workflows", get(list).post(create))
        .route("/api/v1/workflows/validate", post(validate))
        .route(
            "/api/v1/workflows/{id}",
            get(fetch).put(update).delete(remove),
        )
        .route("/api/v1/workflows/{id}/execute", post(execute))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (format!("http://{addr}/api/v1"), state)
}

fn remember_auth(stub: &mut StubState, headers: &HeaderMap) {
    stub.authorization = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
}

fn not_found(id: &str) -> axum::response::Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"error": format!("workflow {id} not found")})),
    )
        .into_response()
}

async fn list(State(state): State<SharedStub>, headers: HeaderMap) -> impl IntoResponse {
    let mut stub = state.lock().await;
    remember_auth(&mut stub, &headers);
    let data: Vec<Value> = stub.workflows.values().cloned().collect();
    Json(json!({ "data": data }))
}

async fn create(State(state): State<SharedStub>, Json(mut body): Json<Value>) -> impl IntoResponse {
    let mut stub = state.lock().await;
    stub.next_id += 1;
    let id = format!("wf_stub_{}", stub.next_id);
    body["id"] = json!(id);
    body["created_at"] = json!("2026-01-01T00:00:00Z");
    body["updated_at"] = json!("2026-01-01T00:00:00Z");
    stub.workflows.insert(id, body.clone());
    (StatusCode::CREATED, Json(json!({ "data": body })))
}

async fn fetch(State(state): State<SharedStub>, Path(id): Path<String>) -> axum::response::Response {
    if id == "slow" {
        tokio::time::sleep(Duration::from_secs(30)).await;
    }
    let stub = state.lock().await;
    match stub.workflows.get(&id) {
        Some(wf) => Json(json!({ "data": wf })).into_response(),
        None => not_found(&id),
    }
}

async fn update(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
    Json(patch): Json<Value>,
) -> axum::response::Response {
    let mut stub = state.lock().await;
    let Some(wf) = stub.workflows.get_mut(&id) else {
        return not_found(&id);
    };
    if let (Some(target), Some(fields)) = (wf.as_object_mut(), patch.as_object()) {
        for (key, value) in fields {
            target.insert(key.clone(), value.clone());
        }
    }
    Json(json!({ "data": wf })).into_response()
}

async fn remove(State(state): State<SharedStub>, Path(id): Path<String>) -> axum::response::Response {
    let mut stub = state.lock().await;
    match stub.workflows.remove(&id) {
        Some(_) => StatusCode::NO_CONTENT.into_response(),
        None => not_found(&id),
    }
}

async fn execute(
    State(state): State<SharedStub>,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> impl IntoResponse {
    let mut stub = state.lock().await;
    stub.executions.push((id, body["context"].clone()));
    Json(json!({ "data": { "success": true, "run_id": "run_1" } }))
}

async fn validate(Json(_body): Json<Value>) -> impl IntoResponse {
    Json(json!({ "data": { "is_valid": false, "errors": ["Remote validation rejected the workflow"] } }))
}
