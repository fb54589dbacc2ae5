//! `crmflow-check <workflow.json>`: validate a workflow document offline and
//! print the validation report plus the dry-run execution plan.

use std::process::ExitCode;

use anyhow::Context;
use serde_json::json;

use crmflow_core::workflow::{validate_workflow, ExecutionPlan, NodeTypeRegistry, Workflow};
use crmflow_service::telemetry;

fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    telemetry::init_tracing("crmflow_service=info,crmflow_core=info");

    let Some(path) = std::env::args().nth(1) else {
        eprintln!("usage: crmflow-check <workflow.json>");
        return ExitCode::FAILURE;
    };

    match run(&path) {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            tracing::error!(path = %path, "{e:#}");
            ExitCode::FAILURE
        }
    }
}

/// Returns whether the workflow is valid.
fn run(path: &str) -> anyhow::Result<bool> {
    let raw = std::fs::read_to_string(path).with_context(|| format!("reading {path}"))?;
    let workflow: Workflow =
        serde_json::from_str(&raw).with_context(|| format!("parsing {path} as a workflow"))?;

    let validation = validate_workflow(&workflow, &NodeTypeRegistry::default());
    let plan = ExecutionPlan::for_workflow(&workflow).ok();

    let report = json!({
        "workflow": workflow.name,
        "validation": validation,
        "plan": plan.as_ref().map(|p| &p.order),
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    tracing::info!(
        nodes = workflow.nodes.len(),
        errors = validation.errors.len(),
        "Checked workflow"
    );
    Ok(validation.is_valid)
}
