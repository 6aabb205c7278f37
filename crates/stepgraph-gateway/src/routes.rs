use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use tracing::{debug, info};

use stepgraph_core::types::{RunId, RunOutcome};

use crate::protocol::{
    ApiError, CreateGraphRequest, CreateGraphResponse, RunGraphRequest, StateResponse,
};
use crate::state::AppState;

// GET /health
pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

// POST /graph/create
pub async fn create_graph(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<CreateGraphRequest>, JsonRejection>,
) -> Result<Json<CreateGraphResponse>, ApiError> {
    let Json(req) = payload?;
    let graph_id = state.graphs.create_graph(req.config)?;
    Ok(Json(CreateGraphResponse { graph_id }))
}

// POST /graph/run: a failed run is still a 200 with status "failed"
pub async fn run_graph(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RunGraphRequest>, JsonRejection>,
) -> Result<Json<RunOutcome>, ApiError> {
    let Json(req) = payload?;
    info!(graph_id = %req.graph_id, keys = req.initial_state.len(), "Run requested");
    let outcome = state.executor.execute(&req.graph_id, req.initial_state).await?;
    Ok(Json(outcome))
}

// GET /graph/state/{run_id}
pub async fn get_state(
    State(state): State<Arc<AppState>>,
    Path(run_id): Path<String>,
) -> Result<Json<StateResponse>, ApiError> {
    debug!(run_id = %run_id, "State requested");
    let run = state.executor.run_state(&RunId::from_string(&run_id))?;
    Ok(Json(StateResponse {
        run_id: run.run_id,
        status: run.status,
        current_state: run.current_state,
    }))
}
