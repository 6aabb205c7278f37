use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use stepgraph_core::types::{GraphId, RunId, RunStatus, State};
use stepgraph_core::{GraphDefinition, StepGraphError};

/// Body of `POST /graph/create`.
#[derive(Debug, Deserialize)]
pub struct CreateGraphRequest {
    pub config: GraphDefinition,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateGraphResponse {
    pub graph_id: GraphId,
}

/// Body of `POST /graph/run`.
#[derive(Debug, Deserialize)]
pub struct RunGraphRequest {
    pub graph_id: GraphId,
    #[serde(default)]
    pub initial_state: State,
}

/// Body of `GET /graph/state/{run_id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct StateResponse {
    pub run_id: RunId,
    pub status: RunStatus,
    pub current_state: State,
}

/// Error envelope shared by every non-2xx response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub error: String,
    pub message: String,
    #[serde(default)]
    pub details: Value,
}

/// Failure of a route, rendered as an `ErrorBody`.
pub enum ApiError {
    Engine(StepGraphError),
    BadRequest(JsonRejection),
}

impl From<StepGraphError> for ApiError {
    fn from(e: StepGraphError) -> Self {
        ApiError::Engine(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(e: JsonRejection) -> Self {
        ApiError::BadRequest(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match self {
            ApiError::Engine(e) => (status_for(&e), engine_error_body(&e)),
            ApiError::BadRequest(rejection) => (
                rejection.status(),
                ErrorBody {
                    error: "RequestValidationError".to_string(),
                    message: rejection.body_text(),
                    details: json!({}),
                },
            ),
        };
        (status, Json(body)).into_response()
    }
}

fn status_for(e: &StepGraphError) -> StatusCode {
    match e {
        StepGraphError::GraphNotFound(_) | StepGraphError::RunNotFound(_) => StatusCode::NOT_FOUND,
        StepGraphError::Validation { .. } | StepGraphError::Serialization(_) => {
            StatusCode::BAD_REQUEST
        }
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

fn engine_error_body(e: &StepGraphError) -> ErrorBody {
    let details = match e {
        StepGraphError::GraphNotFound(id) => json!({ "graph_id": id }),
        StepGraphError::RunNotFound(id) => json!({ "run_id": id }),
        StepGraphError::Validation { errors } => json!({ "errors": errors }),
        StepGraphError::ToolNotFound(name) => json!({ "tool_name": name }),
        StepGraphError::LoopLimitExceeded {
            node,
            max_iterations,
        } => json!({ "node": node, "max_iterations": max_iterations }),
        StepGraphError::NodeExecution { node, message } => {
            json!({ "node": node, "original_error": message })
        }
        _ => json!({}),
    };
    ErrorBody {
        error: e.kind().to_string(),
        message: e.to_string(),
        details,
    }
}
