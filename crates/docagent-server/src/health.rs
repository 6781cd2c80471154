// Health checks
//
// /liveness answers as long as the process serves HTTP. /readiness also
// requires a model deployment, since every run needs one.

use axum::{extract::State, http::StatusCode, routing::get, Json, Router};
use docagent_core::ChatAgent;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub version: String,
    /// Agent name
    pub agent: String,
    /// Model deployment; empty when not configured
    pub model: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CheckResponse {
    #[schema(example = "ready")]
    pub status: String,
}

#[derive(Clone)]
pub struct HealthState {
    pub agent: Arc<ChatAgent>,
}

pub fn routes(state: HealthState) -> Router {
    Router::new()
        .route("/liveness", get(liveness))
        .route("/readiness", get(readiness))
        .route("/health", get(health))
        .with_state(state)
}

/// GET /liveness - Process is serving
#[utoipa::path(
    get,
    path = "/liveness",
    responses((status = 200, description = "Alive", body = CheckResponse)),
    tag = "health"
)]
pub async fn liveness() -> Json<CheckResponse> {
    Json(CheckResponse {
        status: "alive".to_string(),
    })
}

/// GET /readiness - Agent can accept runs
#[utoipa::path(
    get,
    path = "/readiness",
    responses(
        (status = 200, description = "Ready", body = CheckResponse),
        (status = 503, description = "Model deployment not configured", body = CheckResponse)
    ),
    tag = "health"
)]
pub async fn readiness(State(state): State<HealthState>) -> (StatusCode, Json<CheckResponse>) {
    if state.agent.model().is_empty() {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            Json(CheckResponse {
                status: "not_configured".to_string(),
            }),
        );
    }
    (
        StatusCode::OK,
        Json(CheckResponse {
            status: "ready".to_string(),
        }),
    )
}

/// GET /health - Service summary
#[utoipa::path(
    get,
    path = "/health",
    responses((status = 200, description = "Service summary", body = HealthResponse)),
    tag = "health"
)]
pub async fn health(State(state): State<HealthState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        agent: state.agent.name().to_string(),
        model: state.agent.model().to_string(),
    })
}
