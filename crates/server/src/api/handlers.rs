use std::collections::BTreeMap;
use std::sync::Arc;

use axum::{
    extract::State,
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use morphflux_core::{ProcessorStatus, SanitizedConfig};
use serde::Serialize;

use crate::metrics::{collect_dynamic_metrics, encode_metrics};
use crate::state::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub models: BTreeMap<String, ProcessorStatus>,
    pub accepting: bool,
    pub in_flight: usize,
    pub version: String,
}

pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    let orchestrator = state.orchestrator().status();
    Json(HealthResponse {
        status: "healthy".to_string(),
        models: state.models().status(),
        accepting: orchestrator.accepting,
        in_flight: orchestrator.in_flight,
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

pub async fn get_config(State(state): State<Arc<AppState>>) -> Json<SanitizedConfig> {
    Json(state.sanitized_config())
}

/// Prometheus scrape endpoint
pub async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    collect_dynamic_metrics(&state);
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        encode_metrics(),
    )
}
