//! Model (processor readiness) API handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use morphflux_core::{ProcessorDescriptor, ProcessorStatus};
use serde::Serialize;
use std::sync::Arc;

use crate::state::AppState;

/// Response for listing models
#[derive(Debug, Serialize)]
pub struct ListModelsResponse {
    pub models: Vec<ProcessorDescriptor>,
    pub device: String,
    pub ready: usize,
    pub total: usize,
}

/// Readiness of a single model
#[derive(Debug, Serialize)]
pub struct ModelStatusResponse {
    pub name: String,
    pub status: ProcessorStatus,
    pub ready: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ModelErrorResponse {
    pub error: String,
}

fn not_found(name: &str) -> (StatusCode, Json<ModelErrorResponse>) {
    (
        StatusCode::NOT_FOUND,
        Json(ModelErrorResponse {
            error: format!("Model not found: {}", name),
        }),
    )
}

/// List every known model with its readiness
pub async fn list_models(State(state): State<Arc<AppState>>) -> Json<ListModelsResponse> {
    let models = state.models();
    let descriptors = models.descriptors();
    Json(ListModelsResponse {
        device: models.device_hint().to_string(),
        ready: models.ready_count(),
        total: descriptors.len(),
        models: descriptors,
    })
}

/// Get one model's descriptor
pub async fn get_model(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ProcessorDescriptor>, (StatusCode, Json<ModelErrorResponse>)> {
    state
        .models()
        .descriptor(&name)
        .map(Json)
        .ok_or_else(|| not_found(&name))
}

/// Get one model's readiness
pub async fn get_model_status(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Result<Json<ModelStatusResponse>, (StatusCode, Json<ModelErrorResponse>)> {
    let descriptor = state
        .models()
        .descriptor(&name)
        .ok_or_else(|| not_found(&name))?;

    Ok(Json(ModelStatusResponse {
        ready: descriptor.status == ProcessorStatus::Ready,
        name: descriptor.name,
        status: descriptor.status,
    }))
}
