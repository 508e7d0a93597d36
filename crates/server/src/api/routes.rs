use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::{handlers, middleware::metrics_middleware, models, transformations};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // API routes
    let api_routes = Router::new()
        // Health and config
        .route("/health", get(handlers::health))
        .route("/config", get(handlers::get_config))
        // Transformations
        .route("/transformations", get(transformations::list_transformations))
        .route("/transformations/process", post(transformations::process))
        .route(
            "/transformations/{id}/status",
            get(transformations::get_status),
        )
        .route(
            "/transformations/{id}/result",
            get(transformations::get_result),
        )
        // Models
        .route("/models", get(models::list_models))
        .route("/models/{name}", get(models::get_model))
        .route("/models/{name}/status", get(models::get_model_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/metrics", get(handlers::metrics))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
