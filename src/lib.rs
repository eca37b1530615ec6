pub mod api;
pub mod config;
pub mod models;
pub mod services;
pub mod utils;

use crate::config::UploadConfig;
use crate::services::coordinator::UploadCoordinator;
use axum::{
    Json, Router,
    extract::DefaultBodyLimit,
    middleware::from_fn,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    paths(
        api::handlers::upload::upload_files,
        api::handlers::health::health_check,
    ),
    components(
        schemas(
            api::handlers::health::HealthResponse,
        )
    ),
    tags(
        (name = "upload", description = "Multi-file upload endpoint"),
        (name = "system", description = "Service status")
    )
)]
pub struct ApiDoc;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<UploadConfig>,
    pub coordinator: Arc<UploadCoordinator>,
}

impl AppState {
    pub fn new(config: UploadConfig) -> Self {
        let config = Arc::new(config);
        let coordinator = Arc::new(UploadCoordinator::new(config.clone()));
        Self {
            config,
            coordinator,
        }
    }
}

pub fn create_app(state: AppState) -> Router {
    let body_limit = state.config.body_limit();
    let uploads = ServeDir::new(&state.config.upload_root);

    Router::new()
        .route(
            "/upload",
            post(api::handlers::upload::upload_files).layer(DefaultBodyLimit::max(body_limit)),
        )
        .route("/health", get(api::handlers::health::health_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
        .nest_service("/uploads", uploads)
        .layer(from_fn(api::middleware::request_id::request_id_middleware))
        .with_state(state)
}
