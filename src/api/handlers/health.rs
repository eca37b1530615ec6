use crate::AppState;
use axum::{Json, extract::State, response::IntoResponse};
use serde::Serialize;
use utoipa::ToSchema;

#[derive(Serialize, ToSchema)]
pub struct HealthResponse {
    pub status: String,
    pub upload_root: String,
    pub version: String,
}

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "System health status", body = HealthResponse)
    ),
    tag = "system"
)]
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    // The root is created lazily by the first upload, so "missing" is not an error
    let upload_root = match tokio::fs::metadata(&state.config.upload_root).await {
        Ok(meta) if meta.is_dir() => "available",
        Ok(_) => "not a directory",
        Err(_) => "missing",
    };

    Json(HealthResponse {
        status: "ok".to_string(),
        upload_root: upload_root.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
