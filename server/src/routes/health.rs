//! Health check and banner endpoints.

use axum::{routing::get, Json, Router};
use serde::Serialize;

use crate::AppState;

/// Health check response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

/// Create health routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health_check))
        .route("/", get(root))
}

/// Health check handler.
async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Root handler.
async fn root() -> &'static str {
    "Kennel Server\n\n\
     Users are stored on disk and pets in PostgreSQL.\n\
     GET/POST /users, GET/PUT/DELETE /users/{id}, POST /users/{id}/pets\n\
     GET/POST /pets, GET/PUT/DELETE /pets/{id}\n\
     GET /connect_pets joins user 1 to pets 1 and 2, and user 2 to pet 2.\n"
}
