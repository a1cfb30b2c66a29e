//! Pet routes and the demo join endpoint.

use axum::{
    extract::State,
    routing::get,
    Json, Router,
};
use kennel_engine::Record;
use serde_json::Value;

use super::extract::RecordIdPath;
use crate::error::Result;
use crate::handlers::{
    connect_pets, create_record, destroy_record, get_record, list_records, update_record,
    StatusResponse,
};
use crate::AppState;

const PET: &str = "pet";

/// Create pet routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/pets", get(list_handler).post(create_handler))
        .route(
            "/pets/{id}",
            get(get_handler).put(update_handler).delete(destroy_handler),
        )
        .route("/connect_pets", get(connect_handler))
}

/// GET /pets
async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    Ok(Json(list_records(&state.orm, PET, &[]).await?))
}

/// POST /pets
async fn create_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Record>> {
    Ok(Json(create_record(&state.orm, PET, body).await?))
}

/// GET /pets/{id}
async fn get_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<Record>> {
    Ok(Json(get_record(&state.orm, PET, id, &[]).await?))
}

/// PUT /pets/{id}
async fn update_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Record>>> {
    Ok(Json(update_record(&state.orm, PET, id, body).await?))
}

/// DELETE /pets/{id}
async fn destroy_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<StatusResponse>> {
    Ok(Json(destroy_record(&state.orm, PET, id).await?))
}

/// GET /connect_pets
async fn connect_handler(State(state): State<AppState>) -> Result<Json<StatusResponse>> {
    Ok(Json(connect_pets(&state.orm).await?))
}
