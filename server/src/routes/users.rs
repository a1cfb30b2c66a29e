//! User routes. Users are returned with their pets populated.

use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use kennel_engine::Record;
use serde_json::Value;

use super::extract::RecordIdPath;
use crate::error::Result;
use crate::handlers::{
    add_related, create_record, destroy_record, get_record, list_records, update_record,
    StatusResponse,
};
use crate::AppState;

const USER: &str = "user";
const POPULATE: &[&str] = &["pets"];

/// Create user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users", get(list_handler).post(create_handler))
        .route(
            "/users/{id}",
            get(get_handler).put(update_handler).delete(destroy_handler),
        )
        .route("/users/{id}/pets", post(add_pet_handler))
}

/// GET /users
async fn list_handler(State(state): State<AppState>) -> Result<Json<Vec<Record>>> {
    Ok(Json(list_records(&state.orm, USER, POPULATE).await?))
}

/// POST /users
async fn create_handler(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<Record>> {
    Ok(Json(create_record(&state.orm, USER, body).await?))
}

/// GET /users/{id}
async fn get_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<Record>> {
    Ok(Json(get_record(&state.orm, USER, id, POPULATE).await?))
}

/// PUT /users/{id}
async fn update_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
    Json(body): Json<Value>,
) -> Result<Json<Vec<Record>>> {
    Ok(Json(update_record(&state.orm, USER, id, body).await?))
}

/// DELETE /users/{id}
async fn destroy_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
) -> Result<Json<StatusResponse>> {
    Ok(Json(destroy_record(&state.orm, USER, id).await?))
}

/// POST /users/{id}/pets - join a pet id, `{id}` or a new pet payload.
async fn add_pet_handler(
    State(state): State<AppState>,
    RecordIdPath(id): RecordIdPath,
    Json(body): Json<Value>,
) -> Result<Json<Record>> {
    Ok(Json(add_related(&state.orm, USER, id, "pets", body).await?))
}
