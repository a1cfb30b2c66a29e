//! Request extractors shared by the routes.

use axum::{
    extract::{FromRequestParts, Path},
    http::request::Parts,
};
use kennel_engine::RecordId;

use crate::error::AppError;

/// The `{id}` segment of a record route.
///
/// A segment that is not an integer is rejected with the JSON error body
/// instead of axum's plain-text rejection.
#[derive(Debug, Clone, Copy)]
pub struct RecordIdPath(pub RecordId);

impl<S: Send + Sync> FromRequestParts<S> for RecordIdPath {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<RecordId>::from_request_parts(parts, state)
            .await
            .map_err(|rejection| AppError::BadRequest(rejection.body_text()))?;
        Ok(RecordIdPath(id))
    }
}
