//! Handlers for `/residents` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/residents` | Every resident |
//! | `POST`   | `/residents` | Body: [`ResidentInput`]; returns 201 + stored record |
//! | `GET`    | `/residents/{id}` | 404 if not found |
//! | `PUT`    | `/residents/{id}` | Body: [`ResidentInput`]; moves membership on `familyHeadId` change |
//! | `DELETE` | `/residents/{id}` | Removes the record and its membership entry |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use barangay_core::{
  KeyValueStore, Repository,
  record::{Resident, ResidentInput},
};
use serde_json::{Value, json};

use crate::error::ApiError;

/// `GET /residents`
pub async fn list<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<Vec<Resident>>, ApiError> {
  Ok(Json(repo.list_residents().await?))
}

/// `POST /residents`
pub async fn create<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  body: Result<Json<ResidentInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(input) = body?;
  let resident = repo.create_resident(input).await?;
  Ok((StatusCode::CREATED, Json(resident)))
}

/// `GET /residents/{id}`
pub async fn get_one<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
) -> Result<Json<Resident>, ApiError> {
  Ok(Json(repo.get_resident(&id).await?))
}

/// `PUT /residents/{id}`
pub async fn update<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
  body: Result<Json<ResidentInput>, JsonRejection>,
) -> Result<Json<Resident>, ApiError> {
  let Json(input) = body?;
  Ok(Json(repo.update_resident(&id, input).await?))
}

/// `DELETE /residents/{id}`
pub async fn delete<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
  repo.delete_resident(&id).await?;
  Ok(Json(json!({ "message": "Resident deleted successfully" })))
}
