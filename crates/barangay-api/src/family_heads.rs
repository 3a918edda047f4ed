//! Handlers for `/familyHeads` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/familyHeads` | Every family head |
//! | `POST`   | `/familyHeads` | Body: [`FamilyHeadInput`]; returns 201 + stored record |
//! | `GET`    | `/familyHeads/{id}` | 404 if not found |
//! | `PUT`    | `/familyHeads/{id}` | Returns the record plus `memberUpdates` |
//! | `DELETE` | `/familyHeads/{id}` | 409 while the household has members |
//! | `GET`    | `/familyHeads/{id}/members` | Member residents, ordered by id |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use barangay_core::{
  KeyValueStore, Repository,
  record::{FamilyHead, FamilyHeadInput, Resident},
  repository::FamilyHeadUpdate,
};
use serde_json::{Value, json};

use crate::error::ApiError;

/// `GET /familyHeads`
pub async fn list<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
) -> Result<Json<Vec<FamilyHead>>, ApiError> {
  Ok(Json(repo.list_family_heads().await?))
}

/// `POST /familyHeads`
pub async fn create<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  body: Result<Json<FamilyHeadInput>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
  let Json(input) = body?;
  let family_head = repo.create_family_head(input).await?;
  Ok((StatusCode::CREATED, Json(family_head)))
}

/// `GET /familyHeads/{id}`
pub async fn get_one<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
) -> Result<Json<FamilyHead>, ApiError> {
  Ok(Json(repo.get_family_head(&id).await?))
}

/// `PUT /familyHeads/{id}`
pub async fn update<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
  body: Result<Json<FamilyHeadInput>, JsonRejection>,
) -> Result<Json<FamilyHeadUpdate>, ApiError> {
  let Json(input) = body?;
  Ok(Json(repo.update_family_head(&id, input).await?))
}

/// `DELETE /familyHeads/{id}`
pub async fn delete<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
) -> Result<Json<Value>, ApiError> {
  repo.delete_family_head(&id).await?;
  Ok(Json(json!({ "message": "Family head deleted successfully" })))
}

/// `GET /familyHeads/{id}/members`
pub async fn members<S: KeyValueStore>(
  State(repo): State<Repository<S>>,
  Path(id): Path<String>,
) -> Result<Json<Vec<Resident>>, ApiError> {
  Ok(Json(repo.family_members(&id).await?))
}
