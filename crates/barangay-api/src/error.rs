//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  extract::rejection::{JsonRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use barangay_core::{Error, record::RecordType};
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] Error),

  /// The request body or query string could not be parsed.
  #[error("bad request: {0}")]
  BadRequest(String),
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

fn not_found_message(kind: RecordType) -> &'static str {
  match kind {
    RecordType::Resident => "Resident not found",
    RecordType::FamilyHead => "Family head not found",
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match self {
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m),
      ApiError::Core(Error::Validation(errors)) => {
        return (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response();
      }
      ApiError::Core(Error::NotFound { kind, .. }) => {
        (StatusCode::NOT_FOUND, not_found_message(kind).to_owned())
      }
      ApiError::Core(Error::UnknownId(_)) => (StatusCode::NOT_FOUND, "Record not found".to_owned()),
      ApiError::Core(Error::Conflict(m)) => (StatusCode::CONFLICT, m),
      ApiError::Core(e @ (Error::Store(_) | Error::Corrupt { .. })) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "Server error".to_owned())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}
