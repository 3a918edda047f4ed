//! Error types and axum `IntoResponse` implementation.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use barangay_core::FieldError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Missing, malformed or expired bearer token.
  #[error("unauthorized: {0}")]
  Unauthorized(&'static str),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("validation failed")]
  Validation(Vec<FieldError>),

  #[error("not found: {0}")]
  NotFound(&'static str),

  #[error("jwt secret must not be empty")]
  EmptySecret,

  #[error("token error: {0}")]
  Token(#[from] jsonwebtoken::errors::Error),

  #[error("password hash error: {0}")]
  PasswordHash(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

impl From<JsonRejection> for Error {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for Error {
  fn into_response(self) -> Response {
    match self {
      Error::Unauthorized(msg) => {
        let mut res = (StatusCode::UNAUTHORIZED, Json(json!({ "error": msg }))).into_response();
        res.headers_mut().insert(
          header::WWW_AUTHENTICATE,
          HeaderValue::from_static("Bearer realm=\"barangay\""),
        );
        res
      }
      Error::BadRequest(msg) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "error": msg }))).into_response()
      }
      Error::Validation(errors) => {
        (StatusCode::BAD_REQUEST, Json(json!({ "errors": errors }))).into_response()
      }
      Error::NotFound(msg) => {
        (StatusCode::NOT_FOUND, Json(json!({ "error": msg }))).into_response()
      }
      e @ (Error::EmptySecret | Error::Token(_) | Error::PasswordHash(_) | Error::Store(_)) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, Json(json!({ "error": "Server error" })))
          .into_response()
      }
    }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
