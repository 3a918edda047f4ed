//! Error types for `barangay-core`.

use serde::Serialize;
use thiserror::Error;

use crate::record::RecordType;

/// A single rejected input field.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FieldError {
  /// The camelCase field name as it appears on the wire.
  pub field:   String,
  pub message: String,
}

impl FieldError {
  pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
    Self { field: field.into(), message: message.into() }
  }
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {}", summarize(.0))]
  Validation(Vec<FieldError>),

  #[error("{kind} not found: {id}")]
  NotFound { kind: RecordType, id: String },

  /// An identifier with neither the resident nor the family head prefix.
  #[error("no record with id {0}")]
  UnknownId(String),

  #[error("conflict: {0}")]
  Conflict(String),

  /// A stored hash that does not decode into a typed record.
  #[error("corrupt record at {key}: {reason}")]
  Corrupt { key: String, reason: String },

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  pub fn not_found(kind: RecordType, id: impl Into<String>) -> Self {
    Self::NotFound { kind, id: id.into() }
  }

  /// Wrap a backend error.
  pub fn store<E>(e: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(e))
  }
}

fn summarize(errors: &[FieldError]) -> String {
  errors
    .iter()
    .map(|e| format!("{}: {}", e.field, e.message))
    .collect::<Vec<_>>()
    .join("; ")
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
