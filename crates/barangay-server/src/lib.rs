//! HTTP server for barangay records.
//!
//! Mounts [`barangay_api`] under `/api` behind bearer-token authentication,
//! adds the `/api/auth` endpoints, and wraps everything in request tracing.

pub mod auth;
pub mod error;
pub mod users;

pub use error::{Error, Result};

use std::{path::PathBuf, sync::Arc};

use axum::{
  Json, Router, middleware,
  routing::{get, post},
};
use barangay_core::{KeyValueStore, Repository, repository::RepositoryOptions};
use serde::Deserialize;
use serde_json::{Value, json};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use auth::{TokenIssuer, require_auth};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Which [`KeyValueStore`] backs the server.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  #[default]
  Sqlite,
  /// Process-local; everything is lost on exit.
  Memory,
}

/// Runtime server configuration, deserialised from `config.toml` and
/// `BARANGAY_*` environment variables.
#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                   String,
  #[serde(default = "default_port")]
  pub port:                   u16,
  #[serde(default)]
  pub store:                  StoreBackend,
  #[serde(default = "default_store_path")]
  pub store_path:             PathBuf,
  pub jwt_secret:             String,
  #[serde(default = "default_jwt_expiry_secs")]
  pub jwt_expiry_secs:        u64,
  #[serde(default = "default_admin_username")]
  pub admin_username:         String,
  #[serde(default = "default_admin_name")]
  pub admin_name:             String,
  /// Argon2 PHC string for the seeded admin; see `--hash-password`.
  #[serde(default)]
  pub admin_password_hash:    Option<String>,
  #[serde(default = "enabled")]
  pub cascade_member_address: bool,
  #[serde(default = "enabled")]
  pub cors_permissive:        bool,
}

fn default_host() -> String { "127.0.0.1".to_owned() }
fn default_port() -> u16 { 5000 }
fn default_store_path() -> PathBuf { PathBuf::from("barangay.db") }
fn default_jwt_expiry_secs() -> u64 { 24 * 60 * 60 }
fn default_admin_username() -> String { "admin".to_owned() }
fn default_admin_name() -> String { "Juan Dela Cruz".to_owned() }
fn enabled() -> bool { true }

// ─── Application state ────────────────────────────────────────────────────────

/// Shared state threaded through the auth handlers and middleware.
pub struct AppState<S> {
  pub repo:   Repository<S>,
  pub tokens: Arc<TokenIssuer>,
  pub config: Arc<ServerConfig>,
}

impl<S> Clone for AppState<S> {
  fn clone(&self) -> Self {
    Self {
      repo:   self.repo.clone(),
      tokens: Arc::clone(&self.tokens),
      config: Arc::clone(&self.config),
    }
  }
}

impl<S: KeyValueStore> AppState<S> {
  /// Wire a store and configuration into server state.
  pub fn new(store: Arc<S>, config: ServerConfig) -> Result<Self> {
    let tokens = TokenIssuer::new(&config.jwt_secret, config.jwt_expiry_secs)?;
    let repo = Repository::new(store).with_options(RepositoryOptions {
      cascade_member_address: config.cascade_member_address,
    });
    Ok(Self {
      repo,
      tokens: Arc::new(tokens),
      config: Arc::new(config),
    })
  }
}

// ─── Router ───────────────────────────────────────────────────────────────────

/// Build the full application router.
pub fn router<S>(state: AppState<S>) -> Router
where
  S: KeyValueStore + 'static,
{
  let records = barangay_api::api_router(state.repo.clone())
    .layer(middleware::from_fn_with_state(state.clone(), require_auth::<S>));

  let auth = Router::new()
    .route("/auth/login",           post(users::login::<S>))
    .route("/auth/me",              get(users::me::<S>))
    .route("/auth/change-password", post(users::change_password::<S>))
    .with_state(state.clone());

  let app = Router::new()
    .route("/", get(welcome))
    .nest("/api", records.merge(auth))
    .layer(TraceLayer::new_for_http());

  if state.config.cors_permissive {
    app.layer(CorsLayer::permissive())
  } else {
    app
  }
}

async fn welcome() -> Json<Value> {
  Json(json!({ "message": "Welcome to Barangay Management System API" }))
}
