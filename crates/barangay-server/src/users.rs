//! User accounts and the `/auth` endpoints.
//!
//! Users are hashes at `user:<username>` with fields `username`, `password`
//! (an argon2 PHC string), `role` and `name`.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/auth/login` | Body: `{username, password}`; returns `{token, user}` |
//! | `GET`  | `/auth/me` | The caller's profile |
//! | `POST` | `/auth/change-password` | Body: `{currentPassword, newPassword}` |

use argon2::{
  Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString,
};
use axum::{
  Json,
  extract::{State, rejection::JsonRejection},
};
use barangay_core::{FieldError, FieldMap, KeyValueStore, keys};
use rand_core::OsRng;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{debug, info, warn};

use crate::{
  AppState, ServerConfig,
  auth::Authenticated,
  error::{Error, Result},
};

/// Minimum length accepted for a new password.
pub const MIN_PASSWORD_LEN: usize = 6;

// ─── Passwords ───────────────────────────────────────────────────────────────

/// Hash `password` into an argon2 PHC string with a fresh salt.
pub fn hash_password(password: &str) -> Result<String> {
  let salt = SaltString::generate(&mut OsRng);
  Argon2::default()
    .hash_password(password.as_bytes(), &salt)
    .map(|h| h.to_string())
    .map_err(|e| Error::PasswordHash(e.to_string()))
}

/// `false` for a wrong password and for a hash that does not parse.
pub fn verify_password(password: &str, phc: &str) -> bool {
  PasswordHash::new(phc)
    .and_then(|parsed| Argon2::default().verify_password(password.as_bytes(), &parsed))
    .is_ok()
}

// ─── Accounts ────────────────────────────────────────────────────────────────

/// A stored user, password hash included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
  pub username:      String,
  pub name:          String,
  pub role:          String,
  pub password_hash: String,
}

/// What clients see of a [`User`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Profile {
  pub username: String,
  pub name:     String,
  pub role:     String,
}

impl From<User> for Profile {
  fn from(u: User) -> Self {
    Self { username: u.username, name: u.name, role: u.role }
  }
}

pub async fn find_user<S: KeyValueStore>(store: &S, username: &str) -> Result<Option<User>> {
  let mut fields = store
    .hget_all(&keys::user(username))
    .await
    .map_err(Error::store)?;
  if fields.is_empty() {
    return Ok(None);
  }
  let mut take = |f: &str| fields.remove(f).unwrap_or_default();
  Ok(Some(User {
    username:      take("username"),
    name:          take("name"),
    role:          take("role"),
    password_hash: take("password"),
  }))
}

pub async fn put_user<S: KeyValueStore>(store: &S, user: &User) -> Result<()> {
  let fields: FieldMap = [
    ("username", &user.username),
    ("name", &user.name),
    ("role", &user.role),
    ("password", &user.password_hash),
  ]
  .into_iter()
  .map(|(k, v)| (k.to_owned(), v.clone()))
  .collect();
  store
    .hset_all(&keys::user(&user.username), &fields)
    .await
    .map_err(Error::store)
}

/// Create the configured admin account unless it already exists. Returns
/// `true` if it was created.
pub async fn seed_admin<S: KeyValueStore>(store: &S, config: &ServerConfig) -> Result<bool> {
  let Some(password_hash) = &config.admin_password_hash else {
    warn!("no admin_password_hash configured; admin account not seeded");
    return Ok(false);
  };

  let exists = store
    .exists(&keys::user(&config.admin_username))
    .await
    .map_err(Error::store)?;
  if exists {
    return Ok(false);
  }

  put_user(store, &User {
    username:      config.admin_username.clone(),
    name:          config.admin_name.clone(),
    role:          "admin".to_owned(),
    password_hash: password_hash.clone(),
  })
  .await?;
  info!(username = %config.admin_username, "created admin account");
  Ok(true)
}

fn required(errors: &mut Vec<FieldError>, field: &str, message: &str, value: &Option<String>) {
  if value.as_deref().is_none_or(|v| v.trim().is_empty()) {
    errors.push(FieldError::new(field, message));
  }
}

// ─── Login ───────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginBody {
  pub username: Option<String>,
  pub password: Option<String>,
}

/// `POST /auth/login`
pub async fn login<S: KeyValueStore>(
  State(state): State<AppState<S>>,
  body: Result<Json<LoginBody>, JsonRejection>,
) -> Result<Json<Value>> {
  let Json(body) = body?;

  let mut errors = Vec::new();
  required(&mut errors, "username", "Username is required", &body.username);
  required(&mut errors, "password", "Password is required", &body.password);
  let (Some(username), Some(password)) = (body.username, body.password) else {
    return Err(Error::Validation(errors));
  };
  if !errors.is_empty() {
    return Err(Error::Validation(errors));
  }

  let invalid = || Error::BadRequest("Invalid username or password".to_owned());
  let user = find_user(state.repo.store(), username.trim())
    .await?
    .ok_or_else(invalid)?;
  if !verify_password(&password, &user.password_hash) {
    return Err(invalid());
  }

  let token = state.tokens.issue(&user.username, &user.name, &user.role)?;
  debug!(username = %user.username, "issued token");
  Ok(Json(json!({ "token": token, "user": Profile::from(user) })))
}

// ─── Me ──────────────────────────────────────────────────────────────────────

/// `GET /auth/me`
pub async fn me<S: KeyValueStore>(
  State(state): State<AppState<S>>,
  Authenticated(claims): Authenticated,
) -> Result<Json<Profile>> {
  let user = find_user(state.repo.store(), &claims.username)
    .await?
    .ok_or(Error::NotFound("User not found"))?;
  Ok(Json(user.into()))
}

// ─── Change password ─────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordBody {
  pub current_password: Option<String>,
  pub new_password:     Option<String>,
}

/// `POST /auth/change-password`
pub async fn change_password<S: KeyValueStore>(
  State(state): State<AppState<S>>,
  Authenticated(claims): Authenticated,
  body: Result<Json<ChangePasswordBody>, JsonRejection>,
) -> Result<Json<Value>> {
  let Json(body) = body?;

  let mut errors = Vec::new();
  required(&mut errors, "currentPassword", "Current password is required", &body.current_password);
  let new_password = body.new_password.unwrap_or_default();
  if new_password.chars().count() < MIN_PASSWORD_LEN {
    errors.push(FieldError::new(
      "newPassword",
      "New password must be at least 6 characters long",
    ));
  }
  if !errors.is_empty() {
    return Err(Error::Validation(errors));
  }
  let current_password = body.current_password.unwrap_or_default();

  let store = state.repo.store();
  let user = find_user(store, &claims.username)
    .await?
    .ok_or(Error::NotFound("User not found"))?;
  if !verify_password(&current_password, &user.password_hash) {
    return Err(Error::BadRequest("Current password is incorrect".to_owned()));
  }

  let fields: FieldMap = [("password".to_owned(), hash_password(&new_password)?)].into();
  store
    .hset_all(&keys::user(&user.username), &fields)
    .await
    .map_err(Error::store)?;

  info!(username = %user.username, "password changed");
  Ok(Json(json!({ "message": "Password updated successfully" })))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn password_hash_round_trip() {
    let hash = hash_password("admin123").unwrap();
    assert!(hash.starts_with("$argon2"));
    assert!(verify_password("admin123", &hash));
    assert!(!verify_password("admin124", &hash));
  }

  #[test]
  fn unparseable_hash_never_verifies() {
    assert!(!verify_password("anything", "not-a-phc-string"));
    assert!(!verify_password("", ""));
  }
}
