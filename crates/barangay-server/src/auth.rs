//! Bearer-token authentication: HS256 JWT issuing, verification, the
//! [`Authenticated`] extractor and the [`require_auth`] middleware.

use axum::{
  extract::{FromRequestParts, Request, State},
  http::{HeaderMap, header, request::Parts},
  middleware::Next,
  response::Response,
};
use barangay_core::KeyValueStore;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};
use serde::{Deserialize, Serialize};

use crate::{
  AppState,
  error::{Error, Result},
};

/// Payload carried by every issued token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
  pub username: String,
  pub name:     String,
  pub role:     String,
  /// Issued at, seconds since the Unix epoch.
  pub iat:      u64,
  /// Expiry, seconds since the Unix epoch.
  pub exp:      u64,
}

/// Signs and verifies session tokens with one shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
  encoding:    EncodingKey,
  decoding:    DecodingKey,
  validation:  Validation,
  expiry_secs: u64,
}

impl TokenIssuer {
  pub fn new(secret: &str, expiry_secs: u64) -> Result<Self> {
    if secret.is_empty() {
      return Err(Error::EmptySecret);
    }
    Ok(Self {
      encoding: EncodingKey::from_secret(secret.as_bytes()),
      decoding: DecodingKey::from_secret(secret.as_bytes()),
      validation: Validation::default(),
      expiry_secs,
    })
  }

  /// Issue a token for the given user, valid from now.
  pub fn issue(&self, username: &str, name: &str, role: &str) -> Result<String> {
    let now = jsonwebtoken::get_current_timestamp();
    let claims = Claims {
      username: username.to_owned(),
      name:     name.to_owned(),
      role:     role.to_owned(),
      iat:      now,
      exp:      now + self.expiry_secs,
    };
    Ok(jsonwebtoken::encode(&Header::default(), &claims, &self.encoding)?)
  }

  pub fn verify(&self, token: &str) -> Result<Claims> {
    jsonwebtoken::decode::<Claims>(token, &self.decoding, &self.validation)
      .map(|data| data.claims)
      .map_err(|e| match e.kind() {
        ErrorKind::ExpiredSignature => Error::Unauthorized("Token expired"),
        _ => Error::Unauthorized("Invalid token"),
      })
  }

  /// Verify the `Authorization: Bearer <token>` header.
  pub fn verify_headers(&self, headers: &HeaderMap) -> Result<Claims> {
    let token = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .and_then(|v| v.strip_prefix("Bearer "))
      .map(str::trim)
      .filter(|t| !t.is_empty())
      .ok_or(Error::Unauthorized("Access denied. No token provided."))?;
    self.verify(token)
  }
}

/// The verified claims of the caller; rejects the request with 401 otherwise.
pub struct Authenticated(pub Claims);

impl<S: KeyValueStore> FromRequestParts<AppState<S>> for Authenticated {
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if let Some(claims) = parts.extensions.get::<Claims>() {
      return Ok(Self(claims.clone()));
    }
    state.tokens.verify_headers(&parts.headers).map(Self)
  }
}

/// Middleware guarding every route of the records API.
pub async fn require_auth<S: KeyValueStore>(
  State(state): State<AppState<S>>,
  mut req: Request,
  next: Next,
) -> Result<Response> {
  let claims = state.tokens.verify_headers(req.headers())?;
  req.extensions_mut().insert(claims);
  Ok(next.run(req).await)
}

#[cfg(test)]
mod tests {
  use super::*;
  use axum::http::HeaderValue;

  fn issuer() -> TokenIssuer { TokenIssuer::new("test-secret", 3600).unwrap() }

  fn bearer(token: &str) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
      header::AUTHORIZATION,
      HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
    );
    headers
  }

  #[test]
  fn issued_token_verifies() {
    let tokens = issuer();
    let token = tokens.issue("admin", "Juan Dela Cruz", "admin").unwrap();
    let claims = tokens.verify_headers(&bearer(&token)).unwrap();
    assert_eq!(claims.username, "admin");
    assert_eq!(claims.role, "admin");
    assert_eq!(claims.exp - claims.iat, 3600);
  }

  #[test]
  fn token_from_another_secret_is_rejected() {
    let other = TokenIssuer::new("other-secret", 3600).unwrap();
    let token = other.issue("admin", "Juan Dela Cruz", "admin").unwrap();
    assert!(matches!(issuer().verify(&token), Err(Error::Unauthorized("Invalid token"))));
  }

  #[test]
  fn expired_token_is_rejected() {
    let tokens = issuer();
    let now = jsonwebtoken::get_current_timestamp();
    let claims = Claims {
      username: "admin".into(),
      name:     "Juan Dela Cruz".into(),
      role:     "admin".into(),
      iat:      now - 7200,
      exp:      now - 3600,
    };
    let token = jsonwebtoken::encode(&Header::default(), &claims, &tokens.encoding).unwrap();
    assert!(matches!(tokens.verify(&token), Err(Error::Unauthorized("Token expired"))));
  }

  #[test]
  fn missing_or_non_bearer_header_is_rejected() {
    let tokens = issuer();
    assert!(matches!(tokens.verify_headers(&HeaderMap::new()), Err(Error::Unauthorized(_))));

    let mut basic = HeaderMap::new();
    basic.insert(header::AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwYXNz"));
    assert!(matches!(tokens.verify_headers(&basic), Err(Error::Unauthorized(_))));
  }

  #[test]
  fn empty_secret_is_refused() {
    assert!(matches!(TokenIssuer::new("", 60), Err(Error::EmptySecret)));
  }
}
