//! HTTP Basic-auth session extractor and standalone verifier.
//!
//! Answering is open to anonymous callers, who are subject to the quota.
//! Presenting credentials is optional, but wrong credentials are rejected.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::extract::FromRequestParts;
use axum::http::{HeaderMap, header, request::Parts};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as B64;

use crate::{AppState, AnswerStore, error::Error};

/// Credentials accepted as valid for this server instance.
#[derive(Clone)]
pub struct AuthConfig {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
}

/// Who is asking.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Session {
  Authenticated { username: String },
  Anonymous,
}

impl Session {
  pub fn is_authenticated(&self) -> bool {
    matches!(self, Session::Authenticated { .. })
  }
}

/// Verify an `Authorization: Basic` header; returns the username.
pub fn verify_auth(headers: &HeaderMap, config: &AuthConfig) -> Result<String, Error> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(Error::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(Error::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| Error::Unauthorized)?;
  let creds   = std::str::from_utf8(&decoded).map_err(|_| Error::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(Error::Unauthorized)?;

  if config.username.is_empty() || username != config.username {
    return Err(Error::Unauthorized);
  }

  let parsed_hash = PasswordHash::new(&config.password_hash)
    .map_err(|_| Error::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| Error::Unauthorized)?;

  Ok(username.to_owned())
}

impl<S> FromRequestParts<AppState<S>> for Session
where
  S: AnswerStore,
{
  type Rejection = Error;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &AppState<S>,
  ) -> Result<Self, Self::Rejection> {
    if !parts.headers.contains_key(header::AUTHORIZATION) {
      return Ok(Session::Anonymous);
    }
    let username = verify_auth(&parts.headers, &state.auth)?;
    Ok(Session::Authenticated { username })
  }
}
