//! Error type for `hds-webex`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// The token endpoint rejected the refresh grant.
  #[error("token refresh rejected ({status}): {body}")]
  Auth { status: u16, body: String },

  /// The token endpoint answered 2xx without a required field.
  #[error("token response is missing `{0}`")]
  MissingField(&'static str),

  /// The token endpoint answered 2xx with a field outside its usable range.
  #[error("token response has an unusable `{0}`")]
  InvalidField(&'static str),

  /// The people endpoint did not return the requested profile.
  #[error("profile lookup for {subject_id} failed ({status}): {body}")]
  Lookup {
    subject_id: String,
    status:     u16,
    body:       String,
  },

  /// Any other call answered with a non-success status.
  #[error("{method} {path} → {status}: {body}")]
  Status {
    method: &'static str,
    path:   String,
    status: u16,
    body:   String,
  },

  #[error("no bearer token configured for this client")]
  Unauthenticated,

  #[error("invalid base url {0:?}")]
  BaseUrl(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("json error: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Profile(#[from] hds_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
