//! Error type for `hds-elastic`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  #[error("{method} {path} → {status}: {body}")]
  Status {
    method: &'static str,
    path:   String,
    status: u16,
    body:   String,
  },

  #[error("invalid base url {0:?}")]
  BaseUrl(String),

  #[error("http error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("malformed search response: {0}")]
  Json(#[from] serde_json::Error),

  #[error(transparent)]
  Profile(#[from] hds_core::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
