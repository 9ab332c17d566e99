//! Error types for `hds-core`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// A remote payload did not match the expected schema.
  #[error("malformed {what}: {reason}")]
  Parse { what: &'static str, reason: String },

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  pub fn parse(what: &'static str, reason: impl Into<String>) -> Self {
    Self::Parse { what, reason: reason.into() }
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
