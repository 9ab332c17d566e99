//! Error taxonomy of the enrichment loop.
//!
//! Collaborator errors are boxed so the loop stays generic over backends.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Error)]
pub enum Error {
  /// The identity provider refused or failed a token refresh.
  #[error("credential refresh failed: {0}")]
  Auth(#[source] BoxError),

  /// A remote profile lookup failed; the record stays unenriched.
  #[error("profile lookup for {subject_id} failed: {source}")]
  Lookup {
    subject_id: String,
    #[source]
    source:     BoxError,
  },

  /// A search or update against the record store failed.
  #[error("record store error: {0}")]
  Store(#[source] BoxError),

  /// The persisted credential could not be read or written.
  #[error("token store error: {0}")]
  TokenStore(#[source] BoxError),
}

impl Error {
  pub(crate) fn auth(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Auth(Box::new(e))
  }

  pub(crate) fn store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::Store(Box::new(e))
  }

  pub(crate) fn token_store(e: impl std::error::Error + Send + Sync + 'static) -> Self {
    Self::TokenStore(Box::new(e))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
