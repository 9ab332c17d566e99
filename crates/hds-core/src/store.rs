//! The seam traits between the enrichment loop and its collaborators.
//!
//! Each trait is implemented by a backend crate (`hds-token-file`,
//! `hds-webex`, `hds-elastic`) and by the in-memory fakes in
//! [`crate::memory`].
//!
//! All methods return `Send` futures so implementations can be driven from a
//! multi-threaded tokio runtime.

use std::future::Future;

use crate::{
  credential::{AccessGrant, Credential, RefreshGrant},
  profile::SubjectProfile,
  record::{PendingBatch, PendingQuery, RecordId},
};

// ─── TokenStore ──────────────────────────────────────────────────────────────

/// Durable home of the current [`Credential`]. Pure data access.
pub trait TokenStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Read the persisted credential. A store that has never been written
  /// returns `Ok(None)`; a corrupt one returns an error.
  fn load(
    &self,
  ) -> impl Future<Output = Result<Option<Credential>, Self::Error>> + Send + '_;

  /// Replace the persisted credential entirely.
  fn save<'a>(
    &'a self,
    credential: &'a Credential,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}

// ─── IdentityProvider ────────────────────────────────────────────────────────

/// The remote authority for subject profiles.
pub trait IdentityProvider: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Exchange a refresh grant for a new access token.
  fn refresh<'a>(
    &'a self,
    grant: &'a RefreshGrant,
  ) -> impl Future<Output = Result<AccessGrant, Self::Error>> + Send + 'a;

  /// Look up one subject's profile using `bearer_token`.
  fn fetch_profile<'a>(
    &'a self,
    subject_id: &'a str,
    bearer_token: &'a str,
  ) -> impl Future<Output = Result<SubjectProfile, Self::Error>> + Send + 'a;
}

// ─── RecordStore ─────────────────────────────────────────────────────────────

/// The searchable store holding audit records.
pub trait RecordStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// Records matching `query` that still need enrichment.
  fn find_pending<'a>(
    &'a self,
    query: &'a PendingQuery,
  ) -> impl Future<Output = Result<PendingBatch, Self::Error>> + Send + 'a;

  /// A profile previously attached to any record for `subject_id`.
  ///
  /// Zero matches is `Ok(None)`, not an error. With several matches the
  /// first one wins.
  fn find_cached_profile<'a>(
    &'a self,
    query: &'a PendingQuery,
    subject_id: &'a str,
  ) -> impl Future<Output = Result<Option<SubjectProfile>, Self::Error>> + Send + 'a;

  /// Merge `profile` into one record under the profile field, leaving the
  /// rest of the document untouched.
  fn attach_profile<'a>(
    &'a self,
    query: &'a PendingQuery,
    record: &'a RecordId,
    profile: &'a SubjectProfile,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + 'a;
}
