//! Access-token lifecycle: load at startup, refresh when stale, persist.

use std::sync::Arc;

use chrono::Duration;
use hds_core::{
  clock::Clock,
  credential::{Credential, RefreshGrant},
  store::{IdentityProvider, TokenStore},
};
use tracing::{error, info};

use crate::{Error, Result};

/// Owns the refresh grant and decides when the current credential must be
/// replaced.
pub struct TokenLifecycle<I, T> {
  identity: Arc<I>,
  store:    T,
  grant:    RefreshGrant,
  margin:   Duration,
  clock:    Arc<dyn Clock>,
}

impl<I, T> TokenLifecycle<I, T>
where
  I: IdentityProvider,
  T: TokenStore,
{
  pub fn new(
    identity: Arc<I>,
    store: T,
    grant: RefreshGrant,
    margin: Duration,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self { identity, store, grant, margin, clock }
  }

  pub fn store(&self) -> &T { &self.store }

  /// The persisted credential, if any. A missing store is `Ok(None)`; a
  /// corrupt one is an error.
  pub async fn load(&self) -> Result<Option<Credential>> {
    self.store.load().await.map_err(Error::token_store)
  }

  /// Return `current` if it is still valid, otherwise refresh, persist and
  /// return the replacement.
  ///
  /// A persist failure does not fail the call: the fresh credential is
  /// still usable, and the file is rewritten on the next refresh.
  pub async fn ensure_valid(&self, current: Option<&Credential>) -> Result<Credential> {
    let now = self.clock.now();
    match current {
      Some(c) if c.is_valid_at(now, self.margin) => return Ok(c.clone()),
      Some(c) => info!(expires_at = ?c.expires_at(), "access token is stale; refreshing"),
      None => info!("no access token; refreshing"),
    }

    let granted = self.identity.refresh(&self.grant).await.map_err(Error::auth)?;
    let fresh = Credential::issue(granted, now);

    match self.store.save(&fresh).await {
      Ok(()) => info!(expires_at = ?fresh.expires_at(), "refreshed access token"),
      Err(e) => error!(error = %e, "refreshed access token but could not persist it"),
    }
    Ok(fresh)
  }
}
