//! The polling loop that enriches pending audit records.
//!
//! Each iteration first makes sure a usable access token is held, then, if
//! the poll interval has elapsed, runs one enrichment pass: search for
//! pending records and, for every record with a subject id, look for a
//! profile already in the store before asking the identity provider. The
//! resolved profile is written onto that one record only.
//!
//! Identical subject ids within a pass are not de-duplicated. Two pending
//! records for the same uncached subject both go to the identity provider.

use std::{future::Future, sync::Arc, time::Duration as StdDuration};

use chrono::{DateTime, Duration, Utc};
use hds_core::{
  clock::Clock,
  credential::Credential,
  record::{PendingBatch, PendingQuery, PendingRecord},
  store::{IdentityProvider, RecordStore, TokenStore},
};
use tracing::{debug, info, warn};

use crate::{Error, Result, backoff::Backoff, lifecycle::TokenLifecycle};

// ─── Settings and state ──────────────────────────────────────────────────────

/// Immutable loop parameters.
#[derive(Debug, Clone)]
pub struct EnricherSettings {
  pub query:             PendingQuery,
  /// Minimum time between two enrichment passes.
  pub poll_interval:     Duration,
  /// Sleep between loop iterations.
  pub tick_interval:     StdDuration,
  pub auth_backoff_base: Duration,
  pub auth_backoff_max:  Duration,
}

impl Default for EnricherSettings {
  fn default() -> Self {
    Self {
      query:             PendingQuery::default(),
      poll_interval:     Duration::seconds(10),
      tick_interval:     StdDuration::from_secs(1),
      auth_backoff_base: Duration::seconds(5),
      auth_backoff_max:  Duration::seconds(300),
    }
  }
}

/// Everything the loop mutates between iterations.
#[derive(Debug, Clone)]
pub struct LoopState {
  pub credential:   Option<Credential>,
  /// When the last successful pending-record query returned.
  pub last_poll:    DateTime<Utc>,
  pub auth_backoff: Backoff,
}

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Per-pass counters, for logging only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
  /// Matches reported by the store.
  pub total:          u64,
  /// Records examined in this pass.
  pub scanned:        usize,
  /// Records that received a profile.
  pub updated:        usize,
  /// Records with no usable subject id.
  pub skipped:        usize,
  pub cache_hits:     usize,
  pub remote_fetches: usize,
  /// Records left unenriched because a lookup or write failed.
  pub failed:         usize,
}

/// What a single loop iteration did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Tick {
  /// Credential valid, poll not yet due.
  Idle,
  /// A previous refresh failed and its retry delay has not elapsed.
  AuthDeferred,
  /// The refresh attempted in this iteration failed.
  AuthFailed,
  /// The pending-record query failed; the poll will be retried next tick.
  PollFailed,
  Polled(PassReport),
}

/// Where a record's profile came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resolution {
  Skipped,
  Cached,
  Fetched,
}

// ─── Enricher ────────────────────────────────────────────────────────────────

pub struct Enricher<R, I, T> {
  records:  R,
  identity: Arc<I>,
  tokens:   TokenLifecycle<I, T>,
  settings: EnricherSettings,
  clock:    Arc<dyn Clock>,
}

impl<R, I, T> Enricher<R, I, T>
where
  R: RecordStore,
  I: IdentityProvider,
  T: TokenStore,
{
  pub fn new(
    records: R,
    identity: Arc<I>,
    tokens: TokenLifecycle<I, T>,
    settings: EnricherSettings,
    clock: Arc<dyn Clock>,
  ) -> Self {
    Self { records, identity, tokens, settings, clock }
  }

  pub fn settings(&self) -> &EnricherSettings { &self.settings }

  pub fn records(&self) -> &R { &self.records }

  pub fn tokens(&self) -> &TokenLifecycle<I, T> { &self.tokens }

  /// Initial loop state: the persisted credential (if any), and a poll
  /// clock starting now so the first pass runs one interval after startup.
  pub async fn start(&self) -> Result<LoopState> {
    let credential = self.tokens.load().await?;
    Ok(LoopState {
      credential,
      last_poll: self.clock.now(),
      auth_backoff: Backoff::new(
        self.settings.auth_backoff_base,
        self.settings.auth_backoff_max,
      ),
    })
  }

  /// Run until `shutdown` resolves. Shutdown is observed between
  /// iterations, never in the middle of one.
  pub async fn run(&self, shutdown: impl Future<Output = ()>) -> Result<()> {
    let mut state = self.start().await?;
    info!(
      poll_interval_secs = self.settings.poll_interval.num_seconds(),
      have_token = state.credential.is_some(),
      "enrichment loop started"
    );

    tokio::pin!(shutdown);
    loop {
      self.tick(&mut state).await;
      tokio::select! {
        _ = &mut shutdown => break,
        _ = tokio::time::sleep(self.settings.tick_interval) => {}
      }
    }

    info!("enrichment loop stopped");
    Ok(())
  }

  /// One enrichment pass right now, ignoring the poll interval. Errors that
  /// the loop would retry are returned instead.
  pub async fn run_once(&self) -> Result<PassReport> {
    let state = self.start().await?;
    let credential = self.tokens.ensure_valid(state.credential.as_ref()).await?;
    let batch = self
      .records
      .find_pending(&self.settings.query)
      .await
      .map_err(Error::store)?;
    Ok(self.enrich(batch, &credential.token).await)
  }

  /// One loop iteration: token check, then an enrichment pass if due.
  pub async fn tick(&self, state: &mut LoopState) -> Tick {
    let now = self.clock.now();
    if state.auth_backoff.is_waiting(now) {
      return Tick::AuthDeferred;
    }

    let credential = match self.tokens.ensure_valid(state.credential.as_ref()).await {
      Ok(c) => {
        state.auth_backoff.reset();
        c
      }
      Err(e) => {
        let delay = state.auth_backoff.record_failure(now);
        warn!(
          error = %e,
          failures = state.auth_backoff.failures(),
          retry_in_secs = delay.num_seconds(),
          "cannot obtain access token; enrichment paused"
        );
        return Tick::AuthFailed;
      }
    };
    let token = credential.token.clone();
    state.credential = Some(credential);

    if self.clock.now() <= state.last_poll + self.settings.poll_interval {
      return Tick::Idle;
    }

    let batch = match self.records.find_pending(&self.settings.query).await {
      Ok(batch) => batch,
      Err(e) => {
        warn!(error = %e, "pending-record query failed; will retry");
        return Tick::PollFailed;
      }
    };
    state.last_poll = self.clock.now();

    Tick::Polled(self.enrich(batch, &token).await)
  }

  /// Resolve and write back every record in `batch`. Per-record failures are
  /// logged and counted; they never abort the pass.
  pub async fn enrich(&self, batch: PendingBatch, token: &str) -> PassReport {
    let mut report = PassReport { total: batch.total, ..PassReport::default() };
    debug!(total = batch.total, returned = batch.len(), "enrichment pass");

    for record in batch {
      report.scanned += 1;
      match self.resolve(&record, token).await {
        Ok(Resolution::Skipped) => report.skipped += 1,
        Ok(Resolution::Cached) => {
          report.cache_hits += 1;
          report.updated += 1;
        }
        Ok(Resolution::Fetched) => {
          report.remote_fetches += 1;
          report.updated += 1;
        }
        Err(e) => {
          report.failed += 1;
          warn!(
            record = %record.record_id,
            error = %e,
            "leaving record unenriched"
          );
        }
      }
    }

    info!(
      total = report.total,
      scanned = report.scanned,
      updated = report.updated,
      skipped = report.skipped,
      cache_hits = report.cache_hits,
      remote_fetches = report.remote_fetches,
      failed = report.failed,
      "enrichment pass finished"
    );
    report
  }

  /// Cache first, then the identity provider; write the result onto this
  /// record. Records without a usable subject id are left alone.
  pub async fn resolve(&self, record: &PendingRecord, token: &str) -> Result<Resolution> {
    let Some(subject) = record.subject() else {
      return Ok(Resolution::Skipped);
    };
    let query = &self.settings.query;

    let cached = self
      .records
      .find_cached_profile(query, subject)
      .await
      .map_err(Error::store)?;

    let (profile, resolution) = match cached {
      Some(profile) => {
        debug!(subject, "profile found in store");
        (profile, Resolution::Cached)
      }
      None => {
        debug!(subject, "profile not in store; asking identity provider");
        let profile = self
          .identity
          .fetch_profile(subject, token)
          .await
          .map_err(|e| Error::Lookup {
            subject_id: subject.to_owned(),
            source:     Box::new(e),
          })?;
        (profile, Resolution::Fetched)
      }
    };

    self
      .records
      .attach_profile(query, &record.record_id, &profile)
      .await
      .map_err(Error::store)?;
    debug!(record = %record.record_id, subject, "attached profile");
    Ok(resolution)
  }
}
