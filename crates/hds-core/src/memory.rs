//! In-memory implementations of the [`crate::store`] traits.
//!
//! These mirror the filter semantics of the real backends closely enough to
//! drive the enrichment loop end to end in tests, and record how often each
//! operation was called.

use std::{
  collections::{HashMap, HashSet, VecDeque},
  sync::{
    Mutex, MutexGuard,
    atomic::{AtomicUsize, Ordering},
  },
};

use serde_json::Value;
use thiserror::Error;

use crate::{
  credential::{AccessGrant, Credential, RefreshGrant},
  profile::SubjectProfile,
  record::{NULL_SUBJECT, PendingBatch, PendingQuery, PendingRecord, RecordId, field},
  store::{IdentityProvider, RecordStore, TokenStore},
};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MemoryError {
  #[error("injected failure: {0}")]
  Injected(&'static str),
  #[error("no profile for subject {0}")]
  UnknownSubject(String),
  #[error("record not found: {0}")]
  RecordNotFound(RecordId),
  #[error("malformed document: {0}")]
  Malformed(String),
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
  m.lock().unwrap_or_else(|e| e.into_inner())
}

// ─── Records ─────────────────────────────────────────────────────────────────

/// Call counters for [`MemoryRecordStore`].
#[derive(Debug, Default)]
pub struct RecordCalls {
  pub find_pending:        AtomicUsize,
  pub find_cached_profile: AtomicUsize,
  pub attach_profile:      AtomicUsize,
}

/// A record store over a list of JSON documents.
///
/// With [`with_refresh_lag`](Self::with_refresh_lag), profile writes only
/// become visible to cache lookups after the next `find_pending` call, the
/// way a search index only exposes writes after its periodic refresh.
#[derive(Debug, Default)]
pub struct MemoryRecordStore {
  docs:              Mutex<Vec<(RecordId, Value)>>,
  fail_find_pending: AtomicUsize,
  fail_attach:       Mutex<HashSet<RecordId>>,
  refresh_lag:       bool,
  unrefreshed:       Mutex<HashSet<RecordId>>,
  pub calls:         RecordCalls,
}

impl MemoryRecordStore {
  pub fn new() -> Self { Self::default() }

  pub fn with_refresh_lag(mut self) -> Self {
    self.refresh_lag = true;
    self
  }

  pub fn insert(&self, id: RecordId, doc: Value) {
    lock(&self.docs).push((id, doc));
  }

  /// A snapshot of one document.
  pub fn get(&self, id: &RecordId) -> Option<Value> {
    lock(&self.docs)
      .iter()
      .find(|(rid, _)| rid == id)
      .map(|(_, doc)| doc.clone())
  }

  /// Make the next `n` calls to `find_pending` fail.
  pub fn fail_next_find_pending(&self, n: usize) {
    self.fail_find_pending.store(n, Ordering::SeqCst);
  }

  /// Make every `attach_profile` targeting `id` fail.
  pub fn fail_attach_for(&self, id: RecordId) {
    lock(&self.fail_attach).insert(id);
  }

  fn is_pending(query: &PendingQuery, doc: &Value) -> bool {
    let action_matches = field(doc, &query.action_field)
      .and_then(Value::as_str)
      .is_some_and(|a| a == query.action_value);
    // An explicit null does not count as present.
    let enriched = field(doc, &query.enrichment_marker()).is_some_and(|v| !v.is_null());
    let null_subject = field(doc, &query.subject_field)
      .and_then(Value::as_str)
      .is_some_and(|s| s == NULL_SUBJECT);
    action_matches && !enriched && !null_subject
  }
}

impl RecordStore for MemoryRecordStore {
  type Error = MemoryError;

  async fn find_pending(&self, query: &PendingQuery) -> Result<PendingBatch, MemoryError> {
    self.calls.find_pending.fetch_add(1, Ordering::SeqCst);
    let injected = self
      .fail_find_pending
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    if injected.is_ok() {
      return Err(MemoryError::Injected("find_pending"));
    }
    lock(&self.unrefreshed).clear();

    let docs = lock(&self.docs);
    let matching: Vec<PendingRecord> = docs
      .iter()
      .filter(|(_, doc)| Self::is_pending(query, doc))
      .map(|(id, doc)| {
        let subject = field(doc, &query.subject_field)
          .and_then(Value::as_str)
          .map(str::to_owned);
        PendingRecord::new(id.clone(), subject)
      })
      .collect();
    let total = matching.len() as u64;
    let records = matching.into_iter().take(query.page_size).collect();
    Ok(PendingBatch::new(total, records))
  }

  async fn find_cached_profile(
    &self,
    query: &PendingQuery,
    subject_id: &str,
  ) -> Result<Option<SubjectProfile>, MemoryError> {
    self.calls.find_cached_profile.fetch_add(1, Ordering::SeqCst);
    let unrefreshed = lock(&self.unrefreshed);
    let docs = lock(&self.docs);
    let hit = docs.iter().find_map(|(id, doc)| {
      if unrefreshed.contains(id) {
        return None;
      }
      let same_subject = field(doc, &query.subject_field)
        .and_then(Value::as_str)
        .is_some_and(|s| s == subject_id);
      if !same_subject {
        return None;
      }
      field(doc, &query.profile_field).filter(|p| !p.is_null()).cloned()
    });
    hit
      .map(SubjectProfile::from_value)
      .transpose()
      .map_err(|e| MemoryError::Malformed(e.to_string()))
  }

  async fn attach_profile(
    &self,
    query: &PendingQuery,
    record: &RecordId,
    profile: &SubjectProfile,
  ) -> Result<(), MemoryError> {
    self.calls.attach_profile.fetch_add(1, Ordering::SeqCst);
    if lock(&self.fail_attach).contains(record) {
      return Err(MemoryError::Injected("attach_profile"));
    }
    let value = profile
      .to_value()
      .map_err(|e| MemoryError::Malformed(e.to_string()))?;

    let mut docs = lock(&self.docs);
    let (_, doc) = docs
      .iter_mut()
      .find(|(id, _)| id == record)
      .ok_or_else(|| MemoryError::RecordNotFound(record.clone()))?;
    let obj = doc
      .as_object_mut()
      .ok_or_else(|| MemoryError::Malformed(format!("{record} is not an object")))?;
    obj.insert(query.profile_field.clone(), value);
    drop(docs);
    if self.refresh_lag {
      lock(&self.unrefreshed).insert(record.clone());
    }
    Ok(())
  }
}

// ─── Identity ────────────────────────────────────────────────────────────────

/// Call counters for [`MemoryIdentityProvider`].
#[derive(Debug, Default)]
pub struct IdentityCalls {
  pub refresh:       AtomicUsize,
  pub fetch_profile: AtomicUsize,
}

/// An identity provider backed by a profile map and a queue of scripted
/// refresh outcomes.
#[derive(Debug, Default)]
pub struct MemoryIdentityProvider {
  profiles:      Mutex<HashMap<String, SubjectProfile>>,
  refreshes:     Mutex<VecDeque<Result<AccessGrant, MemoryError>>>,
  /// Tokens passed to `fetch_profile`, in call order.
  pub seen_tokens: Mutex<Vec<String>>,
  pub calls:     IdentityCalls,
}

impl MemoryIdentityProvider {
  pub fn new() -> Self { Self::default() }

  pub fn with_profile(self, subject_id: &str, profile: SubjectProfile) -> Self {
    lock(&self.profiles).insert(subject_id.to_owned(), profile);
    self
  }

  /// Queue the outcome of the next `refresh` call. When the queue is empty,
  /// `refresh` grants a token named `token-<n>` valid for one hour.
  pub fn push_refresh(&self, outcome: Result<AccessGrant, MemoryError>) {
    lock(&self.refreshes).push_back(outcome);
  }
}

impl IdentityProvider for MemoryIdentityProvider {
  type Error = MemoryError;

  async fn refresh(&self, _grant: &RefreshGrant) -> Result<AccessGrant, MemoryError> {
    let n = self.calls.refresh.fetch_add(1, Ordering::SeqCst) + 1;
    lock(&self.refreshes).pop_front().unwrap_or_else(|| {
      Ok(AccessGrant { access_token: format!("token-{n}"), expires_in: 3600 })
    })
  }

  async fn fetch_profile(
    &self,
    subject_id: &str,
    bearer_token: &str,
  ) -> Result<SubjectProfile, MemoryError> {
    self.calls.fetch_profile.fetch_add(1, Ordering::SeqCst);
    lock(&self.seen_tokens).push(bearer_token.to_owned());
    lock(&self.profiles)
      .get(subject_id)
      .cloned()
      .ok_or_else(|| MemoryError::UnknownSubject(subject_id.to_owned()))
  }
}

// ─── Tokens ──────────────────────────────────────────────────────────────────

/// A token store that keeps the credential in a mutex.
#[derive(Debug, Default)]
pub struct MemoryTokenStore {
  slot:      Mutex<Option<Credential>>,
  fail_save: AtomicUsize,
  pub saves: AtomicUsize,
}

impl MemoryTokenStore {
  pub fn new() -> Self { Self::default() }

  pub fn with_credential(credential: Credential) -> Self {
    Self { slot: Mutex::new(Some(credential)), ..Self::default() }
  }

  pub fn current(&self) -> Option<Credential> { lock(&self.slot).clone() }

  /// Make the next `n` calls to `save` fail.
  pub fn fail_next_save(&self, n: usize) {
    self.fail_save.store(n, Ordering::SeqCst);
  }
}

impl TokenStore for MemoryTokenStore {
  type Error = MemoryError;

  async fn load(&self) -> Result<Option<Credential>, MemoryError> {
    Ok(lock(&self.slot).clone())
  }

  async fn save(&self, credential: &Credential) -> Result<(), MemoryError> {
    self.saves.fetch_add(1, Ordering::SeqCst);
    let injected = self
      .fail_save
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1));
    if injected.is_ok() {
      return Err(MemoryError::Injected("save"));
    }
    *lock(&self.slot) = Some(credential.clone());
    Ok(())
  }
}
