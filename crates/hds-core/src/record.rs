//! Audit records awaiting enrichment and the query that selects them.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// The literal some log shippers emit in place of a missing subject id.
pub const NULL_SUBJECT: &str = "null";

/// Look up a possibly dotted field name (`user.uuid`) in a document.
///
/// A literal key wins; otherwise each segment descends one object level, the
/// way search engines address fields of nested objects.
pub fn field<'a>(doc: &'a Value, name: &str) -> Option<&'a Value> {
  doc
    .get(name)
    .or_else(|| name.split('.').try_fold(doc, |v, key| v.get(key)))
}

// ─── RecordId ────────────────────────────────────────────────────────────────

/// Store-assigned address of a record: the index it lives in plus its id
/// within that index. Opaque to everything but the record store.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RecordId {
  pub index: String,
  pub id:    String,
}

impl RecordId {
  pub fn new(index: impl Into<String>, id: impl Into<String>) -> Self {
    Self { index: index.into(), id: id.into() }
  }
}

impl fmt::Display for RecordId {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}/{}", self.index, self.id)
  }
}

// ─── PendingRecord ───────────────────────────────────────────────────────────

/// A log entry that has no resolved identity attached yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingRecord {
  pub record_id:  RecordId,
  /// Raw subject id as found in the record, if the field was present at all.
  pub subject_id: Option<String>,
}

impl PendingRecord {
  pub fn new(record_id: RecordId, subject_id: Option<String>) -> Self {
    Self { record_id, subject_id }
  }

  /// The subject id to resolve, or `None` when there is nothing to look up:
  /// the field is missing, empty, or the `"null"` sentinel.
  pub fn subject(&self) -> Option<&str> {
    self
      .subject_id
      .as_deref()
      .filter(|s| !s.is_empty() && *s != NULL_SUBJECT)
  }
}

// ─── PendingBatch ────────────────────────────────────────────────────────────

/// One poll's worth of pending records.
///
/// Consumed by value: iterating drains the batch, and a new poll is needed to
/// see the records again.
#[derive(Debug, Clone, Default)]
pub struct PendingBatch {
  /// Total number of matches reported by the store; may exceed
  /// `records.len()` when the result is capped by the page size.
  pub total:   u64,
  records:     Vec<PendingRecord>,
}

impl PendingBatch {
  pub fn new(total: u64, records: Vec<PendingRecord>) -> Self {
    Self { total, records }
  }

  pub fn len(&self) -> usize { self.records.len() }

  pub fn is_empty(&self) -> bool { self.records.is_empty() }
}

impl IntoIterator for PendingBatch {
  type Item = PendingRecord;
  type IntoIter = std::vec::IntoIter<PendingRecord>;

  fn into_iter(self) -> Self::IntoIter { self.records.into_iter() }
}

// ─── PendingQuery ────────────────────────────────────────────────────────────

/// Which records count as pending, expressed in terms of document fields.
///
/// A record is pending when `action_field` matches `action_value`, the
/// enrichment marker `"{profile_field}.created"` is absent, and
/// `subject_field` is not the `"null"` sentinel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PendingQuery {
  pub action_field:  String,
  pub action_value:  String,
  pub subject_field: String,
  pub profile_field: String,
  /// Upper bound on records returned by one poll.
  pub page_size:     usize,
}

impl Default for PendingQuery {
  fn default() -> Self {
    Self {
      action_field:  "hdsaction".into(),
      action_value:  "KMS:REQUEST".into(),
      subject_field: "hdsuserID".into(),
      profile_field: "userinfo".into(),
      page_size:     10_000,
    }
  }
}

impl PendingQuery {
  /// Field whose existence marks a record as already enriched.
  pub fn enrichment_marker(&self) -> String {
    format!("{}.created", self.profile_field)
  }
}
