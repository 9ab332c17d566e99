//! Search response envelope.

use hds_core::record::field;
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, Deserialize)]
pub struct SearchResponse {
  pub hits: Hits,
}

#[derive(Debug, Deserialize)]
pub struct Hits {
  pub total: Total,
  #[serde(default)]
  pub hits:  Vec<Hit>,
}

/// `hits.total` is a bare number before Elasticsearch 7 and an object after.
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(untagged)]
pub enum Total {
  Count(u64),
  Object { value: u64 },
}

impl Total {
  pub fn value(self) -> u64 {
    match self {
      Self::Count(n) | Self::Object { value: n } => n,
    }
  }
}

#[derive(Debug, Deserialize)]
pub struct Hit {
  #[serde(rename = "_index")]
  pub index:  String,
  #[serde(rename = "_id")]
  pub id:     String,
  #[serde(rename = "_source", default)]
  pub source: Value,
}

impl Hit {
  /// A field of `_source`. Dotted names reach into nested objects, which is
  /// how Elasticsearch returns a projected `a.b` field.
  pub fn source_field(&self, name: &str) -> Option<&Value> { field(&self.source, name) }

  /// A string field of `_source`, if present and a string.
  pub fn source_str(&self, name: &str) -> Option<&str> {
    self.source_field(name).and_then(Value::as_str)
  }
}

/// Body of a successful `_update`. The update has already been applied when
/// this arrives, so it is only logged.
#[derive(Debug, Deserialize)]
pub struct UpdateAck {
  #[serde(default)]
  pub result: Option<String>,
}
