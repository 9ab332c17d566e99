//! [`ElasticStore`]: the Elasticsearch implementation of [`RecordStore`].

use std::{fmt, time::Duration};

use hds_core::{
  profile::SubjectProfile,
  record::{PendingBatch, PendingQuery, PendingRecord, RecordId},
  store::RecordStore,
};
use reqwest::{Client, RequestBuilder, Response, Url};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
  Error, Result, query,
  response::{SearchResponse, UpdateAck},
};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Connection settings for the Elasticsearch cluster.
#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct ElasticConfig {
  pub base_url:     String,
  /// Index (or pattern) to search. Searches every index when unset.
  pub index:        Option<String>,
  /// Mapping type for clusters that still require one in update URLs
  /// (`/{index}/{type}/{id}/_update`). Unset uses `/{index}/_update/{id}`.
  pub doc_type:     Option<String>,
  pub username:     Option<String>,
  pub password:     Option<String>,
  pub timeout_secs: u64,
}

impl Default for ElasticConfig {
  fn default() -> Self {
    Self {
      base_url:     "http://elk:9200".to_string(),
      index:        None,
      doc_type:     None,
      username:     None,
      password:     None,
      timeout_secs: 30,
    }
  }
}

impl fmt::Debug for ElasticConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ElasticConfig")
      .field("base_url", &self.base_url)
      .field("index", &self.index)
      .field("doc_type", &self.doc_type)
      .field("username", &self.username)
      .field("password", &self.password.as_ref().map(|_| "<redacted>"))
      .field("timeout_secs", &self.timeout_secs)
      .finish()
  }
}

// ─── Store ───────────────────────────────────────────────────────────────────

/// Audit records held in Elasticsearch.
///
/// Cloning is cheap; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct ElasticStore {
  client: Client,
  base:   Url,
  config: ElasticConfig,
}

impl fmt::Debug for ElasticStore {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("ElasticStore").field("config", &self.config).finish()
  }
}

impl ElasticStore {
  pub fn new(config: ElasticConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .ok()
      .filter(|u| !u.cannot_be_a_base())
      .ok_or_else(|| Error::BaseUrl(config.base_url.clone()))?;
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, base, config })
  }

  fn url(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  fn search_url(&self) -> Url {
    match self.config.index.as_deref() {
      Some(index) => self.url(&[index, "_search"]),
      None => self.url(&["_search"]),
    }
  }

  fn update_url(&self, record: &RecordId) -> Url {
    let (index, id) = (record.index.as_str(), record.id.as_str());
    match self.config.doc_type.as_deref() {
      Some(doc_type) => self.url(&[index, doc_type, id, "_update"]),
      None => self.url(&[index, "_update", id]),
    }
  }

  fn auth(&self, req: RequestBuilder) -> RequestBuilder {
    match &self.config.username {
      Some(user) => req.basic_auth(user, self.config.password.as_deref()),
      None => req,
    }
  }

  async fn expect_success(resp: Response) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let path = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { method: "POST", path, status: status.as_u16(), body })
  }

  async fn search(&self, body: &Value) -> Result<SearchResponse> {
    let resp = self
      .auth(self.client.post(self.search_url()))
      .json(body)
      .send()
      .await?;
    let resp = Self::expect_success(resp).await?;
    let bytes = resp.bytes().await?;
    Ok(serde_json::from_slice(&bytes)?)
  }
}

// ─── RecordStore impl ────────────────────────────────────────────────────────

impl RecordStore for ElasticStore {
  type Error = Error;

  async fn find_pending(&self, q: &PendingQuery) -> Result<PendingBatch> {
    let found = self.search(&query::pending_search(q)).await?;
    let total = found.hits.total.value();
    let records: Vec<PendingRecord> = found
      .hits
      .hits
      .into_iter()
      .map(|hit| {
        let subject = hit.source_str(&q.subject_field).map(str::to_owned);
        PendingRecord::new(RecordId::new(hit.index, hit.id), subject)
      })
      .collect();

    debug!(total, returned = records.len(), "searched pending records");
    Ok(PendingBatch::new(total, records))
  }

  async fn find_cached_profile(
    &self,
    q: &PendingQuery,
    subject_id: &str,
  ) -> Result<Option<SubjectProfile>> {
    let found = self.search(&query::cached_profile_search(q, subject_id)).await?;
    let Some(first) = found.hits.hits.into_iter().next() else {
      return Ok(None);
    };
    match first.source_field(&q.profile_field) {
      Some(profile) if !profile.is_null() => {
        Ok(Some(SubjectProfile::from_value(profile.clone())?))
      }
      _ => Ok(None),
    }
  }

  async fn attach_profile(
    &self,
    q: &PendingQuery,
    record: &RecordId,
    profile: &SubjectProfile,
  ) -> Result<()> {
    let body = query::attach_profile(q, profile)?;
    let resp = self
      .auth(self.client.post(self.update_url(record)))
      .json(&body)
      .send()
      .await?;
    let resp = Self::expect_success(resp).await?;

    match resp.json::<UpdateAck>().await {
      Ok(ack) => trace!(%record, result = ?ack.result, "updated record"),
      Err(e) => debug!(%record, error = %e, "updated record; acknowledgement unreadable"),
    }
    Ok(())
  }
}
