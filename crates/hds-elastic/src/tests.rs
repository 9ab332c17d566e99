//! Tests for `ElasticStore` against an in-process stand-in for Elasticsearch
//! that understands the three request shapes the store sends.

use std::sync::{Arc, Mutex};

use axum::{
  Json, Router,
  extract::{Path, State},
  http::{HeaderMap, StatusCode, header},
  response::{IntoResponse, Response},
  routing::post,
};
use hds_core::{
  profile::SubjectProfile,
  record::{PendingQuery, RecordId, field},
  store::RecordStore,
};
use serde_json::{Map, Value, json};

use crate::{ElasticConfig, ElasticStore, Error};

// ─── Mock cluster ────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Request {
  path: String,
  body: Value,
  auth: Option<String>,
}

#[derive(Clone, Default)]
struct Cluster {
  docs:     Arc<Mutex<Vec<(String, String, Value)>>>,
  requests: Arc<Mutex<Vec<Request>>>,
}

impl Cluster {
  fn insert(&self, index: &str, id: &str, doc: Value) {
    self.docs.lock().unwrap().push((index.into(), id.into(), doc));
  }

  fn doc(&self, index: &str, id: &str) -> Value {
    self
      .docs
      .lock()
      .unwrap()
      .iter()
      .find(|(i, d, _)| i == index && d == id)
      .map(|(_, _, doc)| doc.clone())
      .unwrap()
  }

  fn record(&self, path: String, headers: &HeaderMap, body: &Value) {
    let auth = headers
      .get(header::AUTHORIZATION)
      .and_then(|v| v.to_str().ok())
      .map(str::to_owned);
    self.requests.lock().unwrap().push(Request { path, body: body.clone(), auth });
  }
}

/// Source filtering: dotted names come back as nested objects.
fn project(doc: &Value, fields: &Value) -> Value {
  let mut out = Map::new();
  for name in fields.as_array().into_iter().flatten().filter_map(Value::as_str) {
    let Some(v) = field(doc, name) else { continue };
    let mut segments: Vec<&str> = name.split('.').collect();
    let leaf = segments.pop().unwrap();
    let mut target = &mut out;
    for seg in segments {
      target = target
        .entry(seg)
        .or_insert_with(|| Value::Object(Map::new()))
        .as_object_mut()
        .unwrap();
    }
    target.insert(leaf.to_owned(), v.clone());
  }
  Value::Object(out)
}

fn search_docs(cluster: &Cluster, body: &Value) -> Value {
  let docs = cluster.docs.lock().unwrap();
  let matches: Vec<&(String, String, Value)> =
    if body.pointer("/query/constant_score").is_some() {
      docs
        .iter()
        .filter(|(_, _, d)| {
          d["hdsaction"] == "KMS:REQUEST"
            && d.pointer("/userinfo/created").is_none()
            && d["hdsuserID"] != "null"
        })
        .collect()
    } else {
      let subject = body
        .pointer("/query/bool/must/0/match_phrase/hdsuserID")
        .cloned()
        .unwrap_or(Value::Null);
      docs
        .iter()
        .filter(|(_, _, d)| d["hdsuserID"] == subject && d.get("userinfo").is_some())
        .collect()
    };

  let size = body["size"].as_u64().unwrap_or(10) as usize;
  let hits: Vec<Value> = matches
    .iter()
    .take(size)
    .map(|(index, id, doc)| {
      json!({ "_index": index, "_id": id, "_source": project(doc, &body["_source"]) })
    })
    .collect();
  json!({ "took": 1, "hits": { "total": { "value": matches.len(), "relation": "eq" }, "hits": hits } })
}

async fn search_all(
  State(cluster): State<Cluster>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> Json<Value> {
  cluster.record("/_search".into(), &headers, &body);
  Json(search_docs(&cluster, &body))
}

async fn search_index(
  State(cluster): State<Cluster>,
  Path(index): Path<String>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> Response {
  cluster.record(format!("/{index}/_search"), &headers, &body);
  if index == "down" {
    return (StatusCode::SERVICE_UNAVAILABLE, "cluster_block_exception").into_response();
  }
  Json(search_docs(&cluster, &body)).into_response()
}

fn merge(cluster: &Cluster, index: &str, id: &str, body: &Value) -> Response {
  let mut docs = cluster.docs.lock().unwrap();
  let Some((_, _, doc)) = docs.iter_mut().find(|(i, d, _)| i == index && d == id) else {
    return (StatusCode::NOT_FOUND, "document_missing_exception").into_response();
  };
  if let (Some(target), Some(patch)) = (doc.as_object_mut(), body["doc"].as_object()) {
    for (k, v) in patch {
      target.insert(k.clone(), v.clone());
    }
  }
  Json(json!({ "_index": index, "_id": id, "result": "updated" })).into_response()
}

async fn update(
  State(cluster): State<Cluster>,
  Path((index, id)): Path<(String, String)>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> Response {
  cluster.record(format!("/{index}/_update/{id}"), &headers, &body);
  let resp = merge(&cluster, &index, &id, &body);
  // Some proxies in front of the cluster answer a successful write with plain text.
  if index == "proxied" && resp.status().is_success() {
    return (StatusCode::OK, "ok").into_response();
  }
  resp
}

async fn legacy_update(
  State(cluster): State<Cluster>,
  Path((index, doc_type, id)): Path<(String, String, String)>,
  headers: HeaderMap,
  Json(body): Json<Value>,
) -> Response {
  cluster.record(format!("/{index}/{doc_type}/{id}/_update"), &headers, &body);
  merge(&cluster, &index, &id, &body)
}

async fn serve(cluster: Cluster) -> String {
  let app = Router::new()
    .route("/_search", post(search_all))
    .route("/{index}/_search", post(search_index))
    .route("/{index}/_update/{id}", post(update))
    .route("/{index}/{doc_type}/{id}/_update", post(legacy_update))
    .with_state(cluster);

  let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
  let addr = listener.local_addr().unwrap();
  tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
  format!("http://{addr}")
}

async fn store_with(cluster: &Cluster, tweak: impl FnOnce(&mut ElasticConfig)) -> ElasticStore {
  let mut config = ElasticConfig {
    base_url: serve(cluster.clone()).await,
    timeout_secs: 5,
    ..ElasticConfig::default()
  };
  tweak(&mut config);
  ElasticStore::new(config).unwrap()
}

fn kms(subject: &str) -> Value {
  json!({ "hdsaction": "KMS:REQUEST", "hdsuserID": subject, "message": "raw syslog line" })
}

fn alice() -> SubjectProfile {
  SubjectProfile {
    id: Some("u1".into()),
    display_name: Some("Alice Liddell".into()),
    created: Some("2017-05-29T14:55:06.369Z".into()),
    ..SubjectProfile::default()
  }
}

// ─── find_pending ────────────────────────────────────────────────────────────

#[tokio::test]
async fn find_pending_returns_composite_ids_and_subjects() {
  let cluster = Cluster::default();
  cluster.insert("logstash-2017.05.29", "a", kms("u1"));
  cluster.insert("logstash-2017.05.30", "b", kms("null"));
  cluster.insert("logstash-2017.05.30", "c", json!({ "hdsaction": "KMS:REQUEST" }));
  let store = store_with(&cluster, |_| {}).await;

  let batch = store.find_pending(&PendingQuery::default()).await.unwrap();
  assert_eq!(batch.total, 2);
  let records: Vec<_> = batch.into_iter().collect();
  assert_eq!(records[0].record_id, RecordId::new("logstash-2017.05.29", "a"));
  assert_eq!(records[0].subject(), Some("u1"));
  assert_eq!(records[1].record_id.id, "c");
  assert_eq!(records[1].subject_id, None);

  let requests = cluster.requests.lock().unwrap();
  assert_eq!(requests[0].path, "/_search");
  assert_eq!(requests[0].body["_source"], json!(["hdsuserID"]));
}

#[tokio::test]
async fn dotted_subject_field_is_read_from_nested_source() {
  let cluster = Cluster::default();
  cluster.insert(
    "logs",
    "a",
    json!({ "hdsaction": "KMS:REQUEST", "user": { "uuid": "u1" } }),
  );
  let store = store_with(&cluster, |_| {}).await;
  let q = PendingQuery { subject_field: "user.uuid".into(), ..PendingQuery::default() };

  let records: Vec<_> = store.find_pending(&q).await.unwrap().into_iter().collect();
  assert_eq!(records.len(), 1);
  assert_eq!(records[0].subject(), Some("u1"));
  assert_eq!(cluster.requests.lock().unwrap()[0].body["_source"], json!(["user.uuid"]));
}

#[tokio::test]
async fn searches_configured_index_with_basic_auth() {
  let cluster = Cluster::default();
  let store = store_with(&cluster, |c| {
    c.index = Some("logstash-*".into());
    c.username = Some("elastic".into());
    c.password = Some("changeme".into());
  })
  .await;

  store.find_pending(&PendingQuery::default()).await.unwrap();
  let requests = cluster.requests.lock().unwrap();
  assert_eq!(requests[0].path, "/logstash-*/_search");
  // base64("elastic:changeme")
  assert_eq!(requests[0].auth.as_deref(), Some("Basic ZWxhc3RpYzpjaGFuZ2VtZQ=="));
}

#[tokio::test]
async fn search_failure_is_status_error() {
  let cluster = Cluster::default();
  let store = store_with(&cluster, |c| c.index = Some("down".into())).await;

  let err = store.find_pending(&PendingQuery::default()).await.unwrap_err();
  assert!(matches!(err, Error::Status { status: 503, .. }));
}

#[tokio::test]
async fn unreachable_cluster_is_http_error() {
  let config = ElasticConfig {
    base_url: "http://127.0.0.1:9".into(),
    timeout_secs: 2,
    ..ElasticConfig::default()
  };
  let store = ElasticStore::new(config).unwrap();
  let err = store.find_pending(&PendingQuery::default()).await.unwrap_err();
  assert!(matches!(err, Error::Http(_)));
}

// ─── find_cached_profile ─────────────────────────────────────────────────────

#[tokio::test]
async fn cached_profile_absent_is_none() {
  let cluster = Cluster::default();
  cluster.insert("logs", "a", kms("u1"));
  let store = store_with(&cluster, |_| {}).await;

  let hit = store.find_cached_profile(&PendingQuery::default(), "u1").await.unwrap();
  assert!(hit.is_none());
}

#[tokio::test]
async fn cached_profile_takes_first_of_many() {
  let cluster = Cluster::default();
  let mut first = kms("u1");
  first["userinfo"] = json!({ "displayName": "Alice (first)" });
  let mut second = kms("u1");
  second["userinfo"] = json!({ "displayName": "Alice (second)" });
  cluster.insert("logs", "a", first);
  cluster.insert("logs", "b", second);
  let store = store_with(&cluster, |_| {}).await;

  let hit = store
    .find_cached_profile(&PendingQuery::default(), "u1")
    .await
    .unwrap()
    .unwrap();
  assert_eq!(hit.display_name.as_deref(), Some("Alice (first)"));

  let requests = cluster.requests.lock().unwrap();
  assert_eq!(requests[0].body["size"], 1);
}

// ─── attach_profile ──────────────────────────────────────────────────────────

#[tokio::test]
async fn attach_merges_and_removes_record_from_pending() {
  let cluster = Cluster::default();
  cluster.insert("logs", "a", kms("u1"));
  cluster.insert("logs", "b", kms("u1"));
  let store = store_with(&cluster, |_| {}).await;
  let q = PendingQuery::default();

  store.attach_profile(&q, &RecordId::new("logs", "a"), &alice()).await.unwrap();

  let doc = cluster.doc("logs", "a");
  assert_eq!(doc["message"], "raw syslog line");
  assert_eq!(doc["userinfo"]["displayName"], "Alice Liddell");

  let pending: Vec<_> = store.find_pending(&q).await.unwrap().into_iter().collect();
  assert_eq!(pending.len(), 1);
  assert_eq!(pending[0].record_id.id, "b");

  let cached = store.find_cached_profile(&q, "u1").await.unwrap().unwrap();
  assert_eq!(cached, alice());
}

#[tokio::test]
async fn legacy_update_path_includes_doc_type() {
  let cluster = Cluster::default();
  cluster.insert("logs", "a", kms("u1"));
  let store = store_with(&cluster, |c| c.doc_type = Some("CiscoHDS".into())).await;

  store
    .attach_profile(&PendingQuery::default(), &RecordId::new("logs", "a"), &alice())
    .await
    .unwrap();

  let requests = cluster.requests.lock().unwrap();
  assert_eq!(requests[0].path, "/logs/CiscoHDS/a/_update");
  assert_eq!(requests[0].body["doc"]["userinfo"]["id"], "u1");
}

#[tokio::test]
async fn attach_succeeds_when_acknowledgement_is_not_json() {
  let cluster = Cluster::default();
  cluster.insert("proxied", "a", kms("u1"));
  let store = store_with(&cluster, |_| {}).await;

  store
    .attach_profile(&PendingQuery::default(), &RecordId::new("proxied", "a"), &alice())
    .await
    .unwrap();

  assert_eq!(cluster.doc("proxied", "a")["userinfo"]["displayName"], "Alice Liddell");
}

#[tokio::test]
async fn attach_to_missing_record_fails() {
  let cluster = Cluster::default();
  let store = store_with(&cluster, |_| {}).await;

  let err = store
    .attach_profile(&PendingQuery::default(), &RecordId::new("logs", "gone"), &alice())
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Status { status: 404, .. }));
}
