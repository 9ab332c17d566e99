//! Request bodies in the Elasticsearch query DSL.

use hds_core::{profile::SubjectProfile, record::{NULL_SUBJECT, PendingQuery}};
use serde_json::{Map, Value, json};

use crate::Result;

/// `{ field: value }` as a JSON object with a dynamic key.
fn keyed(field: &str, value: Value) -> Value {
  let mut obj = Map::new();
  obj.insert(field.to_owned(), value);
  Value::Object(obj)
}

/// Action matches, enrichment marker absent, subject not the `"null"`
/// sentinel. Only the subject field is projected.
pub fn pending_search(q: &PendingQuery) -> Value {
  json!({
    "_source": [q.subject_field],
    "size": q.page_size,
    "query": {
      "constant_score": {
        "filter": {
          "bool": {
            "must": {
              "match_phrase": keyed(&q.action_field, json!(q.action_value))
            },
            "must_not": [
              { "exists": { "field": q.enrichment_marker() } },
              { "match": keyed(&q.subject_field, json!(NULL_SUBJECT)) }
            ]
          }
        }
      }
    }
  })
}

/// First record for `subject_id` that already carries a profile.
pub fn cached_profile_search(q: &PendingQuery, subject_id: &str) -> Value {
  json!({
    "_source": [q.profile_field],
    "from": 0,
    "size": 1,
    "query": {
      "bool": {
        "must": [
          { "match_phrase": keyed(&q.subject_field, json!(subject_id)) },
          { "exists": { "field": q.profile_field } }
        ]
      }
    }
  })
}

/// Partial-update body merging `profile` under the profile field.
pub fn attach_profile(q: &PendingQuery, profile: &SubjectProfile) -> Result<Value> {
  Ok(json!({ "doc": keyed(&q.profile_field, profile.to_value()?) }))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn pending_filter_shape() {
    let body = pending_search(&PendingQuery::default());
    let filter = &body["query"]["constant_score"]["filter"]["bool"];

    assert_eq!(body["_source"], json!(["hdsuserID"]));
    assert_eq!(body["size"], 10_000);
    assert_eq!(filter["must"], json!({ "match_phrase": { "hdsaction": "KMS:REQUEST" } }));
    assert_eq!(
      filter["must_not"],
      json!([
        { "exists": { "field": "userinfo.created" } },
        { "match": { "hdsuserID": "null" } }
      ])
    );
  }

  #[test]
  fn pending_filter_follows_custom_fields() {
    let q = PendingQuery {
      action_field:  "event.action".into(),
      action_value:  "KMS:CREATE".into(),
      subject_field: "user.uuid".into(),
      profile_field: "identity".into(),
      page_size:     50,
    };
    let body = pending_search(&q);
    let filter = &body["query"]["constant_score"]["filter"]["bool"];
    assert_eq!(filter["must"]["match_phrase"]["event.action"], "KMS:CREATE");
    assert_eq!(filter["must_not"][0]["exists"]["field"], "identity.created");
    assert_eq!(filter["must_not"][1]["match"]["user.uuid"], "null");
    assert_eq!(body["size"], 50);
  }

  #[test]
  fn cached_profile_requires_existing_profile() {
    let body = cached_profile_search(&PendingQuery::default(), "u1");
    assert_eq!(body["size"], 1);
    assert_eq!(body["_source"], json!(["userinfo"]));
    assert_eq!(
      body["query"]["bool"]["must"],
      json!([
        { "match_phrase": { "hdsuserID": "u1" } },
        { "exists": { "field": "userinfo" } }
      ])
    );
  }

  #[test]
  fn update_is_a_partial_doc() {
    let profile = SubjectProfile {
      display_name: Some("Alice".into()),
      ..SubjectProfile::default()
    };
    let body = attach_profile(&PendingQuery::default(), &profile).unwrap();
    assert_eq!(body, json!({ "doc": { "userinfo": { "displayName": "Alice" } } }));
  }
}
