//! Human-readable identity data attached to enriched records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{Error, Result};

/// A subject's profile as returned by the identity provider.
///
/// The fields the dashboards rely on are typed; anything else the provider
/// returns is carried through untouched in `extra` so the written-back
/// document matches what the provider sent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectProfile {
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub id:           Option<String>,
  #[serde(default, skip_serializing_if = "Vec::is_empty")]
  pub emails:       Vec<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub display_name: Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub nick_name:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub first_name:   Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub last_name:    Option<String>,
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub org_id:       Option<String>,
  /// Creation time of the identity; also the field whose presence marks a
  /// record as already enriched.
  #[serde(default, skip_serializing_if = "Option::is_none")]
  pub created:      Option<String>,
  #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
  pub kind:         Option<String>,
  #[serde(flatten)]
  pub extra:        Map<String, Value>,
}

impl SubjectProfile {
  /// Validate and decode a profile from an arbitrary JSON value.
  ///
  /// Only JSON objects are accepted.
  pub fn from_value(value: Value) -> Result<Self> {
    if !value.is_object() {
      return Err(Error::parse(
        "subject profile",
        format!("expected a JSON object, got {}", kind_of(&value)),
      ));
    }
    serde_json::from_value(value)
      .map_err(|e| Error::parse("subject profile", e.to_string()))
  }

  pub fn to_value(&self) -> Result<Value> { Ok(serde_json::to_value(self)?) }
}

fn kind_of(value: &Value) -> &'static str {
  match value {
    Value::Null => "null",
    Value::Bool(_) => "a boolean",
    Value::Number(_) => "a number",
    Value::String(_) => "a string",
    Value::Array(_) => "an array",
    Value::Object(_) => "an object",
  }
}

#[cfg(test)]
mod tests {
  use serde_json::json;

  use super::*;

  #[test]
  fn decodes_webex_person() {
    let p = SubjectProfile::from_value(json!({
      "id": "Y2lzY29zcGFyazovL3VzL1BFT1BMRS8x",
      "emails": ["alice@example.com"],
      "displayName": "Alice Liddell",
      "firstName": "Alice",
      "lastName": "Liddell",
      "orgId": "org-1",
      "created": "2017-05-29T14:55:06.369Z",
      "type": "person",
      "avatar": "https://example.com/a.png"
    }))
    .unwrap();

    assert_eq!(p.display_name.as_deref(), Some("Alice Liddell"));
    assert_eq!(p.emails, vec!["alice@example.com".to_string()]);
    assert_eq!(p.kind.as_deref(), Some("person"));
    assert_eq!(p.extra["avatar"], "https://example.com/a.png");
  }

  #[test]
  fn unknown_fields_survive_reencoding() {
    let raw = json!({
      "displayName": "Bob",
      "status": "active",
      "phoneNumbers": [{"type": "work", "value": "+1 555"}]
    });
    let p = SubjectProfile::from_value(raw.clone()).unwrap();
    assert_eq!(p.to_value().unwrap(), raw);
  }

  #[test]
  fn rejects_non_objects() {
    for bad in [json!(null), json!("alice"), json!([1, 2]), json!(3)] {
      let err = SubjectProfile::from_value(bad).unwrap_err();
      assert!(matches!(err, Error::Parse { what: "subject profile", .. }));
    }
  }

  #[test]
  fn rejects_mistyped_known_fields() {
    let err =
      SubjectProfile::from_value(json!({ "displayName": 7 })).unwrap_err();
    assert!(matches!(err, Error::Parse { .. }));
  }
}
