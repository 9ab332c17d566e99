//! Bearer credentials and the grant used to obtain them.
//!
//! A [`Credential`] is never mutated after it is issued. Refreshing produces a
//! new value that replaces the old one wholesale, both in memory and on disk.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

// ─── Credential ──────────────────────────────────────────────────────────────

/// An access token together with its validity window.
///
/// The serialised form is the persisted token file format:
/// `{"token": "...", "expires_in": 1209599, "timestamp": 1496069706.36}`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
  pub token:      String,
  /// Lifetime in seconds, as reported by the identity provider.
  #[serde(deserialize_with = "lifetime_seconds")]
  pub expires_in: i64,
  /// When the token was obtained; stored as Unix seconds.
  #[serde(rename = "timestamp", with = "epoch_seconds")]
  pub issued_at:  DateTime<Utc>,
}

impl Credential {
  /// Stamp a freshly granted token with the time it was received.
  pub fn issue(grant: AccessGrant, now: DateTime<Utc>) -> Self {
    Self {
      token:      grant.access_token,
      expires_in: grant.expires_in,
      issued_at:  now,
    }
  }

  /// The instant at which the provider considers the token expired, or
  /// `None` when that instant is not representable.
  pub fn expires_at(&self) -> Option<DateTime<Utc>> {
    lifetime(self.expires_in).and_then(|d| self.issued_at.checked_add_signed(d))
  }

  /// `true` iff `now < issued_at + expires_in - margin`. A validity window
  /// that overflows the calendar counts as invalid, forcing a refresh.
  pub fn is_valid_at(&self, now: DateTime<Utc>, margin: Duration) -> bool {
    self
      .expires_at()
      .and_then(|at| at.checked_sub_signed(margin))
      .is_some_and(|limit| now < limit)
  }
}

/// `expires_in` as a duration, if it fits one.
pub fn lifetime(expires_in: i64) -> Option<Duration> { Duration::try_seconds(expires_in) }

fn lifetime_seconds<'de, D: serde::Deserializer<'de>>(de: D) -> Result<i64, D::Error> {
  use serde::de::Error as _;
  let secs = i64::deserialize(de)?;
  match lifetime(secs) {
    Some(_) => Ok(secs),
    None => Err(D::Error::custom(format!("expires_in out of range: {secs}"))),
  }
}

impl fmt::Debug for Credential {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("Credential")
      .field("token", &"<redacted>")
      .field("expires_in", &self.expires_in)
      .field("issued_at", &self.issued_at)
      .finish()
  }
}

// ─── Grants ──────────────────────────────────────────────────────────────────

/// The long-lived inputs to an OAuth `refresh_token` grant.
#[derive(Clone, Deserialize)]
pub struct RefreshGrant {
  pub refresh_token: String,
  pub client_id:     String,
  pub client_secret: String,
}

impl fmt::Debug for RefreshGrant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("RefreshGrant")
      .field("refresh_token", &"<redacted>")
      .field("client_id", &self.client_id)
      .field("client_secret", &"<redacted>")
      .finish()
  }
}

/// A validated token-endpoint response, not yet stamped with an issue time.
#[derive(Clone, PartialEq, Eq)]
pub struct AccessGrant {
  pub access_token: String,
  pub expires_in:   i64,
}

impl fmt::Debug for AccessGrant {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("AccessGrant")
      .field("access_token", &"<redacted>")
      .field("expires_in", &self.expires_in)
      .finish()
  }
}

// ─── Unix-seconds serde ──────────────────────────────────────────────────────

/// Fractional Unix seconds on the wire. Integers are accepted on read.
mod epoch_seconds {
  use chrono::{DateTime, Utc};
  use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

  pub fn serialize<S: Serializer>(
    at: &DateTime<Utc>,
    ser: S,
  ) -> Result<S::Ok, S::Error> {
    let secs = at.timestamp() as f64
      + f64::from(at.timestamp_subsec_nanos()) / 1_000_000_000.0;
    ser.serialize_f64(secs)
  }

  pub fn deserialize<'de, D: Deserializer<'de>>(
    de: D,
  ) -> Result<DateTime<Utc>, D::Error> {
    let raw = f64::deserialize(de)?;
    if !raw.is_finite() {
      return Err(D::Error::custom("timestamp is not a finite number"));
    }
    let secs = raw.floor();
    let nanos = (((raw - secs) * 1_000_000_000.0).round() as u32)
      .min(999_999_999);
    DateTime::from_timestamp(secs as i64, nanos)
      .ok_or_else(|| D::Error::custom(format!("timestamp out of range: {raw}")))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn at(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
  }

  fn credential(issued: i64, expires_in: i64) -> Credential {
    Credential {
      token: "tok".into(),
      expires_in,
      issued_at: at(issued),
    }
  }

  #[test]
  fn validity_boundary_is_exclusive() {
    let c = credential(1000, 200);
    let margin = Duration::seconds(180);

    assert!(c.is_valid_at(at(1019), margin));
    assert!(!c.is_valid_at(at(1020), margin));
    // Still inside the provider's window, but inside the safety margin.
    assert!(!c.is_valid_at(at(1199), margin));
  }

  #[test]
  fn zero_margin_uses_raw_expiry() {
    let c = credential(1000, 200);
    assert!(c.is_valid_at(at(1199), Duration::zero()));
    assert!(!c.is_valid_at(at(1200), Duration::zero()));
  }

  #[test]
  fn persisted_form_uses_timestamp_key() {
    let c = credential(1_496_069_706, 1_209_599);
    let json = serde_json::to_value(&c).unwrap();
    assert_eq!(json["token"], "tok");
    assert_eq!(json["expires_in"], 1_209_599);
    assert_eq!(json["timestamp"].as_f64(), Some(1_496_069_706.0));
  }

  #[test]
  fn reads_fractional_timestamp() {
    let c: Credential = serde_json::from_str(
      r#"{"expires_in": 1209599, "token": "abc", "timestamp": 1496069706.5}"#,
    )
    .unwrap();
    assert_eq!(c.issued_at.timestamp(), 1_496_069_706);
    assert_eq!(c.issued_at.timestamp_subsec_millis(), 500);
  }

  #[test]
  fn reads_integer_timestamp() {
    let c: Credential = serde_json::from_str(
      r#"{"expires_in": 60, "token": "abc", "timestamp": 1000}"#,
    )
    .unwrap();
    assert_eq!(c.issued_at, at(1000));
  }

  #[test]
  fn rejects_out_of_range_lifetime() {
    let res: Result<Credential, _> = serde_json::from_str(
      r#"{"expires_in": 9223372036854775807, "token": "abc", "timestamp": 1000}"#,
    );
    assert!(res.unwrap_err().to_string().contains("expires_in out of range"));
  }

  #[test]
  fn overflowing_window_is_invalid_not_a_panic() {
    let huge = credential(1000, i64::MAX);
    assert_eq!(huge.expires_at(), None);
    assert!(!huge.is_valid_at(at(1000), Duration::seconds(180)));

    // Representable lifetime, but issued_at + lifetime leaves the calendar.
    let far = credential(1000, i64::MAX / 2000);
    assert!(lifetime(far.expires_in).is_some());
    assert!(!far.is_valid_at(at(1000), Duration::seconds(180)));
  }

  #[test]
  fn rejects_missing_fields() {
    let res: Result<Credential, _> =
      serde_json::from_str(r#"{"token": "abc", "timestamp": 1000}"#);
    assert!(res.is_err());
  }

  #[test]
  fn debug_does_not_leak_secrets() {
    let c = credential(0, 1);
    assert!(!format!("{c:?}").contains("tok\""));

    let g = RefreshGrant {
      refresh_token: "refresh-secret".into(),
      client_id:     "client".into(),
      client_secret: "client-secret".into(),
    };
    let dbg = format!("{g:?}");
    assert!(!dbg.contains("refresh-secret"));
    assert!(!dbg.contains("client-secret"));
    assert!(dbg.contains("client"));
  }

  #[test]
  fn issue_stamps_grant_with_now() {
    let grant = AccessGrant { access_token: "new".into(), expires_in: 3600 };
    let c = Credential::issue(grant, at(42));
    assert_eq!(c.token, "new");
    assert_eq!(c.issued_at, at(42));
    assert_eq!(c.expires_at(), Some(at(3642)));
  }
}
