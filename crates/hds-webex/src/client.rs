//! [`WebexClient`] and the [`IdentityProvider`] implementation.

use std::{fmt, time::Duration};

use hds_core::{
  credential::{AccessGrant, RefreshGrant, lifetime},
  profile::SubjectProfile,
  store::IdentityProvider,
};
use reqwest::{Client, RequestBuilder, Response, StatusCode, Url};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::{Error, Result};

// ─── Configuration ────────────────────────────────────────────────────────────

/// Connection settings for the Webex API.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WebexConfig {
  /// API root, including the version segment.
  pub base_url:     String,
  pub timeout_secs: u64,
}

impl Default for WebexConfig {
  fn default() -> Self {
    Self {
      base_url:     "https://api.ciscospark.com/v1".to_string(),
      timeout_secs: 30,
    }
  }
}

// ─── Client ───────────────────────────────────────────────────────────────────

/// Async HTTP client for the Webex REST API.
///
/// Cheap to clone; the inner [`reqwest::Client`] is `Arc`-based.
#[derive(Clone)]
pub struct WebexClient {
  pub(crate) client: Client,
  base:              Url,
  /// Static bearer token for the space/message calls. Identity lookups take
  /// their token per call instead.
  token:             Option<String>,
}

impl fmt::Debug for WebexClient {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("WebexClient")
      .field("base", &self.base.as_str())
      .field("token", &self.token.as_ref().map(|_| "<redacted>"))
      .finish()
  }
}

/// Shape of a `POST /access_token` response. Both fields are checked
/// explicitly so a 2xx without a token is reported as such.
#[derive(Deserialize)]
struct TokenResponse {
  access_token: Option<String>,
  expires_in:   Option<i64>,
}

impl WebexClient {
  pub fn new(config: &WebexConfig) -> Result<Self> {
    let base = Url::parse(&config.base_url)
      .ok()
      .filter(|u| !u.cannot_be_a_base())
      .ok_or_else(|| Error::BaseUrl(config.base_url.clone()))?;
    let client = Client::builder()
      .timeout(Duration::from_secs(config.timeout_secs))
      .build()?;
    Ok(Self { client, base, token: None })
  }

  /// Use `token` for every call that is not an identity lookup.
  pub fn with_token(mut self, token: impl Into<String>) -> Self {
    self.token = Some(token.into());
    self
  }

  /// `{base}/{segments...}`, with each segment percent-encoded.
  pub(crate) fn endpoint(&self, segments: &[&str]) -> Url {
    let mut url = self.base.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    url
  }

  pub(crate) fn authed(&self, req: RequestBuilder) -> Result<RequestBuilder> {
    let token = self.token.as_deref().ok_or(Error::Unauthenticated)?;
    Ok(req.bearer_auth(token))
  }

  /// Pass 2xx responses through; turn anything else into [`Error::Status`].
  pub(crate) async fn expect_success(
    method: &'static str,
    resp: Response,
  ) -> Result<Response> {
    let status = resp.status();
    if status.is_success() {
      return Ok(resp);
    }
    let path = resp.url().path().to_string();
    let body = resp.text().await.unwrap_or_default();
    Err(Error::Status { method, path, status: status.as_u16(), body })
  }
}

// ─── IdentityProvider impl ────────────────────────────────────────────────────

impl IdentityProvider for WebexClient {
  type Error = Error;

  /// `POST /access_token` (form-encoded `refresh_token` grant).
  async fn refresh(&self, grant: &RefreshGrant) -> Result<AccessGrant> {
    let resp = self
      .client
      .post(self.endpoint(&["access_token"]))
      .form(&[
        ("refresh_token", grant.refresh_token.as_str()),
        ("grant_type", "refresh_token"),
        ("client_id", grant.client_id.as_str()),
        ("client_secret", grant.client_secret.as_str()),
      ])
      .send()
      .await?;

    let status = resp.status();
    let body = resp.text().await?;
    if !status.is_success() {
      warn!(%status, "token refresh rejected");
      return Err(Error::Auth { status: status.as_u16(), body });
    }

    let parsed: TokenResponse = serde_json::from_str(&body)?;
    let access_token = parsed
      .access_token
      .filter(|t| !t.is_empty())
      .ok_or(Error::MissingField("access_token"))?;
    let expires_in = parsed.expires_in.ok_or(Error::MissingField("expires_in"))?;
    if lifetime(expires_in).is_none() {
      return Err(Error::InvalidField("expires_in"));
    }

    debug!(expires_in, "obtained access token");
    Ok(AccessGrant { access_token, expires_in })
  }

  /// `GET /people/{subject_id}`
  async fn fetch_profile(
    &self,
    subject_id: &str,
    bearer_token: &str,
  ) -> Result<SubjectProfile> {
    let resp = self
      .client
      .get(self.endpoint(&["people", subject_id]))
      .bearer_auth(bearer_token)
      .send()
      .await?;

    let status = resp.status();
    if status != StatusCode::OK {
      let body = resp.text().await.unwrap_or_default();
      return Err(Error::Lookup {
        subject_id: subject_id.to_string(),
        status: status.as_u16(),
        body,
      });
    }

    let value: serde_json::Value = resp.json().await?;
    let profile = SubjectProfile::from_value(value)?;
    debug!(subject_id, display_name = ?profile.display_name, "fetched profile");
    Ok(profile)
  }
}
