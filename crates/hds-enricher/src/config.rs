//! Enricher configuration: a TOML file overlaid with `HDS_*` environment
//! variables.
//!
//! Nested keys use a double underscore in the environment, e.g.
//! `HDS_STORE__BASE_URL` or `HDS_CREDENTIALS__CLIENT_SECRET`.

use std::{path::PathBuf, time::Duration as StdDuration};

use chrono::Duration;
use hds_core::{credential::RefreshGrant, record::PendingQuery};
use hds_elastic::ElasticConfig;
use hds_webex::WebexConfig;
use serde::Deserialize;

use crate::enricher::EnricherSettings;

#[derive(Debug, Clone, Deserialize)]
pub struct EnricherConfig {
  /// Where the current access token is persisted. A leading `~/` is
  /// expanded by the binary.
  #[serde(default = "default_token_path")]
  pub token_path:             PathBuf,
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs:     u64,
  /// A credential this close to expiry is refreshed early.
  #[serde(default = "default_safety_margin_secs")]
  pub safety_margin_secs:     u64,
  #[serde(default = "default_tick_interval_ms")]
  pub tick_interval_ms:       u64,
  #[serde(default = "default_auth_backoff_base_secs")]
  pub auth_backoff_base_secs: u64,
  #[serde(default = "default_auth_backoff_max_secs")]
  pub auth_backoff_max_secs:  u64,

  #[serde(default)]
  pub query:       PendingQuery,
  #[serde(default)]
  pub store:       ElasticConfig,
  #[serde(default)]
  pub identity:    WebexConfig,
  pub credentials: RefreshGrant,
}

fn default_token_path() -> PathBuf { PathBuf::from("/tmp/scripts/webex_teams_proc.token") }
fn default_poll_interval_secs() -> u64 { 10 }
fn default_safety_margin_secs() -> u64 { 180 }
fn default_tick_interval_ms() -> u64 { 1000 }
fn default_auth_backoff_base_secs() -> u64 { 5 }
fn default_auth_backoff_max_secs() -> u64 { 300 }

fn secs(n: u64) -> Duration {
  Duration::seconds(i64::try_from(n).unwrap_or(i64::MAX / 1000))
}

impl EnricherConfig {
  /// Build from `path` (optional) and the process environment.
  pub fn load(path: impl Into<PathBuf>) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path.into()).required(false))
      .add_source(
        config::Environment::with_prefix("HDS")
          .prefix_separator("_")
          .separator("__"),
      )
      .build()?
      .try_deserialize()
  }

  pub fn safety_margin(&self) -> Duration { secs(self.safety_margin_secs) }

  pub fn settings(&self) -> EnricherSettings {
    EnricherSettings {
      query:             self.query.clone(),
      poll_interval:     secs(self.poll_interval_secs),
      tick_interval:     StdDuration::from_millis(self.tick_interval_ms),
      auth_backoff_base: secs(self.auth_backoff_base_secs),
      auth_backoff_max:  secs(self.auth_backoff_max_secs),
    }
  }
}
