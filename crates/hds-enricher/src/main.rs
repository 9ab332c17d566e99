//! hds-enricher binary.
//!
//! Reads `enricher.toml` (or the path given with `--config`) plus `HDS_*`
//! environment overrides, then polls Elasticsearch for KMS request records
//! and attaches Webex profiles to them until interrupted.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use hds_core::clock::SystemClock;
use hds_elastic::ElasticStore;
use hds_enricher::{Enricher, EnricherConfig, TokenLifecycle};
use hds_token_file::FileTokenStore;
use hds_webex::WebexClient;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Attach Webex profiles to HDS KMS audit records")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "enricher.toml")]
  config: PathBuf,

  /// Run a single enrichment pass and exit.
  #[arg(long)]
  once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let cfg = EnricherConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;
  tracing::debug!(?cfg, "loaded configuration");

  let records = ElasticStore::new(cfg.store.clone()).context("invalid store configuration")?;
  let identity =
    Arc::new(WebexClient::new(&cfg.identity).context("invalid identity configuration")?);
  let tokens = FileTokenStore::new(expand_tilde(&cfg.token_path));
  let clock = Arc::new(SystemClock);

  let lifecycle = TokenLifecycle::new(
    identity.clone(),
    tokens,
    cfg.credentials.clone(),
    cfg.safety_margin(),
    clock.clone(),
  );
  let enricher = Enricher::new(records, identity, lifecycle, cfg.settings(), clock);

  if cli.once {
    let report = enricher.run_once().await.context("enrichment pass failed")?;
    tracing::info!(updated = report.updated, failed = report.failed, "single pass done");
    return Ok(());
  }

  enricher.run(shutdown_signal()).await.context("enrichment loop failed")?;
  Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on unix.
async fn shutdown_signal() {
  let ctrl_c = async {
    if let Err(e) = tokio::signal::ctrl_c().await {
      tracing::warn!(error = %e, "cannot listen for Ctrl-C");
      std::future::pending::<()>().await;
    }
  };

  #[cfg(unix)]
  let terminate = async {
    match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
      Ok(mut sig) => {
        sig.recv().await;
      }
      Err(e) => {
        tracing::warn!(error = %e, "cannot listen for SIGTERM");
        std::future::pending::<()>().await;
      }
    }
  };

  #[cfg(not(unix))]
  let terminate = std::future::pending::<()>();

  tokio::select! {
    _ = ctrl_c => {}
    _ = terminate => {}
  }
  tracing::info!("shutdown requested");
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
