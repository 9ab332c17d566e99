//! hds-traffic binary.
//!
//! Creates a new Webex space every `--interval-secs`, adds everyone in the
//! organisation as moderator and posts a message. Runs until Ctrl-C.

use anyhow::Context as _;
use clap::Parser;
use hds_traffic::{TrafficConfig, TrafficGenerator};
use hds_webex::{WebexClient, WebexConfig};
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Generate KMS traffic by creating Webex spaces")]
struct Cli {
  /// Bearer token of the account that creates the spaces.
  #[arg(long, env = "WEBEX_TOKEN", hide_env_values = true)]
  token: String,

  /// Webex API root.
  #[arg(long, env = "WEBEX_URL", default_value = "https://api.ciscospark.com/v1")]
  base_url: String,

  #[arg(long, default_value = "zz auto generated")]
  title_prefix: String,

  #[arg(long, default_value = "Space automatically created to cause some traffic")]
  message: String,

  #[arg(long, default_value_t = 30)]
  interval_secs: u64,

  #[arg(long, default_value_t = 1000)]
  max_people: u32,

  /// Log and skip people who cannot be added instead of stopping.
  #[arg(long)]
  skip_failed_memberships: bool,

  /// Stop after this many spaces.
  #[arg(long)]
  cycles: Option<u32>,
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

  let client = WebexClient::new(&WebexConfig { base_url: cli.base_url, ..WebexConfig::default() })
    .context("invalid Webex API URL")?
    .with_token(cli.token);

  let generator = TrafficGenerator::new(client, TrafficConfig {
    title_prefix:            cli.title_prefix,
    message:                 cli.message,
    interval:                std::time::Duration::from_secs(cli.interval_secs),
    max_people:              cli.max_people,
    skip_failed_memberships: cli.skip_failed_memberships,
    cycles:                  cli.cycles,
  });

  let shutdown = async {
    if tokio::signal::ctrl_c().await.is_err() {
      std::future::pending::<()>().await;
    }
    tracing::info!("shutdown requested");
  };

  let done = generator.run(shutdown).await.context("traffic generation failed")?;
  tracing::info!(spaces = done, "stopped");
  Ok(())
}
