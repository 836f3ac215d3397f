//! recoup server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), layers
//! `RECOUP_*` environment variables on top, opens an in-process SQLite store,
//! and serves the webhook endpoint and JSON API over HTTP.
//!
//! # One-off sync
//!
//! To reconcile the interaction log into inquiries once and exit:
//!
//! ```
//! cargo run -p recoup-webhook --bin recoup -- --sync-once
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use recoup_core::sync::sync_inquiries;
use recoup_store_sqlite::SqliteStore;
use recoup_webhook::{AppState, ServerConfig, schedule};
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Cart recovery reconciliation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Run one inquiry sync pass, print the report and exit.
  #[arg(long)]
  sync_once: bool,
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

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("RECOUP"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  if cli.sync_once {
    let report = sync_inquiries(&store).await.context("inquiry sync failed")?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    return Ok(());
  }

  let policy = server_cfg
    .abandonment_policy()
    .context("invalid abandonment_threshold_secs")?;

  if server_cfg.webhook_secrets.is_empty() && server_cfg.default_webhook_secret.is_none() {
    tracing::warn!("no webhook secrets configured; every delivery will be answered with 500");
  }

  let state = AppState {
    store:  Arc::new(store),
    config: Arc::new(server_cfg.clone()),
    policy,
  };

  if let Some(secs) = server_cfg.inquiry_sync_interval_secs.filter(|s| *s > 0) {
    tracing::info!(every_secs = secs, "scheduling inquiry sync");
    schedule::spawn_inquiry_sync(Arc::clone(&state.store), Duration::from_secs(secs));
  }

  let app = recoup_webhook::router(state);
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
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
