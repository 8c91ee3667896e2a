//! arnica-api server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens the
//! in-process SQLite store and user directory, and serves the activation
//! API over HTTP. Any setting can be overridden with an `ARNICA_`-prefixed
//! environment variable.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use arnica_activation::{Activation, OldestPractitioner};
use arnica_api::{AppState, ServerConfig};
use arnica_store_sqlite::{SqliteDirectory, SqliteStore};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Arnica activation server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("ARNICA"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Expand `~` in store paths.
  let store_path = expand_tilde(&server_cfg.store_path);
  let directory_path = expand_tilde(&server_cfg.directory_path);

  // Open the activation store and the user directory.
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  let directory = SqliteDirectory::open(&directory_path)
    .await
    .with_context(|| format!("failed to open directory at {directory_path:?}"))?;

  // Build application state.
  let store = Arc::new(store);
  let state = AppState {
    activation: Arc::new(Activation::new(
      store.clone(),
      Arc::new(directory),
      OldestPractitioner::new(store),
    )),
  };

  let app = arnica_api::router(state).layer(TraceLayer::new_for_http());
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
