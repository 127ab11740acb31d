//! colloquy server binary.
//!
//! Reads `config.toml` (or the path specified with `--config`), opens an
//! in-process SQLite store, connects the configured model and embedding
//! providers, and serves the JSON API and answer streams over HTTP.
//!
//! # Password hash generation
//!
//! To generate the argon2 PHC string for `auth_password_hash` in config.toml:
//!
//! ```
//! cargo run -p colloquy-answer --bin server -- --hash-password
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use argon2::{Argon2, PasswordHasher, password_hash::SaltString};
use clap::Parser;
use colloquy_answer::{AppState, Pipeline, ServerConfig};
use colloquy_core::{
  config::StoreConfig,
  model::{ModelBackend, ModelRegistry},
  store::ConversationStore,
};
use colloquy_llm::{OpenAiBackend, OpenAiEmbedder};
use colloquy_store_sqlite::SqliteStore;
use rand_core::OsRng;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Colloquy answer server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Print the argon2 hash for a password entered on stdin and exit.
  #[arg(long)]
  hash_password: bool,
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

  // Helper mode: hash a password and exit.
  if cli.hash_password {
    let password = read_password()?;
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
      .hash_password(password.as_bytes(), &salt)
      .map_err(|e| anyhow::anyhow!("argon2 error: {e}"))?
      .to_string();
    println!("{hash}");
    return Ok(());
  }

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("COLLOQUY").separator("__"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;
  seed_default_store(&store, &server_cfg).await?;

  // Model and embedding providers.
  let mut models = ModelRegistry::new(server_cfg.default_model.clone());
  for provider in &server_cfg.models {
    let backend = OpenAiBackend::new(provider.clone())
      .with_context(|| format!("failed to configure model provider {}", provider.name))?;
    tracing::info!(name = %provider.name, model = %provider.model, "model provider ready");
    models = models.with_backend(provider.name.clone(), Arc::new(backend) as Arc<dyn ModelBackend>);
  }
  models
    .resolve(None)
    .with_context(|| format!("default model {} is not configured", server_cfg.default_model))?;

  let embedder = OpenAiEmbedder::new(server_cfg.embedding.clone())
    .context("failed to configure embedding provider")?;

  // Build application state.
  let shutdown = CancellationToken::new();
  let pipeline = Pipeline::new(
    Arc::new(store),
    models,
    Arc::new(embedder),
    server_cfg.pipeline_settings(),
  )
  .with_shutdown(shutdown.clone());

  let state = AppState {
    pipeline: Arc::new(pipeline),
    auth:     Arc::new(server_cfg.auth_config()),
  };

  let app = colloquy_answer::app(state).layer(TraceLayer::new_for_http());
  let address = format!("{}:{}", server_cfg.host, server_cfg.port);

  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app)
    .with_graceful_shutdown(shutdown_signal(shutdown))
    .await
    .context("server error")?;

  Ok(())
}

/// Store `config.default_store` unless the owner scope already has a store.
async fn seed_default_store(store: &SqliteStore, config: &ServerConfig) -> anyhow::Result<()> {
  let existing = store
    .default_store_config(&config.owner_scope)
    .await
    .context("failed to read store configuration")?;
  if existing.is_some() {
    return Ok(());
  }

  let seed = StoreConfig {
    owner: config.owner_scope.clone(),
    ..config.default_store.clone()
  };
  tracing::info!(owner = %seed.owner, name = %seed.name, "seeding default store");
  store
    .put_store_config(seed)
    .await
    .context("failed to seed default store")?;
  Ok(())
}

/// Resolve on Ctrl-C, cancelling in-flight generations first.
async fn shutdown_signal(shutdown: CancellationToken) {
  if let Err(e) = tokio::signal::ctrl_c().await {
    tracing::error!("failed to listen for shutdown signal: {e}");
    return;
  }
  tracing::info!("shutting down");
  shutdown.cancel();
}

/// Read a password from stdin.
fn read_password() -> anyhow::Result<String> {
  use std::io::{self, BufRead, Write};
  let stdin = io::stdin();
  print!("Password: ");
  io::stdout().flush().ok();
  let mut line = String::new();
  stdin.lock().read_line(&mut line)?;
  Ok(
    line
      .trim_end_matches('\n')
      .trim_end_matches('\r')
      .to_string(),
  )
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
