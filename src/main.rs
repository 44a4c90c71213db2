use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use kashir::cli::{self, Commands, PromptAuthenticator, PASSPHRASE_ENV};
use kashir::secret::Authenticator;
use kashir::{
    AppConfig, ConfigStore, EncryptedFileSecretStore, FeedFetcher, Notifier, SettingsManager,
    SqliteConfigStore, StaticPassphrase,
};
use nostr_core::{RelayClient, RelayHandle};

#[derive(Parser)]
#[command(name = "kashir")]
#[command(about = "Kashir wallet settings: relays, mints and seed phrase")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (default: ~/.kashir/config.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match cli.config {
        Some(path) => path,
        None => AppConfig::default_path()?,
    };
    let config = AppConfig::load_from_file(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    init_logging(&config.logging.level)?;
    debug!("Config loaded from {}", config_path.display());

    let store = Arc::new(
        SqliteConfigStore::open(&config.db_path(), &config.default_relays())
            .context("Failed to open settings store")?,
    );

    let authenticator: Arc<dyn Authenticator> = match StaticPassphrase::from_env(PASSPHRASE_ENV) {
        Some(fixed) => Arc::new(fixed),
        None => Arc::new(PromptAuthenticator),
    };
    let secrets = Arc::new(EncryptedFileSecretStore::new(
        config.secret_path(),
        authenticator,
        config.secret.kdf_params(),
    ));

    let relays: Arc<dyn RelayHandle> = Arc::new(connect_relays(&cli.command, store.as_ref()).await);

    let notifier = Notifier::new();
    let manager = SettingsManager::new(store, secrets, relays.clone(), notifier.clone());
    let feed = FeedFetcher::new(relays, config.feed_settings(), notifier);

    cli::handle_command(cli.command, &manager, &feed).await
}

/// Only commands that talk to relays get a live pool.
async fn connect_relays(command: &Commands, store: &SqliteConfigStore) -> RelayClient {
    if !matches!(command, Commands::Posts { .. } | Commands::Relays { .. }) {
        return RelayClient::new();
    }

    let urls = match store.load_relays().await {
        Ok(urls) => urls,
        Err(e) => {
            warn!("Failed to load relays: {e:#}");
            return RelayClient::new();
        }
    };

    match RelayClient::connect(urls).await {
        Ok(client) => client,
        Err(e) => {
            warn!("Failed to connect relay client: {e:#}");
            RelayClient::new()
        }
    }
}

fn init_logging(level: &str) -> Result<()> {
    let filter = match level.to_lowercase().as_str() {
        "error" => tracing::Level::ERROR,
        "warn" => tracing::Level::WARN,
        "info" => tracing::Level::INFO,
        "debug" => tracing::Level::DEBUG,
        "trace" => tracing::Level::TRACE,
        _ => tracing::Level::INFO,
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter.to_string())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();

    Ok(())
}
