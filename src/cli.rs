use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Subcommand;
use tokio::sync::broadcast;

use crate::config::AppConfig;
use crate::feed::{FeedFetcher, FetchOutcome};
use crate::notice::{Notice, NoticeLevel};
use crate::secret::{Authenticator, RecoverySecret};
use crate::settings::SettingsManager;
use nostr_core::short_id;

/// Env var consulted before prompting for the seed passphrase.
pub const PASSPHRASE_ENV: &str = "KASHIR_PASSPHRASE";

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Show relays, mints and whether a seed phrase is stored
    Status,
    /// Manage Nostr relays
    Relays {
        #[clap(subcommand)]
        action: RelayAction,
    },
    /// Manage Cashu mints
    Mints {
        #[clap(subcommand)]
        action: MintAction,
    },
    /// View, import or remove the wallet seed phrase
    Seed {
        #[clap(subcommand)]
        action: SeedAction,
    },
    /// Fetch recent text notes for an npub
    Posts {
        /// Npub or hex pubkey
        npub: String,
    },
    /// Print the config file JSON schema
    Schema,
}

#[derive(Subcommand, Debug)]
pub enum RelayAction {
    /// List configured relays
    List,
    /// Add a relay (ws:// or wss://)
    Add { url: String },
    /// Remove a relay (the last one cannot be removed)
    Remove { url: String },
}

#[derive(Subcommand, Debug)]
pub enum MintAction {
    /// List known mints
    List,
    /// Add a mint (http:// or https://)
    Add { url: String },
    /// Make a known mint the active one
    Use { url: String },
    /// Remove a mint
    Remove { url: String },
}

#[derive(Subcommand, Debug)]
pub enum SeedAction {
    /// Whether a seed phrase is stored
    Status,
    /// Reveal the seed phrase
    Show,
    /// Delete the seed phrase from secure storage
    Remove {
        /// Skip the confirmation prompt
        #[clap(long)]
        yes: bool,
    },
    /// Store an existing seed phrase
    Import,
}

/// Prompts on the terminal for the seed passphrase.
pub struct PromptAuthenticator;

#[async_trait]
impl Authenticator for PromptAuthenticator {
    async fn passphrase(&self, purpose: &str) -> Option<String> {
        let prompt = format!("Passphrase to {purpose}");
        let answer = tokio::task::spawn_blocking(move || {
            dialoguer::Password::new().with_prompt(prompt).interact()
        })
        .await
        .ok()?
        .ok()?;
        (!answer.is_empty()).then_some(answer)
    }
}

/// Run one command. `manager` and `feed` must share a notifier.
pub async fn handle_command(
    cmd: Commands,
    manager: &SettingsManager,
    feed: &FeedFetcher,
) -> Result<()> {
    let mut notices = manager.notifier().subscribe();

    let result = match cmd {
        Commands::Status => cmd_status(manager).await,
        Commands::Relays { action } => cmd_relays(action, manager).await,
        Commands::Mints { action } => cmd_mints(action, manager).await,
        Commands::Seed { action } => cmd_seed(action, manager).await,
        Commands::Posts { npub } => cmd_posts(&npub, feed).await,
        Commands::Schema => cmd_schema(),
    };

    print_notices(&mut notices);
    result
}

async fn cmd_status(manager: &SettingsManager) -> Result<()> {
    let report = manager
        .activate(true)
        .await
        .context("Settings did not refresh")?;
    let snap = manager.snapshot();

    println!("⚙️  Kashir settings:\n");
    println!("  Relays:     {}", snap.relays.len());
    println!("  Mints:      {}", snap.mints.len());
    println!(
        "  Active:     {}",
        snap.active_mint.as_deref().unwrap_or("(none)")
    );
    println!(
        "  Seed:       {}",
        if snap.has_secret { "stored" } else { "not stored" }
    );

    if !report.all_refreshed() {
        println!("\n  Some settings could not be loaded; see logs.");
    }
    Ok(())
}

async fn cmd_relays(action: RelayAction, manager: &SettingsManager) -> Result<()> {
    match action {
        RelayAction::List => {
            manager.activate(true).await;
            let relays = manager.snapshot().relays;
            if relays.is_empty() {
                println!("No relays configured.");
                println!("Add one with: kashir relays add wss://relay.example.com");
            } else {
                println!("📡 Configured relays:\n");
                for relay in relays {
                    println!("  {relay}");
                }
            }
            Ok(())
        }
        RelayAction::Add { url } => {
            let relays = manager.add_relay(&url).await?;
            println!("📡 {} relay(s) connected", relays.len());
            Ok(())
        }
        RelayAction::Remove { url } => {
            let relays = manager.remove_relay(&url).await?;
            println!("📡 {} relay(s) connected", relays.len());
            Ok(())
        }
    }
}

async fn cmd_mints(action: MintAction, manager: &SettingsManager) -> Result<()> {
    manager.activate(true).await;
    match action {
        MintAction::List => {
            let mints = manager.snapshot().mints;
            if mints.is_empty() {
                println!("No mints configured.");
                println!("Add one with: kashir mints add https://mint.example.com");
            } else {
                println!("🪙 Mints:\n");
                for mint in mints {
                    let marker = if mint.active { "*" } else { " " };
                    println!("  {marker} {}", mint.url);
                }
            }
        }
        MintAction::Add { url } => {
            manager.add_mint(&url).await?;
            manager.on_mint_modal_closed().await;
        }
        MintAction::Use { url } => manager.set_active_mint(&url).await?,
        MintAction::Remove { url } => {
            let active = manager.remove_mint(&url).await?;
            println!("🪙 Active mint: {}", active.as_deref().unwrap_or("(none)"));
        }
    }
    Ok(())
}

async fn cmd_seed(action: SeedAction, manager: &SettingsManager) -> Result<()> {
    manager.activate(true).await;
    match action {
        SeedAction::Status => {
            if manager.snapshot().has_secret {
                println!("🔑 A seed phrase is stored.");
            } else {
                println!("No seed phrase stored.");
                println!("Import one with: kashir seed import");
            }
        }
        SeedAction::Show => {
            let secret = manager.view_secret().await?;
            println!("🔑 Seed phrase ({} words):\n", secret.word_count());
            println!("  {}", secret.expose());
            println!("\nNever share your seed phrase with anyone.");
        }
        SeedAction::Remove { yes } => {
            let confirmed = yes
                || tokio::task::spawn_blocking(|| {
                    dialoguer::Confirm::new()
                        .with_prompt(
                            "Remove the seed phrase? You will need it to restore your wallet.",
                        )
                        .default(false)
                        .interact()
                })
                .await??;
            if !confirmed {
                println!("Not removed.");
                return Ok(());
            }
            manager.delete_secret().await?;
        }
        SeedAction::Import => {
            let phrase = tokio::task::spawn_blocking(|| {
                dialoguer::Password::new()
                    .with_prompt("Seed phrase")
                    .interact()
            })
            .await??;
            let secret = RecoverySecret::new(phrase.split_whitespace().collect::<Vec<_>>().join(" "));
            anyhow::ensure!(secret.word_count() > 0, "Seed phrase must not be empty");
            manager.import_secret(&secret).await?;
            println!("✅ Imported {}-word seed phrase.", secret.word_count());
        }
    }
    Ok(())
}

async fn cmd_posts(npub: &str, feed: &FeedFetcher) -> Result<()> {
    if let FetchOutcome::Succeeded(posts) = feed.fetch_posts(npub).await? {
        println!("📝 {} post(s) for {}:\n", posts.len(), short_id(npub.trim()));
        for post in posts {
            println!("  [{}] {}", post.created_at, post.content.replace('\n', " "));
        }
    }
    Ok(())
}

fn cmd_schema() -> Result<()> {
    let schema = schemars::schema_for!(AppConfig);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn print_notices(rx: &mut broadcast::Receiver<Notice>) {
    while let Ok(notice) = rx.try_recv() {
        let icon = match notice.level {
            NoticeLevel::Success => "✅",
            NoticeLevel::Info => "ℹ️ ",
            NoticeLevel::Error => "❌",
        };
        println!("{icon} {}: {}", notice.title, notice.message);
    }
}
