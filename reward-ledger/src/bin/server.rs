//! Reward ledger server binary
//!
//! Opens the configured store, spawns the ledger actor and runs until
//! Ctrl-C. Configuration comes from `REWARD_LEDGER_CONFIG` (TOML file) or,
//! if unset, from environment variables.

use reward_ledger::{spawn_ledger_actor, LedgerConfig, RewardLedger};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting ESC Coin Reward Ledger");

    // Load configuration
    let config = match std::env::var("REWARD_LEDGER_CONFIG") {
        Ok(path) => LedgerConfig::from_file(path)?,
        Err(_) => LedgerConfig::from_env()?,
    };
    tracing::info!(config = %serde_json::to_string(&config)?, "Configuration loaded");

    // Open ledger
    let ledger = RewardLedger::open(&config)?;
    let handle = spawn_ledger_actor(ledger, config.actor.mailbox_capacity);
    tracing::info!("Ledger actor running");

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down reward ledger");
    handle.shutdown().await?;
    Ok(())
}
