//! Leveraged-position keepers
//!
//! Runs two independent loops against the protocol:
//! - Liquidation keeper: recomputes net NAV for watched owners and calls `bark`
//! - Auction reset keeper: resets auctions that expired or decayed too far
//!
//! Both loops share one signing account and its nonce counter.

use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use alloy::primitives::Address;
use keeper_chain::{KeeperContracts, LedgerReader, TransactionSender, TransactionSenderBuilder};
use keeper_core::{
    AuctionResetKeeper, ExecutionEngine, KeeperConfig, LiquidationKeeper, PollScheduler,
    StateFetcher,
};

/// Environment variable names.
mod env {
    pub const RPC_URL: &str = "RPC_URL";
    pub const PRIVATE_KEY: &str = "PRIVATE_KEY";
    pub const KEEPER_ADDRESS: &str = "KEEPER_ADDRESS";
    pub const CHAIN_ID: &str = "CHAIN_ID";
    pub const CUSTODIAN: &str = "CUSTODIAN";
    pub const LIQUIDATION_MANAGER: &str = "LIQUIDATION_MANAGER";
    pub const AUCTION_MANAGER: &str = "AUCTION_MANAGER";
    pub const PRICE_ORACLE: &str = "PRICE_ORACLE";
    pub const LOG_FORMAT: &str = "LOG_FORMAT";
}

#[tokio::main]
async fn main() -> Result<()> {
    print_banner();

    dotenvy::dotenv().ok();
    init_tracing();

    // KEEPER_CONFIG names a TOML file, otherwise KEEPER_PROFILE selects a profile
    let keeper_config = KeeperConfig::from_env()?;
    keeper_config.log_config();

    let config = load_config(&keeper_config)?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let handles = start_keepers(config, &keeper_config, shutdown_rx).await?;

    tokio::signal::ctrl_c().await?;
    info!("Shutdown requested, waiting for keepers to finish");
    shutdown_tx.send(true).ok();

    for handle in handles {
        if let Err(e) = handle.await {
            error!(error = %e, "Keeper task panicked");
        }
    }

    info!("Keepers stopped");
    Ok(())
}

fn init_tracing() {
    let json = std::env::var(env::LOG_FORMAT)
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    let (plain_layer, json_layer) = if json {
        (None, Some(fmt::layer().json()))
    } else {
        (Some(fmt::layer()), None)
    };

    tracing_subscriber::registry()
        .with(plain_layer)
        .with(json_layer)
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,keeper_core=debug,keeper_chain=debug")),
        )
        .init();
}

/// Configuration loaded from environment.
struct Config {
    rpc_url: String,
    private_key: String,
    keeper_address: Option<Address>,
    chain_id: Option<u64>,
    contracts: KeeperContracts,
}

fn load_config(keeper_config: &KeeperConfig) -> Result<Config> {
    let get_env = |name: &str| -> Result<String> {
        std::env::var(name).map_err(|_| anyhow::anyhow!("Missing env var: {}", name))
    };

    let get_address = |name: &str| -> Result<Address> {
        get_env(name)?
            .parse()
            .map_err(|e| anyhow::anyhow!("Invalid address for {}: {}", name, e))
    };

    let rpc_url = match &keeper_config.rpc_url {
        Some(url) => url.clone(),
        None => get_env(env::RPC_URL)?,
    };

    let keeper_address = match std::env::var(env::KEEPER_ADDRESS) {
        Ok(_) => Some(get_address(env::KEEPER_ADDRESS)?),
        Err(_) => None,
    };

    let chain_id = match std::env::var(env::CHAIN_ID) {
        Ok(raw) => Some(
            raw.parse()
                .map_err(|e| anyhow::anyhow!("Invalid {}: {}", env::CHAIN_ID, e))?,
        ),
        Err(_) => None,
    };

    Ok(Config {
        rpc_url,
        private_key: get_env(env::PRIVATE_KEY)?,
        keeper_address,
        chain_id,
        contracts: KeeperContracts {
            custodian: get_address(env::CUSTODIAN)?,
            liquidation_manager: get_address(env::LIQUIDATION_MANAGER)?,
            auction_manager: get_address(env::AUCTION_MANAGER)?,
            price_oracle: get_address(env::PRICE_ORACLE)?,
        },
    })
}

async fn build_sender(config: &Config, keeper_config: &KeeperConfig) -> Result<TransactionSender> {
    let gas = &keeper_config.gas;
    let mut builder = TransactionSenderBuilder::new(&config.rpc_url, config.contracts)
        .gas_from_config(
            gas.pricing()?,
            gas.default_gas_price_gwei,
            gas.max_gas_price_gwei,
            gas.priority_fee_gwei,
        );
    if let Some(chain_id) = config.chain_id {
        builder = builder.chain_id(chain_id);
    }

    let sender = builder
        .build(&config.private_key)
        .await
        .context("failed to initialize transaction sender")?;

    if let Some(expected) = config.keeper_address {
        if expected != sender.address {
            anyhow::bail!(
                "{} {} does not match the signing key ({})",
                env::KEEPER_ADDRESS,
                expected,
                sender.address
            );
        }
    }
    Ok(sender)
}

async fn start_keepers(
    config: Config,
    keeper_config: &KeeperConfig,
    shutdown: watch::Receiver<bool>,
) -> Result<Vec<JoinHandle<()>>> {
    info!("Initializing components...");

    let ledger = LedgerReader::new(&config.rpc_url, config.contracts)
        .await
        .context("ledger unreachable")?
        .with_scan_margin(keeper_config.auction.scan_margin)
        .with_probe_concurrency(keeper_config.auction.probe_concurrency);
    if !ledger.health_check().await? {
        anyhow::bail!("ledger health check failed");
    }

    let sender = Arc::new(build_sender(&config, keeper_config).await?);
    info!(
        keeper = %sender.address,
        chain_id = sender.chain_id(),
        gas_strategy = sender.gas_strategy_name(),
        "Keeper account ready"
    );

    let execution = &keeper_config.execution;
    let engine = Arc::new(
        ExecutionEngine::new(sender)
            .with_gas_buffer(execution.gas_buffer)
            .with_confirmation_timeout(execution.confirmation_timeout())
            .with_receipt_poll_interval(execution.receipt_poll_interval()),
    );
    let fetcher = Arc::new(StateFetcher::new(Arc::new(ledger)));

    let mut handles = Vec::new();

    if keeper_config.liquidation.enabled {
        let accounts = keeper_config.watched_accounts()?;
        if accounts.is_empty() {
            warn!("accounts_to_watch is empty, liquidation keeper has nothing to evaluate");
        }
        let keeper = Arc::new(LiquidationKeeper::new(fetcher.clone(), accounts));
        let scheduler = PollScheduler::new(
            keeper,
            engine.clone(),
            keeper_config.liquidation_scheduler(),
            shutdown.clone(),
        );
        handles.push(tokio::spawn(scheduler.run()));
    }

    if keeper_config.auction.enabled {
        let keeper = Arc::new(AuctionResetKeeper::new(fetcher.clone()));
        let scheduler = PollScheduler::new(
            keeper,
            engine.clone(),
            keeper_config.auction_scheduler(),
            shutdown.clone(),
        );
        handles.push(tokio::spawn(scheduler.run()));
    }

    info!(keepers = handles.len(), "All components initialized");
    Ok(handles)
}

/// Print startup banner.
fn print_banner() {
    println!(
        r#"
    ┬┌─┌─┐┌─┐┌─┐┌─┐┬─┐
    ├┴┐├┤ ├┤ ├─┘├┤ ├┬┘
    ┴ ┴└─┘└─┘┴  └─┘┴└─
    Leveraged Position Keepers v0.1.0
    "#
    );
}
