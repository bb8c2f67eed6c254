//! Configuration management with profile support.
//!
//! Provides centralized configuration for both keeper loops with support for
//! different profiles (default, local, production).

use crate::error::{KeeperError, KeeperResult};
use crate::scheduler::SchedulerConfig;
use alloy::primitives::Address;
use keeper_chain::GasPricing;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main configuration structure containing all keeper parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeeperConfig {
    /// Profile name (for logging/identification)
    #[serde(default = "default_profile_name")]
    pub profile: String,

    /// RPC endpoint; `${VAR}` patterns are expanded. Falls back to `RPC_URL`.
    #[serde(default)]
    pub rpc_url: Option<String>,

    /// Owners whose positions the liquidation keeper evaluates
    #[serde(default)]
    pub accounts_to_watch: Vec<String>,

    #[serde(default)]
    pub liquidation: LiquidationLoopConfig,

    #[serde(default)]
    pub auction: AuctionLoopConfig,

    #[serde(default)]
    pub execution: ExecutionSettings,

    #[serde(default)]
    pub scheduler: SchedulerSettings,

    #[serde(default)]
    pub gas: GasSettings,
}

fn default_profile_name() -> String {
    "default".to_string()
}
fn default_true() -> bool {
    true
}

/// Liquidation keeper loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LiquidationLoopConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between iterations (seconds)
    #[serde(default = "default_liquidation_interval")]
    pub poll_interval_secs: u64,
}

fn default_liquidation_interval() -> u64 {
    30
}

impl Default for LiquidationLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_liquidation_interval(),
        }
    }
}

/// Auction reset keeper loop.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuctionLoopConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Delay between iterations (seconds)
    #[serde(default = "default_auction_interval")]
    pub poll_interval_secs: u64,

    /// Ids probed past the active auction count
    #[serde(default = "default_scan_margin")]
    pub scan_margin: u64,

    /// Concurrent `auctionIsActive` probes
    #[serde(default = "default_probe_concurrency")]
    pub probe_concurrency: usize,
}

fn default_auction_interval() -> u64 {
    60
}
fn default_scan_margin() -> u64 {
    100
}
fn default_probe_concurrency() -> usize {
    10
}

impl Default for AuctionLoopConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            poll_interval_secs: default_auction_interval(),
            scan_margin: default_scan_margin(),
            probe_concurrency: default_probe_concurrency(),
        }
    }
}

/// Transaction execution parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionSettings {
    /// Pause after each executed opportunity (seconds)
    #[serde(default = "default_inter_delay")]
    pub inter_opportunity_delay_secs: u64,

    /// Gas added on top of the estimate
    #[serde(default = "default_gas_buffer")]
    pub gas_buffer: u64,

    /// Maximum wait for a receipt (seconds)
    #[serde(default = "default_confirmation_timeout")]
    pub confirmation_timeout_secs: u64,

    /// Receipt polling period (milliseconds)
    #[serde(default = "default_receipt_poll")]
    pub receipt_poll_interval_ms: u64,
}

fn default_inter_delay() -> u64 {
    5
}
fn default_gas_buffer() -> u64 {
    10_000
}
fn default_confirmation_timeout() -> u64 {
    120
}
fn default_receipt_poll() -> u64 {
    1_000
}

impl Default for ExecutionSettings {
    fn default() -> Self {
        Self {
            inter_opportunity_delay_secs: default_inter_delay(),
            gas_buffer: default_gas_buffer(),
            confirmation_timeout_secs: default_confirmation_timeout(),
            receipt_poll_interval_ms: default_receipt_poll(),
        }
    }
}

impl ExecutionSettings {
    pub fn inter_opportunity_delay(&self) -> Duration {
        Duration::from_secs(self.inter_opportunity_delay_secs)
    }
    pub fn confirmation_timeout(&self) -> Duration {
        Duration::from_secs(self.confirmation_timeout_secs)
    }
    pub fn receipt_poll_interval(&self) -> Duration {
        Duration::from_millis(self.receipt_poll_interval_ms)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerSettings {
    /// Sleep after a failed iteration (seconds)
    #[serde(default = "default_backoff")]
    pub backoff_secs: u64,
}

fn default_backoff() -> u64 {
    60
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            backoff_secs: default_backoff(),
        }
    }
}

/// Gas pricing configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GasSettings {
    /// "legacy" or "eip1559"
    #[serde(default = "default_pricing")]
    pub pricing: String,

    /// Used when the node does not return a gas price (gwei)
    #[serde(default = "default_gas_price")]
    pub default_gas_price_gwei: f64,

    /// Maximum gas price willing to pay (gwei)
    #[serde(default = "default_max_gas_price")]
    pub max_gas_price_gwei: f64,

    /// Priority fee for EIP-1559 transactions (gwei)
    #[serde(default)]
    pub priority_fee_gwei: Option<f64>,
}

fn default_pricing() -> String {
    "legacy".to_string()
}
fn default_gas_price() -> f64 {
    1.0
}
fn default_max_gas_price() -> f64 {
    100.0
}

impl Default for GasSettings {
    fn default() -> Self {
        Self {
            pricing: default_pricing(),
            default_gas_price_gwei: default_gas_price(),
            max_gas_price_gwei: default_max_gas_price(),
            priority_fee_gwei: None,
        }
    }
}

impl GasSettings {
    pub fn pricing(&self) -> KeeperResult<GasPricing> {
        self.pricing
            .parse()
            .map_err(|e: anyhow::Error| KeeperError::Config(e.to_string()))
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            profile: default_profile_name(),
            rpc_url: None,
            accounts_to_watch: Vec::new(),
            liquidation: LiquidationLoopConfig::default(),
            auction: AuctionLoopConfig::default(),
            execution: ExecutionSettings::default(),
            scheduler: SchedulerSettings::default(),
            gas: GasSettings::default(),
        }
    }
}

impl KeeperConfig {
    /// Load configuration from a TOML file and expand `${VAR}` patterns.
    pub fn from_file(path: &str) -> KeeperResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| KeeperError::Config(format!("cannot read {path}: {e}")))?;
        let mut config: Self = toml::from_str(&content)
            .map_err(|e| KeeperError::Config(format!("invalid {path}: {e}")))?;
        config.expand_env_vars();
        Ok(config)
    }

    /// Local dev node: fast polling and short timeouts.
    pub fn local() -> Self {
        Self {
            profile: "local".to_string(),
            liquidation: LiquidationLoopConfig {
                enabled: true,
                poll_interval_secs: 5,
            },
            auction: AuctionLoopConfig {
                poll_interval_secs: 10,
                scan_margin: 20,
                ..Default::default()
            },
            execution: ExecutionSettings {
                inter_opportunity_delay_secs: 1,
                confirmation_timeout_secs: 30,
                receipt_poll_interval_ms: 250,
                ..Default::default()
            },
            scheduler: SchedulerSettings { backoff_secs: 10 },
            ..Default::default()
        }
    }

    /// Production profile with conservative settings.
    pub fn production() -> Self {
        Self {
            profile: "production".to_string(),
            execution: ExecutionSettings {
                gas_buffer: 50_000,
                confirmation_timeout_secs: 180,
                ..Default::default()
            },
            gas: GasSettings {
                pricing: "eip1559".to_string(),
                max_gas_price_gwei: 300.0,
                priority_fee_gwei: Some(2.0),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Profile from `KEEPER_PROFILE`. Supported values: local, production.
    pub fn from_profile_name(profile: &str) -> Self {
        match profile.to_lowercase().as_str() {
            "local" | "dev" => Self::local(),
            "production" | "prod" => Self::production(),
            _ => Self::default(),
        }
    }

    /// `KEEPER_CONFIG` names a TOML file; otherwise `KEEPER_PROFILE` picks a profile.
    pub fn from_env() -> KeeperResult<Self> {
        let config = match std::env::var("KEEPER_CONFIG") {
            Ok(path) => Self::from_file(&path)?,
            Err(_) => {
                let profile =
                    std::env::var("KEEPER_PROFILE").unwrap_or_else(|_| "default".to_string());
                Self::from_profile_name(&profile)
            }
        };
        config.validate()?;
        Ok(config)
    }

    pub fn expand_env_vars(&mut self) {
        if let Some(ref mut url) = self.rpc_url {
            *url = expand_env(url);
        }
        for account in &mut self.accounts_to_watch {
            *account = expand_env(account);
        }
    }

    /// Reject values that would stall or spin the loops.
    pub fn validate(&self) -> KeeperResult<()> {
        if !self.liquidation.enabled && !self.auction.enabled {
            return Err(KeeperError::Config("both keepers are disabled".into()));
        }
        if self.liquidation.poll_interval_secs == 0 || self.auction.poll_interval_secs == 0 {
            return Err(KeeperError::Config("poll intervals must be positive".into()));
        }
        if self.auction.probe_concurrency == 0 {
            return Err(KeeperError::Config("probe_concurrency must be at least 1".into()));
        }
        if self.execution.confirmation_timeout_secs == 0 {
            return Err(KeeperError::Config(
                "confirmation_timeout_secs must be positive".into(),
            ));
        }
        if self.execution.receipt_poll_interval_ms == 0 {
            return Err(KeeperError::Config(
                "receipt_poll_interval_ms must be positive".into(),
            ));
        }
        self.gas.pricing()?;
        self.watched_accounts()?;
        Ok(())
    }

    /// Parsed watch list, duplicates removed, order kept.
    pub fn watched_accounts(&self) -> KeeperResult<Vec<Address>> {
        let mut accounts = Vec::with_capacity(self.accounts_to_watch.len());
        for raw in &self.accounts_to_watch {
            let address: Address = raw
                .trim()
                .parse()
                .map_err(|e| KeeperError::Config(format!("invalid account {raw}: {e}")))?;
            if !accounts.contains(&address) {
                accounts.push(address);
            }
        }
        Ok(accounts)
    }

    pub fn liquidation_scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.liquidation.poll_interval_secs),
            inter_opportunity_delay: self.execution.inter_opportunity_delay(),
            backoff: Duration::from_secs(self.scheduler.backoff_secs),
        }
    }

    pub fn auction_scheduler(&self) -> SchedulerConfig {
        SchedulerConfig {
            poll_interval: Duration::from_secs(self.auction.poll_interval_secs),
            inter_opportunity_delay: self.execution.inter_opportunity_delay(),
            backoff: Duration::from_secs(self.scheduler.backoff_secs),
        }
    }

    /// Log the current configuration.
    pub fn log_config(&self) {
        tracing::info!(
            profile = %self.profile,
            accounts = self.accounts_to_watch.len(),
            "Keeper configuration loaded"
        );
        tracing::info!(
            enabled = self.liquidation.enabled,
            poll_interval_secs = self.liquidation.poll_interval_secs,
            "Liquidation keeper"
        );
        tracing::info!(
            enabled = self.auction.enabled,
            poll_interval_secs = self.auction.poll_interval_secs,
            scan_margin = self.auction.scan_margin,
            probe_concurrency = self.auction.probe_concurrency,
            "Auction reset keeper"
        );
        tracing::info!(
            gas_buffer = self.execution.gas_buffer,
            confirmation_timeout_secs = self.execution.confirmation_timeout_secs,
            inter_opportunity_delay_secs = self.execution.inter_opportunity_delay_secs,
            backoff_secs = self.scheduler.backoff_secs,
            "Execution parameters"
        );
        tracing::info!(
            pricing = %self.gas.pricing,
            default_gwei = self.gas.default_gas_price_gwei,
            max_gwei = self.gas.max_gas_price_gwei,
            "Gas pricing"
        );
    }
}

/// Expand ${VAR_NAME} patterns with environment variable values.
fn expand_env(s: &str) -> String {
    let re = match regex_lite::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return s.to_string(),
    };

    let mut result = s.to_string();
    for cap in re.captures_iter(s) {
        if let (Some(full_match), Some(var_match)) = (cap.get(0), cap.get(1)) {
            if let Ok(value) = std::env::var(var_match.as_str()) {
                result = result.replace(full_match.as_str(), &value);
            }
        }
    }
    result
}
