//! Gas pricing strategies for enforcement transactions.
//!
//! Legacy pricing is the default (local dev nodes and most keeper deployments);
//! EIP-1559 can be selected per deployment.
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper_chain::gas::{create_gas_strategy, GasPricing};
//!
//! let strategy = create_gas_strategy(GasPricing::Legacy, 1.0, 100.0, None);
//! let params = strategy.fetch_params(rpc_url).await?;
//! strategy.apply_gas(&mut tx, &params);
//! ```

mod eip1559;
mod legacy;

pub use eip1559::Eip1559GasStrategy;
pub use legacy::LegacyGasStrategy;

use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::Debug;
use std::str::FromStr;

const WEI_PER_GWEI: f64 = 1e9;

/// Gas pricing model selected in configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GasPricing {
    #[default]
    Legacy,
    Eip1559,
}

impl FromStr for GasPricing {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "legacy" => Ok(GasPricing::Legacy),
            "eip1559" | "eip-1559" => Ok(GasPricing::Eip1559),
            other => anyhow::bail!("unknown gas pricing model: {other}"),
        }
    }
}

/// Gas parameters fetched from the chain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GasParams {
    /// Legacy gas pricing (pre-EIP-1559).
    Legacy {
        /// Gas price in wei.
        gas_price: u128,
    },
    /// EIP-1559 gas pricing.
    Eip1559 {
        /// Maximum fee per gas in wei.
        max_fee_per_gas: u128,
        /// Maximum priority fee per gas in wei.
        max_priority_fee_per_gas: u128,
        /// Base fee of the latest block.
        base_fee: u128,
    },
}

impl GasParams {
    /// Upper bound paid per gas unit.
    pub fn effective_gas_price(&self) -> u128 {
        match self {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        }
    }
}

/// Fetches gas prices and applies them to transaction requests.
#[async_trait]
pub trait GasStrategy: Send + Sync + Debug {
    /// Fetch current gas parameters from the given RPC URL.
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams>;

    /// Set the pricing fields on a transaction request.
    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams);

    /// Strategy name for logging.
    fn strategy_name(&self) -> &'static str;
}

fn gwei_to_wei(gwei: f64) -> u128 {
    (gwei.max(0.0) * WEI_PER_GWEI) as u128
}

/// Build a gas strategy from configuration values (gwei).
///
/// For EIP-1559, `max_gas_price_gwei` caps `max_fee_per_gas` and
/// `priority_fee_gwei` defaults to 2 gwei.
pub fn create_gas_strategy(
    pricing: GasPricing,
    default_gas_price_gwei: f64,
    max_gas_price_gwei: f64,
    priority_fee_gwei: Option<f64>,
) -> Box<dyn GasStrategy> {
    match pricing {
        GasPricing::Eip1559 => {
            let priority_fee = priority_fee_gwei.unwrap_or(2.0);
            Box::new(Eip1559GasStrategy::new(
                gwei_to_wei(priority_fee),
                gwei_to_wei(max_gas_price_gwei),
            ))
        }
        GasPricing::Legacy => Box::new(LegacyGasStrategy::new(
            gwei_to_wei(default_gas_price_gwei),
            gwei_to_wei(max_gas_price_gwei),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gas_params_effective_price() {
        let legacy = GasParams::Legacy {
            gas_price: 1_000_000_000,
        };
        assert_eq!(legacy.effective_gas_price(), 1_000_000_000);

        let eip1559 = GasParams::Eip1559 {
            max_fee_per_gas: 50_000_000_000,
            max_priority_fee_per_gas: 2_000_000_000,
            base_fee: 30_000_000_000,
        };
        assert_eq!(eip1559.effective_gas_price(), 50_000_000_000);
    }

    #[test]
    fn test_gas_pricing_parse() {
        assert_eq!("Legacy".parse::<GasPricing>().unwrap(), GasPricing::Legacy);
        assert_eq!("eip-1559".parse::<GasPricing>().unwrap(), GasPricing::Eip1559);
        assert_eq!("EIP1559".parse::<GasPricing>().unwrap(), GasPricing::Eip1559);
        assert!("custom".parse::<GasPricing>().is_err());
    }

    #[test]
    fn test_create_gas_strategy() {
        let legacy = create_gas_strategy(GasPricing::Legacy, 1.0, 10.0, None);
        assert_eq!(legacy.strategy_name(), "Legacy");

        let eip1559 = create_gas_strategy(GasPricing::Eip1559, 30.0, 500.0, Some(2.0));
        assert_eq!(eip1559.strategy_name(), "EIP-1559");
    }

    #[test]
    fn test_gwei_conversion() {
        assert_eq!(gwei_to_wei(1.5), 1_500_000_000);
        assert_eq!(gwei_to_wei(-3.0), 0);
    }
}
