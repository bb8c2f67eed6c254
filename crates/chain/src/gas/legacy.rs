//! Legacy gas pricing (single `gasPrice` field).

use super::{GasParams, GasStrategy};
use alloy::network::TransactionBuilder;
use alloy::rpc::types::TransactionRequest;
use anyhow::Result;
use async_trait::async_trait;
use tracing::debug;

/// Uses the node's `eth_gasPrice`, capped at a configured maximum.
#[derive(Debug)]
pub struct LegacyGasStrategy {
    /// Price used when the node does not answer, in wei.
    default_gas_price: u128,
    /// Maximum price ever paid, in wei.
    max_gas_price: u128,
}

impl LegacyGasStrategy {
    pub fn new(default_gas_price: u128, max_gas_price: u128) -> Self {
        Self {
            default_gas_price,
            max_gas_price,
        }
    }

    fn capped(&self, gas_price: u128) -> u128 {
        gas_price.min(self.max_gas_price)
    }
}

#[async_trait]
impl GasStrategy for LegacyGasStrategy {
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams> {
        use alloy::providers::{Provider, ProviderBuilder};

        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let gas_price = match provider.get_gas_price().await {
            Ok(price) => price,
            Err(e) => {
                debug!(
                    error = %e,
                    default = self.default_gas_price,
                    "eth_gasPrice failed, using default"
                );
                self.default_gas_price
            }
        };

        Ok(GasParams::Legacy {
            gas_price: self.capped(gas_price),
        })
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        let price = match params {
            GasParams::Legacy { gas_price } => *gas_price,
            GasParams::Eip1559 {
                max_fee_per_gas, ..
            } => *max_fee_per_gas,
        };
        tx.set_gas_price(self.capped(price));
    }

    fn strategy_name(&self) -> &'static str {
        "Legacy"
    }
}
