//! EIP-1559 gas pricing for enforcement transactions.
//!
//! The tip is the configured priority fee. The fee cap doubles the latest base
//! fee so the transaction survives a few full blocks, and never exceeds the
//! configured maximum. Chains without a base fee fall back to `eth_gasPrice`.

use super::{GasParams, GasStrategy};
use alloy::eips::BlockNumberOrTag;
use alloy::network::TransactionBuilder;
use alloy::providers::{Provider, ProviderBuilder};
use alloy::rpc::types::TransactionRequest;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use tracing::debug;

/// Base fee multiple covered by `max_fee_per_gas`.
const BASE_FEE_HEADROOM: u128 = 2;

#[derive(Debug)]
pub struct Eip1559GasStrategy {
    /// Tip paid to the block producer, in wei.
    priority_fee: u128,
    /// Upper bound on `max_fee_per_gas`, in wei.
    max_fee_cap: u128,
}

impl Eip1559GasStrategy {
    pub fn new(priority_fee: u128, max_fee_cap: u128) -> Self {
        Self {
            priority_fee: priority_fee.min(max_fee_cap),
            max_fee_cap,
        }
    }

    fn params_for_base_fee(&self, base_fee: u128) -> GasParams {
        let max_fee_per_gas = base_fee
            .saturating_mul(BASE_FEE_HEADROOM)
            .saturating_add(self.priority_fee)
            .min(self.max_fee_cap);
        GasParams::Eip1559 {
            max_fee_per_gas,
            max_priority_fee_per_gas: self.priority_fee.min(max_fee_per_gas),
            base_fee,
        }
    }
}

#[async_trait]
impl GasStrategy for Eip1559GasStrategy {
    async fn fetch_params(&self, rpc_url: &str) -> Result<GasParams> {
        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| anyhow!("latest block unavailable"))?;

        match block.header.base_fee_per_gas {
            Some(base_fee) => {
                let params = self.params_for_base_fee(u128::from(base_fee));
                debug!(
                    base_fee,
                    max_fee = params.effective_gas_price(),
                    "EIP-1559 fees computed"
                );
                Ok(params)
            }
            None => {
                let gas_price = provider.get_gas_price().await?;
                debug!(gas_price, "No base fee on latest block, using eth_gasPrice");
                Ok(GasParams::Legacy {
                    gas_price: gas_price.min(self.max_fee_cap),
                })
            }
        }
    }

    fn apply_gas(&self, tx: &mut TransactionRequest, params: &GasParams) {
        let (max_fee, tip) = match params {
            GasParams::Eip1559 {
                max_fee_per_gas,
                max_priority_fee_per_gas,
                ..
            } => (*max_fee_per_gas, *max_priority_fee_per_gas),
            GasParams::Legacy { gas_price } => (*gas_price, self.priority_fee.min(*gas_price)),
        };
        tx.set_max_fee_per_gas(max_fee);
        tx.set_max_priority_fee_per_gas(tip);
    }

    fn strategy_name(&self) -> &'static str {
        "EIP-1559"
    }
}
