//! Ledger reader backed by an HTTP RPC endpoint.
//! Uses Alloy providers for type-safe contract reads.

use crate::contracts::{
    IAuctionManager, ICustodian, ILiquidationManager, IPriceOracle, KeeperContracts,
};
use crate::protocol::{
    AuctionInfo, AuctionParams, GlobalRiskParams, KeeperLedger, LiquidationStatus, Position,
};
use alloy::eips::BlockNumberOrTag;
use alloy::primitives::{Address, U256};
use alloy::providers::{Provider, ProviderBuilder};
use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, info};

/// Extra auction ids probed past the active count (ids are not dense).
const DEFAULT_SCAN_MARGIN: u64 = 100;

/// Concurrent `auctionIsActive` probes.
const DEFAULT_PROBE_CONCURRENCY: usize = 10;

/// Reads keeper state from the protocol contracts.
#[derive(Debug, Clone)]
pub struct LedgerReader {
    /// HTTP RPC URL
    rpc_url: String,
    /// Protocol contract addresses
    contracts: KeeperContracts,
    /// Ids probed past the active auction count
    scan_margin: u64,
    /// Bounded parallelism for auction probes
    probe_concurrency: usize,
}

impl LedgerReader {
    /// Create a reader and verify the endpoint answers.
    pub async fn new(rpc_url: &str, contracts: KeeperContracts) -> Result<Self> {
        info!(
            rpc = rpc_url,
            custodian = %contracts.custodian,
            liquidation_manager = %contracts.liquidation_manager,
            auction_manager = %contracts.auction_manager,
            price_oracle = %contracts.price_oracle,
            "Initializing ledger reader"
        );

        let provider = ProviderBuilder::new().on_http(rpc_url.parse()?);
        let block = provider.get_block_number().await?;
        info!(block = block, "Provider connection verified");

        Ok(Self {
            rpc_url: rpc_url.to_string(),
            contracts,
            scan_margin: DEFAULT_SCAN_MARGIN,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
        })
    }

    /// Set how many ids past the active count are probed.
    pub fn with_scan_margin(mut self, scan_margin: u64) -> Self {
        self.scan_margin = scan_margin;
        self
    }

    /// Set the number of concurrent auction probes.
    pub fn with_probe_concurrency(mut self, probe_concurrency: usize) -> Self {
        self.probe_concurrency = probe_concurrency.max(1);
        self
    }

    /// Get current block number.
    pub async fn block_number(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let block = provider.get_block_number().await?;
        Ok(block)
    }

    /// Check if provider is healthy.
    pub async fn health_check(&self) -> Result<bool> {
        let block = self.block_number().await?;
        debug!(block = block, "Provider health check passed");
        Ok(block > 0)
    }
}

#[async_trait]
impl KeeperLedger for LedgerReader {
    async fn positions_of(&self, owner: Address) -> Result<Vec<Position>> {
        debug!(owner = %owner, "Fetching positions");

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let custodian = ICustodian::new(self.contracts.custodian, &provider);
        let info = custodian.getAllLeverageTokenInfo(owner).call().await?;

        let count = info.tokenIds.len();
        if info.balances.len() != count
            || info.leverages.len() != count
            || info.mintPrices.len() != count
            || info.accruedInterests.len() != count
        {
            anyhow::bail!(
                "getAllLeverageTokenInfo returned arrays of different lengths for {owner}"
            );
        }

        let positions: Vec<Position> = (0..count)
            .map(|i| Position {
                owner,
                token_id: info.tokenIds[i],
                balance: info.balances[i],
                leverage: info.leverages[i],
                mint_price: info.mintPrices[i],
                accrued_interest: info.accruedInterests[i],
            })
            .filter(Position::is_live)
            .collect();

        debug!(owner = %owner, tokens = count, live = positions.len(), "Positions fetched");
        Ok(positions)
    }

    async fn active_auction_ids(&self) -> Result<Vec<U256>> {
        use futures::stream::{self, StreamExt};

        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let manager = IAuctionManager::new(self.contracts.auction_manager, &provider);

        let active_count = manager.getActiveAuctionCount().call().await?._0;
        let upper = active_count
            .saturating_to::<u64>()
            .saturating_add(self.scan_margin);

        let manager = &manager;
        let mut ids: Vec<U256> = stream::iter(1..=upper)
            .map(|id| async move {
                let id = U256::from(id);
                match manager.auctionIsActive(id).call().await {
                    Ok(active) if active._0 => Some(id),
                    Ok(_) => None,
                    Err(e) => {
                        // Ids past the last auction may revert
                        debug!(auction_id = %id, error = %e, "Auction probe failed");
                        None
                    }
                }
            })
            .buffer_unordered(self.probe_concurrency)
            .filter_map(|id| async move { id })
            .collect()
            .await;
        ids.sort();

        debug!(
            active_count = %active_count,
            probed = upper,
            found = ids.len(),
            "Active auctions discovered"
        );
        Ok(ids)
    }

    async fn auction(&self, auction_id: U256) -> Result<AuctionInfo> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let manager = IAuctionManager::new(self.contracts.auction_manager, &provider);

        let auction_call = manager.auctions(auction_id);
        let status_call = manager.getAuctionStatus(auction_id);
        let (auction, status) = tokio::try_join!(auction_call.call(), status_call.call())?;

        Ok(AuctionInfo {
            auction_id,
            underlying_amount: auction.underlyingAmount,
            original_owner: auction.originalOwner,
            token_id: auction.tokenId,
            start_time: auction.startTime.saturating_to::<u64>(),
            starting_price: auction.startingPrice,
            current_price: status.currentPrice,
            total_payment: auction.totalPayment,
            needs_reset: status.needsReset,
        })
    }

    async fn liquidation_status(
        &self,
        owner: Address,
        token_id: U256,
    ) -> Result<LiquidationStatus> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let manager = ILiquidationManager::new(self.contracts.liquidation_manager, &provider);
        let status = manager.userLiquidationStatus(owner, token_id).call().await?;

        Ok(LiquidationStatus {
            under_liquidation: status.isUnderLiquidation,
            frozen: status.isFreezed,
        })
    }

    async fn global_risk_params(&self) -> Result<GlobalRiskParams> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let manager = ILiquidationManager::new(self.contracts.liquidation_manager, &provider);
        let config = manager.globalConfig().call().await?;

        Ok(GlobalRiskParams {
            adjustment_threshold: config.adjustmentThreshold,
            liquidation_threshold: config.liquidationThreshold,
            penalty_rate: config.penalty,
        })
    }

    async fn auction_params(&self) -> Result<AuctionParams> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let manager = IAuctionManager::new(self.contracts.auction_manager, &provider);
        let params = manager.auctionParams().call().await?;

        Ok(AuctionParams {
            price_multiplier: params.priceMultiplier,
            reset_time: params.resetTime.saturating_to::<u64>(),
            min_auction_amount: params.minAuctionAmount,
            price_drop_threshold: params.priceDropThreshold,
            percentage_reward: params.percentageReward,
            fixed_reward: params.fixedReward,
        })
    }

    async fn reference_price(&self) -> Result<U256> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let oracle = IPriceOracle::new(self.contracts.price_oracle, &provider);
        let round = oracle.latestRoundData().call().await?;

        if round.answer.is_negative() {
            anyhow::bail!("oracle returned negative answer {}", round.answer);
        }
        Ok(round.answer.into_raw())
    }

    async fn latest_timestamp(&self) -> Result<u64> {
        let provider = ProviderBuilder::new().on_http(self.rpc_url.parse()?);
        let block = provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await?
            .ok_or_else(|| anyhow::anyhow!("Failed to get latest block"))?;
        Ok(block.header.timestamp)
    }
}
