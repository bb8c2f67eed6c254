//! State fetcher: reads ledger state for one keeper iteration.
//!
//! Per-entity failures are logged and the entity is dropped from the round.
//! Parameter reads fall back to the last value that was read successfully,
//! or to the deployment defaults before the first success.

use crate::error::{KeeperError, KeeperResult};
use crate::u256_math::wad_to_f64;
use alloy::primitives::{Address, U256};
use keeper_chain::{
    AuctionInfo, AuctionParams, GlobalRiskParams, KeeperLedger, LiquidationStatus, Position,
};
use parking_lot::RwLock;
use std::sync::Arc;
use tracing::{debug, warn};

/// Parameters and price for one liquidation round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LiquidationSnapshot {
    pub risk: GlobalRiskParams,
    /// Reference price of the underlying (1e18, non-zero)
    pub price: U256,
}

/// Parameters and ledger time for one auction round.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionSnapshot {
    pub params: AuctionParams,
    /// Latest block timestamp (unix seconds)
    pub now: u64,
}

#[derive(Debug)]
pub struct StateFetcher {
    ledger: Arc<dyn KeeperLedger>,
    last_risk_params: RwLock<Option<GlobalRiskParams>>,
    last_auction_params: RwLock<Option<AuctionParams>>,
}

impl StateFetcher {
    pub fn new(ledger: Arc<dyn KeeperLedger>) -> Self {
        Self {
            ledger,
            last_risk_params: RwLock::new(None),
            last_auction_params: RwLock::new(None),
        }
    }

    /// Live positions of every watched owner. Owners whose read fails are skipped.
    pub async fn fetch_positions(&self, owners: &[Address]) -> Vec<Position> {
        let mut positions = Vec::new();

        for &owner in owners {
            match self.ledger.positions_of(owner).await {
                Ok(owned) => positions.extend(owned.into_iter().filter(Position::is_live)),
                Err(e) => {
                    let err = KeeperError::read(format!("positions of {owner}"), e);
                    warn!(
                        owner = %owner,
                        kind = err.kind(),
                        error = %err,
                        "Skipping owner"
                    );
                }
            }
        }

        positions
    }

    /// Every active auction that could be read, ordered by id.
    ///
    /// Failing to enumerate auctions aborts the round; a single unreadable
    /// auction is skipped.
    pub async fn fetch_auctions(&self) -> KeeperResult<Vec<AuctionInfo>> {
        let ids = self
            .ledger
            .active_auction_ids()
            .await
            .map_err(|e| KeeperError::connectivity("active auctions", e))?;

        let mut auctions = Vec::with_capacity(ids.len());
        for auction_id in ids {
            match self.ledger.auction(auction_id).await {
                Ok(info) => auctions.push(info),
                Err(e) => {
                    let err = KeeperError::read(format!("auction {auction_id}"), e);
                    warn!(
                        auction_id = %auction_id,
                        kind = err.kind(),
                        error = %err,
                        "Skipping auction"
                    );
                }
            }
        }
        auctions.sort_by_key(|a| a.auction_id);
        Ok(auctions)
    }

    pub async fn fetch_liquidation_status(
        &self,
        owner: Address,
        token_id: U256,
    ) -> KeeperResult<LiquidationStatus> {
        self.ledger
            .liquidation_status(owner, token_id)
            .await
            .map_err(|e| {
                KeeperError::read(format!("liquidation status of {owner}/{token_id}"), e)
            })
    }

    pub async fn fetch_global_risk_params(&self) -> GlobalRiskParams {
        match self.ledger.global_risk_params().await {
            Ok(params) => {
                *self.last_risk_params.write() = Some(params);
                params
            }
            Err(e) => {
                let fallback = (*self.last_risk_params.read()).unwrap_or_default();
                warn!(
                    error = %e,
                    liquidation_threshold = wad_to_f64(fallback.liquidation_threshold),
                    "Global risk params unavailable, using last known values"
                );
                fallback
            }
        }
    }

    pub async fn fetch_auction_params(&self) -> AuctionParams {
        match self.ledger.auction_params().await {
            Ok(params) => {
                *self.last_auction_params.write() = Some(params);
                params
            }
            Err(e) => {
                let fallback = (*self.last_auction_params.read()).unwrap_or_default();
                warn!(
                    error = %e,
                    reset_time = fallback.reset_time,
                    price_drop_threshold = wad_to_f64(fallback.price_drop_threshold),
                    "Auction params unavailable, using last known values"
                );
                fallback
            }
        }
    }

    /// Oracle price of the underlying. Zero is rejected.
    pub async fn fetch_reference_price(&self) -> KeeperResult<U256> {
        let price = self
            .ledger
            .reference_price()
            .await
            .map_err(|e| KeeperError::connectivity("reference price", e))?;
        if price.is_zero() {
            return Err(KeeperError::data_integrity(
                "reference price",
                "oracle answered zero",
            ));
        }
        Ok(price)
    }

    pub async fn current_ledger_timestamp(&self) -> KeeperResult<u64> {
        self.ledger
            .latest_timestamp()
            .await
            .map_err(|e| KeeperError::connectivity("latest block timestamp", e))
    }

    pub async fn liquidation_snapshot(&self) -> KeeperResult<LiquidationSnapshot> {
        let risk = self.fetch_global_risk_params().await;
        let price = self.fetch_reference_price().await?;
        debug!(
            price = wad_to_f64(price),
            liquidation_threshold = wad_to_f64(risk.liquidation_threshold),
            adjustment_threshold = wad_to_f64(risk.adjustment_threshold),
            "Liquidation snapshot"
        );
        Ok(LiquidationSnapshot { risk, price })
    }

    pub async fn auction_snapshot(&self) -> KeeperResult<AuctionSnapshot> {
        let params = self.fetch_auction_params().await;
        let now = self.current_ledger_timestamp().await?;
        debug!(
            now,
            reset_time = params.reset_time,
            price_drop_threshold = wad_to_f64(params.price_drop_threshold),
            "Auction snapshot"
        );
        Ok(AuctionSnapshot { params, now })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockLedger;
    use crate::u256_math::wad;
    use std::sync::atomic::Ordering;

    fn position(owner: Address, token_id: u64, balance: U256) -> Position {
        Position {
            owner,
            token_id: U256::from(token_id),
            balance,
            leverage: 0,
            mint_price: wad(30),
            accrued_interest: U256::ZERO,
        }
    }

    fn auction(id: u64) -> AuctionInfo {
        AuctionInfo {
            auction_id: U256::from(id),
            underlying_amount: wad(100),
            original_owner: Address::repeat_byte(0x33),
            token_id: U256::from(id),
            start_time: 1_000,
            starting_price: wad(100),
            current_price: wad(90),
            total_payment: U256::ZERO,
            needs_reset: false,
        }
    }

    #[tokio::test]
    async fn test_failed_owner_is_skipped() {
        let alice = Address::repeat_byte(0xa1);
        let bob = Address::repeat_byte(0xb0);
        let ledger = Arc::new(MockLedger::new());
        ledger.add_position(position(alice, 1, wad(10)));
        ledger.add_position(position(bob, 2, wad(5)));
        ledger.failing_owners.lock().insert(alice);

        let fetcher = StateFetcher::new(ledger.clone());
        let positions = fetcher.fetch_positions(&[alice, bob]).await;

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].owner, bob);
    }

    #[tokio::test]
    async fn test_closed_positions_are_dropped() {
        let alice = Address::repeat_byte(0xa1);
        let ledger = Arc::new(MockLedger::new());
        ledger.add_position(position(alice, 1, wad(10)));
        ledger.add_position(position(alice, 2, U256::ZERO));

        let fetcher = StateFetcher::new(ledger.clone());
        let positions = fetcher.fetch_positions(&[alice]).await;

        assert_eq!(positions.len(), 1);
        assert_eq!(positions[0].token_id, U256::from(1u64));
        assert_eq!(ledger.position_reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_auction_is_skipped() {
        let ledger = Arc::new(MockLedger::new());
        for id in [3u64, 1, 2] {
            ledger.add_auction(auction(id));
        }
        ledger.failing_auctions.lock().insert(U256::from(2u64));

        let fetcher = StateFetcher::new(ledger);
        let ids: Vec<U256> = fetcher
            .fetch_auctions()
            .await
            .unwrap()
            .into_iter()
            .map(|a| a.auction_id)
            .collect();

        assert_eq!(ids, vec![U256::from(1u64), U256::from(3u64)]);
    }

    #[tokio::test]
    async fn test_auction_listing_failure_escapes() {
        let ledger = Arc::new(MockLedger::new());
        *ledger.auction_listing_fails.lock() = true;

        let err = StateFetcher::new(ledger).fetch_auctions().await.unwrap_err();
        assert_eq!(err.kind(), "connectivity");
    }

    #[tokio::test]
    async fn test_risk_params_fall_back_to_defaults() {
        let ledger = Arc::new(MockLedger::new());
        *ledger.risk_params.lock() = None;

        let fetcher = StateFetcher::new(ledger);
        assert_eq!(fetcher.fetch_global_risk_params().await, GlobalRiskParams::default());
    }

    #[tokio::test]
    async fn test_risk_params_fall_back_to_last_good() {
        let custom = GlobalRiskParams {
            adjustment_threshold: wad(1) / U256::from(4u64),
            liquidation_threshold: wad(1) / U256::from(10u64),
            penalty_rate: U256::ZERO,
        };
        let ledger = Arc::new(MockLedger::new());
        *ledger.risk_params.lock() = Some(custom);

        let fetcher = StateFetcher::new(ledger.clone());
        assert_eq!(fetcher.fetch_global_risk_params().await, custom);

        *ledger.risk_params.lock() = None;
        assert_eq!(fetcher.fetch_global_risk_params().await, custom);
    }

    #[tokio::test]
    async fn test_auction_params_fall_back_to_last_good() {
        let custom = AuctionParams {
            reset_time: 600,
            ..AuctionParams::default()
        };
        let ledger = Arc::new(MockLedger::new());
        *ledger.auction_params.lock() = Some(custom);

        let fetcher = StateFetcher::new(ledger.clone());
        assert_eq!(fetcher.fetch_auction_params().await.reset_time, 600);

        *ledger.auction_params.lock() = None;
        assert_eq!(fetcher.fetch_auction_params().await.reset_time, 600);
    }

    #[tokio::test]
    async fn test_reference_price_errors_abort() {
        let ledger = Arc::new(MockLedger::new());
        let fetcher = StateFetcher::new(ledger.clone());

        ledger.set_price(None);
        let err = fetcher.liquidation_snapshot().await.unwrap_err();
        assert_eq!(err.kind(), "connectivity");

        ledger.set_price(Some(U256::ZERO));
        let err = fetcher.liquidation_snapshot().await.unwrap_err();
        assert_eq!(err.kind(), "data_integrity");

        ledger.set_price(Some(wad(8)));
        assert_eq!(fetcher.liquidation_snapshot().await.unwrap().price, wad(8));
    }

    #[tokio::test]
    async fn test_auction_snapshot_needs_timestamp() {
        let ledger = Arc::new(MockLedger::new());
        let fetcher = StateFetcher::new(ledger.clone());

        assert!(fetcher.auction_snapshot().await.is_err());

        ledger.set_timestamp(Some(42));
        let snapshot = fetcher.auction_snapshot().await.unwrap();
        assert_eq!(snapshot.now, 42);
        assert_eq!(snapshot.params, AuctionParams::default());
    }
}
