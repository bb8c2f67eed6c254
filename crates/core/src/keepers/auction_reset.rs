//! Auction reset keeper.

use super::Keeper;
use crate::auction::reset_reason;
use crate::error::KeeperResult;
use crate::fetcher::StateFetcher;
use crate::opportunity::Opportunity;
use crate::u256_math::wad_to_f64;
use async_trait::async_trait;
use chrono::DateTime;
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Flags active auctions that ran too long or whose price decayed too far.
#[derive(Debug)]
pub struct AuctionResetKeeper {
    fetcher: Arc<StateFetcher>,
}

impl AuctionResetKeeper {
    pub fn new(fetcher: Arc<StateFetcher>) -> Self {
        Self { fetcher }
    }
}

fn format_unix(secs: u64) -> String {
    i64::try_from(secs)
        .ok()
        .and_then(|s| DateTime::from_timestamp(s, 0))
        .map(|t| t.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| secs.to_string())
}

#[async_trait]
impl Keeper for AuctionResetKeeper {
    fn name(&self) -> &'static str {
        "auction-reset"
    }

    #[instrument(skip(self))]
    async fn collect_opportunities(&self) -> KeeperResult<Vec<Opportunity>> {
        let snapshot = self.fetcher.auction_snapshot().await?;
        let auctions = self.fetcher.fetch_auctions().await?;

        let mut opportunities = Vec::new();
        for auction in &auctions {
            match reset_reason(auction, &snapshot.params, snapshot.now) {
                Some(reason) => {
                    info!(
                        auction_id = %auction.auction_id,
                        owner = %auction.original_owner,
                        started = %format_unix(auction.start_time),
                        current_price = wad_to_f64(auction.current_price),
                        starting_price = wad_to_f64(auction.starting_price),
                        reason = %reason,
                        "Auction reset opportunity"
                    );
                    opportunities.push(Opportunity::AuctionReset {
                        auction_id: auction.auction_id,
                        reason,
                    });
                }
                None => debug!(auction_id = %auction.auction_id, "Auction does not need a reset"),
            }
        }

        info!(
            auctions = auctions.len(),
            opportunities = opportunities.len(),
            "Auction scan complete"
        );
        Ok(opportunities)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auction::ResetReason;
    use crate::testing::MockLedger;
    use crate::u256_math::wad;
    use alloy::primitives::{Address, U256};
    use keeper_chain::AuctionInfo;

    const T: u64 = 1_700_000_000;

    fn auction(id: u64, start_time: u64, current: u64, needs_reset: bool) -> AuctionInfo {
        AuctionInfo {
            auction_id: U256::from(id),
            underlying_amount: wad(250),
            original_owner: Address::repeat_byte(0x44),
            token_id: U256::from(id),
            start_time,
            starting_price: wad(100),
            current_price: wad(current),
            total_payment: U256::ZERO,
            needs_reset,
        }
    }

    #[tokio::test]
    async fn test_collects_each_reset_reason() {
        let ledger = Arc::new(MockLedger::new());
        ledger.set_timestamp(Some(T + 7201));
        ledger.add_auction(auction(1, T + 7000, 95, false));
        ledger.add_auction(auction(2, T + 7000, 95, true));
        ledger.add_auction(auction(3, T, 95, false));
        ledger.add_auction(auction(4, T + 7000, 79, false));

        let keeper = AuctionResetKeeper::new(Arc::new(StateFetcher::new(ledger)));
        let opportunities = keeper.collect_opportunities().await.unwrap();

        assert_eq!(
            opportunities,
            vec![
                Opportunity::AuctionReset {
                    auction_id: U256::from(2u64),
                    reason: ResetReason::ProtocolFlag,
                },
                Opportunity::AuctionReset {
                    auction_id: U256::from(3u64),
                    reason: ResetReason::Expired { elapsed: 7201 },
                },
                Opportunity::AuctionReset {
                    auction_id: U256::from(4u64),
                    reason: ResetReason::PriceDecayed {
                        ratio: U256::from(790_000_000_000_000_000u64)
                    },
                },
            ]
        );
    }

    #[tokio::test]
    async fn test_missing_timestamp_aborts() {
        let ledger = Arc::new(MockLedger::new());
        ledger.add_auction(auction(1, T, 50, true));

        let keeper = AuctionResetKeeper::new(Arc::new(StateFetcher::new(ledger)));
        assert!(keeper.collect_opportunities().await.is_err());
    }

    #[test]
    fn test_format_unix() {
        assert_eq!(format_unix(0), "1970-01-01 00:00:00 UTC");
        assert_eq!(format_unix(u64::MAX), u64::MAX.to_string());
    }
}
