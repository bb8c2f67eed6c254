//! The two keepers: liquidation (`bark`) and auction reset (`resetAuction`).
//!
//! A keeper turns one fresh view of the ledger into a list of opportunities.
//! Executing them and pacing the loop is the scheduler's job.

mod auction_reset;
mod liquidation;

pub use auction_reset::AuctionResetKeeper;
pub use liquidation::LiquidationKeeper;

use crate::error::KeeperResult;
use crate::opportunity::Opportunity;
use async_trait::async_trait;

#[async_trait]
pub trait Keeper: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    /// Snapshot parameters, fetch candidates and return the eligible ones in
    /// execution order. An error aborts the iteration.
    async fn collect_opportunities(&self) -> KeeperResult<Vec<Opportunity>>;
}
