//! Auction reset eligibility.

use crate::u256_math::{wad_div, wad_to_f64};
use alloy::primitives::U256;
use keeper_chain::{AuctionInfo, AuctionParams};
use std::fmt;

/// Why an auction qualifies for `resetAuction`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResetReason {
    /// The auction manager already flags the auction.
    ProtocolFlag,
    /// Running longer than the reset time.
    Expired { elapsed: u64 },
    /// `current / starting` fell below the drop threshold (1e18).
    PriceDecayed { ratio: U256 },
}

impl fmt::Display for ResetReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ResetReason::ProtocolFlag => write!(f, "protocol flag"),
            ResetReason::Expired { elapsed } => write!(f, "expired after {elapsed}s"),
            ResetReason::PriceDecayed { ratio } => {
                write!(f, "price decayed to {:.4}", wad_to_f64(*ratio))
            }
        }
    }
}

/// Checks run in order: protocol flag, elapsed time, price decay.
///
/// A start time in the future never counts as expired. Auctions with a zero
/// starting price skip the price check.
pub fn reset_reason(
    auction: &AuctionInfo,
    params: &AuctionParams,
    now: u64,
) -> Option<ResetReason> {
    if auction.needs_reset {
        return Some(ResetReason::ProtocolFlag);
    }

    let elapsed = now.saturating_sub(auction.start_time);
    if elapsed > params.reset_time {
        return Some(ResetReason::Expired { elapsed });
    }

    let ratio = wad_div(auction.current_price, auction.starting_price)?;
    (ratio < params.price_drop_threshold).then_some(ResetReason::PriceDecayed { ratio })
}
