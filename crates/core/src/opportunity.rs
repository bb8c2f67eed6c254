//! Enforcement opportunities found by the keepers.

use crate::auction::ResetReason;
use crate::u256_math::wad_to_f64;
use alloy::primitives::{Address, U256};
use keeper_chain::EnforcementCall;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Opportunity {
    /// Position below the liquidation threshold.
    Liquidation {
        owner: Address,
        token_id: U256,
        net_nav: U256,
    },
    /// Auction that must be reset.
    AuctionReset { auction_id: U256, reason: ResetReason },
}

impl Opportunity {
    /// Contract call with the keeper as reward recipient.
    pub fn to_call(&self, reward_recipient: Address) -> EnforcementCall {
        match *self {
            Opportunity::Liquidation {
                owner, token_id, ..
            } => EnforcementCall::TriggerLiquidation {
                owner,
                token_id,
                reward_recipient,
            },
            Opportunity::AuctionReset { auction_id, .. } => EnforcementCall::TriggerAuctionReset {
                auction_id,
                reward_recipient,
            },
        }
    }
}

impl fmt::Display for Opportunity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Opportunity::Liquidation {
                owner,
                token_id,
                net_nav,
            } => write!(
                f,
                "liquidate {owner}/{token_id} (net NAV {:.4})",
                wad_to_f64(*net_nav)
            ),
            Opportunity::AuctionReset { auction_id, reason } => {
                write!(f, "reset auction {auction_id} ({reason})")
            }
        }
    }
}
