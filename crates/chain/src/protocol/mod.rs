//! Ledger abstraction for the keepers.
//!
//! Two traits separate what the keepers need from how it is fetched:
//!
//! - [`KeeperLedger`]: read-only view of positions, auctions and protocol parameters
//! - [`EnforcementSender`]: gas estimation, submission and receipt lookup for
//!   enforcement transactions
//!
//! The alloy-backed implementations live in [`crate::LedgerReader`] and
//! [`crate::TransactionSender`]; tests substitute in-memory doubles.
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper_chain::protocol::{EnforcementCall, KeeperLedger};
//!
//! for position in ledger.positions_of(owner).await? {
//!     let status = ledger.liquidation_status(owner, position.token_id).await?;
//!     if !status.is_blocked() {
//!         let call = EnforcementCall::TriggerLiquidation {
//!             owner,
//!             token_id: position.token_id,
//!             reward_recipient,
//!         };
//!         sender.submit(&call, 300_000).await?;
//!     }
//! }
//! ```

use crate::contracts::{encode_bark, encode_reset_auction, KeeperContracts};
use alloy::primitives::{Address, Bytes, B256, U256};
use anyhow::Result;
use async_trait::async_trait;
use std::fmt::{self, Debug};

/// 1.0 in 18-decimal fixed point.
const WAD_U64: u64 = 1_000_000_000_000_000_000;

/// Leverage tier of a position. The numeric value is the on-chain encoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum LeverageTier {
    /// 1:8
    Conservative = 0,
    /// 1:4
    Moderate = 1,
    /// 1:1
    Aggressive = 2,
}

impl LeverageTier {
    /// Denominator multiplier `k` in `gross = ((k+1)·Pt − P0) / (k·P0)`.
    pub fn multiplier(&self) -> u64 {
        match self {
            LeverageTier::Conservative => 8,
            LeverageTier::Moderate => 4,
            LeverageTier::Aggressive => 1,
        }
    }

    /// Human-readable ratio for logs.
    pub fn ratio(&self) -> &'static str {
        match self {
            LeverageTier::Conservative => "1:8",
            LeverageTier::Moderate => "1:4",
            LeverageTier::Aggressive => "1:1",
        }
    }
}

/// A leverage value outside the three known tiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("unknown leverage tier {0}")]
pub struct UnknownLeverageTier(pub u8);

impl TryFrom<u8> for LeverageTier {
    type Error = UnknownLeverageTier;

    fn try_from(value: u8) -> std::result::Result<Self, Self::Error> {
        match value {
            0 => Ok(LeverageTier::Conservative),
            1 => Ok(LeverageTier::Moderate),
            2 => Ok(LeverageTier::Aggressive),
            other => Err(UnknownLeverageTier(other)),
        }
    }
}

/// One leveraged position held by the custodian.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Position {
    /// Position owner
    pub owner: Address,
    /// Leverage token id
    pub token_id: U256,
    /// Token balance (1e18)
    pub balance: U256,
    /// Raw on-chain leverage value, validated through [`Position::tier`]
    pub leverage: u8,
    /// Underlying price at mint (1e18)
    pub mint_price: U256,
    /// Interest accrued on the position (1e18)
    pub accrued_interest: U256,
}

impl Position {
    /// Only positions with a non-zero balance are live.
    pub fn is_live(&self) -> bool {
        !self.balance.is_zero()
    }

    pub fn tier(&self) -> std::result::Result<LeverageTier, UnknownLeverageTier> {
        LeverageTier::try_from(self.leverage)
    }
}

/// Liquidation flags for one (owner, token id) pair.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LiquidationStatus {
    pub under_liquidation: bool,
    pub frozen: bool,
}

impl LiquidationStatus {
    /// A frozen or already liquidating position must never be barked again.
    pub fn is_blocked(&self) -> bool {
        self.frozen || self.under_liquidation
    }
}

/// Collateral auction state as reported by the auction manager.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuctionInfo {
    pub auction_id: U256,
    /// Underlying collateral on sale (1e18)
    pub underlying_amount: U256,
    /// Owner of the liquidated position
    pub original_owner: Address,
    pub token_id: U256,
    /// Auction start (unix seconds)
    pub start_time: u64,
    /// Price at auction start (1e18)
    pub starting_price: U256,
    /// Decayed price from `getAuctionStatus` (1e18)
    pub current_price: U256,
    /// Payment received so far (1e18)
    pub total_payment: U256,
    /// Reset flag computed by the protocol
    pub needs_reset: bool,
}

/// Global liquidation parameters (all 1e18 fractions).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalRiskParams {
    pub adjustment_threshold: U256,
    pub liquidation_threshold: U256,
    pub penalty_rate: U256,
}

impl Default for GlobalRiskParams {
    /// Protocol deployment defaults: 0.5 / 0.3 / 0.03.
    fn default() -> Self {
        Self {
            adjustment_threshold: U256::from(WAD_U64 / 2),
            liquidation_threshold: U256::from(WAD_U64 * 3 / 10),
            penalty_rate: U256::from(WAD_U64 * 3 / 100),
        }
    }
}

/// Auction manager parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AuctionParams {
    pub price_multiplier: U256,
    /// Maximum auction age before a reset (seconds)
    pub reset_time: u64,
    pub min_auction_amount: U256,
    /// Minimum `current / starting` price ratio (1e18)
    pub price_drop_threshold: U256,
    pub percentage_reward: U256,
    pub fixed_reward: U256,
}

impl Default for AuctionParams {
    /// Protocol deployment defaults: 7200 s, 0.8 drop threshold, 100 minimum.
    fn default() -> Self {
        Self {
            price_multiplier: U256::ZERO,
            reset_time: 7200,
            min_auction_amount: U256::from(100u64) * U256::from(WAD_U64),
            price_drop_threshold: U256::from(WAD_U64 * 8 / 10),
            percentage_reward: U256::ZERO,
            fixed_reward: U256::ZERO,
        }
    }
}

/// Enforcement action submitted by a keeper.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnforcementCall {
    /// `LiquidationManager.bark(owner, tokenId, rewardRecipient)`
    TriggerLiquidation {
        owner: Address,
        token_id: U256,
        reward_recipient: Address,
    },
    /// `AuctionManager.resetAuction(auctionId, rewardRecipient)`
    TriggerAuctionReset {
        auction_id: U256,
        reward_recipient: Address,
    },
}

impl EnforcementCall {
    /// ABI-encoded calldata.
    pub fn calldata(&self) -> Bytes {
        match *self {
            EnforcementCall::TriggerLiquidation {
                owner,
                token_id,
                reward_recipient,
            } => encode_bark(owner, token_id, reward_recipient),
            EnforcementCall::TriggerAuctionReset {
                auction_id,
                reward_recipient,
            } => encode_reset_auction(auction_id, reward_recipient),
        }
    }

    /// Contract the call is sent to.
    pub fn target(&self, contracts: &KeeperContracts) -> Address {
        match self {
            EnforcementCall::TriggerLiquidation { .. } => contracts.liquidation_manager,
            EnforcementCall::TriggerAuctionReset { .. } => contracts.auction_manager,
        }
    }
}

impl fmt::Display for EnforcementCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EnforcementCall::TriggerLiquidation {
                owner, token_id, ..
            } => write!(f, "bark({owner}, {token_id})"),
            EnforcementCall::TriggerAuctionReset { auction_id, .. } => {
                write!(f, "resetAuction({auction_id})")
            }
        }
    }
}

/// Read access to the protocol state the keepers evaluate.
#[async_trait]
pub trait KeeperLedger: Send + Sync + Debug {
    /// Live positions (balance > 0) of one owner.
    async fn positions_of(&self, owner: Address) -> Result<Vec<Position>>;

    /// Ids of every auction currently active, ascending.
    async fn active_auction_ids(&self) -> Result<Vec<U256>>;

    /// Full state of one auction.
    async fn auction(&self, auction_id: U256) -> Result<AuctionInfo>;

    async fn liquidation_status(&self, owner: Address, token_id: U256)
        -> Result<LiquidationStatus>;

    async fn global_risk_params(&self) -> Result<GlobalRiskParams>;

    async fn auction_params(&self) -> Result<AuctionParams>;

    /// Reference price of the underlying (1e18). Zero means no usable price.
    async fn reference_price(&self) -> Result<U256>;

    /// Timestamp of the latest block (unix seconds).
    async fn latest_timestamp(&self) -> Result<u64>;
}

/// Builds, signs and submits enforcement transactions for one keeper account.
#[async_trait]
pub trait EnforcementSender: Send + Sync + Debug {
    /// Account that signs and receives the keeper reward.
    fn keeper_address(&self) -> Address;

    /// Gas estimate for the call sent from the keeper account.
    async fn estimate_gas(&self, call: &EnforcementCall) -> Result<u64>;

    /// Sign and broadcast the call with the given gas limit. Consumes one nonce.
    async fn submit(&self, call: &EnforcementCall, gas_limit: u64) -> Result<B256>;

    /// `Some(success)` once the transaction is included, `None` while pending.
    async fn receipt_status(&self, tx_hash: B256) -> Result<Option<bool>>;
}
