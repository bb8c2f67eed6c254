//! Keeper chain interaction layer.
//!
//! This crate provides:
//! - Contract bindings for Custodian, LiquidationManager, AuctionManager and PriceOracle
//! - The [`KeeperLedger`] / [`EnforcementSender`] traits the keeper core depends on
//! - An HTTP ledger reader implementing [`KeeperLedger`]
//! - Transaction signing and sending with a shared nonce counter
//! - Gas strategy abstraction (Legacy + EIP-1559)

pub mod contracts;
pub mod gas;
pub mod protocol;
mod provider;
mod signer;

pub use contracts::KeeperContracts;
pub use gas::{GasParams, GasPricing, GasStrategy};
pub use protocol::{
    AuctionInfo, AuctionParams, EnforcementCall, EnforcementSender, GlobalRiskParams,
    KeeperLedger, LeverageTier, LiquidationStatus, Position, UnknownLeverageTier,
};
pub use provider::LedgerReader;
pub use signer::{NonceManager, TransactionSender, TransactionSenderBuilder};
