//! Keeper core logic.
//!
//! This crate provides the decision and execution engine shared by both keepers:
//! - Fixed-point NAV math matching the protocol contracts
//! - Liquidation and auction-reset eligibility
//! - State fetcher with last-known-good parameter fallback
//! - Execution engine (estimate, submit, bounded confirmation wait)
//! - Poll scheduler with backoff and cooperative shutdown
//! - Configuration profiles

pub mod auction;
pub mod config;
mod error;
mod executor;
mod fetcher;
mod keepers;
pub mod nav;
mod opportunity;
pub mod risk;
mod scheduler;
pub mod u256_math;

#[cfg(test)]
mod testing;

pub use auction::{reset_reason, ResetReason};
pub use config::KeeperConfig;
pub use error::{KeeperError, KeeperResult};
pub use executor::{ExecutionEngine, ExecutionOutcome, DEFAULT_GAS_BUFFER};
pub use fetcher::{AuctionSnapshot, LiquidationSnapshot, StateFetcher};
pub use keepers::{AuctionResetKeeper, Keeper, LiquidationKeeper};
pub use nav::NavError;
pub use opportunity::Opportunity;
pub use risk::{NavAssessment, PositionNav};
pub use scheduler::{IterationSummary, PollScheduler, SchedulerConfig};
