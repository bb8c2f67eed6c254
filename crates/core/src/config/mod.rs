//! Keeper configuration.
//!
//! This module provides:
//! - Runtime configuration with named profiles (default, local, production)
//! - TOML loading with per-field defaults
//! - `${VAR}` expansion for values that come from the environment

mod keeper;

pub use keeper::{
    AuctionLoopConfig, ExecutionSettings, GasSettings, KeeperConfig, LiquidationLoopConfig,
    SchedulerSettings,
};
