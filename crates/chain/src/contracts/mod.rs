//! Contract bindings and calldata encoding for the keeper contracts.
//!
//! The keepers talk to four contracts:
//! - Custodian: position inventory per owner
//! - LiquidationManager: risk parameters, liquidation status, `bark`
//! - AuctionManager: auction inventory and parameters, `resetAuction`
//! - PriceOracle: reference price of the underlying
//!
//! # Example
//!
//! ```rust,ignore
//! use keeper_chain::contracts::{encode_bark, KeeperContracts};
//!
//! let calldata = encode_bark(owner, token_id, keeper_address);
//! sender.send_transaction(contracts.liquidation_manager, calldata, gas_limit).await?;
//! ```

pub mod bindings;

pub use bindings::{IAuctionManager, ICustodian, ILiquidationManager, IPriceOracle};

use alloy::primitives::{Address, Bytes, U256};
use alloy::sol_types::SolCall;

/// Deployed addresses of the protocol contracts the keepers use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeeperContracts {
    pub custodian: Address,
    pub liquidation_manager: Address,
    pub auction_manager: Address,
    pub price_oracle: Address,
}

/// Encode `bark(user, tokenId, kpr)` calldata.
pub fn encode_bark(owner: Address, token_id: U256, reward_recipient: Address) -> Bytes {
    let call = ILiquidationManager::barkCall {
        user: owner,
        tokenId: token_id,
        kpr: reward_recipient,
    };
    Bytes::from(call.abi_encode())
}

/// Encode `resetAuction(auctionId, triggerer)` calldata.
pub fn encode_reset_auction(auction_id: U256, reward_recipient: Address) -> Bytes {
    let call = IAuctionManager::resetAuctionCall {
        auctionId: auction_id,
        triggerer: reward_recipient,
    };
    Bytes::from(call.abi_encode())
}
