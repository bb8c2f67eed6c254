//! Contract bindings for the leveraged-position protocol.
//!
//! Interfaces are declared inline with `sol!` and only cover the functions the
//! keepers read or call. Output names follow the on-chain getters.
//!
//! # Usage
//!
//! ```rust,ignore
//! use keeper_chain::contracts::bindings::ICustodian;
//!
//! let custodian = ICustodian::new(address, provider);
//! let info = custodian.getAllLeverageTokenInfo(owner).call().await?;
//! ```

use alloy::sol;

sol! {
    /// Custodian holding every leveraged position.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ICustodian {
        function getAllLeverageTokenInfo(address user)
            external
            view
            returns (
                uint256[] memory tokenIds,
                uint256[] memory balances,
                uint8[] memory leverages,
                uint256[] memory mintPrices,
                uint256[] memory accruedInterests
            );
    }
}

sol! {
    /// Liquidation manager: risk parameters, per-position status and `bark`.
    #[sol(rpc)]
    #[derive(Debug)]
    interface ILiquidationManager {
        function globalConfig()
            external
            view
            returns (
                uint256 adjustmentThreshold,
                uint256 liquidationThreshold,
                uint256 penalty,
                bool enabled
            );

        function userLiquidationStatus(address user, uint256 tokenId)
            external
            view
            returns (
                uint256 balance,
                uint256 leverageType,
                uint256 mintPrice,
                uint256 accruedInterest,
                bool isUnderLiquidation,
                bool isFreezed
            );

        function bark(address user, uint256 tokenId, address kpr) external returns (uint256);
    }
}

sol! {
    /// Auction manager for liquidated collateral.
    #[sol(rpc)]
    #[derive(Debug)]
    interface IAuctionManager {
        function auctionParams()
            external
            view
            returns (
                uint256 priceMultiplier,
                uint256 resetTime,
                uint256 minAuctionAmount,
                uint256 priceDropThreshold,
                uint256 percentageReward,
                uint256 fixedReward
            );

        function getActiveAuctionCount() external view returns (uint256);

        function auctionIsActive(uint256 auctionId) external view returns (bool);

        function auctions(uint256 auctionId)
            external
            view
            returns (
                uint256 id,
                uint256 underlyingAmount,
                address originalOwner,
                uint256 tokenId,
                uint256 startTime,
                uint256 startingPrice,
                uint256 currentPrice,
                uint256 totalPayment
            );

        function getAuctionStatus(uint256 auctionId)
            external
            view
            returns (bool needsReset, uint256 currentPrice, uint256 underlyingAmount);

        function resetAuction(uint256 auctionId, address triggerer) external;
    }
}

sol! {
    /// Chainlink-style reference price feed (answer scaled to 1e18).
    #[sol(rpc)]
    #[derive(Debug)]
    interface IPriceOracle {
        function latestRoundData()
            external
            view
            returns (
                uint80 roundId,
                int256 answer,
                uint256 startedAt,
                uint256 updatedAt,
                uint80 answeredInRound
            );
    }
}
