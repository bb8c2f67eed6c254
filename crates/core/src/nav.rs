//! Closed-form NAV math for leverage positions.
//!
//! With `k` the tier multiplier (8, 4, 1), `P0` the mint price and `Pt` the
//! reference price:
//!
//! ```text
//! gross = ((k+1)·Pt − P0) · 1e18 / (k·P0)          clamped at 0
//! total = balance · gross / 1e18
//! net   = (total − interest) · 1e18 / balance       0 when interest ≥ total
//! ```
//!
//! Every division floors and every product is checked, matching the contract
//! arithmetic. Inputs the contracts would revert on yield [`NavError::Overflow`].

use crate::u256_math::{wad_div, wad_mul};
use alloy::primitives::U256;
use keeper_chain::{LeverageTier, UnknownLeverageTier};
use thiserror::Error;

/// Inputs the formulas cannot evaluate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NavError {
    #[error(transparent)]
    UnknownTier(#[from] UnknownLeverageTier),
    #[error("mint price is zero")]
    ZeroMintPrice,
    #[error("balance is zero")]
    ZeroBalance,
    #[error("arithmetic overflow")]
    Overflow,
}

/// Gross NAV per unit of leverage token (1e18).
pub fn gross_nav(tier: LeverageTier, mint_price: U256, price: U256) -> Result<U256, NavError> {
    if mint_price.is_zero() {
        return Err(NavError::ZeroMintPrice);
    }
    let k = U256::from(tier.multiplier());
    let scaled_price = (k + U256::from(1u64))
        .checked_mul(price)
        .ok_or(NavError::Overflow)?;
    if scaled_price <= mint_price {
        return Ok(U256::ZERO);
    }
    let denominator = k.checked_mul(mint_price).ok_or(NavError::Overflow)?;
    wad_div(scaled_price - mint_price, denominator).ok_or(NavError::Overflow)
}

/// Net NAV after deducting accrued interest (1e18).
pub fn net_nav(balance: U256, gross: U256, accrued_interest: U256) -> Result<U256, NavError> {
    if balance.is_zero() {
        return Err(NavError::ZeroBalance);
    }
    let total = wad_mul(balance, gross).ok_or(NavError::Overflow)?;
    if total < accrued_interest {
        return Ok(U256::ZERO);
    }
    wad_div(total - accrued_interest, balance).ok_or(NavError::Overflow)
}

/// Reference price at which gross NAV reaches `threshold`.
///
/// `Pt = (threshold·k·P0 / 1e18 + P0) / (k+1)`. Feeding the result back into
/// [`gross_nav`] lands at most one unit below `threshold`.
pub fn liquidation_price(
    tier: LeverageTier,
    mint_price: U256,
    threshold: U256,
) -> Result<U256, NavError> {
    if mint_price.is_zero() {
        return Err(NavError::ZeroMintPrice);
    }
    let k = U256::from(tier.multiplier());
    let scaled_mint = k.checked_mul(mint_price).ok_or(NavError::Overflow)?;
    let numerator = wad_mul(threshold, scaled_mint)
        .and_then(|term| term.checked_add(mint_price))
        .ok_or(NavError::Overflow)?;
    Ok(numerator / (k + U256::from(1u64)))
}

/// Decode a raw on-chain tier value.
pub fn tier_of(raw: u8) -> Result<LeverageTier, NavError> {
    Ok(LeverageTier::try_from(raw)?)
}
