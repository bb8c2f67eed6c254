//! Liquidation eligibility for a single position.

use crate::nav::{gross_nav, liquidation_price, net_nav, tier_of, NavError};
use crate::u256_math::wad_to_f64;
use alloy::primitives::U256;
use keeper_chain::{GlobalRiskParams, LiquidationStatus, Position};

/// Gross and net NAV of one position at a reference price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PositionNav {
    pub gross_nav: U256,
    pub net_nav: U256,
}

impl PositionNav {
    /// Compute both NAVs; fails on an unknown tier, a zero mint price or a zero balance.
    pub fn compute(position: &Position, price: U256) -> Result<Self, NavError> {
        let tier = tier_of(position.leverage)?;
        let gross = gross_nav(tier, position.mint_price, price)?;
        let net = net_nav(position.balance, gross, position.accrued_interest)?;
        Ok(Self {
            gross_nav: gross,
            net_nav: net,
        })
    }

    /// Strictly below the liquidation threshold.
    pub fn below_liquidation(&self, params: &GlobalRiskParams) -> bool {
        self.net_nav < params.liquidation_threshold
    }

    /// Below the adjustment threshold but not yet liquidatable.
    pub fn in_adjustment_band(&self, params: &GlobalRiskParams) -> bool {
        self.net_nav < params.adjustment_threshold && !self.below_liquidation(params)
    }
}

/// Result of evaluating one position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NavAssessment {
    pub gross_nav: U256,
    pub net_nav: U256,
    pub eligible: bool,
}

impl NavAssessment {
    pub fn new(nav: PositionNav, params: &GlobalRiskParams, status: &LiquidationStatus) -> Self {
        Self {
            gross_nav: nav.gross_nav,
            net_nav: nav.net_nav,
            eligible: !status.is_blocked() && nav.below_liquidation(params),
        }
    }

    pub fn net_nav_f64(&self) -> f64 {
        wad_to_f64(self.net_nav)
    }
}

/// Full evaluation: NAV, threshold and liquidation flags.
pub fn evaluate(
    position: &Position,
    price: U256,
    params: &GlobalRiskParams,
    status: &LiquidationStatus,
) -> Result<NavAssessment, NavError> {
    let nav = PositionNav::compute(position, price)?;
    Ok(NavAssessment::new(nav, params, status))
}

/// Reference price at which the position becomes liquidatable, ignoring interest.
pub fn trigger_price(position: &Position, params: &GlobalRiskParams) -> Result<U256, NavError> {
    let tier = tier_of(position.leverage)?;
    liquidation_price(tier, position.mint_price, params.liquidation_threshold)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::u256_math::{wad, WAD};
    use alloy::primitives::Address;
    use keeper_chain::UnknownLeverageTier;

    fn position(leverage: u8, mint: U256, interest: U256) -> Position {
        Position {
            owner: Address::repeat_byte(0x11),
            token_id: U256::from(1u64),
            balance: wad(10),
            leverage,
            mint_price: mint,
            accrued_interest: interest,
        }
    }

    fn fraction(milli: u64) -> U256 {
        U256::from(milli) * WAD / U256::from(1000u64)
    }

    #[test]
    fn test_conservative_scenario_is_eligible() {
        let params = GlobalRiskParams::default();
        let assessment = evaluate(
            &position(0, wad(30), U256::ZERO),
            wad(8),
            &params,
            &LiquidationStatus::default(),
        )
        .unwrap();

        assert_eq!(assessment.gross_nav, fraction(175));
        assert_eq!(assessment.net_nav, fraction(175));
        assert!(assessment.eligible);
    }

    #[test]
    fn test_threshold_comparison_is_strict() {
        let params = GlobalRiskParams::default();
        let assessment = evaluate(
            &position(1, wad(100), U256::ZERO),
            wad(44),
            &params,
            &LiquidationStatus::default(),
        )
        .unwrap();

        assert_eq!(assessment.net_nav, params.liquidation_threshold);
        assert!(!assessment.eligible);
    }

    #[test]
    fn test_blocked_positions_never_eligible() {
        let params = GlobalRiskParams::default();
        let underwater = position(0, wad(30), U256::ZERO);

        for status in [
            LiquidationStatus {
                frozen: true,
                under_liquidation: false,
            },
            LiquidationStatus {
                frozen: false,
                under_liquidation: true,
            },
            LiquidationStatus {
                frozen: true,
                under_liquidation: true,
            },
        ] {
            let assessment = evaluate(&underwater, wad(8), &params, &status).unwrap();
            assert!(!assessment.eligible, "{status:?}");
        }
    }

    #[test]
    fn test_interest_exceeding_value_is_eligible() {
        let params = GlobalRiskParams::default();
        // gross = 1.0 at mint price, total = 10, interest 11
        let assessment = evaluate(
            &position(2, wad(50), wad(11)),
            wad(50),
            &params,
            &LiquidationStatus::default(),
        )
        .unwrap();

        assert_eq!(assessment.gross_nav, WAD);
        assert_eq!(assessment.net_nav, U256::ZERO);
        assert!(assessment.eligible);
    }

    #[test]
    fn test_unknown_tier_is_rejected() {
        let result = evaluate(
            &position(3, wad(30), U256::ZERO),
            wad(8),
            &GlobalRiskParams::default(),
            &LiquidationStatus::default(),
        );
        assert_eq!(result, Err(NavError::UnknownTier(UnknownLeverageTier(3))));
    }

    #[test]
    fn test_adjustment_band() {
        let params = GlobalRiskParams::default();
        // (5·50 − 100) / 400 = 0.375, between 0.3 and 0.5
        let nav = PositionNav::compute(&position(1, wad(100), U256::ZERO), wad(50)).unwrap();
        assert!(nav.in_adjustment_band(&params));
        assert!(!nav.below_liquidation(&params));

        let healthy = PositionNav::compute(&position(1, wad(100), U256::ZERO), wad(100)).unwrap();
        assert!(!healthy.in_adjustment_band(&params));
    }

    #[test]
    fn test_trigger_price() {
        let params = GlobalRiskParams::default();
        let price = trigger_price(&position(1, wad(100), U256::ZERO), &params).unwrap();
        assert_eq!(price, wad(44));
    }
}
