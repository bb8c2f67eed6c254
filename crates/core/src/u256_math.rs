//! 18-decimal fixed-point helpers on `U256`.
//!
//! All keeper math stays in integers with floor division so results match the
//! contracts bit for bit. The `f64` conversions exist for logging only.

use alloy::primitives::U256;

/// WAD constant: 1e18 for 18-decimal fixed-point arithmetic
pub const WAD: U256 = U256::from_limbs([1_000_000_000_000_000_000u64, 0, 0, 0]);

/// Convert WAD (18 decimals) to f64.
/// Use only for display/logging, not for computation.
#[inline(always)]
pub fn wad_to_f64(wad: U256) -> f64 {
    if wad <= U256::from(u128::MAX) {
        let value: u128 = wad.to();
        value as f64 / 1e18
    } else {
        let limbs = wad.as_limbs();
        let high = limbs[1] as f64 * (u64::MAX as f64 + 1.0);
        let low = limbs[0] as f64;
        (high + low) / 1e18
    }
}

/// Multiply two WAD values: (a * b) / WAD. `None` on overflow.
#[inline(always)]
pub fn wad_mul(a: U256, b: U256) -> Option<U256> {
    a.checked_mul(b).map(|product| product / WAD)
}

/// Divide two WAD values: (a * WAD) / b. `None` when `b` is zero or `a * WAD`
/// overflows.
#[inline(always)]
pub fn wad_div(a: U256, b: U256) -> Option<U256> {
    if b.is_zero() {
        return None;
    }
    a.checked_mul(WAD).map(|scaled| scaled / b)
}

/// `n` whole units as a WAD.
#[inline(always)]
pub fn wad(n: u64) -> U256 {
    U256::from(n) * WAD
}
