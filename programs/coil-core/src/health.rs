use anchor_lang::prelude::*;

use crate::constants::*;
use crate::errors::CoilError;

/// Health ratio = collateral value / debt value, in bps. Debt-free positions
/// report [`HEALTH_INFINITE_BPS`].
pub fn health_ratio_bps(collateral_value_usd: u64, debt_value_usd: u64) -> Result<u64> {
    if debt_value_usd == 0 {
        return Ok(HEALTH_INFINITE_BPS);
    }
    let ratio = (collateral_value_usd as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(debt_value_usd as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(u64::try_from(ratio).unwrap_or(HEALTH_INFINITE_BPS))
}

pub fn is_below_minimum(health_bps: u64, min_health_bps: u64) -> bool {
    health_bps < min_health_bps
}

/// Collateral value that must stay posted for a given debt under the venue's
/// maximum LTV.
pub fn required_collateral_usd(debt_value_usd: u64, max_ltv_bps: u64) -> Result<u64> {
    require!(max_ltv_bps > 0, CoilError::ExceedsVenueLtv);
    let required = (debt_value_usd as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(max_ltv_bps as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(required as u64)
}

/// Collateral value free to leave the venue while the debt remains.
pub fn withdrawable_collateral_usd(
    collateral_value_usd: u64,
    debt_value_usd: u64,
    max_ltv_bps: u64,
) -> Result<u64> {
    let required = required_collateral_usd(debt_value_usd, max_ltv_bps)?;
    Ok(collateral_value_usd.saturating_sub(required))
}

/// Largest additional borrow the venue allows against posted collateral.
pub fn max_borrow_usd(
    collateral_value_usd: u64,
    debt_value_usd: u64,
    max_ltv_bps: u64,
) -> Result<u64> {
    let cap = (collateral_value_usd as u128)
        .checked_mul(max_ltv_bps as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)? as u64;
    Ok(cap.saturating_sub(debt_value_usd))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_ratio_basic() {
        // $244 collateral against $195.20 debt: 1.25 exactly
        assert_eq!(health_ratio_bps(244_000_000, 195_200_000).unwrap(), 12_500);
    }

    #[test]
    fn test_health_ratio_zero_debt_is_infinite() {
        assert_eq!(health_ratio_bps(1_000_000, 0).unwrap(), HEALTH_INFINITE_BPS);
    }

    #[test]
    fn test_below_minimum() {
        assert!(is_below_minimum(10_999, 11_000));
        assert!(!is_below_minimum(11_000, 11_000));
    }

    #[test]
    fn test_withdrawable_at_ltv_boundary_is_zero() {
        // debt exactly at 80% of collateral leaves nothing withdrawable
        let w = withdrawable_collateral_usd(100_000_000, 80_000_000, 8_000).unwrap();
        assert_eq!(w, 0);
    }

    #[test]
    fn test_withdrawable_frees_up_as_debt_falls() {
        let w = withdrawable_collateral_usd(100_000_000, 40_000_000, 8_000).unwrap();
        assert_eq!(w, 50_000_000);
    }

    #[test]
    fn test_max_borrow_respects_existing_debt() {
        assert_eq!(max_borrow_usd(100_000_000, 0, 7_500).unwrap(), 75_000_000);
        assert_eq!(
            max_borrow_usd(100_000_000, 70_000_000, 7_500).unwrap(),
            5_000_000
        );
        assert_eq!(max_borrow_usd(100_000_000, 80_000_000, 7_500).unwrap(), 0);
    }
}
