use anchor_lang::prelude::*;

use crate::constants::*;
use crate::errors::CoilError;

/// Capability surface shared by every supported lending venue.
///
/// Each venue fixes its own collateral LTV, origination fee and utilization
/// curve; callers dispatch through [`LendingVenueKind`] and never branch on
/// venue addresses.
pub trait LendingVenue {
    fn name(&self) -> &'static str;

    /// Maximum loan-to-value against PT collateral (bps)
    fn max_ltv_bps(&self) -> u64;

    /// One-off fee folded into debt at borrow time (bps)
    fn origination_fee_bps(&self) -> u64;

    fn base_rate_bps(&self) -> u64;
    fn slope1_bps(&self) -> u64;
    fn slope2_bps(&self) -> u64;
    fn optimal_utilization_bps(&self) -> u64;

    /// Borrow APR from pool utilization, two-slope model.
    fn borrow_rate_bps(&self, total_deposits: u64, total_borrowed: u64) -> u64 {
        if total_deposits == 0 {
            return self.base_rate_bps();
        }

        let utilization_bps = (total_borrowed as u128)
            .saturating_mul(BPS_DENOMINATOR as u128)
            .checked_div(total_deposits as u128)
            .unwrap_or(0) as u64;

        if utilization_bps <= self.optimal_utilization_bps() {
            let rate_increase = (utilization_bps as u128)
                .saturating_mul(self.slope1_bps() as u128)
                .checked_div(self.optimal_utilization_bps() as u128)
                .unwrap_or(0) as u64;
            self.base_rate_bps().saturating_add(rate_increase)
        } else {
            let excess = utilization_bps.saturating_sub(self.optimal_utilization_bps());
            let remaining = BPS_DENOMINATOR.saturating_sub(self.optimal_utilization_bps());
            let steep_increase = (excess as u128)
                .saturating_mul(self.slope2_bps() as u128)
                .checked_div(remaining as u128)
                .unwrap_or(0) as u64;
            self.base_rate_bps()
                .saturating_add(self.slope1_bps())
                .saturating_add(steep_increase)
        }
    }
}

/// Strata: the conservative venue. Lowest LTV, no origination fee.
pub struct Strata;

impl LendingVenue for Strata {
    fn name(&self) -> &'static str {
        "Strata"
    }
    fn max_ltv_bps(&self) -> u64 {
        7_500
    }
    fn origination_fee_bps(&self) -> u64 {
        0
    }
    fn base_rate_bps(&self) -> u64 {
        200
    }
    fn slope1_bps(&self) -> u64 {
        400
    }
    fn slope2_bps(&self) -> u64 {
        6_000
    }
    fn optimal_utilization_bps(&self) -> u64 {
        8_000
    }
}

/// Terminal: mid-curve venue, small origination fee for higher LTV.
pub struct Terminal;

impl LendingVenue for Terminal {
    fn name(&self) -> &'static str {
        "Terminal"
    }
    fn max_ltv_bps(&self) -> u64 {
        8_000
    }
    fn origination_fee_bps(&self) -> u64 {
        10
    }
    fn base_rate_bps(&self) -> u64 {
        300
    }
    fn slope1_bps(&self) -> u64 {
        800
    }
    fn slope2_bps(&self) -> u64 {
        7_500
    }
    fn optimal_utilization_bps(&self) -> u64 {
        8_000
    }
}

/// Ethereal: the aggressive venue. Highest LTV, steepest curve.
pub struct Ethereal;

impl LendingVenue for Ethereal {
    fn name(&self) -> &'static str {
        "Ethereal"
    }
    fn max_ltv_bps(&self) -> u64 {
        8_500
    }
    fn origination_fee_bps(&self) -> u64 {
        20
    }
    fn base_rate_bps(&self) -> u64 {
        400
    }
    fn slope1_bps(&self) -> u64 {
        1_000
    }
    fn slope2_bps(&self) -> u64 {
        9_000
    }
    fn optimal_utilization_bps(&self) -> u64 {
        9_000
    }
}

/// Closed set of supported lending venues.
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
#[repr(u8)]
pub enum LendingVenueKind {
    Strata = 0,
    Terminal = 1,
    Ethereal = 2,
}

impl LendingVenueKind {
    pub fn venue(&self) -> &'static dyn LendingVenue {
        match self {
            LendingVenueKind::Strata => &Strata,
            LendingVenueKind::Terminal => &Terminal,
            LendingVenueKind::Ethereal => &Ethereal,
        }
    }
}

/// Gross debt booked when `net` base units are handed out.
pub fn borrow_gross(net: u64, origination_fee_bps: u64) -> Result<u64> {
    let fee = (net as u128)
        .checked_mul(origination_fee_bps as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)? as u64;
    net.checked_add(fee).ok_or(CoilError::MathOverflow.into())
}

// ========== SPLITTING MARKET QUOTES ==========

/// Output of splitting base into a claim pair. PT and YT mint 1:1 with the
/// post-fee input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitQuote {
    pub pt_out: u64,
    pub yt_out: u64,
    pub fee: u64,
}

pub fn split_quote(amount_in: u64, fee_bps: u64) -> Result<SplitQuote> {
    let fee = (amount_in as u128)
        .checked_mul(fee_bps as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)? as u64;
    let minted = amount_in.saturating_sub(fee);
    Ok(SplitQuote {
        pt_out: minted,
        yt_out: minted,
        fee,
    })
}

/// Redemption back into base. Before maturity only matched pairs redeem;
/// after maturity PT alone redeems 1:1 and YT is worthless.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RedeemQuote {
    pub base_out: u64,
    pub pt_burned: u64,
    pub yt_burned: u64,
}

pub fn redeem_quote(pt: u64, yt: u64, matured: bool) -> RedeemQuote {
    if matured {
        RedeemQuote {
            base_out: pt,
            pt_burned: pt,
            yt_burned: yt,
        }
    } else {
        let pairs = pt.min(yt);
        RedeemQuote {
            base_out: pairs,
            pt_burned: pairs,
            yt_burned: pairs,
        }
    }
}

// ========== SWAP VENUE QUOTES ==========

/// Exact-in swap quote through the price feeds, fee taken on output.
pub fn swap_quote(
    amount_in: u64,
    price_in_6dec: u64,
    price_out_6dec: u64,
    fee_bps: u64,
) -> Result<u64> {
    require!(price_out_6dec > 0, CoilError::StalePriceFeed);
    let gross = (amount_in as u128)
        .checked_mul(price_in_6dec as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(price_out_6dec as u128)
        .ok_or(CoilError::MathOverflow)? as u64;
    let fee = (gross as u128)
        .checked_mul(fee_bps as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)? as u64;
    Ok(gross.saturating_sub(fee))
}

pub fn swap_exact_quote(
    amount_in: u64,
    price_in_6dec: u64,
    price_out_6dec: u64,
    fee_bps: u64,
    min_out: u64,
) -> Result<u64> {
    let out = swap_quote(amount_in, price_in_6dec, price_out_6dec, fee_bps)?;
    require!(out >= min_out, CoilError::SlippageExceeded);
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_venue_dispatch_is_distinct() {
        let kinds = [
            LendingVenueKind::Strata,
            LendingVenueKind::Terminal,
            LendingVenueKind::Ethereal,
        ];
        let ltvs: Vec<u64> = kinds.iter().map(|k| k.venue().max_ltv_bps()).collect();
        assert_eq!(ltvs, vec![7_500, 8_000, 8_500]);
        assert_eq!(kinds[0].venue().name(), "Strata");
        assert_eq!(kinds[2].venue().origination_fee_bps(), 20);
    }

    #[test]
    fn test_rates_at_different_utilizations() {
        let venue = LendingVenueKind::Terminal.venue();

        // 0% utilization
        assert_eq!(venue.borrow_rate_bps(1000, 0), 300);

        // 50% utilization
        let rate_50 = venue.borrow_rate_bps(1000, 500);
        assert!(rate_50 > 300 && rate_50 < 1100);

        // 80% utilization (optimal)
        assert_eq!(venue.borrow_rate_bps(1000, 800), 300 + 800);

        // 95% utilization, steep segment
        let rate_95 = venue.borrow_rate_bps(1000, 950);
        assert!(rate_95 > 1100);
    }

    #[test]
    fn test_aggressive_venue_prices_risk_higher() {
        let strata = LendingVenueKind::Strata.venue();
        let ethereal = LendingVenueKind::Ethereal.venue();
        assert!(ethereal.borrow_rate_bps(1000, 800) > strata.borrow_rate_bps(1000, 800));
    }

    #[test]
    fn test_split_quote_takes_fee_once() {
        let q = split_quote(1_000_000, 10).unwrap();
        assert_eq!(q.fee, 1_000);
        assert_eq!(q.pt_out, 999_000);
        assert_eq!(q.pt_out, q.yt_out);
    }

    #[test]
    fn test_split_quote_zero_fee() {
        let q = split_quote(500, 0).unwrap();
        assert_eq!(q.pt_out, 500);
        assert_eq!(q.fee, 0);
    }

    #[test]
    fn test_redeem_pairs_before_maturity() {
        let q = redeem_quote(100, 60, false);
        assert_eq!(q.base_out, 60);
        assert_eq!(q.pt_burned, 60);
        assert_eq!(q.yt_burned, 60);
    }

    #[test]
    fn test_redeem_principal_after_maturity() {
        let q = redeem_quote(100, 60, true);
        assert_eq!(q.base_out, 100);
        assert_eq!(q.pt_burned, 100);
        // YT is burned but contributes nothing past maturity
        assert_eq!(q.yt_burned, 60);
    }

    #[test]
    fn test_swap_quote_applies_fee() {
        // 100 YT at $0.05 into base at $1.00, 0.3% fee
        let out = swap_quote(100_000_000, 50_000, 1_000_000, 30).unwrap();
        assert_eq!(out, 5_000_000 - 15_000);
    }

    #[test]
    fn test_swap_exact_quote_enforces_floor() {
        let res = swap_exact_quote(100_000_000, 50_000, 1_000_000, 30, 5_000_000);
        assert!(res.is_err());
        let out = swap_exact_quote(100_000_000, 50_000, 1_000_000, 30, 4_900_000).unwrap();
        assert_eq!(out, 4_985_000);
    }

    #[test]
    fn test_borrow_gross_folds_fee_into_debt() {
        assert_eq!(borrow_gross(1_000_000, 0).unwrap(), 1_000_000);
        assert_eq!(borrow_gross(1_000_000, 10).unwrap(), 1_001_000);
    }
}
