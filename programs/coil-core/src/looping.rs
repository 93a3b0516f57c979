use anchor_lang::prelude::*;

use crate::constants::*;
use crate::errors::CoilError;
use crate::health;
use crate::venues::{self, LendingVenueKind, SplitQuote};

/// USD value (6 decimals) of a 6-decimal token amount at a 6-decimal price.
pub fn token_value_usd(amount: u64, price_6dec: u64) -> Result<u64> {
    let value = (amount as u128)
        .checked_mul(price_6dec as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(TOKEN_UNIT as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(value as u64)
}

/// Token amount corresponding to a USD value at a 6-decimal price.
pub fn usd_to_token(value_usd: u64, price_6dec: u64) -> Result<u64> {
    require!(price_6dec > 0, CoilError::StalePriceFeed);
    let amount = (value_usd as u128)
        .checked_mul(TOKEN_UNIT as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(price_6dec as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(amount as u64)
}

/// Signed profit of a round trip, clamped to the i64 range.
pub fn net_pnl(returned: u64, deposited: u64) -> i64 {
    let diff = returned as i128 - deposited as i128;
    diff.clamp(i64::MIN as i128, i64::MAX as i128) as i64
}

fn mul_bps(amount: u64, bps: u64) -> Result<u64> {
    let out = (amount as u128)
        .checked_mul(bps as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(out as u64)
}

// ========== ITERATIVE OPEN ==========

#[derive(Debug, Clone)]
pub struct LoopParams {
    pub deposit: u64,
    pub loop_count: u8,
    /// Per-loop borrow target, bps of the freshly posted collateral value
    pub target_borrow_bps: u64,
    /// Absolute PT floor for the first loop; later floors derive from it
    pub min_pt_out_first_loop: u64,
    /// Per-loop loosening of the floor tolerance (bps)
    pub slippage_decay_bps: u64,
    pub split_fee_bps: u64,
    pub venue: LendingVenueKind,
    pub pt_price_6dec: u64,
    pub base_price_6dec: u64,
    /// Base units the lending pool can still lend
    pub available_liquidity: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct LoopStep {
    pub index: u8,
    pub split_in: u64,
    pub pt_out: u64,
    pub yt_out: u64,
    pub split_fee: u64,
    pub borrowed_net: u64,
    pub debt_incurred: u64,
}

#[derive(Debug, Clone)]
pub struct LoopPlan {
    pub steps: Vec<LoopStep>,
    /// Split of the final borrow, held as free claims rather than collateral
    pub tail: Option<SplitQuote>,
    pub loops_executed: u8,
    pub collateral_pt: u64,
    pub debt: u64,
    pub pt_held: u64,
    pub yt_held: u64,
    /// Base drawn from the pool across all loops (equals re-split borrows)
    pub pool_drawn: u64,
    pub health_bps: u64,
}

/// Compute every amount an iterative open will move. The executing program
/// replays the plan against its vaults; nothing here touches accounts.
///
/// Loop `i` splits the running amount, posts the PT, borrows against it and
/// hands the borrow to loop `i+1`. The final borrow is split as well and the
/// resulting claims stay in custody unposted, which is also what bootstraps
/// a later unwind when the position sits at the venue's LTV boundary.
pub fn plan_loops(p: &LoopParams) -> Result<LoopPlan> {
    require!(p.deposit > 0, CoilError::InvalidAmount);
    require!(
        p.loop_count >= MIN_LOOPS && p.loop_count <= MAX_LOOPS,
        CoilError::InvalidLoopCount
    );
    require!(
        p.target_borrow_bps >= MIN_TARGET_BORROW_BPS as u64
            && p.target_borrow_bps <= MAX_TARGET_BORROW_BPS as u64,
        CoilError::InvalidBorrowTarget
    );
    let venue = p.venue.venue();
    require!(
        p.target_borrow_bps <= venue.max_ltv_bps(),
        CoilError::ExceedsVenueLtv
    );
    require!(
        p.min_pt_out_first_loop <= p.deposit,
        CoilError::InvalidAmount
    );

    // Floor tolerance relative to each loop's own input, loosened per loop.
    let mut floor_tolerance_bps = (p.min_pt_out_first_loop as u128)
        .checked_mul(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(p.deposit as u128)
        .ok_or(CoilError::MathOverflow)? as u64;

    let mut steps = Vec::with_capacity(p.loop_count as usize);
    let mut amount = p.deposit;
    let mut liquidity = p.available_liquidity;
    let mut collateral_pt: u64 = 0;
    let mut yt_held: u64 = 0;
    let mut debt: u64 = 0;
    let mut pool_drawn: u64 = 0;

    for i in 0..p.loop_count {
        if amount == 0 {
            break;
        }

        let quote = venues::split_quote(amount, p.split_fee_bps)?;
        let floor = mul_bps(amount, floor_tolerance_bps)?;
        require!(quote.pt_out >= floor, CoilError::SplitBelowFloor);

        collateral_pt = collateral_pt
            .checked_add(quote.pt_out)
            .ok_or(CoilError::MathOverflow)?;
        yt_held = yt_held
            .checked_add(quote.yt_out)
            .ok_or(CoilError::MathOverflow)?;

        let pt_value_usd = token_value_usd(quote.pt_out, p.pt_price_6dec)?;
        let target_usd = mul_bps(pt_value_usd, p.target_borrow_bps)?;
        let target_base = usd_to_token(target_usd, p.base_price_6dec)?;
        let borrowed_net = target_base.min(liquidity);
        let debt_incurred = venues::borrow_gross(borrowed_net, venue.origination_fee_bps())?;

        steps.push(LoopStep {
            index: i + 1,
            split_in: amount,
            pt_out: quote.pt_out,
            yt_out: quote.yt_out,
            split_fee: quote.fee,
            borrowed_net,
            debt_incurred,
        });

        debt = debt
            .checked_add(debt_incurred)
            .ok_or(CoilError::MathOverflow)?;
        pool_drawn = pool_drawn
            .checked_add(borrowed_net)
            .ok_or(CoilError::MathOverflow)?;
        liquidity = liquidity.saturating_sub(borrowed_net);
        amount = borrowed_net;

        floor_tolerance_bps = mul_bps(
            floor_tolerance_bps,
            BPS_DENOMINATOR.saturating_sub(p.slippage_decay_bps),
        )?;
    }

    let mut pt_held: u64 = 0;
    let tail = if amount > 0 {
        let quote = venues::split_quote(amount, p.split_fee_bps)?;
        let floor = mul_bps(amount, floor_tolerance_bps)?;
        require!(quote.pt_out >= floor, CoilError::SplitBelowFloor);
        pt_held = quote.pt_out;
        yt_held = yt_held
            .checked_add(quote.yt_out)
            .ok_or(CoilError::MathOverflow)?;
        Some(quote)
    } else {
        None
    };

    let collateral_usd = token_value_usd(collateral_pt, p.pt_price_6dec)?;
    let debt_usd = token_value_usd(debt, p.base_price_6dec)?;
    let health_bps = health::health_ratio_bps(collateral_usd, debt_usd)?;

    Ok(LoopPlan {
        loops_executed: steps.len() as u8,
        steps,
        tail,
        collateral_pt,
        debt,
        pt_held,
        yt_held,
        pool_drawn,
        health_bps,
    })
}

// ========== UNWIND (NORMAL CLOSE) ==========

#[derive(Debug, Clone)]
pub struct UnwindParams {
    pub collateral_pt: u64,
    pub pt_held: u64,
    pub yt_held: u64,
    pub debt: u64,
    pub matured: bool,
    pub venue: LendingVenueKind,
    pub pt_price_6dec: u64,
    pub yt_price_6dec: u64,
    pub base_price_6dec: u64,
    pub swap_fee_bps: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnwindPlan {
    pub rounds: u8,
    pub base_recovered: u64,
    pub debt_repaid: u64,
    pub returned: u64,
    pub pt_burned: u64,
    pub yt_burned: u64,
    pub pt_sold: u64,
    pub yt_sold: u64,
    pub collateral_withdrawn: u64,
}

/// Plan a full unwind: redeem free claims, repay, withdraw what the venue's
/// LTV releases, and repeat until the debt is gone. Falls back to selling
/// yield claims when no collateral is withdrawable and nothing pairs.
pub fn plan_unwind(p: &UnwindParams) -> Result<UnwindPlan> {
    let venue = p.venue.venue();
    let ltv_bps = venue.max_ltv_bps();

    let mut plan = UnwindPlan::default();
    let mut pt_free = p.pt_held;
    let mut yt = p.yt_held;
    let mut collateral = p.collateral_pt;
    let mut debt = p.debt;
    let mut base_on_hand: u64 = 0;

    for round in 0..MAX_UNWIND_ROUNDS {
        if debt == 0 {
            break;
        }
        plan.rounds = round + 1;
        let mut progressed = false;

        let q = venues::redeem_quote(pt_free, yt, p.matured);
        if q.base_out > 0 {
            base_on_hand = base_on_hand
                .checked_add(q.base_out)
                .ok_or(CoilError::MathOverflow)?;
            pt_free = pt_free.saturating_sub(q.pt_burned);
            yt = yt.saturating_sub(q.yt_burned);
            plan.pt_burned = plan.pt_burned.saturating_add(q.pt_burned);
            plan.yt_burned = plan.yt_burned.saturating_add(q.yt_burned);
            progressed = true;
        }

        let repay = base_on_hand.min(debt);
        if repay > 0 {
            debt -= repay;
            base_on_hand -= repay;
            plan.debt_repaid = plan.debt_repaid.saturating_add(repay);
            progressed = true;
        }
        if debt == 0 {
            break;
        }

        let collateral_usd = token_value_usd(collateral, p.pt_price_6dec)?;
        let debt_usd = token_value_usd(debt, p.base_price_6dec)?;
        let withdrawable_usd =
            health::withdrawable_collateral_usd(collateral_usd, debt_usd, ltv_bps)?;
        let withdrawable_pt = collateral.min(usd_to_token(withdrawable_usd, p.pt_price_6dec)?);

        if withdrawable_pt > 0 {
            collateral -= withdrawable_pt;
            pt_free = pt_free
                .checked_add(withdrawable_pt)
                .ok_or(CoilError::MathOverflow)?;
            plan.collateral_withdrawn = plan
                .collateral_withdrawn
                .saturating_add(withdrawable_pt);
            progressed = true;
        } else if !p.matured && yt > 0 && base_on_hand == 0 && pt_free == 0 {
            // Nothing pairs and nothing is withdrawable: sell just enough
            // yield claims to cover the remaining debt.
            let debt_value = token_value_usd(debt, p.base_price_6dec)?;
            let needed_yt = usd_to_token(debt_value, p.yt_price_6dec)?
                .saturating_add(1)
                .min(yt);
            let out = venues::swap_quote(
                needed_yt,
                p.yt_price_6dec,
                p.base_price_6dec,
                p.swap_fee_bps,
            )?;
            yt -= needed_yt;
            base_on_hand = base_on_hand
                .checked_add(out)
                .ok_or(CoilError::MathOverflow)?;
            plan.yt_sold = plan.yt_sold.saturating_add(needed_yt);
            progressed = out > 0;
        }

        if !progressed {
            break;
        }
    }

    require!(debt == 0, CoilError::UnwindIncomplete);

    // Debt is retired; sweep the rest of the custody out.
    if collateral > 0 {
        pt_free = pt_free
            .checked_add(collateral)
            .ok_or(CoilError::MathOverflow)?;
        plan.collateral_withdrawn = plan.collateral_withdrawn.saturating_add(collateral);
    }

    let q = venues::redeem_quote(pt_free, yt, p.matured);
    base_on_hand = base_on_hand
        .checked_add(q.base_out)
        .ok_or(CoilError::MathOverflow)?;
    pt_free = pt_free.saturating_sub(q.pt_burned);
    yt = yt.saturating_sub(q.yt_burned);
    plan.pt_burned = plan.pt_burned.saturating_add(q.pt_burned);
    plan.yt_burned = plan.yt_burned.saturating_add(q.yt_burned);

    if !p.matured {
        if pt_free > 0 {
            let out = venues::swap_quote(
                pt_free,
                p.pt_price_6dec,
                p.base_price_6dec,
                p.swap_fee_bps,
            )?;
            base_on_hand = base_on_hand
                .checked_add(out)
                .ok_or(CoilError::MathOverflow)?;
            plan.pt_sold = plan.pt_sold.saturating_add(pt_free);
        }
        if yt > 0 {
            let out = venues::swap_quote(
                yt,
                p.yt_price_6dec,
                p.base_price_6dec,
                p.swap_fee_bps,
            )?;
            base_on_hand = base_on_hand
                .checked_add(out)
                .ok_or(CoilError::MathOverflow)?;
            plan.yt_sold = plan.yt_sold.saturating_add(yt);
        }
    }

    plan.returned = base_on_hand;
    plan.base_recovered = plan
        .debt_repaid
        .checked_add(base_on_hand)
        .ok_or(CoilError::MathOverflow)?;
    Ok(plan)
}

// ========== LIQUIDATION ==========

#[derive(Debug, Clone)]
pub struct LiquidationParams {
    pub collateral_pt: u64,
    pub pt_held: u64,
    pub yt_held: u64,
    pub debt: u64,
    pub matured: bool,
    pub pt_price_6dec: u64,
    pub yt_price_6dec: u64,
    pub base_price_6dec: u64,
    pub swap_fee_bps: u64,
    pub reward_bps: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LiquidationPlan {
    pub yt_sold: u64,
    pub yt_proceeds: u64,
    pub pt_redeemed: u64,
    pub pt_sold: u64,
    pub pt_proceeds: u64,
    pub debt_recovered: u64,
    pub shortfall: u64,
    pub reward: u64,
    pub residual: u64,
}

/// Forced recovery. Yield claims are sold first (most liquid, least senior),
/// then principal claims redeem (past maturity) or sell (before it); whatever
/// survives debt and the cranker reward returns to the owner.
pub fn plan_liquidation(p: &LiquidationParams) -> Result<LiquidationPlan> {
    let mut plan = LiquidationPlan::default();
    let mut proceeds: u64 = 0;

    if !p.matured && p.yt_held > 0 {
        plan.yt_sold = p.yt_held;
        plan.yt_proceeds = venues::swap_quote(
            p.yt_held,
            p.yt_price_6dec,
            p.base_price_6dec,
            p.swap_fee_bps,
        )?;
        proceeds = proceeds
            .checked_add(plan.yt_proceeds)
            .ok_or(CoilError::MathOverflow)?;
    }

    let pt_total = p
        .collateral_pt
        .checked_add(p.pt_held)
        .ok_or(CoilError::MathOverflow)?;
    if pt_total > 0 {
        if p.matured {
            plan.pt_redeemed = pt_total;
            plan.pt_proceeds = pt_total;
        } else {
            plan.pt_sold = pt_total;
            plan.pt_proceeds = venues::swap_quote(
                pt_total,
                p.pt_price_6dec,
                p.base_price_6dec,
                p.swap_fee_bps,
            )?;
        }
        proceeds = proceeds
            .checked_add(plan.pt_proceeds)
            .ok_or(CoilError::MathOverflow)?;
    }

    plan.debt_recovered = proceeds.min(p.debt);
    plan.shortfall = p.debt.saturating_sub(plan.debt_recovered);
    let mut residual = proceeds.saturating_sub(plan.debt_recovered);
    plan.reward = mul_bps(plan.debt_recovered, p.reward_bps)?.min(residual);
    residual -= plan.reward;
    plan.residual = residual;
    Ok(plan)
}

// ========== ACCELERATED PATH ==========

/// Flash principal needed to reach a leverage target in one pass.
pub fn flash_amount(deposit: u64, target_leverage_bps: u64) -> Result<u64> {
    require!(
        target_leverage_bps >= MIN_ACCEL_LEVERAGE_BPS
            && target_leverage_bps <= MAX_ACCEL_LEVERAGE_BPS,
        CoilError::InvalidLeverage
    );
    let amount = (deposit as u128)
        .checked_mul((target_leverage_bps - BPS_DENOMINATOR) as u128)
        .ok_or(CoilError::MathOverflow)?
        .checked_div(BPS_DENOMINATOR as u128)
        .ok_or(CoilError::MathOverflow)?;
    Ok(amount as u64)
}

/// Flash fee: bps of principal with an absolute minimum.
pub fn flash_fee_for(amount: u64) -> u64 {
    let fee = (amount as u128)
        .saturating_mul(FLASH_LOAN_FEE_BPS as u128)
        .checked_div(BPS_DENOMINATOR as u128)
        .unwrap_or(0) as u64;
    fee.max(MIN_FLASH_LOAN_FEE)
}

#[derive(Debug, Clone)]
pub struct AccelOpenParams {
    pub deposit: u64,
    pub target_leverage_bps: u64,
    pub max_slippage_bps: u64,
    pub split_fee_bps: u64,
    pub venue: LendingVenueKind,
    pub pt_price_6dec: u64,
    pub base_price_6dec: u64,
    pub min_health_bps: u64,
    pub available_liquidity: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AccelOpenPlan {
    pub flash_amount: u64,
    pub flash_fee: u64,
    pub total_in: u64,
    pub collateral_pt: u64,
    pub yt_held: u64,
    pub split_fee: u64,
    /// Exactly covers flash principal + fee
    pub borrow_net: u64,
    pub debt: u64,
    pub health_bps: u64,
}

/// One-pass open: deposit plus flash proceeds split together, the borrow
/// sized to settle the flash loan exactly. Any shortfall fails the plan.
pub fn plan_accelerated_open(p: &AccelOpenParams) -> Result<AccelOpenPlan> {
    require!(p.deposit > 0, CoilError::InvalidAmount);
    let venue = p.venue.venue();

    let flash = flash_amount(p.deposit, p.target_leverage_bps)?;
    let fee = flash_fee_for(flash);
    let total_in = p
        .deposit
        .checked_add(flash)
        .ok_or(CoilError::MathOverflow)?;

    let quote = venues::split_quote(total_in, p.split_fee_bps)?;
    let floor = mul_bps(total_in, BPS_DENOMINATOR.saturating_sub(p.max_slippage_bps))?;
    require!(quote.pt_out >= floor, CoilError::SplitBelowFloor);

    let borrow_net = flash.checked_add(fee).ok_or(CoilError::MathOverflow)?;
    require!(
        borrow_net <= p.available_liquidity,
        CoilError::InsufficientLiquidity
    );
    let debt = venues::borrow_gross(borrow_net, venue.origination_fee_bps())?;

    let pt_value_usd = token_value_usd(quote.pt_out, p.pt_price_6dec)?;
    let debt_usd = token_value_usd(debt, p.base_price_6dec)?;
    let cap_usd = mul_bps(pt_value_usd, venue.max_ltv_bps())?;
    require!(debt_usd <= cap_usd, CoilError::FlashRepaymentShortfall);

    let health_bps = health::health_ratio_bps(pt_value_usd, debt_usd)?;
    require!(
        health_bps >= p.min_health_bps,
        CoilError::HealthBelowMinimum
    );

    Ok(AccelOpenPlan {
        flash_amount: flash,
        flash_fee: fee,
        total_in,
        collateral_pt: quote.pt_out,
        yt_held: quote.yt_out,
        split_fee: quote.fee,
        borrow_net,
        debt,
        health_bps,
    })
}

#[derive(Debug, Clone)]
pub struct AccelCloseParams {
    pub collateral_pt: u64,
    pub yt_held: u64,
    pub debt: u64,
    pub matured: bool,
    pub pt_price_6dec: u64,
    pub yt_price_6dec: u64,
    pub base_price_6dec: u64,
    pub swap_fee_bps: u64,
}

#[derive(Debug, Clone, Copy)]
pub struct AccelClosePlan {
    /// Flash principal that retires the debt up front
    pub required_flash: u64,
    pub flash_fee: u64,
    pub recovered: u64,
    pub flash_repayment: u64,
    pub returned: u64,
    pub pt_burned: u64,
    pub yt_burned: u64,
    pub pt_sold: u64,
    pub yt_sold: u64,
}

/// One-pass close: flash-repay the debt, free the collateral, redeem or sell
/// everything, settle the flash loan from the proceeds.
pub fn plan_accelerated_close(p: &AccelCloseParams) -> Result<AccelClosePlan> {
    let required_flash = p.debt;
    let fee = if required_flash > 0 {
        flash_fee_for(required_flash)
    } else {
        0
    };

    let mut recovered: u64 = 0;
    let mut pt = p.collateral_pt;
    let mut yt = p.yt_held;
    let mut pt_sold = 0u64;
    let mut yt_sold = 0u64;

    let q = venues::redeem_quote(pt, yt, p.matured);
    recovered = recovered
        .checked_add(q.base_out)
        .ok_or(CoilError::MathOverflow)?;
    pt = pt.saturating_sub(q.pt_burned);
    yt = yt.saturating_sub(q.yt_burned);

    if !p.matured {
        if pt > 0 {
            let out =
                venues::swap_quote(pt, p.pt_price_6dec, p.base_price_6dec, p.swap_fee_bps)?;
            recovered = recovered
                .checked_add(out)
                .ok_or(CoilError::MathOverflow)?;
            pt_sold = pt;
        }
        if yt > 0 {
            let out =
                venues::swap_quote(yt, p.yt_price_6dec, p.base_price_6dec, p.swap_fee_bps)?;
            recovered = recovered
                .checked_add(out)
                .ok_or(CoilError::MathOverflow)?;
            yt_sold = yt;
        }
    }

    let flash_repayment = required_flash
        .checked_add(fee)
        .ok_or(CoilError::MathOverflow)?;
    require!(
        recovered >= flash_repayment,
        CoilError::FlashRepaymentShortfall
    );

    Ok(AccelClosePlan {
        required_flash,
        flash_fee: fee,
        recovered,
        flash_repayment,
        returned: recovered - flash_repayment,
        pt_burned: q.pt_burned,
        yt_burned: q.yt_burned,
        pt_sold,
        yt_sold,
    })
}

// ========== READ-ONLY ESTIMATION ==========

#[derive(Debug, Clone, Copy)]
pub struct PositionProjection {
    pub loops_executed: u8,
    pub collateral_pt: u64,
    pub pt_held: u64,
    pub yt_held: u64,
    pub debt: u64,
    pub health_bps: u64,
    /// PT valued at redemption parity, YT at its current quote, less debt
    pub maturity_value_usd: u64,
    pub projected_pnl_usd: i64,
}

/// Estimated outcome of a hypothetical open, for integrators. Assumes PT
/// converges to redemption parity at maturity.
pub fn estimate_open(p: &LoopParams, yt_price_6dec: u64) -> Result<PositionProjection> {
    let plan = plan_loops(p)?;
    let pt_total = plan
        .collateral_pt
        .checked_add(plan.pt_held)
        .ok_or(CoilError::MathOverflow)?;
    let pt_value = token_value_usd(pt_total, p.base_price_6dec)?;
    let yt_value = token_value_usd(plan.yt_held, yt_price_6dec)?;
    let debt_value = token_value_usd(plan.debt, p.base_price_6dec)?;
    let maturity_value_usd = pt_value
        .checked_add(yt_value)
        .ok_or(CoilError::MathOverflow)?
        .saturating_sub(debt_value);
    let deposit_value = token_value_usd(p.deposit, p.base_price_6dec)?;

    Ok(PositionProjection {
        loops_executed: plan.loops_executed,
        collateral_pt: plan.collateral_pt,
        pt_held: plan.pt_held,
        yt_held: plan.yt_held,
        debt: plan.debt,
        health_bps: plan.health_bps,
        maturity_value_usd,
        projected_pnl_usd: net_pnl(maturity_value_usd, deposit_value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT: u64 = TOKEN_UNIT;
    const PAR: u64 = USD_MULTIPLIER;

    fn base_params() -> LoopParams {
        LoopParams {
            deposit: 100 * UNIT,
            loop_count: 3,
            target_borrow_bps: 8_000,
            min_pt_out_first_loop: 0,
            slippage_decay_bps: DEFAULT_SLIPPAGE_DECAY_BPS,
            split_fee_bps: 0,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            base_price_6dec: PAR,
            available_liquidity: 1_000_000 * UNIT,
        }
    }

    #[test]
    fn test_three_loops_at_eighty_percent() {
        let plan = plan_loops(&base_params()).unwrap();

        assert_eq!(plan.loops_executed, 3);
        // 100 + 80 + 64 posted as collateral
        assert_eq!(plan.collateral_pt, 244 * UNIT);
        // geometric borrows 80 + 64 + 51.2, each grossed up by the 10 bps
        // origination fee
        assert_eq!(plan.pool_drawn, 195_200_000);
        assert_eq!(plan.debt, 195_395_200);
        // the final 51.2 borrow is split and held, not posted
        assert_eq!(plan.pt_held, 51_200_000);
        assert_eq!(plan.yt_held, 295_200_000);
        // 244 / 195.3952 comfortably above a 1.10 floor
        assert_eq!(plan.health_bps, 12_487);
        assert!(plan.health_bps >= DEFAULT_MIN_HEALTH_BPS);
    }

    #[test]
    fn test_loop_count_boundaries_rejected() {
        let mut p = base_params();
        p.loop_count = 0;
        assert!(plan_loops(&p).is_err());
        p.loop_count = MAX_LOOPS + 1;
        assert!(plan_loops(&p).is_err());
    }

    #[test]
    fn test_zero_deposit_rejected() {
        let mut p = base_params();
        p.deposit = 0;
        assert!(plan_loops(&p).is_err());
    }

    #[test]
    fn test_target_above_venue_ltv_rejected() {
        let mut p = base_params();
        p.venue = LendingVenueKind::Strata; // 75% cap
        p.target_borrow_bps = 8_000;
        assert!(plan_loops(&p).is_err());
    }

    #[test]
    fn test_early_exit_when_liquidity_runs_dry() {
        let mut p = base_params();
        p.loop_count = 5;
        p.available_liquidity = 80 * UNIT;

        let plan = plan_loops(&p).unwrap();
        // loop 1 drains the pool, loop 2 borrows zero, loop 3 never runs
        assert_eq!(plan.loops_executed, 2);
        assert_eq!(plan.steps[1].borrowed_net, 0);
        assert!(plan.tail.is_none());
        assert_eq!(plan.pool_drawn, 80 * UNIT);
    }

    #[test]
    fn test_slippage_floor_enforced_and_decays() {
        let mut p = base_params();
        p.split_fee_bps = 100; // 1% fee
        p.min_pt_out_first_loop = p.deposit; // demands a lossless split
        assert!(plan_loops(&p).is_err());

        // a 99% floor tolerates the 1% fee on every loop
        p.min_pt_out_first_loop = 99 * UNIT;
        let plan = plan_loops(&p).unwrap();
        assert_eq!(plan.loops_executed, 3);

        // the tolerance loosens multiplicatively each loop
        assert_eq!(mul_bps(9_900, BPS_DENOMINATOR - 500).unwrap(), 9_405);
    }

    #[test]
    fn test_round_trip_loses_only_fees() {
        let open = plan_loops(&base_params()).unwrap();
        let close = plan_unwind(&UnwindParams {
            collateral_pt: open.collateral_pt,
            pt_held: open.pt_held,
            yt_held: open.yt_held,
            debt: open.debt,
            matured: false,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })
        .unwrap();

        assert_eq!(close.debt_repaid, open.debt);
        // every claim pairs off, nothing needs the swap venue
        assert_eq!(close.pt_sold, 0);
        assert_eq!(close.yt_sold, 0);
        assert_eq!(close.returned, 99_804_800);
        assert!(close.rounds <= MAX_UNWIND_ROUNDS);

        // bounded loss, never profit, under static prices
        let pnl = net_pnl(close.returned, 100 * UNIT);
        assert_eq!(pnl, -195_200);
        assert!(pnl < 0);
    }

    #[test]
    fn test_unwind_with_zero_debt_returns_everything() {
        let plan = plan_unwind(&UnwindParams {
            collateral_pt: 99_900_000,
            pt_held: 0,
            yt_held: 99_900_000,
            debt: 0,
            matured: false,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })
        .unwrap();

        assert_eq!(plan.debt_repaid, 0);
        assert_eq!(plan.returned, 99_900_000);
        assert_eq!(net_pnl(plan.returned, 100 * UNIT), -100_000);
    }

    #[test]
    fn test_unwind_after_maturity_redeems_principal_alone() {
        let plan = plan_unwind(&UnwindParams {
            collateral_pt: 244 * UNIT,
            pt_held: 51_200_000,
            yt_held: 295_200_000,
            debt: 195_200_000,
            matured: true,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            yt_price_6dec: 0,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })
        .unwrap();

        // PT redeems 1:1, expired YT contributes nothing
        assert_eq!(plan.debt_repaid, 195_200_000);
        assert_eq!(plan.returned, 100 * UNIT);
        assert_eq!(plan.yt_sold, 0);
        assert_eq!(plan.pt_sold, 0);
    }

    #[test]
    fn test_liquidation_sells_yield_claims_first() {
        let plan = plan_liquidation(&LiquidationParams {
            collateral_pt: 100 * UNIT,
            pt_held: 0,
            yt_held: 120 * UNIT,
            debt: 90 * UNIT,
            matured: false,
            pt_price_6dec: 950_000,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
            reward_bps: LIQUIDATION_REWARD_BPS,
        })
        .unwrap();

        assert_eq!(plan.yt_sold, 120 * UNIT);
        assert_eq!(plan.yt_proceeds, 5_982_000);
        assert_eq!(plan.pt_sold, 100 * UNIT);
        assert_eq!(plan.pt_proceeds, 94_715_000);
        assert_eq!(plan.debt_recovered, 90 * UNIT);
        assert_eq!(plan.shortfall, 0);
        assert_eq!(plan.reward, 450_000);
        assert_eq!(plan.residual, 10_247_000);
    }

    #[test]
    fn test_liquidation_shortfall_never_pays_residual() {
        let plan = plan_liquidation(&LiquidationParams {
            collateral_pt: 50 * UNIT,
            pt_held: 0,
            yt_held: 10 * UNIT,
            debt: 90 * UNIT,
            matured: false,
            pt_price_6dec: 950_000,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
            reward_bps: LIQUIDATION_REWARD_BPS,
        })
        .unwrap();

        assert!(plan.shortfall > 0);
        assert_eq!(plan.residual, 0);
        assert_eq!(plan.reward, 0);
    }

    #[test]
    fn test_flash_amount_for_three_x() {
        assert_eq!(flash_amount(100 * UNIT, 30_000).unwrap(), 200 * UNIT);
    }

    #[test]
    fn test_flash_amount_leverage_bounds() {
        assert!(flash_amount(100 * UNIT, BPS_DENOMINATOR).is_err());
        assert!(flash_amount(100 * UNIT, MAX_ACCEL_LEVERAGE_BPS + 1).is_err());
    }

    #[test]
    fn test_accelerated_open_covers_flash_exactly() {
        let plan = plan_accelerated_open(&AccelOpenParams {
            deposit: 100 * UNIT,
            target_leverage_bps: 30_000,
            max_slippage_bps: 100,
            split_fee_bps: 0,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            base_price_6dec: PAR,
            min_health_bps: DEFAULT_MIN_HEALTH_BPS,
            available_liquidity: 1_000_000 * UNIT,
        })
        .unwrap();

        assert_eq!(plan.flash_amount, 200 * UNIT);
        assert_eq!(plan.flash_fee, 100_000);
        assert_eq!(plan.total_in, 300 * UNIT);
        assert_eq!(plan.collateral_pt, 300 * UNIT);
        // borrow hands out precisely principal + fee
        assert_eq!(plan.borrow_net, 200_100_000);
        assert_eq!(plan.debt, 200_300_100);
        assert!(plan.health_bps >= DEFAULT_MIN_HEALTH_BPS);
    }

    #[test]
    fn test_accelerated_open_shortfall_fails_whole_plan() {
        let res = plan_accelerated_open(&AccelOpenParams {
            deposit: 100 * UNIT,
            target_leverage_bps: 50_000,
            max_slippage_bps: 100,
            split_fee_bps: 0,
            venue: LendingVenueKind::Terminal,
            pt_price_6dec: PAR,
            base_price_6dec: PAR,
            min_health_bps: DEFAULT_MIN_HEALTH_BPS,
            available_liquidity: 1_000_000 * UNIT,
        });
        assert!(res.is_err());
    }

    #[test]
    fn test_accelerated_close_settles_flash_or_fails() {
        let plan = plan_accelerated_close(&AccelCloseParams {
            collateral_pt: 300 * UNIT,
            yt_held: 300 * UNIT,
            debt: 200_300_100,
            matured: false,
            pt_price_6dec: PAR,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })
        .unwrap();

        assert_eq!(plan.required_flash, 200_300_100);
        assert_eq!(plan.flash_fee, 100_150);
        assert_eq!(plan.recovered, 300 * UNIT);
        assert_eq!(plan.returned, 300 * UNIT - 200_300_100 - 100_150);

        // starved of collateral the same close refuses to plan
        let res = plan_accelerated_close(&AccelCloseParams {
            collateral_pt: 150 * UNIT,
            yt_held: 150 * UNIT,
            debt: 200_300_100,
            matured: false,
            pt_price_6dec: PAR,
            yt_price_6dec: 50_000,
            base_price_6dec: PAR,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        });
        assert!(res.is_err());
    }

    #[test]
    fn test_estimate_open_reports_signed_projection() {
        let proj = estimate_open(&base_params(), 50_000).unwrap();
        assert_eq!(proj.loops_executed, 3);
        // 295.2 PT at parity + 295.2 YT at 0.05 - 195.3952 debt
        assert_eq!(proj.maturity_value_usd, 114_564_800);
        assert_eq!(proj.projected_pnl_usd, 14_564_800);
    }
}
