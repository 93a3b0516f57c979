use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, Mint, MintTo, Token, TokenAccount, Transfer};

use coil_core::{
    constants::*,
    errors::CoilError,
    events::*,
    health, looping,
    looping::{LiquidationParams, LoopParams, UnwindParams},
    state::{PriceFeed, Protocol, StrategyConfig, VenueEntry, VenueKind},
    venues,
};

declare_id!("54piVaDqudzpUmzGwTzknJb24dSN9RSXrw3TK7iF4HU3");

// ========== LOCAL STATE (owned by this program) ==========

/// Engine singleton: custody authority for every vault and claim mint,
/// plus the aggregate totals the reconciliation check runs against.
#[account]
#[derive(InitSpace)]
pub struct EngineState {
    pub base_mint: Pubkey,
    pub pt_mint: Pubkey,
    pub yt_mint: Pubkey,
    pub lp_share_mint: Pubkey,
    pub splitter_vault: Pubkey,
    pub lending_vault: Pubkey,
    pub collateral_vault: Pubkey,
    pub pt_vault: Pubkey,
    pub yield_vault: Pubkey,
    pub total_collateral_pt: u64,
    pub total_pt_held: u64,
    pub total_yt_held: u64,
    pub total_debt: u64,
    pub bump: u8,
}

/// The splitting market's book: base locked behind outstanding claim pairs
/// and the fee it has skimmed.
#[account]
#[derive(InitSpace)]
pub struct SplitterMarket {
    pub fee_bps: u64,
    pub base_locked: u64,
    pub fee_accrued: u64,
    pub bump: u8,
}

/// Share-accounted lending pool the executor borrows from
#[account]
#[derive(InitSpace)]
pub struct LendingPool {
    pub total_deposits: u64,
    pub total_shares: u64,
    pub total_borrowed: u64,
    pub interest_earned: u64,
    pub bump: u8,
}

/// Per-owner looping position
#[account]
#[derive(InitSpace)]
pub struct LoopPosition {
    pub owner: Pubkey,
    pub initial_deposit: u64,
    /// PT posted with the lending venue
    pub collateral_deposited: u64,
    /// Base units owed, origination fees included
    pub debt_outstanding: u64,
    /// Claims in custody but not posted or sold
    pub pt_held: u64,
    pub yt_held: u64,
    pub loops_executed: u8,
    pub target_borrow_bps: u16,
    pub min_health_bps: u64,
    pub opened_at: i64,
    pub last_rebalanced_at: i64,
    pub is_active: bool,
    pub bump: u8,
}

impl LoopPosition {
    pub fn health_ratio_bps(&self, pt_price_6dec: u64, base_price_6dec: u64) -> Result<u64> {
        let collateral_usd =
            looping::token_value_usd(self.collateral_deposited, pt_price_6dec)?;
        let debt_usd = looping::token_value_usd(self.debt_outstanding, base_price_6dec)?;
        health::health_ratio_bps(collateral_usd, debt_usd)
    }

    pub fn is_liquidation_due(
        &self,
        pt_price_6dec: u64,
        base_price_6dec: u64,
        min_health_bps: u64,
    ) -> Result<bool> {
        let health_bps = self.health_ratio_bps(pt_price_6dec, base_price_6dec)?;
        Ok(self.is_active && health::is_below_minimum(health_bps, min_health_bps))
    }

    fn clear(&mut self) {
        self.collateral_deposited = 0;
        self.debt_outstanding = 0;
        self.pt_held = 0;
        self.yt_held = 0;
        self.loops_executed = 0;
        self.is_active = false;
    }
}

#[program]
pub mod coil_looper {
    use super::*;

    /// Create the engine, splitting market and lending pool records
    pub fn initialize_engine(ctx: Context<InitializeEngine>, split_fee_bps: u64) -> Result<()> {
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.admin.key(),
            CoilError::Unauthorized
        );
        require!(split_fee_bps < BPS_DENOMINATOR, CoilError::InvalidAmount);

        let engine = &mut ctx.accounts.engine;
        engine.base_mint = ctx.accounts.base_mint.key();
        engine.bump = ctx.bumps.engine;

        let market = &mut ctx.accounts.market;
        market.fee_bps = split_fee_bps;
        market.base_locked = 0;
        market.fee_accrued = 0;
        market.bump = ctx.bumps.market;

        let pool = &mut ctx.accounts.pool;
        pool.total_deposits = 0;
        pool.total_shares = 0;
        pool.total_borrowed = 0;
        pool.interest_earned = 0;
        pool.bump = ctx.bumps.pool;

        msg!("Engine initialized for base {}", engine.base_mint);
        Ok(())
    }

    /// Create the PT/YT claim mints and the LP share mint under the engine
    /// authority
    pub fn initialize_claim_mints(ctx: Context<InitializeClaimMints>) -> Result<()> {
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.admin.key(),
            CoilError::Unauthorized
        );

        let engine = &mut ctx.accounts.engine;
        engine.pt_mint = ctx.accounts.pt_mint.key();
        engine.yt_mint = ctx.accounts.yt_mint.key();
        engine.lp_share_mint = ctx.accounts.lp_share_mint.key();

        msg!("Claim mints initialized");
        Ok(())
    }

    /// Create the custody vaults and finish engine setup
    pub fn initialize_engine_vaults(ctx: Context<InitializeEngineVaults>) -> Result<()> {
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.admin.key(),
            CoilError::Unauthorized
        );

        let engine = &mut ctx.accounts.engine;
        engine.splitter_vault = ctx.accounts.splitter_vault.key();
        engine.lending_vault = ctx.accounts.lending_vault.key();
        engine.collateral_vault = ctx.accounts.collateral_vault.key();
        engine.pt_vault = ctx.accounts.pt_vault.key();
        engine.yield_vault = ctx.accounts.yield_vault.key();

        emit!(EngineInitialized {
            base_mint: engine.base_mint,
            pt_mint: engine.pt_mint,
            yt_mint: engine.yt_mint,
        });

        msg!("Engine vaults initialized");
        Ok(())
    }

    /// Deposit base into the lending pool, receive shares
    pub fn seed_liquidity(ctx: Context<SeedLiquidity>, amount: u64) -> Result<()> {
        require!(amount > 0, CoilError::InvalidAmount);

        let pool = &ctx.accounts.pool;
        let shares_to_mint = if pool.total_shares == 0 {
            amount
        } else {
            (amount as u128)
                .checked_mul(pool.total_shares as u128)
                .ok_or(CoilError::MathOverflow)?
                .checked_div(pool.total_deposits as u128)
                .ok_or(CoilError::MathOverflow)? as u64
        };
        require!(shares_to_mint > 0, CoilError::InvalidAmount);

        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.user_base_account.to_account_info(),
                    to: ctx.accounts.lending_vault.to_account_info(),
                    authority: ctx.accounts.depositor.to_account_info(),
                },
            ),
            amount,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        token::mint_to(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                MintTo {
                    mint: ctx.accounts.lp_share_mint.to_account_info(),
                    to: ctx.accounts.user_share_account.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            shares_to_mint,
        )?;

        let pool = &mut ctx.accounts.pool;
        pool.total_deposits = pool
            .total_deposits
            .checked_add(amount)
            .ok_or(CoilError::MathOverflow)?;
        pool.total_shares = pool
            .total_shares
            .checked_add(shares_to_mint)
            .ok_or(CoilError::MathOverflow)?;

        emit!(LiquiditySeeded {
            depositor: ctx.accounts.depositor.key(),
            amount,
            shares_minted: shares_to_mint,
        });

        msg!("Seeded {} base, minted {} shares", amount, shares_to_mint);
        Ok(())
    }

    /// Burn pool shares for base plus accrued fees
    pub fn withdraw_liquidity(ctx: Context<WithdrawLiquidity>, shares_amount: u64) -> Result<()> {
        require!(shares_amount > 0, CoilError::InvalidAmount);

        let pool = &ctx.accounts.pool;
        require!(pool.total_shares > 0, CoilError::NoPoolShares);

        let tokens_to_return = (shares_amount as u128)
            .checked_mul(pool.total_deposits as u128)
            .ok_or(CoilError::MathOverflow)?
            .checked_div(pool.total_shares as u128)
            .ok_or(CoilError::MathOverflow)? as u64;
        require!(tokens_to_return > 0, CoilError::InvalidAmount);
        require!(
            ctx.accounts.lending_vault.amount >= tokens_to_return,
            CoilError::InsufficientLiquidity
        );

        token::burn(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Burn {
                    mint: ctx.accounts.lp_share_mint.to_account_info(),
                    from: ctx.accounts.user_share_account.to_account_info(),
                    authority: ctx.accounts.withdrawer.to_account_info(),
                },
            ),
            shares_amount,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.lending_vault.to_account_info(),
                    to: ctx.accounts.user_base_account.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            tokens_to_return,
        )?;

        let pool = &mut ctx.accounts.pool;
        pool.total_deposits = pool.total_deposits.saturating_sub(tokens_to_return);
        pool.total_shares = pool.total_shares.saturating_sub(shares_amount);

        emit!(LiquidityWithdrawn {
            withdrawer: ctx.accounts.withdrawer.key(),
            shares_burned: shares_amount,
            amount_received: tokens_to_return,
        });

        msg!("Withdrew {} shares for {} base", shares_amount, tokens_to_return);
        Ok(())
    }

    /// Create an (inactive) position record for the caller
    pub fn initialize_position(ctx: Context<InitializePosition>) -> Result<()> {
        let position = &mut ctx.accounts.position;
        position.owner = ctx.accounts.owner.key();
        position.is_active = false;
        position.bump = ctx.bumps.position;

        msg!("Position initialized for {}", position.owner);
        Ok(())
    }

    /// Open a leveraged looping position.
    ///
    /// Splits the deposit, posts the PT, borrows against it and feeds the
    /// borrow into the next loop, `loop_count` times. The final borrow is
    /// split and held as free claims. The whole instruction reverts if any
    /// loop's split lands under its floor or the final health misses the
    /// configured minimum.
    pub fn open_position(
        ctx: Context<OpenPosition>,
        deposit_amount: u64,
        loop_count: u8,
        target_borrow_bps: u16,
        min_pt_out_first_loop: u64,
        min_health_bps: u64,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let strategy = &ctx.accounts.strategy;

        ctx.accounts.protocol.ensure_not_paused()?;
        strategy.ensure_open_ready(now)?;
        require!(
            loop_count <= strategy.max_loops,
            CoilError::InvalidLoopCount
        );
        require!(
            !ctx.accounts.position.is_active,
            CoilError::PositionAlreadyActive
        );
        ctx.accounts.market_entry.ensure_approved(
            VenueKind::SplittingMarket,
            ctx.accounts.market.key(),
        )?;
        require!(
            strategy.splitting_market == ctx.accounts.market.key(),
            CoilError::VenueNotWhitelisted
        );
        ctx.accounts
            .claim_entry
            .ensure_approved(VenueKind::ClaimSource, strategy.pt_mint)?;

        let base_feed = &ctx.accounts.base_price_feed;
        let pt_feed = &ctx.accounts.pt_price_feed;
        require!(
            base_feed.mint == strategy.base_mint && pt_feed.mint == strategy.pt_mint,
            CoilError::StalePriceFeed
        );
        base_feed.ensure_fresh(now)?;
        pt_feed.ensure_fresh(now)?;

        let effective_min_health = if min_health_bps == 0 {
            strategy.min_health_bps
        } else {
            require!(
                min_health_bps >= strategy.min_health_bps,
                CoilError::HealthBelowMinimum
            );
            min_health_bps
        };

        let plan = looping::plan_loops(&LoopParams {
            deposit: deposit_amount,
            loop_count,
            target_borrow_bps: target_borrow_bps as u64,
            min_pt_out_first_loop,
            slippage_decay_bps: strategy.slippage_decay_bps,
            split_fee_bps: ctx.accounts.market.fee_bps,
            venue: strategy.lending_venue,
            pt_price_6dec: pt_feed.price_usd_6dec,
            base_price_6dec: base_feed.price_usd_6dec,
            available_liquidity: ctx.accounts.lending_vault.amount,
        })?;
        require!(
            plan.health_bps >= effective_min_health,
            CoilError::HealthBelowMinimum
        );

        let total_split_in = deposit_amount
            .checked_add(plan.pool_drawn)
            .ok_or(CoilError::MathOverflow)?;
        let total_pt_minted = plan
            .collateral_pt
            .checked_add(plan.pt_held)
            .ok_or(CoilError::MathOverflow)?;
        let total_split_fees = total_split_in.saturating_sub(total_pt_minted);

        // Effects before interactions: the ledger reflects the finished
        // position before any token moves.
        let position = &mut ctx.accounts.position;
        position.initial_deposit = deposit_amount;
        position.collateral_deposited = plan.collateral_pt;
        position.debt_outstanding = plan.debt;
        position.pt_held = plan.pt_held;
        position.yt_held = plan.yt_held;
        position.loops_executed = plan.loops_executed;
        position.target_borrow_bps = target_borrow_bps;
        position.min_health_bps = effective_min_health;
        position.opened_at = now;
        position.last_rebalanced_at = now;
        position.is_active = true;

        let engine = &mut ctx.accounts.engine;
        engine.total_collateral_pt = engine
            .total_collateral_pt
            .checked_add(plan.collateral_pt)
            .ok_or(CoilError::MathOverflow)?;
        engine.total_pt_held = engine
            .total_pt_held
            .checked_add(plan.pt_held)
            .ok_or(CoilError::MathOverflow)?;
        engine.total_yt_held = engine
            .total_yt_held
            .checked_add(plan.yt_held)
            .ok_or(CoilError::MathOverflow)?;
        engine.total_debt = engine
            .total_debt
            .checked_add(plan.debt)
            .ok_or(CoilError::MathOverflow)?;

        let market = &mut ctx.accounts.market;
        market.base_locked = market
            .base_locked
            .checked_add(total_pt_minted)
            .ok_or(CoilError::MathOverflow)?;
        market.fee_accrued = market
            .fee_accrued
            .checked_add(total_split_fees)
            .ok_or(CoilError::MathOverflow)?;

        let pool = &mut ctx.accounts.pool;
        pool.total_borrowed = pool
            .total_borrowed
            .checked_add(plan.debt)
            .ok_or(CoilError::MathOverflow)?;
        pool.interest_earned = pool
            .interest_earned
            .checked_add(plan.debt.saturating_sub(plan.pool_drawn))
            .ok_or(CoilError::MathOverflow)?;

        for step in &plan.steps {
            emit!(LoopExecuted {
                owner: position.owner,
                loop_index: step.index,
                split_in: step.split_in,
                pt_out: step.pt_out,
                yt_out: step.yt_out,
                borrowed: step.borrowed_net,
            });
        }

        // Caller's deposit into the splitting market
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.user_base_account.to_account_info(),
                    to: ctx.accounts.splitter_vault.to_account_info(),
                    authority: ctx.accounts.owner.to_account_info(),
                },
            ),
            deposit_amount,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];

        // Every borrow is re-split, so the pool's outflow lands in the market
        if plan.pool_drawn > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.lending_vault.to_account_info(),
                        to: ctx.accounts.splitter_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.pool_drawn,
            )?;
        }

        token::mint_to(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                MintTo {
                    mint: ctx.accounts.pt_mint.to_account_info(),
                    to: ctx.accounts.collateral_vault.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            plan.collateral_pt,
        )?;
        if plan.pt_held > 0 {
            token::mint_to(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    MintTo {
                        mint: ctx.accounts.pt_mint.to_account_info(),
                        to: ctx.accounts.pt_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.pt_held,
            )?;
        }
        token::mint_to(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                MintTo {
                    mint: ctx.accounts.yt_mint.to_account_info(),
                    to: ctx.accounts.yield_vault.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            plan.yt_held,
        )?;

        emit!(PositionOpened {
            owner: ctx.accounts.position.owner,
            deposit: deposit_amount,
            loops_executed: plan.loops_executed,
            collateral_deposited: plan.collateral_pt,
            debt_outstanding: plan.debt,
            health_bps: plan.health_bps,
        });

        msg!(
            "Opened position: {} loops, {} PT collateral, {} debt",
            plan.loops_executed,
            plan.collateral_pt,
            plan.debt
        );
        Ok(())
    }

    /// Close the caller's position. A position whose health sits below the
    /// minimum is liquidated instead of closed; that path never errors back
    /// to the caller.
    pub fn close_position(ctx: Context<ClosePosition>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let position = &ctx.accounts.position;
        require!(position.is_active, CoilError::PositionNotFound);
        require!(
            ctx.accounts.caller.key() == position.owner
                || ctx.accounts.caller.key() == ctx.accounts.protocol.admin,
            CoilError::Unauthorized
        );

        let strategy = &ctx.accounts.strategy;
        let base_feed = &ctx.accounts.base_price_feed;
        let pt_feed = &ctx.accounts.pt_price_feed;
        let yt_feed = &ctx.accounts.yt_price_feed;
        require!(
            base_feed.mint == strategy.base_mint
                && pt_feed.mint == strategy.pt_mint
                && yt_feed.mint == strategy.yt_mint,
            CoilError::StalePriceFeed
        );
        base_feed.ensure_fresh(now)?;
        pt_feed.ensure_fresh(now)?;

        let matured = strategy.is_matured(now);
        // Expired YT is worthless and its feed goes quiet legitimately
        if !matured {
            yt_feed.ensure_fresh(now)?;
        }
        let health_bps =
            position.health_ratio_bps(pt_feed.price_usd_6dec, base_feed.price_usd_6dec)?;

        if health::is_below_minimum(health_bps, strategy.min_health_bps) {
            // Designed fallback, not error suppression: an unhealthy close
            // becomes a liquidation with no cranker reward.
            let plan = looping::plan_liquidation(&LiquidationParams {
                collateral_pt: position.collateral_deposited,
                pt_held: position.pt_held,
                yt_held: position.yt_held,
                debt: position.debt_outstanding,
                matured,
                pt_price_6dec: pt_feed.price_usd_6dec,
                yt_price_6dec: yt_feed.price_usd_6dec,
                base_price_6dec: base_feed.price_usd_6dec,
                swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
                reward_bps: 0,
            })?;
            if plan.yt_sold > 0 || plan.pt_sold > 0 {
                ctx.accounts
                    .router_entry
                    .ensure_approved(VenueKind::SwapRouter, ctx.accounts.engine.key())?;
            }

            let pre_collateral = position.collateral_deposited;
            let pre_pt_held = position.pt_held;
            let pre_yt_held = position.yt_held;
            let pre_debt = position.debt_outstanding;
            let owner = position.owner;

            let position = &mut ctx.accounts.position;
            position.clear();

            apply_book_release(
                &mut ctx.accounts.engine,
                &mut ctx.accounts.market,
                &mut ctx.accounts.pool,
                pre_collateral,
                pre_pt_held,
                pre_yt_held,
                pre_debt,
                plan.shortfall,
                plan.yt_proceeds
                    .checked_add(plan.pt_proceeds)
                    .ok_or(CoilError::MathOverflow)?,
            )?;

            burn_position_claims(
                &ctx.accounts.token_program,
                &ctx.accounts.pt_mint,
                &ctx.accounts.yt_mint,
                &ctx.accounts.collateral_vault,
                &ctx.accounts.pt_vault,
                &ctx.accounts.yield_vault,
                &ctx.accounts.engine,
                pre_collateral,
                pre_pt_held,
                pre_yt_held,
            )?;

            let engine_bump = ctx.accounts.engine.bump;
            let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
            if plan.debt_recovered > 0 {
                token::transfer(
                    CpiContext::new_with_signer(
                        ctx.accounts.token_program.key(),
                        Transfer {
                            from: ctx.accounts.splitter_vault.to_account_info(),
                            to: ctx.accounts.lending_vault.to_account_info(),
                            authority: ctx.accounts.engine.to_account_info(),
                        },
                        &[seeds],
                    ),
                    plan.debt_recovered,
                )?;
            }
            if plan.residual > 0 {
                token::transfer(
                    CpiContext::new_with_signer(
                        ctx.accounts.token_program.key(),
                        Transfer {
                            from: ctx.accounts.splitter_vault.to_account_info(),
                            to: ctx.accounts.owner_base_account.to_account_info(),
                            authority: ctx.accounts.engine.to_account_info(),
                        },
                        &[seeds],
                    ),
                    plan.residual,
                )?;
            }

            emit!(PositionLiquidated {
                owner,
                health_at_liquidation_bps: health_bps,
                debt_recovered: plan.debt_recovered,
                residual_returned: plan.residual,
                cranker: ctx.accounts.caller.key(),
                cranker_reward: 0,
            });

            msg!("Close redirected to liquidation at health {}", health_bps);
            return Ok(());
        }

        let plan = looping::plan_unwind(&UnwindParams {
            collateral_pt: position.collateral_deposited,
            pt_held: position.pt_held,
            yt_held: position.yt_held,
            debt: position.debt_outstanding,
            matured,
            venue: strategy.lending_venue,
            pt_price_6dec: pt_feed.price_usd_6dec,
            yt_price_6dec: yt_feed.price_usd_6dec,
            base_price_6dec: base_feed.price_usd_6dec,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })?;
        if plan.yt_sold > 0 || plan.pt_sold > 0 {
            ctx.accounts
                .router_entry
                .ensure_approved(VenueKind::SwapRouter, ctx.accounts.engine.key())?;
        }

        let pre_collateral = position.collateral_deposited;
        let pre_pt_held = position.pt_held;
        let pre_yt_held = position.yt_held;
        let pre_debt = position.debt_outstanding;
        let initial_deposit = position.initial_deposit;
        let owner = position.owner;

        // Pre-image cleared before any token movement
        let position = &mut ctx.accounts.position;
        position.clear();

        apply_book_release(
            &mut ctx.accounts.engine,
            &mut ctx.accounts.market,
            &mut ctx.accounts.pool,
            pre_collateral,
            pre_pt_held,
            pre_yt_held,
            pre_debt,
            0,
            plan.base_recovered,
        )?;

        burn_position_claims(
            &ctx.accounts.token_program,
            &ctx.accounts.pt_mint,
            &ctx.accounts.yt_mint,
            &ctx.accounts.collateral_vault,
            &ctx.accounts.pt_vault,
            &ctx.accounts.yield_vault,
            &ctx.accounts.engine,
            pre_collateral,
            pre_pt_held,
            pre_yt_held,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        if plan.debt_repaid > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.splitter_vault.to_account_info(),
                        to: ctx.accounts.lending_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.debt_repaid,
            )?;
        }
        if plan.returned > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.splitter_vault.to_account_info(),
                        to: ctx.accounts.owner_base_account.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.returned,
            )?;
        }

        let net_pnl = looping::net_pnl(plan.returned, initial_deposit);
        emit!(PositionClosed {
            owner,
            returned: plan.returned,
            net_pnl,
        });

        msg!(
            "Closed position in {} rounds, returned {}, pnl {}",
            plan.rounds,
            plan.returned,
            net_pnl
        );
        Ok(())
    }

    /// Permissionless liquidation crank for positions under the health
    /// minimum. The cranker earns a cut of the recovered value.
    pub fn liquidate(ctx: Context<Liquidate>) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let position = &ctx.accounts.position;
        require!(position.is_active, CoilError::PositionNotFound);

        let strategy = &ctx.accounts.strategy;
        let base_feed = &ctx.accounts.base_price_feed;
        let pt_feed = &ctx.accounts.pt_price_feed;
        let yt_feed = &ctx.accounts.yt_price_feed;
        require!(
            base_feed.mint == strategy.base_mint
                && pt_feed.mint == strategy.pt_mint
                && yt_feed.mint == strategy.yt_mint,
            CoilError::StalePriceFeed
        );
        base_feed.ensure_fresh(now)?;
        pt_feed.ensure_fresh(now)?;
        let matured = strategy.is_matured(now);
        if !matured {
            yt_feed.ensure_fresh(now)?;
        }

        require!(
            position.is_liquidation_due(
                pt_feed.price_usd_6dec,
                base_feed.price_usd_6dec,
                strategy.min_health_bps,
            )?,
            CoilError::PositionStillHealthy
        );
        let health_bps =
            position.health_ratio_bps(pt_feed.price_usd_6dec, base_feed.price_usd_6dec)?;
        let plan = looping::plan_liquidation(&LiquidationParams {
            collateral_pt: position.collateral_deposited,
            pt_held: position.pt_held,
            yt_held: position.yt_held,
            debt: position.debt_outstanding,
            matured,
            pt_price_6dec: pt_feed.price_usd_6dec,
            yt_price_6dec: yt_feed.price_usd_6dec,
            base_price_6dec: base_feed.price_usd_6dec,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
            reward_bps: LIQUIDATION_REWARD_BPS,
        })?;
        if plan.yt_sold > 0 || plan.pt_sold > 0 {
            ctx.accounts
                .router_entry
                .ensure_approved(VenueKind::SwapRouter, ctx.accounts.engine.key())?;
        }

        let pre_collateral = position.collateral_deposited;
        let pre_pt_held = position.pt_held;
        let pre_yt_held = position.yt_held;
        let pre_debt = position.debt_outstanding;
        let owner = position.owner;

        let position = &mut ctx.accounts.position;
        position.clear();

        apply_book_release(
            &mut ctx.accounts.engine,
            &mut ctx.accounts.market,
            &mut ctx.accounts.pool,
            pre_collateral,
            pre_pt_held,
            pre_yt_held,
            pre_debt,
            plan.shortfall,
            plan.yt_proceeds
                .checked_add(plan.pt_proceeds)
                .ok_or(CoilError::MathOverflow)?,
        )?;

        burn_position_claims(
            &ctx.accounts.token_program,
            &ctx.accounts.pt_mint,
            &ctx.accounts.yt_mint,
            &ctx.accounts.collateral_vault,
            &ctx.accounts.pt_vault,
            &ctx.accounts.yield_vault,
            &ctx.accounts.engine,
            pre_collateral,
            pre_pt_held,
            pre_yt_held,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        if plan.debt_recovered > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.splitter_vault.to_account_info(),
                        to: ctx.accounts.lending_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.debt_recovered,
            )?;
        }
        if plan.reward > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.splitter_vault.to_account_info(),
                        to: ctx.accounts.cranker_base_account.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.reward,
            )?;
        }
        if plan.residual > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.splitter_vault.to_account_info(),
                        to: ctx.accounts.owner_base_account.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                plan.residual,
            )?;
        }

        emit!(PositionLiquidated {
            owner,
            health_at_liquidation_bps: health_bps,
            debt_recovered: plan.debt_recovered,
            residual_returned: plan.residual,
            cranker: ctx.accounts.cranker.key(),
            cranker_reward: plan.reward,
        });

        msg!(
            "Liquidated at health {}: recovered {}, shortfall {}",
            health_bps,
            plan.debt_recovered,
            plan.shortfall
        );
        Ok(())
    }

    /// Adjust leverage on an open position. `increase` borrows and splits
    /// `amount` more base; otherwise `amount` of debt is repaid by unwinding
    /// collateral. Health is recomputed after the final movement.
    pub fn rebalance(ctx: Context<Rebalance>, increase: bool, amount: u64) -> Result<()> {
        require!(amount > 0, CoilError::InvalidAmount);
        let now = Clock::get()?.unix_timestamp;

        ctx.accounts.protocol.ensure_not_paused()?;
        let position = &ctx.accounts.position;
        require!(position.is_active, CoilError::PositionNotFound);
        require!(
            now.saturating_sub(position.last_rebalanced_at) >= REBALANCE_COOLDOWN,
            CoilError::RebalanceCooldown
        );

        let strategy = &ctx.accounts.strategy;
        let base_feed = &ctx.accounts.base_price_feed;
        let pt_feed = &ctx.accounts.pt_price_feed;
        require!(
            base_feed.mint == strategy.base_mint && pt_feed.mint == strategy.pt_mint,
            CoilError::StalePriceFeed
        );
        base_feed.ensure_fresh(now)?;
        pt_feed.ensure_fresh(now)?;

        let matured = strategy.is_matured(now);
        let venue = strategy.lending_venue.venue();
        let engine_bump = ctx.accounts.engine.bump;

        if increase {
            require!(!matured, CoilError::MaturityPassed);
            let net = amount;
            require!(
                net <= ctx.accounts.lending_vault.amount,
                CoilError::InsufficientLiquidity
            );
            let gross = venues::borrow_gross(net, venue.origination_fee_bps())?;
            let quote = venues::split_quote(net, ctx.accounts.market.fee_bps)?;

            let new_collateral = position
                .collateral_deposited
                .checked_add(quote.pt_out)
                .ok_or(CoilError::MathOverflow)?;
            let new_debt = position
                .debt_outstanding
                .checked_add(gross)
                .ok_or(CoilError::MathOverflow)?;

            let collateral_usd =
                looping::token_value_usd(new_collateral, pt_feed.price_usd_6dec)?;
            let debt_usd = looping::token_value_usd(new_debt, base_feed.price_usd_6dec)?;
            require!(
                debt_usd
                    <= (collateral_usd as u128)
                        .checked_mul(venue.max_ltv_bps() as u128)
                        .ok_or(CoilError::MathOverflow)?
                        .checked_div(BPS_DENOMINATOR as u128)
                        .ok_or(CoilError::MathOverflow)? as u64,
                CoilError::ExceedsVenueLtv
            );
            let health_bps = health::health_ratio_bps(collateral_usd, debt_usd)?;
            require!(
                health_bps >= position.min_health_bps,
                CoilError::HealthBelowMinimum
            );

            let position = &mut ctx.accounts.position;
            position.collateral_deposited = new_collateral;
            position.debt_outstanding = new_debt;
            position.yt_held = position
                .yt_held
                .checked_add(quote.yt_out)
                .ok_or(CoilError::MathOverflow)?;
            position.last_rebalanced_at = now;

            let engine = &mut ctx.accounts.engine;
            engine.total_collateral_pt = engine
                .total_collateral_pt
                .checked_add(quote.pt_out)
                .ok_or(CoilError::MathOverflow)?;
            engine.total_yt_held = engine
                .total_yt_held
                .checked_add(quote.yt_out)
                .ok_or(CoilError::MathOverflow)?;
            engine.total_debt = engine
                .total_debt
                .checked_add(gross)
                .ok_or(CoilError::MathOverflow)?;

            let market = &mut ctx.accounts.market;
            market.base_locked = market
                .base_locked
                .checked_add(quote.pt_out)
                .ok_or(CoilError::MathOverflow)?;
            market.fee_accrued = market
                .fee_accrued
                .checked_add(quote.fee)
                .ok_or(CoilError::MathOverflow)?;

            let pool = &mut ctx.accounts.pool;
            pool.total_borrowed = pool
                .total_borrowed
                .checked_add(gross)
                .ok_or(CoilError::MathOverflow)?;
            pool.interest_earned = pool
                .interest_earned
                .checked_add(gross.saturating_sub(net))
                .ok_or(CoilError::MathOverflow)?;

            let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.lending_vault.to_account_info(),
                        to: ctx.accounts.splitter_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                net,
            )?;
            token::mint_to(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    MintTo {
                        mint: ctx.accounts.pt_mint.to_account_info(),
                        to: ctx.accounts.collateral_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                quote.pt_out,
            )?;
            token::mint_to(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    MintTo {
                        mint: ctx.accounts.yt_mint.to_account_info(),
                        to: ctx.accounts.yield_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                quote.yt_out,
            )?;

            emit!(Rebalanced {
                owner: ctx.accounts.position.owner,
                leverage_increased: true,
                collateral_deposited: new_collateral,
                debt_outstanding: new_debt,
                health_bps,
            });
            msg!("Leverage increased: +{} collateral, +{} debt", quote.pt_out, gross);
            return Ok(());
        }

        // Leverage down: redeem held pairs first, then collateral the venue
        // releases as the debt shrinks.
        let target = amount.min(position.debt_outstanding);
        require!(target > 0, CoilError::InvalidAmount);

        let ltv_bps = venue.max_ltv_bps();
        let mut pt_free = position.pt_held;
        let mut yt = position.yt_held;
        let mut collateral = position.collateral_deposited;
        let mut debt = position.debt_outstanding;
        let mut repaid: u64 = 0;
        let mut collateral_burned: u64 = 0;
        let mut held_burned: u64 = 0;
        let mut yt_burned: u64 = 0;

        for _ in 0..MAX_UNWIND_ROUNDS {
            if repaid >= target {
                break;
            }
            let needed = target - repaid;
            let pt_use = pt_free.min(needed);
            let yt_avail = if matured { 0 } else { yt };
            let q = venues::redeem_quote(pt_use, yt_avail, matured);
            if q.base_out == 0 {
                break;
            }
            pt_free -= q.pt_burned;
            yt -= q.yt_burned;
            let from_held = q.pt_burned.min(position.pt_held.saturating_sub(held_burned));
            held_burned += from_held;
            collateral_burned += q.pt_burned - from_held;
            yt_burned += q.yt_burned;

            let r = q.base_out.min(debt);
            debt -= r;
            repaid += r;
            if repaid >= target {
                break;
            }

            let collateral_usd = looping::token_value_usd(collateral, pt_feed.price_usd_6dec)?;
            let debt_usd = looping::token_value_usd(debt, base_feed.price_usd_6dec)?;
            let withdrawable_usd =
                health::withdrawable_collateral_usd(collateral_usd, debt_usd, ltv_bps)?;
            let withdrawable_pt =
                collateral.min(looping::usd_to_token(withdrawable_usd, pt_feed.price_usd_6dec)?);
            if withdrawable_pt == 0 {
                break;
            }
            collateral -= withdrawable_pt;
            pt_free = pt_free
                .checked_add(withdrawable_pt)
                .ok_or(CoilError::MathOverflow)?;
        }
        require!(repaid > 0, CoilError::UnwindIncomplete);

        // Whatever was withdrawn but not redeemed is no longer posted
        let leftover_withdrawn =
            pt_free.saturating_sub(position.pt_held.saturating_sub(held_burned));

        let collateral_usd = looping::token_value_usd(collateral, pt_feed.price_usd_6dec)?;
        let debt_usd = looping::token_value_usd(debt, base_feed.price_usd_6dec)?;
        let health_bps = health::health_ratio_bps(collateral_usd, debt_usd)?;
        require!(
            health_bps >= ctx.accounts.position.min_health_bps,
            CoilError::HealthBelowMinimum
        );

        let position = &mut ctx.accounts.position;
        position.collateral_deposited = collateral;
        position.debt_outstanding = debt;
        position.pt_held = pt_free;
        position.yt_held = yt;
        position.last_rebalanced_at = now;

        let engine = &mut ctx.accounts.engine;
        engine.total_collateral_pt = engine
            .total_collateral_pt
            .saturating_sub(collateral_burned + leftover_withdrawn);
        engine.total_pt_held = engine
            .total_pt_held
            .saturating_sub(held_burned)
            .saturating_add(leftover_withdrawn);
        engine.total_yt_held = engine.total_yt_held.saturating_sub(yt_burned);
        engine.total_debt = engine.total_debt.saturating_sub(repaid);

        let market = &mut ctx.accounts.market;
        market.base_locked = market.base_locked.saturating_sub(repaid);

        let pool = &mut ctx.accounts.pool;
        pool.total_borrowed = pool.total_borrowed.saturating_sub(repaid);

        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        if collateral_burned > 0 {
            token::burn(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Burn {
                        mint: ctx.accounts.pt_mint.to_account_info(),
                        from: ctx.accounts.collateral_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                collateral_burned,
            )?;
        }
        if leftover_withdrawn > 0 {
            token::transfer(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Transfer {
                        from: ctx.accounts.collateral_vault.to_account_info(),
                        to: ctx.accounts.pt_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                leftover_withdrawn,
            )?;
        }
        if held_burned > 0 {
            token::burn(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Burn {
                        mint: ctx.accounts.pt_mint.to_account_info(),
                        from: ctx.accounts.pt_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                held_burned,
            )?;
        }
        if yt_burned > 0 {
            token::burn(
                CpiContext::new_with_signer(
                    ctx.accounts.token_program.key(),
                    Burn {
                        mint: ctx.accounts.yt_mint.to_account_info(),
                        from: ctx.accounts.yield_vault.to_account_info(),
                        authority: ctx.accounts.engine.to_account_info(),
                    },
                    &[seeds],
                ),
                yt_burned,
            )?;
        }
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.splitter_vault.to_account_info(),
                    to: ctx.accounts.lending_vault.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            repaid,
        )?;

        emit!(Rebalanced {
            owner: ctx.accounts.position.owner,
            leverage_increased: false,
            collateral_deposited: collateral,
            debt_outstanding: debt,
            health_bps,
        });
        msg!("Leverage decreased: repaid {}", repaid);
        Ok(())
    }

    /// Fault if the ledger totals drift from what the vaults actually hold.
    /// Anyone can run this.
    pub fn reconcile(ctx: Context<Reconcile>) -> Result<()> {
        let engine = &ctx.accounts.engine;
        require!(
            ctx.accounts.collateral_vault.amount == engine.total_collateral_pt
                && ctx.accounts.pt_vault.amount == engine.total_pt_held
                && ctx.accounts.yield_vault.amount == engine.total_yt_held,
            CoilError::LedgerDrift
        );
        require!(
            ctx.accounts.splitter_vault.amount
                >= ctx
                    .accounts
                    .market
                    .base_locked
                    .checked_add(ctx.accounts.market.fee_accrued)
                    .ok_or(CoilError::MathOverflow)?,
            CoilError::LedgerDrift
        );

        msg!("Ledger reconciles with vault balances");
        Ok(())
    }

    /// Admin-only escape hatch for surplus funds. Anything backing open
    /// positions or the splitting market's obligations stays put.
    pub fn emergency_withdraw(ctx: Context<EmergencyWithdraw>, amount: u64) -> Result<()> {
        require!(amount > 0, CoilError::InvalidAmount);
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.admin.key(),
            CoilError::Unauthorized
        );

        let engine = &ctx.accounts.engine;
        let vault_key = ctx.accounts.vault.key();
        let reserved = if vault_key == engine.collateral_vault {
            engine.total_collateral_pt
        } else if vault_key == engine.pt_vault {
            engine.total_pt_held
        } else if vault_key == engine.yield_vault {
            engine.total_yt_held
        } else if vault_key == engine.splitter_vault {
            ctx.accounts.market.base_locked
        } else if vault_key == engine.lending_vault {
            // LP money is never withdrawable this way
            return err!(CoilError::PositionBackingFunds);
        } else {
            return err!(CoilError::PositionBackingFunds);
        };

        let surplus = ctx.accounts.vault.amount.saturating_sub(reserved);
        require!(amount <= surplus, CoilError::PositionBackingFunds);

        if vault_key == engine.splitter_vault {
            let market = &mut ctx.accounts.market;
            market.fee_accrued = market.fee_accrued.saturating_sub(amount);
        }

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.vault.to_account_info(),
                    to: ctx.accounts.destination.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            amount,
        )?;

        emit!(EmergencyWithdrawal {
            vault: vault_key,
            amount,
            destination: ctx.accounts.destination.key(),
        });

        msg!("Emergency withdrawal of {} from {}", amount, vault_key);
        Ok(())
    }
}

// ========== INTERNAL HELPERS ==========

/// Release a finished position from the aggregate books. Shared by close and
/// both liquidation paths so no guarded entry point calls another.
#[allow(clippy::too_many_arguments)]
fn apply_book_release<'info>(
    engine: &mut Account<'info, EngineState>,
    market: &mut Account<'info, SplitterMarket>,
    pool: &mut Account<'info, LendingPool>,
    collateral_pt: u64,
    pt_held: u64,
    yt_held: u64,
    debt: u64,
    shortfall: u64,
    base_released: u64,
) -> Result<()> {
    engine.total_collateral_pt = engine.total_collateral_pt.saturating_sub(collateral_pt);
    engine.total_pt_held = engine.total_pt_held.saturating_sub(pt_held);
    engine.total_yt_held = engine.total_yt_held.saturating_sub(yt_held);
    engine.total_debt = engine.total_debt.saturating_sub(debt);

    market.base_locked = market.base_locked.saturating_sub(base_released);

    pool.total_borrowed = pool.total_borrowed.saturating_sub(debt);
    // Unrecovered debt is an LP loss
    pool.total_deposits = pool.total_deposits.saturating_sub(shortfall);
    Ok(())
}

/// Burn every claim a position held, collateral and free custody alike.
#[allow(clippy::too_many_arguments)]
fn burn_position_claims<'info>(
    token_program: &Program<'info, Token>,
    pt_mint: &Account<'info, Mint>,
    yt_mint: &Account<'info, Mint>,
    collateral_vault: &Account<'info, TokenAccount>,
    pt_vault: &Account<'info, TokenAccount>,
    yield_vault: &Account<'info, TokenAccount>,
    engine: &Account<'info, EngineState>,
    collateral_pt: u64,
    pt_held: u64,
    yt_held: u64,
) -> Result<()> {
    let engine_bump = engine.bump;
    let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];

    if collateral_pt > 0 {
        token::burn(
            CpiContext::new_with_signer(
                token_program.key(),
                Burn {
                    mint: pt_mint.to_account_info(),
                    from: collateral_vault.to_account_info(),
                    authority: engine.to_account_info(),
                },
                &[seeds],
            ),
            collateral_pt,
        )?;
    }
    if pt_held > 0 {
        token::burn(
            CpiContext::new_with_signer(
                token_program.key(),
                Burn {
                    mint: pt_mint.to_account_info(),
                    from: pt_vault.to_account_info(),
                    authority: engine.to_account_info(),
                },
                &[seeds],
            ),
            pt_held,
        )?;
    }
    if yt_held > 0 {
        token::burn(
            CpiContext::new_with_signer(
                token_program.key(),
                Burn {
                    mint: yt_mint.to_account_info(),
                    from: yield_vault.to_account_info(),
                    authority: engine.to_account_info(),
                },
                &[seeds],
            ),
            yt_held,
        )?;
    }
    Ok(())
}

// ========== ACCOUNTS ==========

#[derive(Accounts)]
pub struct InitializeEngine<'info> {
    #[account(
        init,
        payer = admin,
        space = 8 + EngineState::INIT_SPACE,
        seeds = [b"engine"],
        bump
    )]
    pub engine: Account<'info, EngineState>,
    #[account(
        init,
        payer = admin,
        space = 8 + SplitterMarket::INIT_SPACE,
        seeds = [b"splitter_market"],
        bump
    )]
    pub market: Account<'info, SplitterMarket>,
    #[account(
        init,
        payer = admin,
        space = 8 + LendingPool::INIT_SPACE,
        seeds = [b"lending_pool"],
        bump
    )]
    pub pool: Account<'info, LendingPool>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    pub base_mint: Account<'info, Mint>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct InitializeClaimMints<'info> {
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(
        init,
        payer = admin,
        mint::decimals = TOKEN_DECIMALS,
        mint::authority = engine,
        seeds = [b"pt_mint"],
        bump
    )]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = admin,
        mint::decimals = TOKEN_DECIMALS,
        mint::authority = engine,
        seeds = [b"yt_mint"],
        bump
    )]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = admin,
        mint::decimals = TOKEN_DECIMALS,
        mint::authority = engine,
        seeds = [b"lp_share_mint"],
        bump
    )]
    pub lp_share_mint: Box<Account<'info, Mint>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct InitializeEngineVaults<'info> {
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(address = engine.base_mint)]
    pub base_mint: Box<Account<'info, Mint>>,
    #[account(address = engine.pt_mint)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(address = engine.yt_mint)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(
        init,
        payer = admin,
        token::mint = base_mint,
        token::authority = engine,
        seeds = [b"splitter_vault"],
        bump
    )]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(
        init,
        payer = admin,
        token::mint = base_mint,
        token::authority = engine,
        seeds = [b"lending_vault"],
        bump
    )]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(
        init,
        payer = admin,
        token::mint = pt_mint,
        token::authority = engine,
        seeds = [b"collateral_vault"],
        bump
    )]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(
        init,
        payer = admin,
        token::mint = pt_mint,
        token::authority = engine,
        seeds = [b"pt_vault"],
        bump
    )]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(
        init,
        payer = admin,
        token::mint = yt_mint,
        token::authority = engine,
        seeds = [b"yield_vault"],
        bump
    )]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct SeedLiquidity<'info> {
    #[account(seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lp_share_mint"], bump)]
    pub lp_share_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub user_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub user_share_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub depositor: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct WithdrawLiquidity<'info> {
    #[account(seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lp_share_mint"], bump)]
    pub lp_share_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub user_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub user_share_account: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub withdrawer: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct InitializePosition<'info> {
    #[account(
        init,
        payer = owner,
        space = 8 + LoopPosition::INIT_SPACE,
        seeds = [b"loop_position", owner.key().as_ref()],
        bump
    )]
    pub position: Account<'info, LoopPosition>,
    #[account(mut)]
    pub owner: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct OpenPosition<'info> {
    #[account(
        mut,
        seeds = [b"loop_position", owner.key().as_ref()],
        bump = position.bump,
        has_one = owner
    )]
    pub position: Box<Account<'info, LoopPosition>>,
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Box<Account<'info, Protocol>>,
    /// Strategy config (owned by the core program - validated manually)
    pub strategy: Box<Account<'info, StrategyConfig>>,
    /// Registry entry whitelisting the splitting market
    pub market_entry: Box<Account<'info, VenueEntry>>,
    /// Registry entry whitelisting the claim mint source
    pub claim_entry: Box<Account<'info, VenueEntry>>,
    /// Price feeds (owned by the core program - validated manually)
    pub base_price_feed: Box<Account<'info, PriceFeed>>,
    pub pt_price_feed: Box<Account<'info, PriceFeed>>,
    #[account(mut)]
    pub user_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_vault"], bump)]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub owner: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct ClosePosition<'info> {
    #[account(
        mut,
        seeds = [b"loop_position", position.owner.as_ref()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, LoopPosition>>,
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Box<Account<'info, Protocol>>,
    /// Strategy config (owned by the core program - validated manually)
    pub strategy: Box<Account<'info, StrategyConfig>>,
    /// Registry entry whitelisting the swap route for claim sales
    pub router_entry: Box<Account<'info, VenueEntry>>,
    pub base_price_feed: Box<Account<'info, PriceFeed>>,
    pub pt_price_feed: Box<Account<'info, PriceFeed>>,
    pub yt_price_feed: Box<Account<'info, PriceFeed>>,
    /// Proceeds always go to the position owner, whoever closes
    #[account(mut, constraint = owner_base_account.owner == position.owner)]
    pub owner_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_vault"], bump)]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    pub caller: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Liquidate<'info> {
    #[account(
        mut,
        seeds = [b"loop_position", position.owner.as_ref()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, LoopPosition>>,
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Box<Account<'info, Protocol>>,
    /// Strategy config (owned by the core program - validated manually)
    pub strategy: Box<Account<'info, StrategyConfig>>,
    /// Registry entry whitelisting the swap route for claim sales
    pub router_entry: Box<Account<'info, VenueEntry>>,
    pub base_price_feed: Box<Account<'info, PriceFeed>>,
    pub pt_price_feed: Box<Account<'info, PriceFeed>>,
    pub yt_price_feed: Box<Account<'info, PriceFeed>>,
    #[account(mut, constraint = owner_base_account.owner == position.owner)]
    pub owner_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, constraint = cranker_base_account.owner == cranker.key())]
    pub cranker_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_vault"], bump)]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub cranker: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Rebalance<'info> {
    #[account(
        mut,
        seeds = [b"loop_position", owner.key().as_ref()],
        bump = position.bump,
        has_one = owner
    )]
    pub position: Box<Account<'info, LoopPosition>>,
    #[account(mut, seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    #[account(mut, seeds = [b"lending_pool"], bump = pool.bump)]
    pub pool: Box<Account<'info, LendingPool>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Box<Account<'info, Protocol>>,
    /// Strategy config (owned by the core program - validated manually)
    pub strategy: Box<Account<'info, StrategyConfig>>,
    pub base_price_feed: Box<Account<'info, PriceFeed>>,
    pub pt_price_feed: Box<Account<'info, PriceFeed>>,
    #[account(mut, seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_vault"], bump)]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub owner: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct Reconcile<'info> {
    #[account(seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    #[account(seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(seeds = [b"pt_vault"], bump)]
    pub pt_vault: Box<Account<'info, TokenAccount>>,
    #[account(seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
}

#[derive(Accounts)]
pub struct EmergencyWithdraw<'info> {
    #[account(seeds = [b"engine"], bump = engine.bump)]
    pub engine: Box<Account<'info, EngineState>>,
    #[account(mut, seeds = [b"splitter_market"], bump = market.bump)]
    pub market: Box<Account<'info, SplitterMarket>>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub vault: Box<Account<'info, TokenAccount>>,
    #[account(mut)]
    pub destination: Box<Account<'info, TokenAccount>>,
    pub admin: Signer<'info>,
    pub token_program: Program<'info, Token>,
}
