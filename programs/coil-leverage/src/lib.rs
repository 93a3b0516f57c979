use anchor_lang::prelude::*;
use anchor_spl::token::{self, Burn, Mint, MintTo, Token, TokenAccount, Transfer};

use coil_core::{
    constants::*,
    errors::CoilError,
    events::*,
    looping,
    looping::{AccelCloseParams, AccelOpenParams},
    state::{PriceFeed, Protocol, StrategyConfig, VenueEntry, VenueKind},
};

declare_id!("4em5cvWiktaefghrPw7i762bKyU6xCLXv8Vgc1yPPqwA");

// ========== LOCAL STRUCTS (for cross-program account validation) ==========

/// Flash loan state (owned by the flash program)
#[account]
#[derive(InitSpace)]
pub struct FlashLoanState {
    pub borrower: Pubkey,
    pub amount: u64,
    pub fee: u64,
    pub initiated_slot: u64,
    pub repaid: bool,
    pub bump: u8,
}

/// Engine custody record (owned by the looper program)
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

/// Splitting market book (owned by the looper program)
#[account]
#[derive(InitSpace)]
pub struct SplitterMarket {
    pub fee_bps: u64,
    pub base_locked: u64,
    pub fee_accrued: u64,
    pub bump: u8,
}

/// Lending pool book (owned by the looper program)
#[account]
#[derive(InitSpace)]
pub struct LendingPool {
    pub total_deposits: u64,
    pub total_shares: u64,
    pub total_borrowed: u64,
    pub interest_earned: u64,
    pub bump: u8,
}

// ========== PROGRAM STATE ==========

/// A position built in a single flash-settled pass
#[account]
#[derive(InitSpace)]
pub struct AcceleratedPosition {
    pub owner: Pubkey,
    pub initial_deposit: u64,
    pub flash_borrowed: u64,
    pub collateral_pt: u64,
    pub yt_held: u64,
    pub debt: u64,
    pub entry_leverage_bps: u64,
    pub opened_at: i64,
    pub is_active: bool,
    pub bump: u8,
}

#[program]
pub mod coil_leverage {
    use super::*;

    /// Open the whole target exposure in one pass behind a flash loan.
    ///
    /// The caller composes `flash_borrow`, this instruction and
    /// `flash_repay` in one transaction: the deposit plus the flash proceeds
    /// split together, the PT posts as collateral, and the borrow is sized
    /// to settle the flash principal and fee exactly. Any shortfall fails
    /// here, which fails the flash loan with it.
    pub fn open_accelerated(
        ctx: Context<OpenAccelerated>,
        deposit_amount: u64,
        target_leverage_bps: u64,
        max_slippage_bps: u64,
    ) -> Result<()> {
        let now = Clock::get()?.unix_timestamp;
        let strategy = &ctx.accounts.strategy;

        ctx.accounts.protocol.ensure_not_paused()?;
        strategy.ensure_open_ready(now)?;
        require!(
            target_leverage_bps <= strategy.max_leverage_bps,
            CoilError::InvalidLeverage
        );
        ctx.accounts.market_entry.ensure_approved(
            VenueKind::SplittingMarket,
            strategy.splitting_market,
        )?;

        let base_feed = &ctx.accounts.base_price_feed;
        let pt_feed = &ctx.accounts.pt_price_feed;
        require!(
            base_feed.mint == strategy.base_mint && pt_feed.mint == strategy.pt_mint,
            CoilError::StalePriceFeed
        );
        base_feed.ensure_fresh(now)?;
        pt_feed.ensure_fresh(now)?;

        let plan = looping::plan_accelerated_open(&AccelOpenParams {
            deposit: deposit_amount,
            target_leverage_bps,
            max_slippage_bps,
            split_fee_bps: ctx.accounts.market.fee_bps,
            venue: strategy.lending_venue,
            pt_price_6dec: pt_feed.price_usd_6dec,
            base_price_6dec: base_feed.price_usd_6dec,
            min_health_bps: strategy.min_health_bps,
            available_liquidity: ctx.accounts.lending_vault.amount,
        })?;

        // The flash loan must have been drawn for exactly the planned size
        let flash_state = &ctx.accounts.flash_state;
        require!(
            flash_state.borrower == ctx.accounts.owner.key() && !flash_state.repaid,
            CoilError::FlashLoanNotRepaid
        );
        require!(
            flash_state.initiated_slot == Clock::get()?.slot,
            CoilError::InvalidSlot
        );
        require!(
            flash_state.amount == plan.flash_amount && flash_state.fee == plan.flash_fee,
            CoilError::FlashRepaymentShortfall
        );

        // Effects before interactions
        let position = &mut ctx.accounts.position;
        position.owner = ctx.accounts.owner.key();
        position.initial_deposit = deposit_amount;
        position.flash_borrowed = plan.flash_amount;
        position.collateral_pt = plan.collateral_pt;
        position.yt_held = plan.yt_held;
        position.debt = plan.debt;
        position.entry_leverage_bps = target_leverage_bps;
        position.opened_at = now;
        position.is_active = true;
        position.bump = ctx.bumps.position;

        let engine = &mut ctx.accounts.engine;
        engine.total_collateral_pt = engine
            .total_collateral_pt
            .checked_add(plan.collateral_pt)
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
            .checked_add(plan.collateral_pt)
            .ok_or(CoilError::MathOverflow)?;
        market.fee_accrued = market
            .fee_accrued
            .checked_add(plan.split_fee)
            .ok_or(CoilError::MathOverflow)?;

        let pool = &mut ctx.accounts.pool;
        pool.total_borrowed = pool
            .total_borrowed
            .checked_add(plan.debt)
            .ok_or(CoilError::MathOverflow)?;
        pool.interest_earned = pool
            .interest_earned
            .checked_add(plan.debt.saturating_sub(plan.borrow_net))
            .ok_or(CoilError::MathOverflow)?;

        // Deposit plus flash proceeds into the splitting market
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.user_base_account.to_account_info(),
                    to: ctx.accounts.splitter_vault.to_account_info(),
                    authority: ctx.accounts.owner.to_account_info(),
                },
            ),
            plan.total_in,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
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

        // Borrow proceeds land with the caller so flash_repay can settle
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
            plan.borrow_net,
        )?;

        emit!(AcceleratedOpened {
            owner: ctx.accounts.position.owner,
            deposit: deposit_amount,
            flash_amount: plan.flash_amount,
            leverage_bps: target_leverage_bps,
            collateral_deposited: plan.collateral_pt,
            debt_outstanding: plan.debt,
            health_bps: plan.health_bps,
        });

        msg!(
            "Accelerated open at {}x: {} PT, {} debt",
            target_leverage_bps as f64 / BPS_DENOMINATOR as f64,
            plan.collateral_pt,
            plan.debt
        );
        Ok(())
    }

    /// Unwind in one pass: flash funds retire the debt first (collateral
    /// cannot leave while it is owed against), then the freed claims redeem
    /// or sell, and the proceeds settle the flash loan.
    pub fn close_accelerated(ctx: Context<CloseAccelerated>) -> Result<()> {
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
        let plan = looping::plan_accelerated_close(&AccelCloseParams {
            collateral_pt: position.collateral_pt,
            yt_held: position.yt_held,
            debt: position.debt,
            matured,
            pt_price_6dec: pt_feed.price_usd_6dec,
            yt_price_6dec: yt_feed.price_usd_6dec,
            base_price_6dec: base_feed.price_usd_6dec,
            swap_fee_bps: DEFAULT_SWAP_FEE_BPS,
        })?;
        if plan.pt_sold > 0 || plan.yt_sold > 0 {
            ctx.accounts
                .router_entry
                .ensure_approved(VenueKind::SwapRouter, ctx.accounts.engine.key())?;
        }

        // The flash loan must cover the debt being retired
        let flash_state = &ctx.accounts.flash_state;
        require!(
            flash_state.borrower == position.owner && !flash_state.repaid,
            CoilError::FlashLoanNotRepaid
        );
        require!(
            flash_state.initiated_slot == Clock::get()?.slot,
            CoilError::InvalidSlot
        );
        require!(
            flash_state.amount == plan.required_flash,
            CoilError::FlashRepaymentShortfall
        );

        let pre_collateral = position.collateral_pt;
        let pre_yt_held = position.yt_held;
        let pre_debt = position.debt;
        let initial_deposit = position.initial_deposit;
        let owner = position.owner;

        // Pre-image cleared before any token movement
        let position = &mut ctx.accounts.position;
        position.collateral_pt = 0;
        position.yt_held = 0;
        position.debt = 0;
        position.is_active = false;

        let engine = &mut ctx.accounts.engine;
        engine.total_collateral_pt = engine.total_collateral_pt.saturating_sub(pre_collateral);
        engine.total_yt_held = engine.total_yt_held.saturating_sub(pre_yt_held);
        engine.total_debt = engine.total_debt.saturating_sub(pre_debt);

        let market = &mut ctx.accounts.market;
        market.base_locked = market.base_locked.saturating_sub(plan.recovered);

        let pool = &mut ctx.accounts.pool;
        pool.total_borrowed = pool.total_borrowed.saturating_sub(pre_debt);

        // Flash proceeds retire the debt
        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.user_base_account.to_account_info(),
                    to: ctx.accounts.lending_vault.to_account_info(),
                    authority: ctx.accounts.caller.to_account_info(),
                },
            ),
            pre_debt,
        )?;

        let engine_bump = ctx.accounts.engine.bump;
        let seeds: &[&[u8]] = &[b"engine", &[engine_bump]];
        if pre_collateral > 0 {
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
                pre_collateral,
            )?;
        }
        if pre_yt_held > 0 {
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
                pre_yt_held,
            )?;
        }

        // Redemption proceeds go back to the caller, who settles the flash
        // loan out of them and keeps the remainder
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.splitter_vault.to_account_info(),
                    to: ctx.accounts.user_base_account.to_account_info(),
                    authority: ctx.accounts.engine.to_account_info(),
                },
                &[seeds],
            ),
            plan.recovered,
        )?;

        let net_pnl = looping::net_pnl(plan.returned, initial_deposit);
        emit!(AcceleratedClosed {
            owner,
            returned: plan.returned,
            net_pnl,
        });

        msg!(
            "Accelerated close: recovered {}, returned {} after flash",
            plan.recovered,
            plan.returned
        );
        Ok(())
    }
}

// ========== ACCOUNTS ==========

#[derive(Accounts)]
pub struct OpenAccelerated<'info> {
    #[account(
        init,
        payer = owner,
        space = 8 + AcceleratedPosition::INIT_SPACE,
        seeds = [b"accel_position", owner.key().as_ref()],
        bump
    )]
    pub position: Box<Account<'info, AcceleratedPosition>>,
    /// Flash loan state (owned by the flash program - validated manually)
    pub flash_state: Box<Account<'info, FlashLoanState>>,
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
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub owner: Signer<'info>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct CloseAccelerated<'info> {
    #[account(
        mut,
        close = caller,
        seeds = [b"accel_position", position.owner.as_ref()],
        bump = position.bump
    )]
    pub position: Box<Account<'info, AcceleratedPosition>>,
    /// Flash loan state (owned by the flash program - validated manually)
    pub flash_state: Box<Account<'info, FlashLoanState>>,
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
    #[account(mut)]
    pub user_base_account: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"splitter_vault"], bump)]
    pub splitter_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"lending_vault"], bump)]
    pub lending_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"collateral_vault"], bump)]
    pub collateral_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"yield_vault"], bump)]
    pub yield_vault: Box<Account<'info, TokenAccount>>,
    #[account(mut, seeds = [b"pt_mint"], bump)]
    pub pt_mint: Box<Account<'info, Mint>>,
    #[account(mut, seeds = [b"yt_mint"], bump)]
    pub yt_mint: Box<Account<'info, Mint>>,
    #[account(mut)]
    pub caller: Signer<'info>,
    pub token_program: Program<'info, Token>,
}
