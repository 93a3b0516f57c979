use anchor_lang::prelude::*;
use anchor_spl::token::{self, Mint, Token, TokenAccount, Transfer};

use coil_core::{constants::*, errors::CoilError, events::*, looping, state::Protocol};

declare_id!("9Pnix1wyvCNneBnNFCpnHt5jz8ysS7KgxYCHEbg1GKqy");

// ========== LOCAL STATE (owned by this program) ==========

/// Liquidity backing flash loans of the base asset
#[account]
#[derive(InitSpace)]
pub struct FlashPool {
    pub base_mint: Pubkey,
    pub total_deposits: u64,
    pub fees_earned: u64,
    pub bump: u8,
}

/// Tracks one outstanding loan inside a transaction
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

#[program]
pub mod coil_flash {
    use super::*;

    /// Create the flash pool and its vault (admin only)
    pub fn initialize_flash_pool(ctx: Context<InitializeFlashPool>) -> Result<()> {
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.admin.key(),
            CoilError::Unauthorized
        );

        let pool = &mut ctx.accounts.flash_pool;
        pool.base_mint = ctx.accounts.base_mint.key();
        pool.total_deposits = 0;
        pool.fees_earned = 0;
        pool.bump = ctx.bumps.flash_pool;

        msg!("Flash pool created for {}", pool.base_mint);
        Ok(())
    }

    /// Add lendable base to the pool (admin only)
    pub fn fund_flash_pool(ctx: Context<FundFlashPool>, amount: u64) -> Result<()> {
        require!(amount > 0, CoilError::InvalidAmount);
        require!(
            ctx.accounts.protocol.admin == ctx.accounts.funder.key(),
            CoilError::Unauthorized
        );

        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.funder_token_account.to_account_info(),
                    to: ctx.accounts.vault.to_account_info(),
                    authority: ctx.accounts.funder.to_account_info(),
                },
            ),
            amount,
        )?;

        let pool = &mut ctx.accounts.flash_pool;
        pool.total_deposits = pool
            .total_deposits
            .checked_add(amount)
            .ok_or(CoilError::MathOverflow)?;

        msg!("Flash pool funded with {}", amount);
        Ok(())
    }

    /// Initiate a flash loan. Must be repaid in the same transaction.
    pub fn flash_borrow(ctx: Context<FlashBorrow>, amount: u64, slot: u64) -> Result<()> {
        require!(amount > 0, CoilError::InvalidAmount);

        // Slot must match the current slot to prevent replay across blocks
        let current_slot = Clock::get()?.slot;
        require!(slot == current_slot, CoilError::InvalidSlot);
        require!(
            ctx.accounts.vault.amount >= amount,
            CoilError::InsufficientLiquidity
        );

        let fee = looping::flash_fee_for(amount);

        let flash_state = &mut ctx.accounts.flash_state;
        flash_state.borrower = ctx.accounts.borrower.key();
        flash_state.amount = amount;
        flash_state.fee = fee;
        flash_state.initiated_slot = current_slot;
        flash_state.repaid = false;
        flash_state.bump = ctx.bumps.flash_state;

        let pool_bump = ctx.accounts.flash_pool.bump;
        let seeds: &[&[u8]] = &[b"flash_pool", &[pool_bump]];
        token::transfer(
            CpiContext::new_with_signer(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.vault.to_account_info(),
                    to: ctx.accounts.borrower_token_account.to_account_info(),
                    authority: ctx.accounts.flash_pool.to_account_info(),
                },
                &[seeds],
            ),
            amount,
        )?;

        emit!(FlashLoanInitiated {
            borrower: flash_state.borrower,
            amount,
            fee,
        });

        msg!("Flash loan initiated: {} base, fee {}", amount, fee);
        Ok(())
    }

    /// Repay principal plus fee. Must run in the borrow's transaction.
    pub fn flash_repay(ctx: Context<FlashRepay>) -> Result<()> {
        let flash_state = &ctx.accounts.flash_state;

        let current_slot = Clock::get()?.slot;
        require!(
            flash_state.initiated_slot == current_slot,
            CoilError::FlashLoanNotRepaid
        );
        require!(!flash_state.repaid, CoilError::FlashLoanNotRepaid);

        let total_repayment = flash_state
            .amount
            .checked_add(flash_state.fee)
            .ok_or(CoilError::MathOverflow)?;

        token::transfer(
            CpiContext::new(
                ctx.accounts.token_program.key(),
                Transfer {
                    from: ctx.accounts.borrower_token_account.to_account_info(),
                    to: ctx.accounts.vault.to_account_info(),
                    authority: ctx.accounts.borrower.to_account_info(),
                },
            ),
            total_repayment,
        )?;

        let flash_state = &mut ctx.accounts.flash_state;
        flash_state.repaid = true;

        // Fee splits between the pool and the protocol insurance fund
        let insurance_fee = flash_state
            .fee
            .checked_mul(INSURANCE_FEE_BPS)
            .ok_or(CoilError::MathOverflow)?
            .checked_div(BPS_DENOMINATOR)
            .ok_or(CoilError::MathOverflow)?;
        let pool_fee = flash_state.fee.saturating_sub(insurance_fee);

        let pool = &mut ctx.accounts.flash_pool;
        pool.total_deposits = pool
            .total_deposits
            .checked_add(pool_fee)
            .ok_or(CoilError::MathOverflow)?;
        pool.fees_earned = pool
            .fees_earned
            .checked_add(pool_fee)
            .ok_or(CoilError::MathOverflow)?;

        let protocol = &mut ctx.accounts.protocol;
        protocol.insurance_fund = protocol
            .insurance_fund
            .checked_add(insurance_fee)
            .ok_or(CoilError::MathOverflow)?;

        emit!(FlashLoanRepaid {
            borrower: flash_state.borrower,
            amount: flash_state.amount,
            fee: flash_state.fee,
        });

        msg!(
            "Flash loan repaid: {} + {} fee",
            flash_state.amount,
            flash_state.fee
        );
        Ok(())
    }

    /// Reclaim the state account's rent once the loan settled
    pub fn close_flash_state(ctx: Context<CloseFlashState>) -> Result<()> {
        require!(
            ctx.accounts.flash_state.repaid,
            CoilError::FlashLoanNotRepaid
        );

        msg!("Flash loan state closed");
        Ok(())
    }
}

// ========== ACCOUNTS ==========

#[derive(Accounts)]
pub struct InitializeFlashPool<'info> {
    #[account(
        init,
        payer = admin,
        space = 8 + FlashPool::INIT_SPACE,
        seeds = [b"flash_pool"],
        bump
    )]
    pub flash_pool: Account<'info, FlashPool>,
    #[account(
        init,
        payer = admin,
        token::mint = base_mint,
        token::authority = flash_pool,
        seeds = [b"flash_vault"],
        bump
    )]
    pub vault: Account<'info, TokenAccount>,
    pub base_mint: Account<'info, Mint>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct FundFlashPool<'info> {
    #[account(mut, seeds = [b"flash_pool"], bump = flash_pool.bump)]
    pub flash_pool: Account<'info, FlashPool>,
    #[account(mut, seeds = [b"flash_vault"], bump)]
    pub vault: Account<'info, TokenAccount>,
    /// Protocol state (owned by the core program - validated manually)
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub funder_token_account: Account<'info, TokenAccount>,
    #[account(mut)]
    pub funder: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
#[instruction(amount: u64, slot: u64)]
pub struct FlashBorrow<'info> {
    #[account(
        init,
        payer = borrower,
        space = 8 + FlashLoanState::INIT_SPACE,
        seeds = [b"flash", borrower.key().as_ref(), &slot.to_le_bytes()],
        bump
    )]
    pub flash_state: Account<'info, FlashLoanState>,
    #[account(mut, seeds = [b"flash_pool"], bump = flash_pool.bump)]
    pub flash_pool: Account<'info, FlashPool>,
    #[account(mut, seeds = [b"flash_vault"], bump)]
    pub vault: Account<'info, TokenAccount>,
    #[account(mut)]
    pub borrower_token_account: Account<'info, TokenAccount>,
    #[account(mut)]
    pub borrower: Signer<'info>,
    pub token_program: Program<'info, Token>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct FlashRepay<'info> {
    #[account(
        mut,
        seeds = [b"flash", borrower.key().as_ref(), &flash_state.initiated_slot.to_le_bytes()],
        bump = flash_state.bump,
        has_one = borrower
    )]
    pub flash_state: Account<'info, FlashLoanState>,
    #[account(mut, seeds = [b"flash_pool"], bump = flash_pool.bump)]
    pub flash_pool: Account<'info, FlashPool>,
    #[account(mut, seeds = [b"flash_vault"], bump)]
    pub vault: Account<'info, TokenAccount>,
    /// Protocol state (owned by the core program - validated manually)
    #[account(mut)]
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub borrower_token_account: Account<'info, TokenAccount>,
    #[account(mut)]
    pub borrower: Signer<'info>,
    pub token_program: Program<'info, Token>,
}

#[derive(Accounts)]
pub struct CloseFlashState<'info> {
    #[account(
        mut,
        close = borrower,
        seeds = [b"flash", borrower.key().as_ref(), &flash_state.initiated_slot.to_le_bytes()],
        bump = flash_state.bump,
        has_one = borrower
    )]
    pub flash_state: Account<'info, FlashLoanState>,
    #[account(mut)]
    pub borrower: Signer<'info>,
}
