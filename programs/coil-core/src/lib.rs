use anchor_lang::prelude::*;

declare_id!("BLoEswM45xFCnkcdDEruqdiJ4BaW61ydSyBzz2CGZPuy");

pub mod constants;
pub mod errors;
pub mod events;
pub mod health;
pub mod looping;
pub mod state;
pub mod venues;

pub use constants::*;
pub use errors::*;
pub use events::*;
pub use state::*;
pub use venues::LendingVenueKind;

#[program]
pub mod coil_core {
    use super::*;

    /// Initialize the protocol state
    pub fn initialize_protocol(ctx: Context<InitializeProtocol>, treasury: Pubkey) -> Result<()> {
        let protocol = &mut ctx.accounts.protocol;
        protocol.admin = ctx.accounts.admin.key();
        protocol.treasury = treasury;
        protocol.insurance_fund = 0;
        protocol.paused = false;
        protocol.bump = ctx.bumps.protocol;

        emit!(ProtocolInitialized {
            admin: protocol.admin,
            treasury,
        });

        msg!("Protocol initialized with admin: {}", protocol.admin);
        Ok(())
    }

    /// Pause/unpause state-changing entry points (admin only)
    pub fn set_paused(ctx: Context<AdminOnly>, paused: bool) -> Result<()> {
        ctx.accounts.protocol.paused = paused;

        emit!(PauseToggled { paused });

        msg!("Protocol paused: {}", paused);
        Ok(())
    }

    /// Set the strategy. Every field must be populated before any position
    /// can open.
    pub fn configure_strategy(
        ctx: Context<ConfigureStrategy>,
        base_mint: Pubkey,
        pt_mint: Pubkey,
        yt_mint: Pubkey,
        splitting_market: Pubkey,
        lending_venue: LendingVenueKind,
        max_leverage_bps: u64,
        min_health_bps: u64,
        max_loops: u8,
        slippage_decay_bps: u64,
        maturity_ts: i64,
    ) -> Result<()> {
        require!(
            base_mint != Pubkey::default()
                && pt_mint != Pubkey::default()
                && yt_mint != Pubkey::default()
                && splitting_market != Pubkey::default(),
            CoilError::StrategyNotConfigured
        );
        require!(
            max_leverage_bps > BPS_DENOMINATOR && max_leverage_bps <= MAX_ACCEL_LEVERAGE_BPS,
            CoilError::InvalidLeverage
        );
        require!(
            min_health_bps >= BPS_DENOMINATOR,
            CoilError::HealthBelowMinimum
        );
        require!(
            max_loops >= MIN_LOOPS && max_loops <= MAX_LOOPS,
            CoilError::InvalidLoopCount
        );
        require!(maturity_ts > Clock::get()?.unix_timestamp, CoilError::MaturityPassed);

        let strategy = &mut ctx.accounts.strategy;
        strategy.base_mint = base_mint;
        strategy.pt_mint = pt_mint;
        strategy.yt_mint = yt_mint;
        strategy.splitting_market = splitting_market;
        strategy.lending_venue = lending_venue;
        strategy.max_leverage_bps = max_leverage_bps;
        strategy.min_health_bps = min_health_bps;
        strategy.max_loops = max_loops;
        strategy.slippage_decay_bps = slippage_decay_bps;
        strategy.maturity_ts = maturity_ts;
        strategy.is_active = true;
        strategy.bump = ctx.bumps.strategy;

        emit!(StrategyConfigured {
            base_mint,
            pt_mint,
            yt_mint,
            splitting_market,
            lending_venue,
            max_leverage_bps,
            min_health_bps,
            maturity_ts,
        });

        msg!("Strategy configured: {:?} venue", lending_venue);
        Ok(())
    }

    /// Adjust live risk parameters. Open positions keep their health
    /// guarantees: the floor can only move down for them, never up.
    pub fn update_strategy(
        ctx: Context<UpdateStrategy>,
        max_leverage_bps: u64,
        min_health_bps: u64,
        slippage_decay_bps: u64,
        is_active: bool,
    ) -> Result<()> {
        require!(
            max_leverage_bps > BPS_DENOMINATOR && max_leverage_bps <= MAX_ACCEL_LEVERAGE_BPS,
            CoilError::InvalidLeverage
        );
        require!(
            min_health_bps >= BPS_DENOMINATOR,
            CoilError::HealthBelowMinimum
        );

        let strategy = &mut ctx.accounts.strategy;
        // Raising the floor would retroactively strand positions opened
        // against the old one.
        require!(
            min_health_bps <= strategy.min_health_bps,
            CoilError::HealthBelowMinimum
        );
        strategy.max_leverage_bps = max_leverage_bps;
        strategy.min_health_bps = min_health_bps;
        strategy.slippage_decay_bps = slippage_decay_bps;
        strategy.is_active = is_active;

        emit!(StrategyUpdated {
            max_leverage_bps,
            min_health_bps,
            slippage_decay_bps,
            is_active,
        });

        msg!("Strategy updated, active: {}", is_active);
        Ok(())
    }

    /// Whitelist a collaborator address (admin only)
    pub fn register_venue(
        ctx: Context<RegisterVenue>,
        kind: VenueKind,
        address: Pubkey,
    ) -> Result<()> {
        require!(address != Pubkey::default(), CoilError::VenueNotWhitelisted);

        let entry = &mut ctx.accounts.venue_entry;
        entry.kind = kind;
        entry.address = address;
        entry.is_active = true;
        entry.bump = ctx.bumps.venue_entry;

        emit!(RegistryUpdated {
            kind,
            address,
            is_active: true,
        });

        msg!("Venue registered: {:?} {}", kind, address);
        Ok(())
    }

    /// Flip a registry entry without closing it (admin only)
    pub fn set_venue_status(ctx: Context<SetVenueStatus>, is_active: bool) -> Result<()> {
        let entry = &mut ctx.accounts.venue_entry;
        entry.is_active = is_active;

        emit!(RegistryUpdated {
            kind: entry.kind,
            address: entry.address,
            is_active,
        });

        msg!("Venue {} active: {}", entry.address, is_active);
        Ok(())
    }

    /// Create a price record for a mint (admin only)
    pub fn initialize_price_feed(
        ctx: Context<InitializePriceFeed>,
        initial_price_usd: u64,
    ) -> Result<()> {
        require!(initial_price_usd > 0, CoilError::InvalidAmount);

        let price_feed = &mut ctx.accounts.price_feed;
        price_feed.mint = ctx.accounts.mint.key();
        price_feed.price_usd_6dec = initial_price_usd;
        price_feed.last_update = Clock::get()?.unix_timestamp;
        price_feed.confidence = 0;
        price_feed.bump = ctx.bumps.price_feed;

        msg!(
            "Price feed initialized: {} = ${}",
            price_feed.mint,
            initial_price_usd as f64 / USD_MULTIPLIER as f64
        );
        Ok(())
    }

    /// Push a price (admin only)
    pub fn update_price(ctx: Context<UpdatePrice>, price_usd: u64) -> Result<()> {
        require!(price_usd > 0, CoilError::InvalidAmount);

        let price_feed = &mut ctx.accounts.price_feed;
        price_feed.price_usd_6dec = price_usd;
        price_feed.last_update = Clock::get()?.unix_timestamp;

        emit!(PriceUpdated {
            mint: price_feed.mint,
            price_usd_6dec: price_usd,
            timestamp: price_feed.last_update,
        });

        msg!("Price updated to ${}", price_usd as f64 / USD_MULTIPLIER as f64);
        Ok(())
    }
}

// ========== ACCOUNTS ==========

#[derive(Accounts)]
pub struct InitializeProtocol<'info> {
    #[account(
        init,
        payer = admin,
        space = 8 + Protocol::INIT_SPACE,
        seeds = [b"protocol"],
        bump
    )]
    pub protocol: Account<'info, Protocol>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct AdminOnly<'info> {
    #[account(mut, seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    pub admin: Signer<'info>,
}

#[derive(Accounts)]
pub struct ConfigureStrategy<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(
        init,
        payer = admin,
        space = 8 + StrategyConfig::INIT_SPACE,
        seeds = [b"strategy"],
        bump
    )]
    pub strategy: Account<'info, StrategyConfig>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct UpdateStrategy<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(mut, seeds = [b"strategy"], bump = strategy.bump)]
    pub strategy: Account<'info, StrategyConfig>,
    pub admin: Signer<'info>,
}

#[derive(Accounts)]
#[instruction(kind: VenueKind, address: Pubkey)]
pub struct RegisterVenue<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(
        init,
        payer = admin,
        space = 8 + VenueEntry::INIT_SPACE,
        seeds = [b"venue".as_ref(), &[kind as u8], address.as_ref()],
        bump
    )]
    pub venue_entry: Account<'info, VenueEntry>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct SetVenueStatus<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(
        mut,
        seeds = [b"venue", &[venue_entry.kind as u8], venue_entry.address.as_ref()],
        bump = venue_entry.bump
    )]
    pub venue_entry: Account<'info, VenueEntry>,
    pub admin: Signer<'info>,
}

#[derive(Accounts)]
pub struct InitializePriceFeed<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(
        init,
        payer = admin,
        space = 8 + PriceFeed::INIT_SPACE,
        seeds = [b"price", mint.key().as_ref()],
        bump
    )]
    pub price_feed: Account<'info, PriceFeed>,
    /// CHECK: Token mint for this price feed
    pub mint: UncheckedAccount<'info>,
    #[account(mut)]
    pub admin: Signer<'info>,
    pub system_program: Program<'info, System>,
}

#[derive(Accounts)]
pub struct UpdatePrice<'info> {
    #[account(seeds = [b"protocol"], bump = protocol.bump, has_one = admin)]
    pub protocol: Account<'info, Protocol>,
    #[account(
        mut,
        seeds = [b"price", price_feed.mint.as_ref()],
        bump = price_feed.bump
    )]
    pub price_feed: Account<'info, PriceFeed>,
    pub admin: Signer<'info>,
}
