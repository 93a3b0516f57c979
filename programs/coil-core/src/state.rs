use anchor_lang::prelude::*;

use crate::constants::*;
use crate::errors::CoilError;
use crate::venues::LendingVenueKind;

/// Collaborator categories tracked by the venue registry
#[derive(AnchorSerialize, AnchorDeserialize, Clone, Copy, PartialEq, Eq, Debug, InitSpace)]
#[repr(u8)]
pub enum VenueKind {
    SplittingMarket = 0,
    SwapRouter = 1,
    ClaimSource = 2,
}

/// Protocol global state
#[account]
#[derive(InitSpace)]
pub struct Protocol {
    pub admin: Pubkey,
    pub treasury: Pubkey,
    pub insurance_fund: u64,
    pub paused: bool,
    pub bump: u8,
}

impl Protocol {
    pub fn ensure_not_paused(&self) -> Result<()> {
        require!(!self.paused, CoilError::ProtocolPaused);
        Ok(())
    }
}

/// Strategy configuration. Must be fully populated before any position opens.
#[account]
#[derive(InitSpace)]
pub struct StrategyConfig {
    pub base_mint: Pubkey,
    pub pt_mint: Pubkey,
    pub yt_mint: Pubkey,
    pub splitting_market: Pubkey,
    pub lending_venue: LendingVenueKind,
    pub max_leverage_bps: u64,
    pub min_health_bps: u64,
    pub max_loops: u8,
    pub slippage_decay_bps: u64,
    pub maturity_ts: i64,
    pub is_active: bool,
    pub bump: u8,
}

impl StrategyConfig {
    pub fn is_fully_configured(&self) -> bool {
        self.base_mint != Pubkey::default()
            && self.pt_mint != Pubkey::default()
            && self.yt_mint != Pubkey::default()
            && self.splitting_market != Pubkey::default()
            && self.min_health_bps > 0
            && self.maturity_ts > 0
    }

    pub fn is_matured(&self, now: i64) -> bool {
        now >= self.maturity_ts
    }

    /// Gate for position-opening paths: configured, active, not yet matured.
    pub fn ensure_open_ready(&self, now: i64) -> Result<()> {
        require!(self.is_fully_configured(), CoilError::StrategyNotConfigured);
        require!(self.is_active, CoilError::StrategyInactive);
        require!(!self.is_matured(now), CoilError::MaturityPassed);
        Ok(())
    }
}

/// Venue registry entry, one PDA per collaborator address
#[account]
#[derive(InitSpace)]
pub struct VenueEntry {
    pub kind: VenueKind,
    pub address: Pubkey,
    pub is_active: bool,
    pub bump: u8,
}

impl VenueEntry {
    pub fn ensure_approved(&self, kind: VenueKind, address: Pubkey) -> Result<()> {
        require!(
            self.kind == kind && self.address == address && self.is_active,
            CoilError::VenueNotWhitelisted
        );
        Ok(())
    }
}

/// Admin-fed price record, USD with 6 decimals, keyed by mint
#[account]
#[derive(InitSpace)]
pub struct PriceFeed {
    pub mint: Pubkey,
    pub price_usd_6dec: u64,
    pub last_update: i64,
    pub confidence: u64,
    pub bump: u8,
}

impl PriceFeed {
    pub fn is_stale(&self, now: i64) -> bool {
        now.saturating_sub(self.last_update) > PRICE_STALENESS_THRESHOLD
    }

    pub fn ensure_fresh(&self, now: i64) -> Result<()> {
        require!(!self.is_stale(now), CoilError::StalePriceFeed);
        Ok(())
    }

    /// USD value (6 decimals) of a 6-decimal token amount.
    pub fn value_of(&self, amount: u64) -> Result<u64> {
        let value = (amount as u128)
            .checked_mul(self.price_usd_6dec as u128)
            .ok_or(CoilError::MathOverflow)?
            .checked_div(TOKEN_UNIT as u128)
            .ok_or(CoilError::MathOverflow)?;
        Ok(value as u64)
    }

    /// Token amount (6 decimals) corresponding to a USD value.
    pub fn amount_for_value(&self, value_usd: u64) -> Result<u64> {
        require!(self.price_usd_6dec > 0, CoilError::StalePriceFeed);
        let amount = (value_usd as u128)
            .checked_mul(TOKEN_UNIT as u128)
            .ok_or(CoilError::MathOverflow)?
            .checked_div(self.price_usd_6dec as u128)
            .ok_or(CoilError::MathOverflow)?;
        Ok(amount as u64)
    }
}
