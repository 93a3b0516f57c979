use anchor_lang::prelude::*;

use crate::state::VenueKind;
use crate::venues::LendingVenueKind;

#[event]
pub struct ProtocolInitialized {
    pub admin: Pubkey,
    pub treasury: Pubkey,
}

#[event]
pub struct PauseToggled {
    pub paused: bool,
}

#[event]
pub struct StrategyConfigured {
    pub base_mint: Pubkey,
    pub pt_mint: Pubkey,
    pub yt_mint: Pubkey,
    pub splitting_market: Pubkey,
    pub lending_venue: LendingVenueKind,
    pub max_leverage_bps: u64,
    pub min_health_bps: u64,
    pub maturity_ts: i64,
}

#[event]
pub struct StrategyUpdated {
    pub max_leverage_bps: u64,
    pub min_health_bps: u64,
    pub slippage_decay_bps: u64,
    pub is_active: bool,
}

#[event]
pub struct RegistryUpdated {
    pub kind: VenueKind,
    pub address: Pubkey,
    pub is_active: bool,
}

#[event]
pub struct PriceUpdated {
    pub mint: Pubkey,
    pub price_usd_6dec: u64,
    pub timestamp: i64,
}

#[event]
pub struct EngineInitialized {
    pub base_mint: Pubkey,
    pub pt_mint: Pubkey,
    pub yt_mint: Pubkey,
}

#[event]
pub struct LiquiditySeeded {
    pub depositor: Pubkey,
    pub amount: u64,
    pub shares_minted: u64,
}

#[event]
pub struct LiquidityWithdrawn {
    pub withdrawer: Pubkey,
    pub shares_burned: u64,
    pub amount_received: u64,
}

#[event]
pub struct PositionOpened {
    pub owner: Pubkey,
    pub deposit: u64,
    pub loops_executed: u8,
    pub collateral_deposited: u64,
    pub debt_outstanding: u64,
    pub health_bps: u64,
}

#[event]
pub struct LoopExecuted {
    pub owner: Pubkey,
    pub loop_index: u8,
    pub split_in: u64,
    pub pt_out: u64,
    pub yt_out: u64,
    pub borrowed: u64,
}

#[event]
pub struct PositionClosed {
    pub owner: Pubkey,
    pub returned: u64,
    pub net_pnl: i64,
}

#[event]
pub struct PositionLiquidated {
    pub owner: Pubkey,
    pub health_at_liquidation_bps: u64,
    pub debt_recovered: u64,
    pub residual_returned: u64,
    pub cranker: Pubkey,
    pub cranker_reward: u64,
}

#[event]
pub struct Rebalanced {
    pub owner: Pubkey,
    pub leverage_increased: bool,
    pub collateral_deposited: u64,
    pub debt_outstanding: u64,
    pub health_bps: u64,
}

#[event]
pub struct EmergencyWithdrawal {
    pub vault: Pubkey,
    pub amount: u64,
    pub destination: Pubkey,
}

#[event]
pub struct FlashLoanInitiated {
    pub borrower: Pubkey,
    pub amount: u64,
    pub fee: u64,
}

#[event]
pub struct FlashLoanRepaid {
    pub borrower: Pubkey,
    pub amount: u64,
    pub fee: u64,
}

#[event]
pub struct AcceleratedOpened {
    pub owner: Pubkey,
    pub deposit: u64,
    pub flash_amount: u64,
    pub leverage_bps: u64,
    pub collateral_deposited: u64,
    pub debt_outstanding: u64,
    pub health_bps: u64,
}

#[event]
pub struct AcceleratedClosed {
    pub owner: Pubkey,
    pub returned: u64,
    pub net_pnl: i64,
}
