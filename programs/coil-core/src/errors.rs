use anchor_lang::prelude::*;

#[error_code]
pub enum CoilError {
    #[msg("Invalid amount")]
    InvalidAmount,

    #[msg("Loop count out of range")]
    InvalidLoopCount,

    #[msg("Leverage target out of range")]
    InvalidLeverage,

    #[msg("Borrow target out of range")]
    InvalidBorrowTarget,

    #[msg("Math overflow")]
    MathOverflow,

    #[msg("Split output below the slippage floor")]
    SplitBelowFloor,

    #[msg("Swap output below the requested minimum")]
    SlippageExceeded,

    #[msg("Insufficient liquidity in the lending pool")]
    InsufficientLiquidity,

    #[msg("Borrow would exceed the venue's maximum LTV")]
    ExceedsVenueLtv,

    #[msg("Health ratio below the configured minimum")]
    HealthBelowMinimum,

    #[msg("Position is still healthy")]
    PositionStillHealthy,

    #[msg("Caller already has an active position")]
    PositionAlreadyActive,

    #[msg("Position not found or inactive")]
    PositionNotFound,

    #[msg("Strategy is not fully configured")]
    StrategyNotConfigured,

    #[msg("Strategy is not active")]
    StrategyInactive,

    #[msg("Venue is not whitelisted")]
    VenueNotWhitelisted,

    #[msg("Claim maturity has passed")]
    MaturityPassed,

    #[msg("Price feed is stale")]
    StalePriceFeed,

    #[msg("Unauthorized")]
    Unauthorized,

    #[msg("Protocol is paused")]
    ProtocolPaused,

    #[msg("Rebalance called before cooldown elapsed")]
    RebalanceCooldown,

    #[msg("Unwind did not retire the debt within the round bound")]
    UnwindIncomplete,

    #[msg("Flash loan not repaid")]
    FlashLoanNotRepaid,

    #[msg("Borrow cannot cover the flash repayment")]
    FlashRepaymentShortfall,

    #[msg("Flash loan slot mismatch")]
    InvalidSlot,

    #[msg("No shares in the lending pool")]
    NoPoolShares,

    #[msg("Funds are backing open positions")]
    PositionBackingFunds,

    #[msg("Ledger totals do not reconcile with vault balances")]
    LedgerDrift,
}
