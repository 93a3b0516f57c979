/// Basis points denominator (100% = 10000)
pub const BPS_DENOMINATOR: u64 = 10_000;

/// USD decimals (6)
pub const USD_DECIMALS: u8 = 6;
pub const USD_MULTIPLIER: u64 = 1_000_000;

/// Base asset, PT and YT all use 6 decimals
pub const TOKEN_DECIMALS: u8 = 6;
pub const TOKEN_UNIT: u64 = 1_000_000;

/// Loop count bounds per position
pub const MIN_LOOPS: u8 = 1;
pub const MAX_LOOPS: u8 = 10;

/// Per-loop borrow target bounds (bps of posted collateral value)
pub const MIN_TARGET_BORROW_BPS: u16 = 1_000; // 10%
pub const MAX_TARGET_BORROW_BPS: u16 = 9_000; // 90%

/// Default minimum health ratio (collateral value / debt value, bps)
pub const DEFAULT_MIN_HEALTH_BPS: u64 = 11_000; // 1.10

/// Health ratio reported for debt-free positions
pub const HEALTH_INFINITE_BPS: u64 = u64::MAX;

/// Default per-loop decay applied to the split slippage floor (bps)
pub const DEFAULT_SLIPPAGE_DECAY_BPS: u64 = 500; // floor loosens 5% per loop

/// Default split fee taken by the splitting market (bps)
pub const DEFAULT_SPLIT_FEE_BPS: u64 = 10; // 0.1%

/// Default fee on claim sales through the swap venue (bps)
pub const DEFAULT_SWAP_FEE_BPS: u64 = 30; // 0.3%

/// Flash loan fee (basis points)
pub const FLASH_LOAN_FEE_BPS: u64 = 5; // 0.05%

/// Minimum flash loan fee (absolute)
pub const MIN_FLASH_LOAN_FEE: u64 = 1;

/// Insurance fund share of flash fees (basis points)
pub const INSURANCE_FEE_BPS: u64 = 500; // 5%

/// Reward paid to the liquidation cranker (bps of recovered value)
pub const LIQUIDATION_REWARD_BPS: u64 = 50; // 0.5%

/// Price feed staleness threshold (seconds)
pub const PRICE_STALENESS_THRESHOLD: i64 = 300; // 5 minutes

/// Minimum time between rebalances of one position (seconds)
pub const REBALANCE_COOLDOWN: i64 = 3_600; // 1 hour

/// Bound on redeem/repay rounds during an unwind
pub const MAX_UNWIND_ROUNDS: u8 = 16;

/// Accelerated-path leverage bounds (bps, 10000 = 1x)
pub const MIN_ACCEL_LEVERAGE_BPS: u64 = 11_000; // 1.1x
pub const MAX_ACCEL_LEVERAGE_BPS: u64 = 50_000; // 5x
