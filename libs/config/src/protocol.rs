//! Protocol constants
//!
//! Fixed scales used by the fixed-point kernel and the fee schedule that a
//! freshly configured exchange starts with.

/// Denominator for every fee expressed in basis points (10_000 = 100%)
pub const BASIS_POINTS: u128 = 10_000;

/// Fixed-point scale for ratios (18 decimal places)
pub const WAD: u128 = 1_000_000_000_000_000_000;

/// Fee defaults applied when settings omit them
pub mod fees {
    /// Total liquidity fee charged on swap input (30 = 0.30%)
    pub const DEFAULT_LIQUIDITY_FEE_BPS: u32 = 30;

    /// Slice of the liquidity fee owed to the protocol recipient (5 = 0.05%)
    pub const DEFAULT_PROTOCOL_FEE_BPS: u32 = 5;
}

/// Length in bytes of an account address
pub const ADDRESS_LEN: usize = 20;

/// Prefix for environment variable overrides
pub const ENV_PREFIX: &str = "ELASTIC";
