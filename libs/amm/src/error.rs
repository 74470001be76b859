//! Exchange error taxonomy
//!
//! Every variant is a precondition failure: the operation that produced it is
//! aborted without touching reserves, liquidity balances or token ledgers.
//! The `Display` text of each variant is its static tag so callers can match
//! on it verbatim.

use thiserror::Error;

use crate::token::TokenError;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AmmError {
    // Deadline
    #[error("EXPIRED")]
    Expired,

    // Input validity
    #[error("INSUFFICIENT_TOKEN_QTY")]
    InsufficientTokenQty,

    #[error("INSUFFICIENT_QTY_DESIRED")]
    InsufficientQtyDesired,

    #[error("MINS_MUST_BE_GREATER_THAN_ZERO")]
    MinsMustBeGreaterThanZero,

    // Liquidity-curve sufficiency
    #[error("INSUFFICIENT_QUOTE_QTY")]
    InsufficientQuoteQty,

    #[error("INSUFFICIENT_BASE_QTY")]
    InsufficientBaseQty,

    #[error("INSUFFICIENT_QUOTE_TOKEN_QTY")]
    InsufficientQuoteTokenQty,

    #[error("INSUFFICIENT_BASE_TOKEN_QTY")]
    InsufficientBaseTokenQty,

    #[error("INSUFFICIENT_LIQUIDITY")]
    InsufficientLiquidity,

    #[error("INSUFFICIENT_OUTPUT_RESERVE")]
    InsufficientOutputReserve,

    // Decay
    #[error("NO_QUOTE_DECAY")]
    NoQuoteDecay,

    #[error("INSUFFICIENT_DECAY")]
    InsufficientDecay,

    // Arithmetic
    #[error("DIVISION_BY_ZERO")]
    DivisionByZero,

    #[error("OVERFLOW")]
    Overflow,

    // Construction
    #[error("INVALID_FEE_CONFIGURATION: {0}")]
    InvalidFeeConfiguration(String),

    // Collaborators
    #[error("TOKEN_TRANSFER_FAILED: {0}")]
    Token(#[from] TokenError),
}

impl AmmError {
    /// Static tag identifying the failure kind
    pub fn tag(&self) -> &'static str {
        match self {
            AmmError::Expired => "EXPIRED",
            AmmError::InsufficientTokenQty => "INSUFFICIENT_TOKEN_QTY",
            AmmError::InsufficientQtyDesired => "INSUFFICIENT_QTY_DESIRED",
            AmmError::MinsMustBeGreaterThanZero => "MINS_MUST_BE_GREATER_THAN_ZERO",
            AmmError::InsufficientQuoteQty => "INSUFFICIENT_QUOTE_QTY",
            AmmError::InsufficientBaseQty => "INSUFFICIENT_BASE_QTY",
            AmmError::InsufficientQuoteTokenQty => "INSUFFICIENT_QUOTE_TOKEN_QTY",
            AmmError::InsufficientBaseTokenQty => "INSUFFICIENT_BASE_TOKEN_QTY",
            AmmError::InsufficientLiquidity => "INSUFFICIENT_LIQUIDITY",
            AmmError::InsufficientOutputReserve => "INSUFFICIENT_OUTPUT_RESERVE",
            AmmError::NoQuoteDecay => "NO_QUOTE_DECAY",
            AmmError::InsufficientDecay => "INSUFFICIENT_DECAY",
            AmmError::DivisionByZero => "DIVISION_BY_ZERO",
            AmmError::Overflow => "OVERFLOW",
            AmmError::InvalidFeeConfiguration(_) => "INVALID_FEE_CONFIGURATION",
            AmmError::Token(_) => "TOKEN_TRANSFER_FAILED",
        }
    }
}

/// Result type for exchange operations
pub type Result<T> = std::result::Result<T, AmmError>;
