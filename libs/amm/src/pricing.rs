//! Pricing engine
//!
//! Fee-adjusted constant-product pricing over the internal reserve ledger.
//! `k` is never cached: every quote reads the reserves it is handed, so a
//! rebase between two calls cannot move the curve.

use serde::{Deserialize, Serialize};

use crate::error::{AmmError, Result};
use crate::math::{self, BASIS_POINTS};
use crate::reserves::ReserveState;

/// Output of a swap against a reserve snapshot, nothing committed yet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapQuote {
    pub input_qty: u128,
    pub output_qty: u128,
    /// Reserves after the swap is applied
    pub reserves_after: ReserveState,
}

/// Exact-input constant-product output after the liquidity fee.
///
/// ```text
///                      in·(10000 − fee) · R_out
/// out = ⌊ ───────────────────────────────────────── ⌋
///          R_in · 10000 + in·(10000 − fee)
/// ```
///
/// which is `R_out − R_in·R_out / (R_in + in·(1 − fee))` floored in the
/// pool's favour.
pub fn calculate_qty_to_return_after_fees(
    input_qty: u128,
    input_reserve: u128,
    output_reserve: u128,
    fee_basis_points: u128,
) -> Result<u128> {
    if output_reserve == 0 {
        return Err(AmmError::InsufficientOutputReserve);
    }
    let fee_complement = math::checked_sub(BASIS_POINTS, fee_basis_points)?;
    let input_less_fee = input_qty
        .checked_mul(fee_complement)
        .ok_or(AmmError::Overflow)?;
    let denominator = input_reserve
        .checked_mul(BASIS_POINTS)
        .and_then(|scaled| scaled.checked_add(input_less_fee))
        .ok_or(AmmError::Overflow)?;
    if denominator == 0 {
        return Err(AmmError::InsufficientOutputReserve);
    }

    let output_qty = math::mul_div(input_less_fee, output_reserve, denominator)?;
    if output_qty >= output_reserve {
        return Err(AmmError::InsufficientOutputReserve);
    }
    Ok(output_qty)
}

/// Proportional scaling: ⌊basis_qty · other_reserve / basis_reserve⌋
pub fn calculate_qty(basis_qty: u128, basis_reserve: u128, other_reserve: u128) -> Result<u128> {
    if basis_qty == 0 {
        return Err(AmmError::InsufficientTokenQty);
    }
    if basis_reserve == 0 || other_reserve == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    math::mul_div(basis_qty, other_reserve, basis_reserve)
}

/// Base in, quote out
pub fn quote_base_token_for_quote_token(
    reserves: &ReserveState,
    base_qty_in: u128,
    fee_basis_points: u128,
) -> Result<SwapQuote> {
    let quote_qty_out = calculate_qty_to_return_after_fees(
        base_qty_in,
        reserves.base_reserve_qty,
        reserves.quote_reserve_qty,
        fee_basis_points,
    )?;
    let reserves_after = ReserveState {
        quote_reserve_qty: math::checked_sub(reserves.quote_reserve_qty, quote_qty_out)?,
        base_reserve_qty: math::checked_add(reserves.base_reserve_qty, base_qty_in)?,
    };
    Ok(SwapQuote {
        input_qty: base_qty_in,
        output_qty: quote_qty_out,
        reserves_after,
    })
}

/// Quote in, base out
pub fn quote_quote_token_for_base_token(
    reserves: &ReserveState,
    quote_qty_in: u128,
    fee_basis_points: u128,
) -> Result<SwapQuote> {
    let base_qty_out = calculate_qty_to_return_after_fees(
        quote_qty_in,
        reserves.quote_reserve_qty,
        reserves.base_reserve_qty,
        fee_basis_points,
    )?;
    let reserves_after = ReserveState {
        quote_reserve_qty: math::checked_add(reserves.quote_reserve_qty, quote_qty_in)?,
        base_reserve_qty: math::checked_sub(reserves.base_reserve_qty, base_qty_out)?,
    };
    Ok(SwapQuote {
        input_qty: quote_qty_in,
        output_qty: base_qty_out,
        reserves_after,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_swap_output() {
        // 100k base into a 1M/1M pool at 30 bps
        let out = calculate_qty_to_return_after_fees(100_000, 1_000_000, 1_000_000, 30).unwrap();
        assert_eq!(out, 90_661);
    }

    #[test]
    fn test_zero_fee_matches_plain_curve() {
        let out = calculate_qty_to_return_after_fees(100, 1_000, 2_000, 0).unwrap();
        // 2000 - 1000*2000/1100 = 181.8 -> 181
        assert_eq!(out, 181);
    }

    #[test]
    fn test_output_increases_with_input_and_decreases_with_fee() {
        let small = calculate_qty_to_return_after_fees(1_000, 50_000, 80_000, 30).unwrap();
        let large = calculate_qty_to_return_after_fees(2_000, 50_000, 80_000, 30).unwrap();
        let pricey = calculate_qty_to_return_after_fees(2_000, 50_000, 80_000, 100).unwrap();
        assert!(large > small);
        assert!(pricey < large);
    }

    #[test]
    fn test_empty_output_reserve_rejected() {
        assert_eq!(
            calculate_qty_to_return_after_fees(10, 10, 0, 30),
            Err(AmmError::InsufficientOutputReserve)
        );
    }

    #[test]
    fn test_curve_cannot_be_crossed() {
        // an empty input side would hand out the entire output reserve
        assert_eq!(
            calculate_qty_to_return_after_fees(10, 0, 1_000, 0),
            Err(AmmError::InsufficientOutputReserve)
        );
        let out = calculate_qty_to_return_after_fees(u64::MAX as u128, 1, 1_000, 30).unwrap();
        assert!(out <= 999);
    }

    #[test]
    fn test_calculate_qty_floors() {
        assert_eq!(calculate_qty(10, 3, 1).unwrap(), 3);
        assert_eq!(calculate_qty(0, 3, 1), Err(AmmError::InsufficientTokenQty));
        assert_eq!(calculate_qty(1, 0, 1), Err(AmmError::InsufficientLiquidity));
    }

    #[test]
    fn test_swap_quotes_move_reserves() {
        let reserves = ReserveState::new(1_000_000, 1_000_000);
        let quote = quote_base_token_for_quote_token(&reserves, 100_000, 30).unwrap();
        assert_eq!(quote.output_qty, 90_661);
        assert_eq!(quote.reserves_after, ReserveState::new(909_339, 1_100_000));

        let back = quote_quote_token_for_base_token(&quote.reserves_after, 90_661, 30).unwrap();
        // the round trip pays the fee twice
        assert!(back.output_qty < 100_000);
        assert_eq!(back.reserves_after.quote_reserve_qty, 1_000_000);
    }
}
