//! Fixed-point math kernel
//!
//! Integer-only primitives used by every other component. Quantities are
//! `u128` token units; products are formed in 256 bits so that no
//! intermediate can wrap, and results that do not fit back into `u128` fail
//! with [`AmmError::Overflow`].
//!
//! All divisions floor. Callers that need the pool-favourable direction for a
//! quantity the user has to pay use [`mul_div_up`].

use primitive_types::U256;

use crate::error::{AmmError, Result};

pub use elastic_config::protocol::{BASIS_POINTS, WAD};

fn narrow(value: U256) -> Result<u128> {
    if value > U256::from(u128::MAX) {
        return Err(AmmError::Overflow);
    }
    Ok(value.low_u128())
}

/// ⌊a · b / denominator⌋ with a 256-bit intermediate
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(AmmError::DivisionByZero);
    }
    narrow(U256::from(a) * U256::from(b) / U256::from(denominator))
}

/// ⌈a · b / denominator⌉ with a 256-bit intermediate
pub fn mul_div_up(a: u128, b: u128, denominator: u128) -> Result<u128> {
    if denominator == 0 {
        return Err(AmmError::DivisionByZero);
    }
    let denominator = U256::from(denominator);
    let product = U256::from(a) * U256::from(b);
    let quotient = product / denominator;
    if (product % denominator).is_zero() {
        narrow(quotient)
    } else {
        narrow(quotient + U256::one())
    }
}

/// ⌊a · b / WAD⌋: multiply a quantity by a WAD-scaled ratio
pub fn scaled_multiply(a: u128, b: u128) -> Result<u128> {
    mul_div(a, b, WAD)
}

/// ⌊a · WAD / b⌋: WAD-scaled ratio of two quantities, or a quantity divided
/// by a WAD-scaled ratio
pub fn scaled_divide(a: u128, b: u128) -> Result<u128> {
    mul_div(a, WAD, b)
}

/// Round `value` to the nearest multiple of `multiple`, halves rounding up
pub fn round_to_nearest_multiple(value: u128, multiple: u128) -> Result<u128> {
    if multiple == 0 {
        return Err(AmmError::DivisionByZero);
    }
    let shifted = value
        .checked_add(multiple / 2)
        .ok_or(AmmError::Overflow)?;
    (shifted / multiple)
        .checked_mul(multiple)
        .ok_or(AmmError::Overflow)
}

pub fn absolute_difference(a: u128, b: u128) -> u128 {
    a.abs_diff(b)
}

/// ⌊√(a · b)⌋, used for the √k fee accounting
pub fn sqrt_product(a: u128, b: u128) -> u128 {
    // √ of a 256-bit value always fits in 128 bits
    (U256::from(a) * U256::from(b)).integer_sqrt().low_u128()
}

pub fn checked_add(a: u128, b: u128) -> Result<u128> {
    a.checked_add(b).ok_or(AmmError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128> {
    a.checked_sub(b).ok_or(AmmError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mul_div_floors() {
        assert_eq!(mul_div(10, 10, 3).unwrap(), 33);
        assert_eq!(mul_div_up(10, 10, 3).unwrap(), 34);
        assert_eq!(mul_div_up(10, 9, 3).unwrap(), 30);
    }

    #[test]
    fn test_mul_div_uses_wide_intermediate() {
        // u128::MAX * 4 would wrap in 128 bits
        assert_eq!(mul_div(u128::MAX, 4, 8).unwrap(), u128::MAX / 2);
    }

    #[test]
    fn test_mul_div_overflow_detected() {
        assert_eq!(mul_div(u128::MAX, 3, 2), Err(AmmError::Overflow));
    }

    #[test]
    fn test_division_by_zero() {
        assert_eq!(mul_div(1, 1, 0), Err(AmmError::DivisionByZero));
        assert_eq!(scaled_divide(5, 0), Err(AmmError::DivisionByZero));
        assert_eq!(round_to_nearest_multiple(5, 0), Err(AmmError::DivisionByZero));
    }

    #[test]
    fn test_scaled_ratio_round_trip() {
        let half = scaled_divide(1, 2).unwrap();
        assert_eq!(half, WAD / 2);
        assert_eq!(scaled_multiply(1_000, half).unwrap(), 500);
        // dividing by a ratio undoes multiplying by it
        assert_eq!(scaled_divide(500, half).unwrap(), 1_000);
    }

    #[test]
    fn test_round_to_nearest_multiple_half_up() {
        assert_eq!(round_to_nearest_multiple(14, 10).unwrap(), 10);
        assert_eq!(round_to_nearest_multiple(15, 10).unwrap(), 20);
        assert_eq!(round_to_nearest_multiple(WAD + WAD / 2, WAD).unwrap(), 2 * WAD);
        assert_eq!(round_to_nearest_multiple(u128::MAX, 2), Err(AmmError::Overflow));
    }

    #[test]
    fn test_absolute_difference() {
        assert_eq!(absolute_difference(3, 10), 7);
        assert_eq!(absolute_difference(10, 3), 7);
    }

    #[test]
    fn test_sqrt_product() {
        assert_eq!(sqrt_product(1_000_000, 1_000_000), 1_000_000);
        assert_eq!(sqrt_product(2, 1), 1);
        assert_eq!(sqrt_product(u128::MAX, u128::MAX), u128::MAX);
    }
}
