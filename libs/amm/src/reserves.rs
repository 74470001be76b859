//! Reserve ledger
//!
//! The internally tracked reserves are the only input to pricing. They move
//! when the exchange commits an operation and never because a token ledger
//! rebased.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::{AmmError, Result};
use crate::math;

/// Internally tracked pool reserves
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReserveState {
    /// Elastic asset held on the curve
    pub quote_reserve_qty: u128,
    /// Fixed-supply asset held on the curve
    pub base_reserve_qty: u128,
}

impl ReserveState {
    pub fn new(quote_reserve_qty: u128, base_reserve_qty: u128) -> Self {
        Self {
            quote_reserve_qty,
            base_reserve_qty,
        }
    }

    /// True when either side is empty and no curve exists
    pub fn is_empty(&self) -> bool {
        self.quote_reserve_qty == 0 || self.base_reserve_qty == 0
    }

    /// ω = quote / base, WAD-scaled
    pub fn omega(&self) -> Result<u128> {
        if self.is_empty() {
            return Err(AmmError::InsufficientLiquidity);
        }
        math::scaled_divide(self.quote_reserve_qty, self.base_reserve_qty)
    }

    /// ω⁻¹ = base / quote, WAD-scaled
    pub fn i_omega(&self) -> Result<u128> {
        if self.is_empty() {
            return Err(AmmError::InsufficientLiquidity);
        }
        math::scaled_divide(self.base_reserve_qty, self.quote_reserve_qty)
    }

    /// √(quote · base), the size of the curve
    pub fn root_k(&self) -> u128 {
        math::sqrt_product(self.quote_reserve_qty, self.base_reserve_qty)
    }

    /// Quote per base as a decimal, for reports and logs only
    pub fn spot_price(&self) -> Option<Decimal> {
        if self.is_empty() {
            return None;
        }
        let quote = i128::try_from(self.quote_reserve_qty).ok()?;
        let base = i128::try_from(self.base_reserve_qty).ok()?;
        let quote = Decimal::try_from_i128_with_scale(quote, 0).ok()?;
        let base = Decimal::try_from_i128_with_scale(base, 0).ok()?;
        quote.checked_div(base)
    }

    pub(crate) fn with_added(&self, quote_qty: u128, base_qty: u128) -> Result<Self> {
        Ok(Self {
            quote_reserve_qty: math::checked_add(self.quote_reserve_qty, quote_qty)?,
            base_reserve_qty: math::checked_add(self.base_reserve_qty, base_qty)?,
        })
    }

    pub(crate) fn with_removed(&self, quote_qty: u128, base_qty: u128) -> Result<Self> {
        Ok(Self {
            quote_reserve_qty: math::checked_sub(self.quote_reserve_qty, quote_qty)?,
            base_reserve_qty: math::checked_sub(self.base_reserve_qty, base_qty)?,
        })
    }
}

/// The exchange's live token balances as reported by the token ledgers.
///
/// Kept as a separate type from [`ReserveState`] so the two read paths are
/// never interchangeable; only the decay detector and liquidity removal look
/// at these numbers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExternalBalances {
    pub quote_balance: u128,
    pub base_balance: u128,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::math::WAD;
    use rust_decimal_macros::dec;

    #[test]
    fn test_ratios() {
        let reserves = ReserveState::new(2_000, 1_000);
        assert_eq!(reserves.omega().unwrap(), 2 * WAD);
        assert_eq!(reserves.i_omega().unwrap(), WAD / 2);
        assert_eq!(reserves.spot_price(), Some(dec!(2)));
    }

    #[test]
    fn test_empty_reserves_have_no_ratio() {
        let reserves = ReserveState::new(0, 1_000);
        assert!(reserves.is_empty());
        assert_eq!(reserves.omega(), Err(AmmError::InsufficientLiquidity));
        assert_eq!(reserves.spot_price(), None);
        assert_eq!(reserves.root_k(), 0);
    }

    #[test]
    fn test_with_removed_underflow() {
        let reserves = ReserveState::new(10, 10);
        assert_eq!(reserves.with_removed(11, 0), Err(AmmError::Overflow));
        assert_eq!(
            reserves.with_added(5, 1).unwrap(),
            ReserveState::new(15, 11)
        );
    }
}
