//! Decay detector
//!
//! Compares the exchange's live balance of the elastic (quote) asset with
//! the internally tracked quote reserve. A positive rebase leaves quote
//! tokens in the pool that back no claim yet (alpha decay); a negative rebase
//! leaves the reserve promising more quote than the pool holds (beta decay).
//!
//! Decay is always recomputed from a fresh snapshot and never stored.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::math;
use crate::reserves::ReserveState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Decay {
    None,
    /// External quote balance exceeds the quote reserve
    Alpha {
        /// Surplus in quote units
        quote_surplus: u128,
        /// Base needed to pair with the surplus at the current ratio,
        /// ⌊surplus · base_reserve / quote_reserve⌋
        base_required: u128,
    },
    /// External quote balance trails the quote reserve
    Beta {
        /// Deficit in quote units
        quote_deficit: u128,
        /// Deficit expressed in base units,
        /// ⌊deficit · base_reserve / quote_reserve⌋
        base_equivalent: u128,
    },
}

impl Decay {
    /// Classify the divergence between `external_quote_balance` and `reserves`.
    ///
    /// A pool without a curve reports no decay: nothing can be priced
    /// against it until the first deposit sets the reserves.
    pub fn detect(reserves: &ReserveState, external_quote_balance: u128) -> Result<Self> {
        if reserves.is_empty() {
            return Ok(Decay::None);
        }
        let internal = reserves.quote_reserve_qty;
        let base_reserve = reserves.base_reserve_qty;

        if external_quote_balance > internal {
            let quote_surplus = external_quote_balance - internal;
            let base_required = math::mul_div(quote_surplus, base_reserve, internal)?;
            Ok(Decay::Alpha {
                quote_surplus,
                base_required,
            })
        } else if external_quote_balance < internal {
            let quote_deficit = internal - external_quote_balance;
            let base_equivalent = math::mul_div(quote_deficit, base_reserve, internal)?;
            Ok(Decay::Beta {
                quote_deficit,
                base_equivalent,
            })
        } else {
            Ok(Decay::None)
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, Decay::None)
    }

    /// True when the decay is worth at least one whole unit of base
    pub fn is_resolvable(&self) -> bool {
        match self {
            Decay::None => false,
            Decay::Alpha { base_required, .. } => *base_required > 0,
            Decay::Beta {
                base_equivalent, ..
            } => *base_equivalent > 0,
        }
    }

    /// Quote-unit size of the divergence, regardless of direction
    pub fn quote_magnitude(&self) -> u128 {
        match self {
            Decay::None => 0,
            Decay::Alpha { quote_surplus, .. } => *quote_surplus,
            Decay::Beta { quote_deficit, .. } => *quote_deficit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use elastic_config::protocol::WAD;

    #[test]
    fn test_no_decay_when_balanced() {
        let reserves = ReserveState::new(1_000, 500);
        assert_eq!(Decay::detect(&reserves, 1_000).unwrap(), Decay::None);
    }

    #[test]
    fn test_alpha_decay_after_positive_rebase() {
        let reserves = ReserveState::new(1_000, 500);
        let decay = Decay::detect(&reserves, 1_250).unwrap();
        assert_eq!(
            decay,
            Decay::Alpha {
                quote_surplus: 250,
                base_required: 125,
            }
        );
        assert!(decay.is_resolvable());
        assert_eq!(decay.quote_magnitude(), 250);
    }

    #[test]
    fn test_beta_decay_after_negative_rebase() {
        let reserves = ReserveState::new(1_000, 500);
        let decay = Decay::detect(&reserves, 800).unwrap();
        assert_eq!(
            decay,
            Decay::Beta {
                quote_deficit: 200,
                base_equivalent: 100,
            }
        );
    }

    #[test]
    fn test_dust_decay_is_not_resolvable() {
        // one quote unit is worth half a base unit
        let reserves = ReserveState::new(1_000, 500);
        let alpha = Decay::detect(&reserves, 1_001).unwrap();
        assert!(!alpha.is_none());
        assert!(!alpha.is_resolvable());

        let beta = Decay::detect(&reserves, 999).unwrap();
        assert!(!beta.is_resolvable());
    }

    #[test]
    fn test_decay_on_pool_with_tiny_quote_ratio() {
        // omega floors to zero at this ratio; the base sizing must not
        let reserves = ReserveState::new(1, 2 * WAD);
        assert_eq!(
            Decay::detect(&reserves, 3).unwrap(),
            Decay::Alpha {
                quote_surplus: 2,
                base_required: 4 * WAD,
            }
        );
        assert_eq!(
            Decay::detect(&reserves, 0).unwrap(),
            Decay::Beta {
                quote_deficit: 1,
                base_equivalent: 2 * WAD,
            }
        );
    }

    #[test]
    fn test_empty_pool_has_no_decay() {
        let reserves = ReserveState::default();
        assert_eq!(Decay::detect(&reserves, 42).unwrap(), Decay::None);
    }
}
