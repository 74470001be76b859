//! Liquidity issuance engine
//!
//! Pure planning functions: each takes one consistent [`PoolSnapshot`] and
//! returns what the exchange should pull, pay, mint and burn, together with
//! the reserves it should commit. Nothing here mutates state, so a failed
//! plan leaves the pool untouched.
//!
//! Entry paths:
//!
//! - **pair entry**: both assets at the current ratio, claims sized by the
//!   base contribution over the base reserve;
//! - **alpha absorption**: base paired with surplus quote left by a positive
//!   rebase, which is then moved onto the curve;
//! - **beta absorption**: quote that tops the pool's balance back up to the
//!   reserve after a negative rebase.
//!
//! Single-asset claims are sized by contributed value over the pool's value
//! before entry, both measured at the internal ratio, so rebase gains and
//! losses stay with the holders who were present for them.

use serde::{Deserialize, Serialize};

use crate::decay::Decay;
use crate::error::{AmmError, Result};
use crate::math;
use crate::pricing;
use crate::reserves::{ExternalBalances, ReserveState};

/// Everything an issuance decision may read, captured once per operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolSnapshot {
    pub reserves: ReserveState,
    pub external: ExternalBalances,
    /// Liquidity supply including any protocol fee liquidity about to be minted
    pub total_supply: u128,
}

impl PoolSnapshot {
    pub fn decay(&self) -> Result<Decay> {
        Decay::detect(&self.reserves, self.external.quote_balance)
    }
}

/// Outcome of an entry plan
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IssuancePlan {
    /// Quote to pull from the provider
    pub quote_qty: u128,
    /// Base to pull from the provider
    pub base_qty: u128,
    /// Liquidity tokens to mint to the recipient
    pub liquidity_qty: u128,
    pub reserves_after: ReserveState,
}

/// Outcome of a withdrawal plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemovalPlan {
    /// Quote paid out of the exchange's external balance
    pub quote_qty: u128,
    /// Base paid out of the exchange's external balance
    pub base_qty: u128,
    pub reserves_after: ReserveState,
}

/// Double-asset entry, routing through decay absorption first when the pool
/// carries resolvable decay.
pub fn plan_add_liquidity(
    snapshot: &PoolSnapshot,
    quote_qty_desired: u128,
    base_qty_desired: u128,
    quote_qty_min: u128,
    base_qty_min: u128,
) -> Result<IssuancePlan> {
    if snapshot.total_supply == 0 {
        return plan_initial_liquidity(
            quote_qty_desired,
            base_qty_desired,
            quote_qty_min,
            base_qty_min,
        );
    }

    let decay = snapshot.decay()?;
    let absorbed = match decay {
        Decay::Alpha {
            quote_surplus,
            base_required,
        } if decay.is_resolvable() => {
            absorb_alpha(snapshot, quote_surplus, base_required, base_qty_desired, 0)?
        }
        Decay::Beta {
            quote_deficit,
            base_equivalent,
        } if decay.is_resolvable() => {
            absorb_beta(snapshot, quote_deficit, base_equivalent, quote_qty_desired, 0)?
        }
        // balanced, or decay too small to be worth a base unit
        _ => {
            if quote_qty_desired == 0 || base_qty_desired == 0 {
                return Err(AmmError::InsufficientQtyDesired);
            }
            return plan_pair_entry(
                &snapshot.reserves,
                snapshot.total_supply,
                quote_qty_desired,
                base_qty_desired,
                quote_qty_min,
                base_qty_min,
            );
        }
    };

    let quote_left = quote_qty_desired - absorbed.quote_qty;
    let base_left = base_qty_desired - absorbed.base_qty;
    let mut plan = absorbed;

    if quote_left > 0 && base_left > 0 {
        // whatever is left enters at the post-absorption ratio
        let supply_after_absorb = math::checked_add(snapshot.total_supply, absorbed.liquidity_qty)?;
        let pair = plan_pair_entry(
            &absorbed.reserves_after,
            supply_after_absorb,
            quote_left,
            base_left,
            0,
            0,
        )?;
        plan = IssuancePlan {
            quote_qty: math::checked_add(absorbed.quote_qty, pair.quote_qty)?,
            base_qty: math::checked_add(absorbed.base_qty, pair.base_qty)?,
            liquidity_qty: math::checked_add(absorbed.liquidity_qty, pair.liquidity_qty)?,
            reserves_after: pair.reserves_after,
        };
    }

    if plan.quote_qty < quote_qty_min {
        return Err(AmmError::InsufficientQuoteQty);
    }
    if plan.base_qty < base_qty_min {
        return Err(AmmError::InsufficientBaseQty);
    }
    Ok(plan)
}

/// Base-only entry that pairs with alpha decay
pub fn plan_add_base_token_liquidity(
    snapshot: &PoolSnapshot,
    base_qty_desired: u128,
    base_qty_min: u128,
) -> Result<IssuancePlan> {
    if snapshot.total_supply == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    match snapshot.decay()? {
        Decay::Alpha {
            quote_surplus,
            base_required,
        } => absorb_alpha(snapshot, quote_surplus, base_required, base_qty_desired, base_qty_min),
        _ => Err(AmmError::NoQuoteDecay),
    }
}

/// Quote-only entry that covers beta decay
pub fn plan_add_quote_token_liquidity(
    snapshot: &PoolSnapshot,
    quote_qty_desired: u128,
    quote_qty_min: u128,
) -> Result<IssuancePlan> {
    if snapshot.total_supply == 0 {
        return Err(AmmError::InsufficientLiquidity);
    }
    match snapshot.decay()? {
        Decay::Beta {
            quote_deficit,
            base_equivalent,
        } => absorb_beta(
            snapshot,
            quote_deficit,
            base_equivalent,
            quote_qty_desired,
            quote_qty_min,
        ),
        _ => Err(AmmError::NoQuoteDecay),
    }
}

/// Proportional withdrawal of `liquidity_qty` out of the external balances
pub fn plan_remove_liquidity(
    snapshot: &PoolSnapshot,
    holder_balance: u128,
    liquidity_qty: u128,
    quote_qty_min: u128,
    base_qty_min: u128,
) -> Result<RemovalPlan> {
    let supply = snapshot.total_supply;
    if supply == 0 || liquidity_qty == 0 || liquidity_qty > holder_balance {
        return Err(AmmError::InsufficientLiquidity);
    }

    let quote_qty = math::mul_div(snapshot.external.quote_balance, liquidity_qty, supply)?;
    let base_qty = math::mul_div(snapshot.external.base_balance, liquidity_qty, supply)?;
    if quote_qty < quote_qty_min {
        return Err(AmmError::InsufficientQuoteQty);
    }
    if base_qty < base_qty_min {
        return Err(AmmError::InsufficientBaseQty);
    }

    // the curve shrinks by the same fraction, keeping the price
    let reserves = &snapshot.reserves;
    let quote_off_curve = math::mul_div(reserves.quote_reserve_qty, liquidity_qty, supply)?;
    let base_off_curve = math::mul_div(reserves.base_reserve_qty, liquidity_qty, supply)?;
    let reserves_after = reserves.with_removed(quote_off_curve, base_off_curve)?;

    Ok(RemovalPlan {
        quote_qty,
        base_qty,
        reserves_after,
    })
}

fn plan_initial_liquidity(
    quote_qty_desired: u128,
    base_qty_desired: u128,
    quote_qty_min: u128,
    base_qty_min: u128,
) -> Result<IssuancePlan> {
    if quote_qty_desired == 0 || base_qty_desired == 0 {
        return Err(AmmError::InsufficientQtyDesired);
    }
    if quote_qty_desired < quote_qty_min {
        return Err(AmmError::InsufficientQuoteQty);
    }
    if base_qty_desired < base_qty_min {
        return Err(AmmError::InsufficientBaseQty);
    }
    Ok(IssuancePlan {
        quote_qty: quote_qty_desired,
        base_qty: base_qty_desired,
        liquidity_qty: base_qty_desired,
        reserves_after: ReserveState::new(quote_qty_desired, base_qty_desired),
    })
}

fn plan_pair_entry(
    reserves: &ReserveState,
    total_supply: u128,
    quote_qty_desired: u128,
    base_qty_desired: u128,
    quote_qty_min: u128,
    base_qty_min: u128,
) -> Result<IssuancePlan> {
    let required_base = pricing::calculate_qty(
        quote_qty_desired,
        reserves.quote_reserve_qty,
        reserves.base_reserve_qty,
    )?;

    let (quote_qty, base_qty) = if required_base <= base_qty_desired {
        if quote_qty_desired < quote_qty_min {
            return Err(AmmError::InsufficientQuoteQty);
        }
        if required_base < base_qty_min {
            return Err(AmmError::InsufficientBaseQty);
        }
        (quote_qty_desired, required_base)
    } else {
        let required_quote = pricing::calculate_qty(
            base_qty_desired,
            reserves.base_reserve_qty,
            reserves.quote_reserve_qty,
        )?;
        if required_quote < quote_qty_min {
            return Err(AmmError::InsufficientQuoteQty);
        }
        if base_qty_desired < base_qty_min {
            return Err(AmmError::InsufficientBaseQty);
        }
        (required_quote, base_qty_desired)
    };

    let liquidity_qty = math::mul_div(base_qty, total_supply, reserves.base_reserve_qty)?;
    Ok(IssuancePlan {
        quote_qty,
        base_qty,
        liquidity_qty,
        reserves_after: reserves.with_added(quote_qty, base_qty)?,
    })
}

fn absorb_alpha(
    snapshot: &PoolSnapshot,
    quote_surplus: u128,
    base_required: u128,
    base_qty_desired: u128,
    base_qty_min: u128,
) -> Result<IssuancePlan> {
    if base_required == 0 || base_qty_desired < base_required {
        return Err(AmmError::InsufficientDecay);
    }
    if base_required < base_qty_min {
        return Err(AmmError::InsufficientBaseQty);
    }

    let reserves = &snapshot.reserves;
    // pool value before entry in base units; rounding up shrinks the claim
    let quote_in_base = math::mul_div_up(
        snapshot.external.quote_balance,
        reserves.base_reserve_qty,
        reserves.quote_reserve_qty,
    )?;
    let pool_value = math::checked_add(reserves.base_reserve_qty, quote_in_base)?;
    let liquidity_qty = math::mul_div(snapshot.total_supply, base_required, pool_value)?;

    Ok(IssuancePlan {
        quote_qty: 0,
        base_qty: base_required,
        liquidity_qty,
        reserves_after: reserves.with_added(quote_surplus, base_required)?,
    })
}

fn absorb_beta(
    snapshot: &PoolSnapshot,
    quote_deficit: u128,
    base_equivalent: u128,
    quote_qty_desired: u128,
    quote_qty_min: u128,
) -> Result<IssuancePlan> {
    if base_equivalent == 0 || quote_qty_desired < quote_deficit {
        return Err(AmmError::InsufficientDecay);
    }
    if quote_deficit < quote_qty_min {
        return Err(AmmError::InsufficientQuoteQty);
    }

    // pool value before entry in quote units: the base side is worth the
    // quote reserve at the internal ratio
    let pool_value = math::checked_add(
        snapshot.external.quote_balance,
        snapshot.reserves.quote_reserve_qty,
    )?;
    let liquidity_qty = math::mul_div(snapshot.total_supply, quote_deficit, pool_value)?;

    Ok(IssuancePlan {
        quote_qty: quote_deficit,
        base_qty: 0,
        liquidity_qty,
        reserves_after: snapshot.reserves,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(
        quote_reserve: u128,
        base_reserve: u128,
        external_quote: u128,
        supply: u128,
    ) -> PoolSnapshot {
        PoolSnapshot {
            reserves: ReserveState::new(quote_reserve, base_reserve),
            external: ExternalBalances {
                quote_balance: external_quote,
                base_balance: base_reserve,
            },
            total_supply: supply,
        }
    }

    #[test]
    fn test_first_deposit_sets_curve() {
        let plan = plan_add_liquidity(&snapshot(0, 0, 0, 0), 5_000, 2_000, 1, 1).unwrap();
        assert_eq!(plan.liquidity_qty, 2_000);
        assert_eq!(plan.reserves_after, ReserveState::new(5_000, 2_000));
    }

    #[test]
    fn test_first_deposit_needs_both_assets() {
        assert_eq!(
            plan_add_liquidity(&snapshot(0, 0, 0, 0), 0, 2_000, 0, 0),
            Err(AmmError::InsufficientQtyDesired)
        );
    }

    #[test]
    fn test_pair_entry_uses_current_ratio() {
        // 2 quote per base
        let snap = snapshot(2_000, 1_000, 2_000, 1_000);
        let plan = plan_add_liquidity(&snap, 500, 400, 1, 1).unwrap();
        assert_eq!(plan.quote_qty, 500);
        assert_eq!(plan.base_qty, 250);
        assert_eq!(plan.liquidity_qty, 250);
        assert_eq!(plan.reserves_after, ReserveState::new(2_500, 1_250));

        // base is the binding side
        let plan = plan_add_liquidity(&snap, 5_000, 100, 1, 1).unwrap();
        assert_eq!((plan.quote_qty, plan.base_qty), (200, 100));
    }

    #[test]
    fn test_pair_entry_minimums() {
        let snap = snapshot(2_000, 1_000, 2_000, 1_000);
        assert_eq!(
            plan_add_liquidity(&snap, 500, 400, 1, 300),
            Err(AmmError::InsufficientBaseQty)
        );
        assert_eq!(
            plan_add_liquidity(&snap, 5_000, 100, 250, 1),
            Err(AmmError::InsufficientQuoteQty)
        );
        assert_eq!(
            plan_add_liquidity(&snap, 0, 100, 0, 0),
            Err(AmmError::InsufficientQtyDesired)
        );
    }

    #[test]
    fn test_alpha_absorption_clears_decay() {
        // +25% rebase on a 1000/1000 pool
        let snap = snapshot(1_000, 1_000, 1_250, 1_000);
        let plan = plan_add_base_token_liquidity(&snap, 300, 1).unwrap();
        assert_eq!(plan.base_qty, 250);
        assert_eq!(plan.quote_qty, 0);
        assert_eq!(plan.reserves_after, ReserveState::new(1_250, 1_250));
        // 1000 · 250 / (1000 + 1250)
        assert_eq!(plan.liquidity_qty, 111);
        assert_eq!(Decay::detect(&plan.reserves_after, 1_250).unwrap(), Decay::None);
    }

    #[test]
    fn test_alpha_absorption_rejections() {
        let snap = snapshot(1_000, 1_000, 1_250, 1_000);
        assert_eq!(
            plan_add_base_token_liquidity(&snap, 249, 0),
            Err(AmmError::InsufficientDecay)
        );
        assert_eq!(
            plan_add_base_token_liquidity(&snap, 300, 251),
            Err(AmmError::InsufficientBaseQty)
        );

        let balanced = snapshot(1_000, 1_000, 1_000, 1_000);
        assert_eq!(
            plan_add_base_token_liquidity(&balanced, 300, 0),
            Err(AmmError::NoQuoteDecay)
        );

        // surplus worth less than one base unit
        let dust = snapshot(1_000, 500, 1_001, 500);
        assert_eq!(
            plan_add_base_token_liquidity(&dust, 300, 0),
            Err(AmmError::InsufficientDecay)
        );
    }

    #[test]
    fn test_beta_absorption_tops_up_balance() {
        // -20% rebase on a 1000/1000 pool
        let snap = snapshot(1_000, 1_000, 800, 1_000);
        let plan = plan_add_quote_token_liquidity(&snap, 500, 1).unwrap();
        assert_eq!(plan.quote_qty, 200);
        assert_eq!(plan.base_qty, 0);
        assert_eq!(plan.reserves_after, snap.reserves);
        // 1000 · 200 / (800 + 1000)
        assert_eq!(plan.liquidity_qty, 111);

        assert_eq!(
            plan_add_quote_token_liquidity(&snap, 199, 0),
            Err(AmmError::InsufficientDecay)
        );
        assert_eq!(
            plan_add_base_token_liquidity(&snap, 199, 0),
            Err(AmmError::NoQuoteDecay)
        );
    }

    #[test]
    fn test_add_liquidity_resolves_decay_then_pairs() {
        let snap = snapshot(1_000, 1_000, 1_250, 1_000);
        let plan = plan_add_liquidity(&snap, 100, 350, 1, 1).unwrap();
        // 250 base absorbs the surplus, then 100/100 enters at 1:1
        assert_eq!(plan.base_qty, 350);
        assert_eq!(plan.quote_qty, 100);
        assert_eq!(plan.reserves_after, ReserveState::new(1_350, 1_350));
        // 111 from absorption, then 100 · 1111 / 1250
        assert_eq!(plan.liquidity_qty, 111 + 88);
    }

    #[test]
    fn test_add_liquidity_covers_deficit_then_pairs() {
        // -20% rebase on a 1000/1000 pool
        let snap = snapshot(1_000, 1_000, 800, 1_000);
        let plan = plan_add_liquidity(&snap, 300, 100, 1, 1).unwrap();
        // 200 quote covers the deficit, then 100/100 enters at 1:1
        assert_eq!(plan.quote_qty, 300);
        assert_eq!(plan.base_qty, 100);
        assert_eq!(plan.reserves_after, ReserveState::new(1_100, 1_100));
        // 111 from the deficit, then 100 · 1111 / 1000
        assert_eq!(plan.liquidity_qty, 111 + 111);
        assert_eq!(Decay::detect(&plan.reserves_after, 800 + 300).unwrap(), Decay::None);

        // exactly the deficit and no base: nothing left to pair
        let plan = plan_add_liquidity(&snap, 200, 50, 0, 0).unwrap();
        assert_eq!((plan.quote_qty, plan.base_qty), (200, 0));
        assert_eq!(plan.reserves_after, snap.reserves);

        assert_eq!(
            plan_add_liquidity(&snap, 150, 100, 0, 0),
            Err(AmmError::InsufficientDecay)
        );
    }

    #[test]
    fn test_add_liquidity_with_decay_checks_totals() {
        let snap = snapshot(1_000, 1_000, 1_250, 1_000);
        // only enough base to absorb: quote minimum cannot be met
        assert_eq!(
            plan_add_liquidity(&snap, 100, 250, 1, 1),
            Err(AmmError::InsufficientQuoteQty)
        );
        assert_eq!(
            plan_add_liquidity(&snap, 100, 200, 0, 0),
            Err(AmmError::InsufficientDecay)
        );
    }

    #[test]
    fn test_contribution_truncating_to_zero_claims() {
        // one base unit into a pool whose supply is far smaller than its reserve
        let snap = snapshot(1_000_000, 1_000_000, 1_000_000, 10);
        let plan = plan_add_liquidity(&snap, 1, 1, 0, 0).unwrap();
        assert_eq!(plan.base_qty, 1);
        assert_eq!(plan.liquidity_qty, 0);
    }

    #[test]
    fn test_removal_pays_external_balances() {
        // positive rebase accrued to holders
        let snap = snapshot(1_000, 1_000, 1_250, 1_000);
        let plan = plan_remove_liquidity(&snap, 1_000, 400, 1, 1).unwrap();
        assert_eq!(plan.quote_qty, 500);
        assert_eq!(plan.base_qty, 400);
        assert_eq!(plan.reserves_after, ReserveState::new(600, 600));
    }

    #[test]
    fn test_removal_rejections() {
        let snap = snapshot(1_000, 1_000, 1_000, 1_000);
        assert_eq!(
            plan_remove_liquidity(&snap, 10, 11, 1, 1),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            plan_remove_liquidity(&snapshot(0, 0, 0, 0), 10, 1, 1, 1),
            Err(AmmError::InsufficientLiquidity)
        );
        assert_eq!(
            plan_remove_liquidity(&snap, 100, 100, 101, 1),
            Err(AmmError::InsufficientQuoteQty)
        );
        assert_eq!(
            plan_remove_liquidity(&snap, 100, 100, 1, 101),
            Err(AmmError::InsufficientBaseQty)
        );
    }
}
