//! Liquidity token ledger
//!
//! Fungible claim markers on the pool, one balance per provider.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{AmmError, Result};
use crate::token::Address;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LiquidityTokenLedger {
    balances: BTreeMap<Address, u128>,
    total_supply: u128,
}

impl LiquidityTokenLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, holder: &Address) -> u128 {
        self.balances.get(holder).copied().unwrap_or(0)
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    /// Holders with a non-zero balance
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &u128)> {
        self.balances.iter()
    }

    pub fn mint(&mut self, to: &Address, qty: u128) -> Result<()> {
        if qty == 0 {
            return Ok(());
        }
        let supply = self.total_supply.checked_add(qty).ok_or(AmmError::Overflow)?;
        let balance = self.balance_of(to).checked_add(qty).ok_or(AmmError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    pub fn burn(&mut self, from: &Address, qty: u128) -> Result<()> {
        let balance = self.balance_of(from);
        if balance < qty || self.total_supply < qty {
            return Err(AmmError::InsufficientLiquidity);
        }
        if balance == qty {
            self.balances.remove(from);
        } else {
            self.balances.insert(*from, balance - qty);
        }
        self.total_supply -= qty;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const LP: Address = Address::repeat_byte(0x01);

    #[test]
    fn test_mint_and_burn() {
        let mut ledger = LiquidityTokenLedger::new();
        ledger.mint(&LP, 100).unwrap();
        ledger.burn(&LP, 40).unwrap();
        assert_eq!(ledger.balance_of(&LP), 60);
        assert_eq!(ledger.total_supply(), 60);

        ledger.burn(&LP, 60).unwrap();
        assert_eq!(ledger.holders().count(), 0);
    }

    #[test]
    fn test_burn_more_than_balance() {
        let mut ledger = LiquidityTokenLedger::new();
        ledger.mint(&LP, 10).unwrap();
        assert_eq!(ledger.burn(&LP, 11), Err(AmmError::InsufficientLiquidity));
        assert_eq!(ledger.total_supply(), 10);
    }

    #[test]
    fn test_zero_mint_is_noop() {
        let mut ledger = LiquidityTokenLedger::new();
        ledger.mint(&LP, 0).unwrap();
        assert_eq!(ledger.holders().count(), 0);
    }
}
