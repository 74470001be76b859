//! Token ledger collaborator
//!
//! The exchange never owns token balances. It reads its own balance through
//! [`TokenLedger::balance_of`] (the *external* read path) and moves tokens
//! with `transfer` / `transfer_from`. [`InMemoryTokenLedger`] is the
//! implementation used by tests and the simulator; it can also rebase, which
//! is how an elastic asset changes balances behind the exchange's back.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use elastic_config::protocol::ADDRESS_LEN;

/// Account identifier, serialized as a `0x` hex string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Address(pub [u8; ADDRESS_LEN]);

impl Address {
    pub const ZERO: Address = Address([0u8; ADDRESS_LEN]);

    /// Address with every byte set to `byte`
    pub const fn repeat_byte(byte: u8) -> Self {
        Address([byte; ADDRESS_LEN])
    }

    pub fn from_hex(raw: &str) -> Result<Self, TokenError> {
        let digits = raw.trim().strip_prefix("0x").unwrap_or(raw.trim());
        let bytes = hex::decode(digits).map_err(|_| TokenError::InvalidAddress(raw.to_string()))?;
        let bytes: [u8; ADDRESS_LEN] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| TokenError::InvalidAddress(raw.to_string()))?;
        Ok(Address(bytes))
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl FromStr for Address {
    type Err = TokenError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Address::from_hex(s)
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Address::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

impl From<[u8; ADDRESS_LEN]> for Address {
    fn from(bytes: [u8; ADDRESS_LEN]) -> Self {
        Address(bytes)
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("insufficient balance: required {required}, available {available}")]
    InsufficientBalance { required: u128, available: u128 },

    #[error("insufficient allowance: required {required}, available {available}")]
    InsufficientAllowance { required: u128, available: u128 },

    #[error("balance overflow")]
    Overflow,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("invalid rebase ratio {numerator}/{denominator}")]
    InvalidRebase { numerator: u128, denominator: u128 },
}

/// Fungible token ledger as seen by the exchange
pub trait TokenLedger {
    /// Live balance of `owner`
    fn balance_of(&self, owner: &Address) -> u128;

    /// Quantity `spender` may still move out of `owner`'s balance
    fn allowance(&self, owner: &Address, spender: &Address) -> u128;

    /// Move `qty` from `caller` to `to`
    fn transfer(&mut self, caller: &Address, to: &Address, qty: u128) -> Result<(), TokenError>;

    /// Move `qty` from `from` to `to` using the allowance `from` granted `spender`
    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        qty: u128,
    ) -> Result<(), TokenError>;
}

/// Map-backed ledger with allowances and proportional rebasing
#[derive(Debug, Clone, Default)]
pub struct InMemoryTokenLedger {
    symbol: String,
    balances: HashMap<Address, u128>,
    allowances: HashMap<(Address, Address), u128>,
    total_supply: u128,
}

impl InMemoryTokenLedger {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            ..Default::default()
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn total_supply(&self) -> u128 {
        self.total_supply
    }

    pub fn mint(&mut self, to: &Address, qty: u128) -> Result<(), TokenError> {
        let supply = self.total_supply.checked_add(qty).ok_or(TokenError::Overflow)?;
        let balance = self.balance_of(to).checked_add(qty).ok_or(TokenError::Overflow)?;
        self.total_supply = supply;
        self.balances.insert(*to, balance);
        Ok(())
    }

    pub fn approve(&mut self, owner: &Address, spender: &Address, qty: u128) {
        self.allowances.insert((*owner, *spender), qty);
    }

    /// Scale every balance by `numerator / denominator`, flooring each one.
    ///
    /// A rebase of 5/4 is a +25% supply expansion, 3/4 a 25% contraction.
    pub fn rebase(&mut self, numerator: u128, denominator: u128) -> Result<(), TokenError> {
        if denominator == 0 || numerator == 0 {
            return Err(TokenError::InvalidRebase {
                numerator,
                denominator,
            });
        }
        let mut scaled = HashMap::with_capacity(self.balances.len());
        let mut supply: u128 = 0;
        for (owner, balance) in &self.balances {
            let next = crate::math::mul_div(*balance, numerator, denominator)
                .map_err(|_| TokenError::Overflow)?;
            supply = supply.checked_add(next).ok_or(TokenError::Overflow)?;
            scaled.insert(*owner, next);
        }
        self.balances = scaled;
        self.total_supply = supply;
        Ok(())
    }

    fn debit(&mut self, from: &Address, qty: u128) -> Result<(), TokenError> {
        let available = self.balance_of(from);
        if available < qty {
            return Err(TokenError::InsufficientBalance {
                required: qty,
                available,
            });
        }
        self.balances.insert(*from, available - qty);
        Ok(())
    }

    fn credit(&mut self, to: &Address, qty: u128) -> Result<(), TokenError> {
        let balance = self.balance_of(to).checked_add(qty).ok_or(TokenError::Overflow)?;
        self.balances.insert(*to, balance);
        Ok(())
    }
}

impl TokenLedger for InMemoryTokenLedger {
    fn balance_of(&self, owner: &Address) -> u128 {
        self.balances.get(owner).copied().unwrap_or(0)
    }

    fn allowance(&self, owner: &Address, spender: &Address) -> u128 {
        self.allowances.get(&(*owner, *spender)).copied().unwrap_or(0)
    }

    fn transfer(&mut self, caller: &Address, to: &Address, qty: u128) -> Result<(), TokenError> {
        if caller == to {
            // self-transfer only needs the balance check
            let available = self.balance_of(caller);
            if available < qty {
                return Err(TokenError::InsufficientBalance {
                    required: qty,
                    available,
                });
            }
            return Ok(());
        }
        self.debit(caller, qty)?;
        self.credit(to, qty)
    }

    fn transfer_from(
        &mut self,
        spender: &Address,
        from: &Address,
        to: &Address,
        qty: u128,
    ) -> Result<(), TokenError> {
        let allowance = self.allowance(from, spender);
        if allowance < qty {
            return Err(TokenError::InsufficientAllowance {
                required: qty,
                available: allowance,
            });
        }
        self.transfer(from, to, qty)?;
        self.allowances.insert((*from, *spender), allowance - qty);
        Ok(())
    }
}
