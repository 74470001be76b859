//! Fee configuration and protocol fee accrual
//!
//! Swaps charge `liquidity_fee_bps` on their input and leave the whole input
//! on the curve, so `√k` grows with every trade. The protocol's slice
//! (`protocol_fee_bps` of volume) is realised as liquidity tokens minted to
//! the fee recipient at the next liquidity event, sized so that the recipient
//! owns `protocol_fee_bps / liquidity_fee_bps` of the growth since the last
//! event:
//!
//! ```text
//!                 S · (√k − √k_last) · p
//! minted = ⌊ ───────────────────────────────── ⌋
//!             √k · (f − p) + √k_last · p
//! ```
//!
//! `√k_last` is kept in [`FeeAccrual`], an explicit ledger entry refreshed
//! after every add/remove.

use serde::{Deserialize, Serialize};

use elastic_config::ExchangeSettings;

use crate::error::{AmmError, Result};
use crate::math::{self, BASIS_POINTS};
use crate::reserves::ReserveState;
use crate::token::Address;

/// Fee schedule, fixed at construction apart from the recipient
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeConfiguration {
    liquidity_fee_bps: u128,
    protocol_fee_bps: u128,
    recipient: Address,
}

impl FeeConfiguration {
    pub fn new(
        liquidity_fee_bps: u128,
        protocol_fee_bps: u128,
        recipient: Address,
    ) -> Result<Self> {
        if liquidity_fee_bps >= BASIS_POINTS {
            return Err(AmmError::InvalidFeeConfiguration(format!(
                "liquidity fee {} bps must be below {}",
                liquidity_fee_bps, BASIS_POINTS
            )));
        }
        if protocol_fee_bps > liquidity_fee_bps {
            return Err(AmmError::InvalidFeeConfiguration(format!(
                "protocol fee {} bps exceeds liquidity fee {} bps",
                protocol_fee_bps, liquidity_fee_bps
            )));
        }
        Ok(Self {
            liquidity_fee_bps,
            protocol_fee_bps,
            recipient,
        })
    }

    pub fn from_settings(settings: &ExchangeSettings) -> Result<Self> {
        let recipient = settings
            .recipient_bytes()
            .map_err(|e| AmmError::InvalidFeeConfiguration(e.to_string()))?;
        Self::new(
            u128::from(settings.fees.liquidity_fee_bps),
            u128::from(settings.fees.protocol_fee_bps),
            Address(recipient),
        )
    }

    pub fn liquidity_fee_bps(&self) -> u128 {
        self.liquidity_fee_bps
    }

    pub fn protocol_fee_bps(&self) -> u128 {
        self.protocol_fee_bps
    }

    pub fn recipient(&self) -> &Address {
        &self.recipient
    }

    pub(crate) fn set_recipient(&mut self, recipient: Address) {
        self.recipient = recipient;
    }
}

/// Protocol fee ledger entry
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeAccrual {
    /// √k as of the last liquidity event
    pub root_k_last: u128,
    /// Liquidity tokens minted to fee recipients so far
    pub total_fee_liquidity_minted: u128,
}

impl FeeAccrual {
    /// Liquidity owed to the protocol for curve growth since the last event
    pub fn pending_fee_liquidity(
        &self,
        config: &FeeConfiguration,
        total_supply: u128,
        reserves: &ReserveState,
    ) -> Result<u128> {
        let p = config.protocol_fee_bps;
        if p == 0 || total_supply == 0 || self.root_k_last == 0 {
            return Ok(0);
        }
        let root_k = reserves.root_k();
        if root_k <= self.root_k_last {
            return Ok(0);
        }

        let weighted_growth = (root_k - self.root_k_last)
            .checked_mul(p)
            .ok_or(AmmError::Overflow)?;
        let denominator = root_k
            .checked_mul(config.liquidity_fee_bps - p)
            .and_then(|lhs| {
                self.root_k_last
                    .checked_mul(p)
                    .and_then(|rhs| lhs.checked_add(rhs))
            })
            .ok_or(AmmError::Overflow)?;
        math::mul_div(total_supply, weighted_growth, denominator)
    }

    /// Ledger entry after minting `minted` and settling at `reserves`
    pub(crate) fn settled(&self, minted: u128, reserves: &ReserveState) -> Result<Self> {
        Ok(Self {
            root_k_last: reserves.root_k(),
            total_fee_liquidity_minted: math::checked_add(self.total_fee_liquidity_minted, minted)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RECIPIENT: Address = Address::repeat_byte(0xfe);

    fn config(f: u128, p: u128) -> FeeConfiguration {
        FeeConfiguration::new(f, p, RECIPIENT).unwrap()
    }

    #[test]
    fn test_invalid_configurations() {
        assert!(FeeConfiguration::new(BASIS_POINTS, 0, RECIPIENT).is_err());
        assert!(FeeConfiguration::new(30, 31, RECIPIENT).is_err());
        assert!(FeeConfiguration::new(0, 0, RECIPIENT).is_ok());
    }

    #[test]
    fn test_from_settings() {
        let settings = ExchangeSettings::default();
        let fees = FeeConfiguration::from_settings(&settings).unwrap();
        assert_eq!(fees.liquidity_fee_bps(), 30);
        assert_eq!(fees.protocol_fee_bps(), 5);
        assert_eq!(fees.recipient(), &Address::ZERO);
    }

    #[test]
    fn test_no_growth_no_fee() {
        let accrual = FeeAccrual {
            root_k_last: 1_000,
            total_fee_liquidity_minted: 0,
        };
        let reserves = ReserveState::new(1_000, 1_000);
        assert_eq!(
            accrual.pending_fee_liquidity(&config(30, 5), 1_000, &reserves).unwrap(),
            0
        );
    }

    #[test]
    fn test_growth_split_by_protocol_share() {
        // √k grew from 1000 to 1100
        let accrual = FeeAccrual {
            root_k_last: 1_000,
            total_fee_liquidity_minted: 0,
        };
        let reserves = ReserveState::new(1_100, 1_100);

        // one sixth of the fee: 1000·100·5 / (1100·25 + 1000·5) = 15.38
        let sixth = accrual
            .pending_fee_liquidity(&config(30, 5), 1_000, &reserves)
            .unwrap();
        assert_eq!(sixth, 15);

        // the whole fee: recipient ends up with all of the growth
        let whole = accrual
            .pending_fee_liquidity(&config(30, 30), 1_000, &reserves)
            .unwrap();
        assert_eq!(whole, 100);

        let none = accrual
            .pending_fee_liquidity(&config(30, 0), 1_000, &reserves)
            .unwrap();
        assert_eq!(none, 0);
    }

    #[test]
    fn test_settled_refreshes_root_k() {
        let accrual = FeeAccrual::default();
        let next = accrual.settled(7, &ReserveState::new(400, 100)).unwrap();
        assert_eq!(next.root_k_last, 200);
        assert_eq!(next.total_fee_liquidity_minted, 7);
    }
}
