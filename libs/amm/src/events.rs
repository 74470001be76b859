//! Notifications recorded by the exchange after each committed mutation

use serde::{Deserialize, Serialize};

use crate::token::Address;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ExchangeEvent {
    AddLiquidity {
        provider: Address,
        quote_qty: u128,
        base_qty: u128,
    },
    RemoveLiquidity {
        provider: Address,
        quote_qty: u128,
        base_qty: u128,
    },
    Swap {
        trader: Address,
        quote_in: u128,
        base_in: u128,
        quote_out: u128,
        base_out: u128,
    },
}

impl ExchangeEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ExchangeEvent::AddLiquidity { .. } => "AddLiquidity",
            ExchangeEvent::RemoveLiquidity { .. } => "RemoveLiquidity",
            ExchangeEvent::Swap { .. } => "Swap",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_json_shape() {
        let event = ExchangeEvent::Swap {
            trader: Address::repeat_byte(0x11),
            quote_in: 0,
            base_in: 10,
            quote_out: 9,
            base_out: 0,
        };
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "swap");
        assert_eq!(json["trader"], format!("0x{}", "11".repeat(20)));
        assert_eq!(event.name(), "Swap");
    }
}
