//! # Elastic AMM - Rebase-Aware Constant Product Exchange
//!
//! ## Purpose
//!
//! Two-asset constant-product market maker where the quote asset has an
//! elastic supply: its balances are rescaled by rebases that happen outside
//! the exchange. Pricing runs on an internally tracked reserve ledger, and
//! the gap between that ledger and the exchange's live quote balance
//! ("decay") is measured on demand and resolved by single-asset liquidity
//! entry.
//!
//! ## Integration Points
//!
//! - **Token ledgers**: any [`TokenLedger`] implementation; [`InMemoryTokenLedger`]
//!   ships with proportional rebasing for tests and simulation
//! - **Time**: deadlines are checked against an injected [`Clock`]
//! - **Configuration**: fee schedule from `elastic_config::ExchangeSettings`
//! - **Notifications**: [`ExchangeEvent`]s recorded per committed operation
//!
//! ## Architecture Role
//!
//! ```text
//! math ─► pricing ─┐
//!   │              ├─► liquidity (pure plans) ─► exchange (commit, transfers, events)
//!   └─► decay ─────┘          ▲
//!          reserves ──────────┘   fees / lp_token
//! ```
//!
//! All quantities are `u128` base units; ratios are WAD-scaled (1e18) and
//! intermediates are widened to 256 bits. Every rounding step favours the
//! pool.

pub mod clock;
pub mod decay;
pub mod error;
pub mod events;
pub mod exchange;
pub mod fees;
pub mod liquidity;
pub mod lp_token;
pub mod math;
pub mod pricing;
pub mod reserves;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use decay::Decay;
pub use error::{AmmError, Result};
pub use events::ExchangeEvent;
pub use exchange::Exchange;
pub use fees::{FeeAccrual, FeeConfiguration};
pub use liquidity::{IssuancePlan, PoolSnapshot, RemovalPlan};
pub use lp_token::LiquidityTokenLedger;
pub use pricing::SwapQuote;
pub use reserves::{ExternalBalances, ReserveState};
pub use token::{Address, InMemoryTokenLedger, TokenError, TokenLedger};
