//! # Elastic Exchange Configuration
//!
//! Constants and configuration loading shared by the exchange engine and the
//! simulation host.
//!
//! ## Features
//!
//! - **Protocol Constants**: basis-point and fixed-point scales, default fees
//! - **Exchange Settings**: TOML settings with `ELASTIC_*` environment overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use elastic_config::{protocol, ExchangeSettings};
//!
//! let settings = ExchangeSettings::load(std::path::Path::new("config/exchange.toml"))?;
//! assert!(u128::from(settings.fees.liquidity_fee_bps) < protocol::BASIS_POINTS);
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod exchange_settings;
pub mod protocol;

pub use exchange_settings::{ExchangeSection, ExchangeSettings, FeeSettings};
