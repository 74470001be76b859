//! Exchange Settings Module
//!
//! Loads the settings an exchange is constructed with from a TOML file, with
//! environment variable overrides (`ELASTIC_FEES__LIQUIDITY_FEE_BPS=25`).

use crate::protocol::{self, fees};
use anyhow::{bail, Context, Result};
use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{debug, info};

/// Top-level settings for one exchange instance
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
pub struct ExchangeSettings {
    /// Pair description
    #[serde(default)]
    pub exchange: ExchangeSection,

    /// Fee schedule and recipient
    #[serde(default)]
    pub fees: FeeSettings,
}

/// Pair description, used for logs and reports only
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ExchangeSection {
    pub name: String,
    /// Symbol of the elastic (rebasing) asset
    pub quote_symbol: String,
    /// Symbol of the fixed-supply asset
    pub base_symbol: String,
}

/// Fee schedule
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct FeeSettings {
    /// Total fee charged on swap input, in basis points
    #[serde(default = "default_liquidity_fee_bps")]
    pub liquidity_fee_bps: u32,

    /// Part of `liquidity_fee_bps` owed to the protocol recipient
    #[serde(default = "default_protocol_fee_bps")]
    pub protocol_fee_bps: u32,

    /// Hex encoded recipient address, `0x` prefix optional
    #[serde(default = "default_recipient")]
    pub recipient: String,
}

fn default_liquidity_fee_bps() -> u32 {
    fees::DEFAULT_LIQUIDITY_FEE_BPS
}

fn default_protocol_fee_bps() -> u32 {
    fees::DEFAULT_PROTOCOL_FEE_BPS
}

fn default_recipient() -> String {
    format!("0x{}", "00".repeat(protocol::ADDRESS_LEN))
}

impl Default for ExchangeSection {
    fn default() -> Self {
        Self {
            name: "ELASTIC-POOL".to_string(),
            quote_symbol: "QUOTE".to_string(),
            base_symbol: "BASE".to_string(),
        }
    }
}

impl Default for FeeSettings {
    fn default() -> Self {
        Self {
            liquidity_fee_bps: default_liquidity_fee_bps(),
            protocol_fee_bps: default_protocol_fee_bps(),
            recipient: default_recipient(),
        }
    }
}

impl ExchangeSettings {
    /// Load settings from a TOML file, then apply `ELASTIC_*` overrides
    pub fn load(path: &Path) -> Result<Self> {
        info!("Loading exchange settings from {:?}", path);

        let config = Config::builder()
            .add_source(File::from(path).required(true))
            .add_source(
                Environment::with_prefix(protocol::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .context("Failed to build configuration")?;

        let settings: Self = config
            .try_deserialize()
            .context("Failed to deserialize exchange settings")?;

        settings.validate()?;
        debug!(
            liquidity_fee_bps = settings.fees.liquidity_fee_bps,
            protocol_fee_bps = settings.fees.protocol_fee_bps,
            "Exchange settings loaded"
        );
        Ok(settings)
    }

    /// Parse settings from an in-memory TOML document (no env overrides)
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let settings: Self = toml::from_str(raw).context("Failed to parse exchange settings")?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check fee bounds and the recipient encoding
    pub fn validate(&self) -> Result<()> {
        let fees = &self.fees;
        if u128::from(fees.liquidity_fee_bps) >= protocol::BASIS_POINTS {
            bail!(
                "liquidity_fee_bps must be below {}, got {}",
                protocol::BASIS_POINTS,
                fees.liquidity_fee_bps
            );
        }
        if fees.protocol_fee_bps > fees.liquidity_fee_bps {
            bail!(
                "protocol_fee_bps ({}) cannot exceed liquidity_fee_bps ({})",
                fees.protocol_fee_bps,
                fees.liquidity_fee_bps
            );
        }
        self.recipient_bytes()?;
        Ok(())
    }

    /// Decoded fee recipient
    pub fn recipient_bytes(&self) -> Result<[u8; protocol::ADDRESS_LEN]> {
        let raw = self.fees.recipient.trim();
        let digits = raw.strip_prefix("0x").unwrap_or(raw);
        let bytes = hex::decode(digits)
            .with_context(|| format!("Fee recipient is not valid hex: {}", raw))?;
        bytes.as_slice().try_into().map_err(|_| {
            anyhow::anyhow!(
                "Fee recipient must be {} bytes, got {}",
                protocol::ADDRESS_LEN,
                bytes.len()
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;

    const RECIPIENT: &str = "0x1111111111111111111111111111111111111111";

    #[test]
    fn test_load_settings_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exchange.toml");

        let content = format!(
            r#"
[exchange]
name = "AMPL/USDC"
quote_symbol = "AMPL"
base_symbol = "USDC"

[fees]
liquidity_fee_bps = 25
protocol_fee_bps = 4
recipient = "{}"
"#,
            RECIPIENT
        );
        fs::write(&path, content).unwrap();

        let settings = ExchangeSettings::load(&path).unwrap();
        assert_eq!(settings.exchange.quote_symbol, "AMPL");
        assert_eq!(settings.fees.liquidity_fee_bps, 25);
        assert_eq!(settings.fees.protocol_fee_bps, 4);
        assert_eq!(settings.recipient_bytes().unwrap(), [0x11; 20]);
    }

    #[test]
    fn test_missing_fee_fields_use_defaults() {
        let settings = ExchangeSettings::from_toml_str(
            r#"
[exchange]
name = "X/Y"
quote_symbol = "X"
base_symbol = "Y"
"#,
        )
        .unwrap();

        assert_eq!(settings.fees.liquidity_fee_bps, fees::DEFAULT_LIQUIDITY_FEE_BPS);
        assert_eq!(settings.fees.protocol_fee_bps, fees::DEFAULT_PROTOCOL_FEE_BPS);
        assert_eq!(settings.recipient_bytes().unwrap(), [0u8; 20]);
    }

    #[test]
    fn test_protocol_fee_above_total_rejected() {
        let err = ExchangeSettings::from_toml_str(
            r#"
[fees]
liquidity_fee_bps = 10
protocol_fee_bps = 11
"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("cannot exceed"));
    }

    #[test]
    fn test_fee_of_full_basis_points_rejected() {
        let mut settings = ExchangeSettings::default();
        settings.fees.liquidity_fee_bps = protocol::BASIS_POINTS as u32;
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_bad_recipient_rejected() {
        let mut settings = ExchangeSettings::default();
        settings.fees.recipient = "0x1234".to_string();
        assert!(settings.validate().is_err());

        settings.fees.recipient = "not-hex".to_string();
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_environment_override() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("exchange.toml");
        fs::write(&path, "[fees]\nprotocol_fee_bps = 0\n").unwrap();

        std::env::set_var("ELASTIC_EXCHANGE__NAME", "FROM-ENV");
        let settings = ExchangeSettings::load(&path);
        std::env::remove_var("ELASTIC_EXCHANGE__NAME");

        let settings = settings.unwrap();
        assert_eq!(settings.exchange.name, "FROM-ENV");
        assert_eq!(settings.fees.protocol_fee_bps, 0);
    }
}
