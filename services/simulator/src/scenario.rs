//! Scenario files and the runner that replays them
//!
//! A scenario names its accounts and lists steps; each step is one ledger
//! action (mint, approve, rebase), a clock advance, or one exchange
//! operation. Quantities may be written as TOML integers or, when they do
//! not fit in 64 bits, as decimal strings.

use anyhow::{anyhow, bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, info};

use elastic_amm::{
    Address, AmmError, Clock, Decay, Exchange, ExchangeEvent, ExternalBalances, FeeAccrual,
    InMemoryTokenLedger, ManualClock, ReserveState,
};
use elastic_config::ExchangeSettings;

pub type SimExchange = Exchange<InMemoryTokenLedger, InMemoryTokenLedger, ManualClock>;

const DEFAULT_START_TIME: u64 = 1_700_000_000;
const DEFAULT_DEADLINE_SECS: u64 = 300;

/// Token quantity accepted as an integer or a decimal string
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(try_from = "RawQty")]
pub struct Qty(pub u128);

#[derive(Deserialize)]
#[serde(untagged)]
enum RawQty {
    Int(u64),
    Text(String),
}

impl TryFrom<RawQty> for Qty {
    type Error = String;

    fn try_from(raw: RawQty) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawQty::Int(value) => Ok(Qty(u128::from(value))),
            RawQty::Text(text) => text
                .replace('_', "")
                .parse::<u128>()
                .map(Qty)
                .map_err(|e| format!("invalid quantity {:?}: {}", text, e)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenSide {
    Quote,
    Base,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum Action {
    Mint {
        token: TokenSide,
        account: String,
        qty: Qty,
    },
    /// Allow the exchange to pull `qty` from `account`
    Approve {
        token: TokenSide,
        account: String,
        qty: Qty,
    },
    /// Rescale every quote balance by `numerator / denominator`
    Rebase {
        numerator: Qty,
        denominator: Qty,
    },
    AdvanceClock {
        seconds: u64,
    },
    AddLiquidity {
        account: String,
        quote_desired: Qty,
        base_desired: Qty,
        quote_min: Qty,
        base_min: Qty,
        to: Option<String>,
        deadline: Option<u64>,
    },
    AddBaseTokenLiquidity {
        account: String,
        base_desired: Qty,
        base_min: Qty,
        to: Option<String>,
        deadline: Option<u64>,
    },
    AddQuoteTokenLiquidity {
        account: String,
        quote_desired: Qty,
        quote_min: Qty,
        to: Option<String>,
        deadline: Option<u64>,
    },
    RemoveLiquidity {
        account: String,
        liquidity: Qty,
        quote_min: Qty,
        base_min: Qty,
        to: Option<String>,
        deadline: Option<u64>,
    },
    SwapBaseForQuote {
        account: String,
        base_in: Qty,
        quote_out_min: Qty,
        deadline: Option<u64>,
    },
    SwapQuoteForBase {
        account: String,
        quote_in: Qty,
        base_out_min: Qty,
        deadline: Option<u64>,
    },
    SetFeeRecipient {
        account: String,
    },
}

impl Action {
    pub fn name(&self) -> &'static str {
        match self {
            Action::Mint { .. } => "mint",
            Action::Approve { .. } => "approve",
            Action::Rebase { .. } => "rebase",
            Action::AdvanceClock { .. } => "advance_clock",
            Action::AddLiquidity { .. } => "add_liquidity",
            Action::AddBaseTokenLiquidity { .. } => "add_base_token_liquidity",
            Action::AddQuoteTokenLiquidity { .. } => "add_quote_token_liquidity",
            Action::RemoveLiquidity { .. } => "remove_liquidity",
            Action::SwapBaseForQuote { .. } => "swap_base_for_quote",
            Action::SwapQuoteForBase { .. } => "swap_quote_for_base",
            Action::SetFeeRecipient { .. } => "set_fee_recipient",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Step {
    #[serde(flatten)]
    pub action: Action,
    /// Tag the step must fail with, e.g. `"INSUFFICIENT_DECAY"`
    #[serde(default)]
    pub expect_error: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Scenario {
    #[serde(default)]
    pub name: String,
    #[serde(default = "default_start_time")]
    pub start_time: u64,
    #[serde(default = "default_exchange_address")]
    pub exchange_address: Address,
    pub accounts: BTreeMap<String, Address>,
    #[serde(default, rename = "step")]
    pub steps: Vec<Step>,
}

fn default_start_time() -> u64 {
    DEFAULT_START_TIME
}

fn default_exchange_address() -> Address {
    Address::repeat_byte(0xee)
}

impl Scenario {
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario {}", path.display()))?;
        Self::from_toml_str(&raw).with_context(|| format!("Invalid scenario {}", path.display()))
    }

    pub fn from_toml_str(raw: &str) -> Result<Self> {
        toml::from_str(raw).context("Failed to parse scenario")
    }
}

#[derive(Debug, Serialize)]
pub struct StepOutcome {
    pub index: usize,
    pub action: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<&'static str>,
}

#[derive(Debug, Serialize)]
pub struct FinalState {
    pub reserves: ReserveState,
    pub external: ExternalBalances,
    pub decay: Decay,
    pub total_supply: u128,
    pub liquidity: BTreeMap<String, u128>,
    pub fee_accrual: FeeAccrual,
}

#[derive(Debug, Serialize)]
pub struct Report {
    pub scenario: String,
    pub exchange: String,
    pub steps: Vec<StepOutcome>,
    pub events: Vec<ExchangeEvent>,
    pub final_state: FinalState,
}

/// Replay `scenario` against a fresh exchange built from `settings`
pub fn run(scenario: &Scenario, settings: &ExchangeSettings) -> Result<Report> {
    let clock = ManualClock::new(scenario.start_time);
    let mut exchange = SimExchange::from_settings(
        scenario.exchange_address,
        InMemoryTokenLedger::new(settings.exchange.quote_symbol.clone()),
        InMemoryTokenLedger::new(settings.exchange.base_symbol.clone()),
        settings,
        clock.clone(),
    )
    .map_err(|e| anyhow!("invalid exchange settings: {}", e))?;

    info!(
        scenario = %scenario.name,
        exchange = %settings.exchange.name,
        steps = scenario.steps.len(),
        "Running scenario"
    );

    let mut steps = Vec::with_capacity(scenario.steps.len());
    let mut events = Vec::new();
    for (index, step) in scenario.steps.iter().enumerate() {
        debug!(index, action = step.action.name(), "step");
        let outcome = apply(scenario, &mut exchange, &clock, &step.action)
            .with_context(|| format!("step {} ({})", index, step.action.name()))?;

        let entry = match (outcome, &step.expect_error) {
            (Ok(result), None) => StepOutcome {
                index,
                action: step.action.name(),
                result,
                rejected: None,
            },
            (Err(err), Some(expected)) if err.tag() == expected.as_str() => StepOutcome {
                index,
                action: step.action.name(),
                result: None,
                rejected: Some(err.tag()),
            },
            (Err(err), expected) => bail!(
                "step {} ({}) failed with {} (expected {:?})",
                index,
                step.action.name(),
                err,
                expected
            ),
            (Ok(_), Some(expected)) => bail!(
                "step {} ({}) succeeded but was expected to fail with {}",
                index,
                step.action.name(),
                expected
            ),
        };
        steps.push(entry);
        events.extend(exchange.take_events());
    }

    let names: BTreeMap<Address, &String> = scenario
        .accounts
        .iter()
        .map(|(name, address)| (*address, name))
        .collect();
    let liquidity = exchange
        .liquidity_ledger()
        .holders()
        .map(|(holder, qty)| {
            let label = names
                .get(holder)
                .map(|name| name.to_string())
                .unwrap_or_else(|| holder.to_string());
            (label, *qty)
        })
        .collect();

    let final_state = FinalState {
        reserves: exchange.internal_balances(),
        external: exchange.external_balances(),
        decay: exchange.decay().map_err(|e| anyhow!("decay: {}", e))?,
        total_supply: exchange.total_supply(),
        liquidity,
        fee_accrual: *exchange.fee_accrual(),
    };

    Ok(Report {
        scenario: scenario.name.clone(),
        exchange: settings.exchange.name.clone(),
        steps,
        events,
        final_state,
    })
}

/// Run one action. The outer error is a broken scenario, the inner one an
/// exchange rejection.
fn apply(
    scenario: &Scenario,
    exchange: &mut SimExchange,
    clock: &ManualClock,
    action: &Action,
) -> Result<std::result::Result<Option<String>, AmmError>> {
    let account = |name: &str| -> Result<Address> {
        scenario
            .accounts
            .get(name)
            .copied()
            .ok_or_else(|| anyhow!("unknown account {:?}", name))
    };
    let recipient = |to: &Option<String>, fallback: Address| -> Result<Address> {
        match to {
            Some(name) => account(name),
            None => Ok(fallback),
        }
    };
    let deadline = |requested: &Option<u64>| {
        requested.unwrap_or_else(|| clock.now().saturating_add(DEFAULT_DEADLINE_SECS))
    };
    let spender = scenario.exchange_address;

    let outcome = match action {
        Action::Mint { token, account: name, qty } => {
            let owner = account(name)?;
            match token {
                TokenSide::Quote => exchange.quote_token_mut().mint(&owner, qty.0),
                TokenSide::Base => exchange.base_token_mut().mint(&owner, qty.0),
            }
            .map_err(AmmError::from)
            .map(|_| None)
        }
        Action::Approve { token, account: name, qty } => {
            let owner = account(name)?;
            match token {
                TokenSide::Quote => exchange.quote_token_mut().approve(&owner, &spender, qty.0),
                TokenSide::Base => exchange.base_token_mut().approve(&owner, &spender, qty.0),
            }
            Ok(None)
        }
        Action::Rebase {
            numerator,
            denominator,
        } => exchange
            .quote_token_mut()
            .rebase(numerator.0, denominator.0)
            .map_err(AmmError::from)
            .map(|_| None),
        Action::AdvanceClock { seconds } => {
            clock.advance(*seconds);
            Ok(None)
        }
        Action::AddLiquidity {
            account: name,
            quote_desired,
            base_desired,
            quote_min,
            base_min,
            to,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .add_liquidity(
                    &caller,
                    quote_desired.0,
                    base_desired.0,
                    quote_min.0,
                    base_min.0,
                    &recipient(to, caller)?,
                    deadline(expiration),
                )
                .map(|minted| Some(minted.to_string()))
        }
        Action::AddBaseTokenLiquidity {
            account: name,
            base_desired,
            base_min,
            to,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .add_base_token_liquidity(
                    &caller,
                    base_desired.0,
                    base_min.0,
                    &recipient(to, caller)?,
                    deadline(expiration),
                )
                .map(|minted| Some(minted.to_string()))
        }
        Action::AddQuoteTokenLiquidity {
            account: name,
            quote_desired,
            quote_min,
            to,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .add_quote_token_liquidity(
                    &caller,
                    quote_desired.0,
                    quote_min.0,
                    &recipient(to, caller)?,
                    deadline(expiration),
                )
                .map(|minted| Some(minted.to_string()))
        }
        Action::RemoveLiquidity {
            account: name,
            liquidity,
            quote_min,
            base_min,
            to,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .remove_liquidity(
                    &caller,
                    liquidity.0,
                    quote_min.0,
                    base_min.0,
                    &recipient(to, caller)?,
                    deadline(expiration),
                )
                .map(|(quote, base)| Some(format!("{} quote, {} base", quote, base)))
        }
        Action::SwapBaseForQuote {
            account: name,
            base_in,
            quote_out_min,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .swap_base_token_for_quote_token(
                    &caller,
                    base_in.0,
                    quote_out_min.0,
                    deadline(expiration),
                )
                .map(|out| Some(out.to_string()))
        }
        Action::SwapQuoteForBase {
            account: name,
            quote_in,
            base_out_min,
            deadline: expiration,
        } => {
            let caller = account(name)?;
            exchange
                .swap_quote_token_for_base_token(
                    &caller,
                    quote_in.0,
                    base_out_min.0,
                    deadline(expiration),
                )
                .map(|out| Some(out.to_string()))
        }
        Action::SetFeeRecipient { account: name } => {
            exchange.set_fee_recipient(account(name)?);
            Ok(None)
        }
    };
    Ok(outcome)
}
