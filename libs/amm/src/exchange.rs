//! Exchange facade
//!
//! One [`Exchange`] owns the reserve ledger, the liquidity token ledger and
//! the fee accrual entry of a single quote/base pair. Every public operation
//! follows the same transaction shape:
//!
//! 1. deadline check against the injected [`Clock`];
//! 2. quantity sanity;
//! 3. one snapshot of reserves and external balances, then a pure plan;
//! 4. liquidity ledger changes prepared on a copy;
//! 5. every pull checked against the payer's balance and allowance, then
//!    token transfers applied in order and reverted in reverse on failure;
//! 6. commit of reserves, liquidity ledger, fee accrual and the event.
//!
//! Nothing is written to exchange state before step 6, so a rejected
//! operation leaves the exchange exactly as it found it.

use tracing::{debug, error, info, warn};

use elastic_config::ExchangeSettings;

use crate::clock::{Clock, SystemClock};
use crate::decay::Decay;
use crate::error::{AmmError, Result};
use crate::events::ExchangeEvent;
use crate::fees::{FeeAccrual, FeeConfiguration};
use crate::liquidity::{self, IssuancePlan, PoolSnapshot};
use crate::lp_token::LiquidityTokenLedger;
use crate::math;
use crate::pricing::{self, SwapQuote};
use crate::reserves::{ExternalBalances, ReserveState};
use crate::token::{Address, TokenError, TokenLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Leg {
    Quote,
    Base,
}

/// A single token movement staged by an operation
#[derive(Debug, Clone, Copy)]
enum Transfer {
    /// Into the exchange, drawn on the allowance `from` granted it
    Pull { leg: Leg, from: Address, qty: u128 },
    /// Out of the exchange
    Push { leg: Leg, to: Address, qty: u128 },
}

/// Elastic-supply constant-product exchange for one quote/base pair
#[derive(Debug)]
pub struct Exchange<Q, B, C = SystemClock> {
    address: Address,
    quote_token: Q,
    base_token: B,
    clock: C,
    reserves: ReserveState,
    liquidity: LiquidityTokenLedger,
    fees: FeeConfiguration,
    fee_accrual: FeeAccrual,
    events: Vec<ExchangeEvent>,
}

impl<Q: TokenLedger, B: TokenLedger> Exchange<Q, B, SystemClock> {
    pub fn with_system_clock(
        address: Address,
        quote_token: Q,
        base_token: B,
        fees: FeeConfiguration,
    ) -> Self {
        Self::new(address, quote_token, base_token, fees, SystemClock)
    }
}

impl<Q: TokenLedger, B: TokenLedger, C: Clock> Exchange<Q, B, C> {
    /// Create an empty exchange; `address` is the account holding its tokens
    pub fn new(
        address: Address,
        quote_token: Q,
        base_token: B,
        fees: FeeConfiguration,
        clock: C,
    ) -> Self {
        info!(
            exchange = %address,
            liquidity_fee_bps = %fees.liquidity_fee_bps(),
            protocol_fee_bps = %fees.protocol_fee_bps(),
            "exchange created"
        );
        Self {
            address,
            quote_token,
            base_token,
            clock,
            reserves: ReserveState::default(),
            liquidity: LiquidityTokenLedger::new(),
            fees,
            fee_accrual: FeeAccrual::default(),
            events: Vec::new(),
        }
    }

    /// Create an exchange with the fee schedule from loaded settings
    pub fn from_settings(
        address: Address,
        quote_token: Q,
        base_token: B,
        settings: &ExchangeSettings,
        clock: C,
    ) -> Result<Self> {
        let fees = FeeConfiguration::from_settings(settings)?;
        Ok(Self::new(address, quote_token, base_token, fees, clock))
    }

    // ---------------------------------------------------------------------
    // Liquidity entry
    // ---------------------------------------------------------------------

    /// Deposit both assets; routes through decay absorption first when the
    /// pool carries resolvable decay. Returns the liquidity minted to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn add_liquidity(
        &mut self,
        caller: &Address,
        quote_qty_desired: u128,
        base_qty_desired: u128,
        quote_qty_min: u128,
        base_qty_min: u128,
        to: &Address,
        expiration: u64,
    ) -> Result<u128> {
        self.issue("add_liquidity", caller, to, expiration, |snapshot| {
            liquidity::plan_add_liquidity(
                snapshot,
                quote_qty_desired,
                base_qty_desired,
                quote_qty_min,
                base_qty_min,
            )
        })
    }

    /// Deposit base only, pairing it with quote surplus left by a positive rebase
    pub fn add_base_token_liquidity(
        &mut self,
        caller: &Address,
        base_qty_desired: u128,
        base_qty_min: u128,
        to: &Address,
        expiration: u64,
    ) -> Result<u128> {
        self.issue("add_base_token_liquidity", caller, to, expiration, |snapshot| {
            if base_qty_desired == 0 {
                return Err(AmmError::InsufficientQtyDesired);
            }
            liquidity::plan_add_base_token_liquidity(snapshot, base_qty_desired, base_qty_min)
        })
    }

    /// Deposit quote only, covering the deficit left by a negative rebase
    pub fn add_quote_token_liquidity(
        &mut self,
        caller: &Address,
        quote_qty_desired: u128,
        quote_qty_min: u128,
        to: &Address,
        expiration: u64,
    ) -> Result<u128> {
        self.issue("add_quote_token_liquidity", caller, to, expiration, |snapshot| {
            if quote_qty_desired == 0 {
                return Err(AmmError::InsufficientQtyDesired);
            }
            liquidity::plan_add_quote_token_liquidity(snapshot, quote_qty_desired, quote_qty_min)
        })
    }

    // ---------------------------------------------------------------------
    // Liquidity exit
    // ---------------------------------------------------------------------

    /// Burn `liquidity_qty` of the caller's claims and pay the proportional
    /// share of the exchange's live balances to `to`.
    #[allow(clippy::too_many_arguments)]
    pub fn remove_liquidity(
        &mut self,
        caller: &Address,
        liquidity_qty: u128,
        quote_qty_min: u128,
        base_qty_min: u128,
        to: &Address,
        expiration: u64,
    ) -> Result<(u128, u128)> {
        let result = self.try_remove_liquidity(
            caller,
            liquidity_qty,
            quote_qty_min,
            base_qty_min,
            to,
            expiration,
        );
        result.map_err(|err| rejected("remove_liquidity", caller, err))
    }

    fn try_remove_liquidity(
        &mut self,
        caller: &Address,
        liquidity_qty: u128,
        quote_qty_min: u128,
        base_qty_min: u128,
        to: &Address,
        expiration: u64,
    ) -> Result<(u128, u128)> {
        self.ensure_not_expired(expiration)?;
        if quote_qty_min == 0 || base_qty_min == 0 {
            return Err(AmmError::MinsMustBeGreaterThanZero);
        }

        let (snapshot, fee_liquidity) = self.liquidity_snapshot()?;
        let plan = liquidity::plan_remove_liquidity(
            &snapshot,
            self.liquidity.balance_of(caller),
            liquidity_qty,
            quote_qty_min,
            base_qty_min,
        )?;

        let mut next_liquidity = self.liquidity.clone();
        next_liquidity.mint(self.fees.recipient(), fee_liquidity)?;
        next_liquidity.burn(caller, liquidity_qty)?;
        let next_accrual = self.fee_accrual.settled(fee_liquidity, &plan.reserves_after)?;

        self.execute_transfers(&[
            Transfer::Push {
                leg: Leg::Quote,
                to: *to,
                qty: plan.quote_qty,
            },
            Transfer::Push {
                leg: Leg::Base,
                to: *to,
                qty: plan.base_qty,
            },
        ])?;

        self.reserves = plan.reserves_after;
        self.liquidity = next_liquidity;
        self.fee_accrual = next_accrual;
        self.record(ExchangeEvent::RemoveLiquidity {
            provider: *caller,
            quote_qty: plan.quote_qty,
            base_qty: plan.base_qty,
        });

        info!(
            provider = %caller,
            to = %to,
            liquidity_qty = %liquidity_qty,
            quote_qty = %plan.quote_qty,
            base_qty = %plan.base_qty,
            fee_liquidity = %fee_liquidity,
            "liquidity removed"
        );
        Ok((plan.quote_qty, plan.base_qty))
    }

    // ---------------------------------------------------------------------
    // Swaps
    // ---------------------------------------------------------------------

    /// Sell exactly `base_qty_in` base for at least `quote_qty_out_min` quote
    pub fn swap_base_token_for_quote_token(
        &mut self,
        caller: &Address,
        base_qty_in: u128,
        quote_qty_out_min: u128,
        expiration: u64,
    ) -> Result<u128> {
        let result = self.try_swap(caller, Leg::Base, base_qty_in, quote_qty_out_min, expiration);
        result.map_err(|err| rejected("swap_base_token_for_quote_token", caller, err))
    }

    /// Sell exactly `quote_qty_in` quote for at least `base_qty_out_min` base
    pub fn swap_quote_token_for_base_token(
        &mut self,
        caller: &Address,
        quote_qty_in: u128,
        base_qty_out_min: u128,
        expiration: u64,
    ) -> Result<u128> {
        let result = self.try_swap(caller, Leg::Quote, quote_qty_in, base_qty_out_min, expiration);
        result.map_err(|err| rejected("swap_quote_token_for_base_token", caller, err))
    }

    fn try_swap(
        &mut self,
        caller: &Address,
        input: Leg,
        qty_in: u128,
        qty_out_min: u128,
        expiration: u64,
    ) -> Result<u128> {
        self.ensure_not_expired(expiration)?;
        if qty_in == 0 || qty_out_min == 0 {
            return Err(AmmError::InsufficientTokenQty);
        }

        let fee_bps = self.fees.liquidity_fee_bps();
        let (output, short_output) = match input {
            Leg::Base => (Leg::Quote, AmmError::InsufficientQuoteTokenQty),
            Leg::Quote => (Leg::Base, AmmError::InsufficientBaseTokenQty),
        };
        let reserves = &self.reserves;
        let quoted: Result<SwapQuote> = match input {
            Leg::Base => pricing::quote_base_token_for_quote_token(reserves, qty_in, fee_bps),
            Leg::Quote => pricing::quote_quote_token_for_base_token(reserves, qty_in, fee_bps),
        };
        let quote = quoted.map_err(|err| match err {
            AmmError::InsufficientOutputReserve => short_output.clone(),
            other => other,
        })?;

        if quote.output_qty < qty_out_min {
            return Err(short_output);
        }
        // the curve may promise more than a rebased balance still holds
        let available = self.ledger(output).balance_of(&self.address);
        if quote.output_qty > available {
            debug!(
                output_qty = %quote.output_qty,
                available = %available,
                "swap output exceeds external balance"
            );
            return Err(short_output);
        }

        self.execute_transfers(&[
            Transfer::Pull {
                leg: input,
                from: *caller,
                qty: qty_in,
            },
            Transfer::Push {
                leg: output,
                to: *caller,
                qty: quote.output_qty,
            },
        ])?;

        self.reserves = quote.reserves_after;
        let event = match input {
            Leg::Base => ExchangeEvent::Swap {
                trader: *caller,
                quote_in: 0,
                base_in: qty_in,
                quote_out: quote.output_qty,
                base_out: 0,
            },
            Leg::Quote => ExchangeEvent::Swap {
                trader: *caller,
                quote_in: qty_in,
                base_in: 0,
                quote_out: 0,
                base_out: quote.output_qty,
            },
        };
        self.record(event);

        info!(
            trader = %caller,
            input = ?input,
            qty_in = %qty_in,
            qty_out = %quote.output_qty,
            quote_reserve = %self.reserves.quote_reserve_qty,
            base_reserve = %self.reserves.base_reserve_qty,
            "swap executed"
        );
        Ok(quote.output_qty)
    }

    // ---------------------------------------------------------------------
    // Reads and administration
    // ---------------------------------------------------------------------

    pub fn address(&self) -> &Address {
        &self.address
    }

    /// The internal reserve ledger, the only input to pricing
    pub fn internal_balances(&self) -> ReserveState {
        self.reserves
    }

    /// The exchange's live balances on both token ledgers
    pub fn external_balances(&self) -> ExternalBalances {
        ExternalBalances {
            quote_balance: self.quote_token.balance_of(&self.address),
            base_balance: self.base_token.balance_of(&self.address),
        }
    }

    pub fn decay(&self) -> Result<Decay> {
        Decay::detect(&self.reserves, self.quote_token.balance_of(&self.address))
    }

    pub fn liquidity_balance_of(&self, holder: &Address) -> u128 {
        self.liquidity.balance_of(holder)
    }

    pub fn total_supply(&self) -> u128 {
        self.liquidity.total_supply()
    }

    pub fn liquidity_ledger(&self) -> &LiquidityTokenLedger {
        &self.liquidity
    }

    pub fn fee_configuration(&self) -> &FeeConfiguration {
        &self.fees
    }

    pub fn fee_accrual(&self) -> &FeeAccrual {
        &self.fee_accrual
    }

    /// Protocol fee liquidity that the next liquidity event would mint
    pub fn pending_fee_liquidity(&self) -> Result<u128> {
        self.fee_accrual
            .pending_fee_liquidity(&self.fees, self.liquidity.total_supply(), &self.reserves)
    }

    pub fn set_fee_recipient(&mut self, recipient: Address) {
        info!(
            previous = %self.fees.recipient(),
            recipient = %recipient,
            "fee recipient updated"
        );
        self.fees.set_recipient(recipient);
    }

    pub fn quote_token(&self) -> &Q {
        &self.quote_token
    }

    /// Direct access to the quote ledger, e.g. to rebase it
    pub fn quote_token_mut(&mut self) -> &mut Q {
        &mut self.quote_token
    }

    pub fn base_token(&self) -> &B {
        &self.base_token
    }

    pub fn base_token_mut(&mut self) -> &mut B {
        &mut self.base_token
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn events(&self) -> &[ExchangeEvent] {
        &self.events
    }

    /// Drain the recorded events
    pub fn take_events(&mut self) -> Vec<ExchangeEvent> {
        std::mem::take(&mut self.events)
    }

    // ---------------------------------------------------------------------
    // Internals
    // ---------------------------------------------------------------------

    fn issue<F>(
        &mut self,
        operation: &'static str,
        caller: &Address,
        to: &Address,
        expiration: u64,
        plan: F,
    ) -> Result<u128>
    where
        F: FnOnce(&PoolSnapshot) -> Result<IssuancePlan>,
    {
        self.try_issue(caller, to, expiration, plan)
            .map_err(|err| rejected(operation, caller, err))
    }

    fn try_issue<F>(
        &mut self,
        caller: &Address,
        to: &Address,
        expiration: u64,
        plan: F,
    ) -> Result<u128>
    where
        F: FnOnce(&PoolSnapshot) -> Result<IssuancePlan>,
    {
        self.ensure_not_expired(expiration)?;

        let (snapshot, fee_liquidity) = self.liquidity_snapshot()?;
        debug!(
            quote_reserve = %snapshot.reserves.quote_reserve_qty,
            base_reserve = %snapshot.reserves.base_reserve_qty,
            quote_balance = %snapshot.external.quote_balance,
            total_supply = %snapshot.total_supply,
            "liquidity snapshot"
        );
        let plan = plan(&snapshot)?;

        let mut next_liquidity = self.liquidity.clone();
        next_liquidity.mint(self.fees.recipient(), fee_liquidity)?;
        next_liquidity.mint(to, plan.liquidity_qty)?;
        let next_accrual = self.fee_accrual.settled(fee_liquidity, &plan.reserves_after)?;

        self.execute_transfers(&[
            Transfer::Pull {
                leg: Leg::Quote,
                from: *caller,
                qty: plan.quote_qty,
            },
            Transfer::Pull {
                leg: Leg::Base,
                from: *caller,
                qty: plan.base_qty,
            },
        ])?;

        self.reserves = plan.reserves_after;
        self.liquidity = next_liquidity;
        self.fee_accrual = next_accrual;
        self.record(ExchangeEvent::AddLiquidity {
            provider: *caller,
            quote_qty: plan.quote_qty,
            base_qty: plan.base_qty,
        });

        if plan.liquidity_qty == 0 {
            warn!(provider = %caller, "contribution too small to mint liquidity");
        }
        info!(
            provider = %caller,
            to = %to,
            quote_qty = %plan.quote_qty,
            base_qty = %plan.base_qty,
            minted = %plan.liquidity_qty,
            fee_liquidity = %fee_liquidity,
            "liquidity added"
        );
        Ok(plan.liquidity_qty)
    }

    fn ensure_not_expired(&self, expiration: u64) -> Result<()> {
        let now = self.clock.now();
        if now > expiration {
            return Err(AmmError::Expired);
        }
        Ok(())
    }

    /// Snapshot for issuance and removal, with pending fee liquidity folded
    /// into the supply
    fn liquidity_snapshot(&self) -> Result<(PoolSnapshot, u128)> {
        let supply = self.liquidity.total_supply();
        let fee_liquidity = self.pending_fee_liquidity()?;
        let snapshot = PoolSnapshot {
            reserves: self.reserves,
            external: self.external_balances(),
            total_supply: math::checked_add(supply, fee_liquidity)?,
        };
        Ok((snapshot, fee_liquidity))
    }

    fn ledger(&self, leg: Leg) -> &dyn TokenLedger {
        match leg {
            Leg::Quote => &self.quote_token,
            Leg::Base => &self.base_token,
        }
    }

    fn ledger_mut(&mut self, leg: Leg) -> &mut dyn TokenLedger {
        match leg {
            Leg::Quote => &mut self.quote_token,
            Leg::Base => &mut self.base_token,
        }
    }

    /// Apply transfers in order; on failure revert the applied ones in
    /// reverse and return the failure.
    fn execute_transfers(&mut self, transfers: &[Transfer]) -> Result<()> {
        self.check_pulls(transfers)?;
        for (applied, transfer) in transfers.iter().enumerate() {
            if let Err(err) = self.apply(transfer) {
                warn!(transfer = ?transfer, error = %err, "transfer failed, rolling back");
                for done in transfers[..applied].iter().rev() {
                    if let Err(revert_err) = self.revert(done) {
                        error!(transfer = ?done, error = %revert_err, "rollback transfer failed");
                    }
                }
                return Err(err);
            }
        }
        Ok(())
    }

    /// Reject before any token moves when a pull would fail. A reverted
    /// pull gives the balance back but not the allowance it consumed.
    fn check_pulls(&self, transfers: &[Transfer]) -> Result<()> {
        for transfer in transfers {
            let Transfer::Pull { leg, from, qty } = *transfer else {
                continue;
            };
            if qty == 0 {
                continue;
            }
            let ledger = self.ledger(leg);
            let allowance = ledger.allowance(&from, &self.address);
            if allowance < qty {
                return Err(TokenError::InsufficientAllowance {
                    required: qty,
                    available: allowance,
                }
                .into());
            }
            let balance = ledger.balance_of(&from);
            if balance < qty {
                return Err(TokenError::InsufficientBalance {
                    required: qty,
                    available: balance,
                }
                .into());
            }
        }
        Ok(())
    }

    fn apply(&mut self, transfer: &Transfer) -> Result<()> {
        let exchange = self.address;
        match *transfer {
            Transfer::Pull { qty: 0, .. } | Transfer::Push { qty: 0, .. } => Ok(()),
            Transfer::Pull { leg, from, qty } => {
                Ok(self.ledger_mut(leg).transfer_from(&exchange, &from, &exchange, qty)?)
            }
            Transfer::Push { leg, to, qty } => {
                Ok(self.ledger_mut(leg).transfer(&exchange, &to, qty)?)
            }
        }
    }

    fn revert(&mut self, transfer: &Transfer) -> Result<()> {
        let exchange = self.address;
        match *transfer {
            Transfer::Pull { qty: 0, .. } | Transfer::Push { qty: 0, .. } => Ok(()),
            Transfer::Pull { leg, from, qty } => {
                Ok(self.ledger_mut(leg).transfer(&exchange, &from, qty)?)
            }
            Transfer::Push { leg, to, qty } => {
                Ok(self.ledger_mut(leg).transfer(&to, &exchange, qty)?)
            }
        }
    }

    fn record(&mut self, event: ExchangeEvent) {
        debug!(event = event.name(), "event recorded");
        self.events.push(event);
    }
}

fn rejected(operation: &'static str, caller: &Address, err: AmmError) -> AmmError {
    warn!(operation, caller = %caller, reason = err.tag(), "operation rejected");
    err
}
