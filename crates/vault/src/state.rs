//! Vault state
//!
//! Everything the orchestrator owns. Each component (registry, planner,
//! rebalance, harvest, emergency, accounting, shares) adds its operations
//! as an `impl VaultState` block in its own module; the [`Vault`](crate::Vault)
//! facade takes the guard and lock, checks roles, then calls into here.

use keel_core::{AccountId, Amount, PerformanceMetrics, Timestamp, VaultConfig, reported_amount};
use keel_ports::{StrategyError, StrategyResult};
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::access::AccessControl;
use crate::emergency::EmergencyStatus;
use crate::journal::{Journal, VaultEvent};
use crate::pool::LiquidPool;
use crate::registry::StrategyRegistry;
use crate::shares::ShareLedger;

pub(crate) struct VaultState {
    pub config: VaultConfig,
    pub access: AccessControl,
    pub pool: LiquidPool,
    pub registry: StrategyRegistry,
    pub shares: ShareLedger,
    pub metrics: PerformanceMetrics,
    pub emergency: EmergencyStatus,
    pub journal: Journal,
    /// Fees transferred out of the pool, by recipient
    pub fee_balances: HashMap<AccountId, Amount>,
    /// Start of the current management fee accrual period
    pub last_fee_accrual: Timestamp,
}

impl VaultState {
    pub fn new(owner: AccountId, config: VaultConfig, now: Timestamp) -> Self {
        let journal = Journal::new(config.journal_capacity);
        Self {
            config,
            access: AccessControl::with_owner(owner),
            pool: LiquidPool::new(),
            registry: StrategyRegistry::new(),
            shares: ShareLedger::new(),
            metrics: PerformanceMetrics::default(),
            emergency: EmergencyStatus::default(),
            journal,
            fee_balances: HashMap::new(),
            last_fee_accrual: now,
        }
    }

    pub fn record(&mut self, now: Timestamp, event: VaultEvent) {
        self.journal.record(now, event);
    }

    /// Credit an amount a strategy handed back to the pool. A negative or
    /// out-of-range amount is the strategy's failure and leaves the pool untouched.
    pub fn accept_returned(
        &mut self,
        amount: Amount,
        failure: fn(String) -> StrategyError,
    ) -> StrategyResult<Amount> {
        let amount =
            reported_amount(amount).ok_or_else(|| failure(format!("unusable amount {}", amount)))?;
        self.pool
            .credit(amount)
            .map_err(|e| failure(e.to_string()))?;
        Ok(amount)
    }

    /// Move `amount` out of the pool to the fee recipient; capped by the pool balance
    pub fn pay_fee(&mut self, amount: Amount) -> Amount {
        let paid = amount.min(self.pool.balance());
        if paid <= Decimal::ZERO || self.pool.debit(paid).is_err() {
            return Decimal::ZERO;
        }
        *self
            .fee_balances
            .entry(self.config.fee_recipient.clone())
            .or_default() += paid;
        paid
    }
}
