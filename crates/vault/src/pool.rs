//! Liquid pool
//!
//! Idle vault balance, plus the set of strategies approved to receive
//! transfers from it. Approval is granted on admission and revoked on
//! removal; a transfer to an unapproved strategy is refused.

use keel_core::{Amount, StrategyId};
use keel_ports::StrategyError;
use rust_decimal::Decimal;
use std::collections::HashSet;

use crate::error::{VaultError, VaultResult};

#[derive(Debug, Clone, Default)]
pub struct LiquidPool {
    balance: Amount,
    approved: HashSet<StrategyId>,
}

impl LiquidPool {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance(&self) -> Amount {
        self.balance
    }

    pub fn has_liquidity(&self, amount: Amount) -> bool {
        amount <= self.balance
    }

    /// Add funds (deposits, recovered capital, harvested yield).
    /// Non-positive amounts are ignored; an overflowing credit fails without mutation.
    pub fn credit(&mut self, amount: Amount) -> VaultResult<()> {
        if amount <= Decimal::ZERO {
            return Ok(());
        }
        self.balance = self.balance.checked_add(amount).ok_or_else(|| {
            VaultError::InvalidAmount(format!(
                "credit {} overflows pool balance {}",
                amount, self.balance
            ))
        })?;
        Ok(())
    }

    /// Remove funds; fails without mutation if the balance is short
    pub fn debit(&mut self, amount: Amount) -> VaultResult<()> {
        if amount < Decimal::ZERO {
            return Err(VaultError::InvalidAmount(format!(
                "negative debit {}",
                amount
            )));
        }
        if !self.has_liquidity(amount) {
            return Err(VaultError::InsufficientLiquidity {
                requested: amount,
                available: self.balance,
            });
        }
        self.balance -= amount;
        Ok(())
    }

    pub fn approve(&mut self, id: &StrategyId) {
        self.approved.insert(id.clone());
    }

    pub fn revoke(&mut self, id: &StrategyId) {
        self.approved.remove(id);
    }

    pub fn is_approved(&self, id: &StrategyId) -> bool {
        self.approved.contains(id)
    }

    /// Debit `amount` on behalf of an approved strategy
    pub fn transfer_to(&mut self, id: &StrategyId, amount: Amount) -> VaultResult<()> {
        if !self.is_approved(id) {
            return Err(VaultError::Execution {
                strategy: id.clone(),
                source: StrategyError::Execution("pool transfer not approved".to_string()),
            });
        }
        self.debit(amount)
    }
}
