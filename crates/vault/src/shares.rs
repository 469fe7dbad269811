//! Share ledger
//!
//! Conventional proportional vault shares: the first deposit mints 1:1,
//! later ones mint `amount * supply / assets`.

use keel_core::{
    AccountId, Amount, BPS_DENOMINATOR, Bps, ConfigError, StrategyId, Timestamp, UserPosition,
};
use log::info;
use rust_decimal::Decimal;
use std::collections::HashMap;

use crate::error::{VaultError, VaultResult};
use crate::journal::VaultEvent;
use crate::state::VaultState;

#[derive(Debug, Clone, Default)]
pub struct ShareLedger {
    total_shares: Amount,
    positions: HashMap<AccountId, UserPosition>,
}

impl ShareLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn total_shares(&self) -> Amount {
        self.total_shares
    }

    pub fn position(&self, account: &str) -> Option<&UserPosition> {
        self.positions.get(account)
    }

    pub fn shares_of(&self, account: &str) -> Amount {
        self.positions
            .get(account)
            .map(|p| p.shares)
            .unwrap_or(Decimal::ZERO)
    }

    pub fn shares_for_deposit(&self, amount: Amount, total_assets: Amount) -> VaultResult<Amount> {
        if self.total_shares.is_zero() {
            return Ok(amount);
        }
        if total_assets <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount(
                "vault has shares outstanding but no assets".to_string(),
            ));
        }
        scale(amount, self.total_shares, total_assets).ok_or_else(|| {
            VaultError::InvalidAmount(format!("deposit {} overflows share supply", amount))
        })
    }

    pub fn assets_for_shares(&self, shares: Amount, total_assets: Amount) -> Amount {
        if self.total_shares.is_zero() {
            return Decimal::ZERO;
        }
        scale(shares, total_assets, self.total_shares).unwrap_or(Decimal::MAX)
    }

    /// Assets per share (1 for an empty vault)
    pub fn share_price(&self, total_assets: Amount) -> Amount {
        if self.total_shares.is_zero() {
            return Decimal::ONE;
        }
        total_assets
            .checked_div(self.total_shares)
            .unwrap_or(Decimal::MAX)
    }

    /// Returns `true` if this is the account's first position
    pub fn mint(
        &mut self,
        account: &str,
        shares: Amount,
        principal: Amount,
        risk_tolerance: Bps,
        now: Timestamp,
    ) -> bool {
        let is_new = !self.positions.contains_key(account);
        let position = self
            .positions
            .entry(account.to_string())
            .or_insert_with(|| UserPosition::new(now, risk_tolerance));
        position.shares += shares;
        position.principal += principal;
        position.risk_tolerance = risk_tolerance;
        self.total_shares += shares;
        is_new
    }

    pub fn set_preferred(&mut self, account: &str, strategies: Vec<StrategyId>) -> VaultResult<()> {
        let position = self
            .positions
            .get_mut(account)
            .ok_or_else(|| VaultError::UnknownAccount(account.to_string()))?;
        position.preferred_strategies = strategies;
        Ok(())
    }

    /// Burn shares; fails without mutation if the account holds fewer
    pub fn burn(&mut self, account: &str, shares: Amount, assets: Amount) -> VaultResult<()> {
        let held = self.shares_of(account);
        if shares > held {
            return Err(VaultError::InsufficientShares {
                requested: shares,
                held,
            });
        }
        if let Some(position) = self.positions.get_mut(account) {
            position.shares -= shares;
            position.principal = (position.principal - assets).max(Decimal::ZERO);
        }
        self.total_shares -= shares;
        Ok(())
    }
}

/// `value * numerator / denominator`, dividing first if the product overflows
fn scale(value: Amount, numerator: Amount, denominator: Amount) -> Option<Amount> {
    value
        .checked_mul(numerator)
        .and_then(|product| product.checked_div(denominator))
        .or_else(|| {
            value
                .checked_div(denominator)
                .and_then(|ratio| ratio.checked_mul(numerator))
        })
}

impl VaultState {
    pub(crate) fn deposit(
        &mut self,
        account: &str,
        amount: Amount,
        risk_tolerance: Bps,
        now: Timestamp,
    ) -> VaultResult<Amount> {
        self.ensure_not_paused()?;
        if !self.config.deposit_in_range(amount) {
            return Err(VaultError::InvalidAmount(format!(
                "deposit {} outside [{}, {}]",
                amount, self.config.min_deposit, self.config.max_deposit
            )));
        }
        if risk_tolerance > BPS_DENOMINATOR {
            return Err(ConfigError::invalid(
                "risk_tolerance",
                format!("{} exceeds {}", risk_tolerance, BPS_DENOMINATOR),
            )
            .into());
        }

        let assets = self.total_assets();
        let shares = self.shares.shares_for_deposit(amount, assets)?;
        if shares <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount(format!(
                "deposit {} mints no shares",
                amount
            )));
        }

        self.pool.credit(amount)?;
        if self.shares.mint(account, shares, amount, risk_tolerance, now) {
            self.metrics.users_served += 1;
        }
        self.metrics.tvl = assets.checked_add(amount).unwrap_or(assets);

        info!("[VAULT] {} deposited {} for {} shares", account, amount, shares);
        self.record(
            now,
            VaultEvent::Deposited {
                account: account.to_string(),
                amount,
                shares,
            },
        );
        Ok(shares)
    }

    pub(crate) fn withdraw(&mut self, account: &str, shares: Amount, now: Timestamp) -> VaultResult<Amount> {
        self.ensure_not_paused()?;
        if shares <= Decimal::ZERO {
            return Err(VaultError::InvalidAmount(format!(
                "withdrawal of {} shares",
                shares
            )));
        }
        let held = self.shares.shares_of(account);
        if shares > held {
            return Err(VaultError::InsufficientShares {
                requested: shares,
                held,
            });
        }

        let total = self.total_assets();
        let assets = self.shares.assets_for_shares(shares, total);
        if !self.pool.has_liquidity(assets) {
            return Err(VaultError::InsufficientLiquidity {
                requested: assets,
                available: self.pool.balance(),
            });
        }

        self.shares.burn(account, shares, assets)?;
        self.pool.debit(assets)?;
        self.metrics.tvl = (total - assets).max(Decimal::ZERO);

        info!("[VAULT] {} withdrew {} for {} shares", account, assets, shares);
        self.record(
            now,
            VaultEvent::Withdrawn {
                account: account.to_string(),
                amount: assets,
                shares,
            },
        );
        Ok(assets)
    }
}
