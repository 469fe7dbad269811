//! Vault facade
//!
//! The only public entry into vault state. Every mutating call enters the
//! reentrancy guard, takes the state lock, checks the caller's role and the
//! pause switch, then runs the operation with one timestamp from the clock.
//! Views take a non-blocking read and report `Concurrency` when called from
//! inside a batch (a strategy calling back into the vault).

use keel_core::{
    AccountId, AllocationTarget, Amount, Bps, ConfigError, PerformanceMetrics, Role, StrategyId,
    Timestamp, UserPosition, VaultConfig,
};
use keel_ports::{Clock, StrategyHandle};
use keel_risk::RiskGateway;
use log::info;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

use crate::emergency::{EmergencyStatus, EvacuationReport, ExitOutcome};
use crate::error::{VaultError, VaultResult};
use crate::guard::ReentrancyGuard;
use crate::harvest::HarvestReport;
use crate::journal::{JournalEntry, VaultEvent};
use crate::planner::DriftReport;
use crate::rebalance::RebalanceReport;
use crate::registry::StrategySummary;
use crate::state::VaultState;

/// Serializable copy of everything the vault persists
#[derive(Debug, Clone, Serialize)]
pub struct VaultSnapshot {
    pub timestamp: Timestamp,
    pub pool_balance: Amount,
    pub total_assets: Amount,
    pub total_shares: Amount,
    pub share_price: Amount,
    pub emergency: EmergencyStatus,
    pub config: VaultConfig,
    pub metrics: PerformanceMetrics,
    /// Every record ever admitted, sorted by id
    pub strategies: Vec<StrategySummary>,
    pub targets: Vec<AllocationTarget>,
    pub fee_balances: HashMap<AccountId, Amount>,
}

impl VaultSnapshot {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

pub struct Vault {
    guard: ReentrancyGuard,
    state: RwLock<VaultState>,
    clock: Arc<dyn Clock>,
    risk: RiskGateway,
}

impl Vault {
    /// Create a vault owned by `owner`, who receives every role
    pub fn new(
        owner: impl Into<AccountId>,
        config: VaultConfig,
        risk: RiskGateway,
        clock: Arc<dyn Clock>,
    ) -> VaultResult<Self> {
        config.validate()?;
        let owner = owner.into();
        let now = clock.now();
        info!(
            "[VAULT] Created by {} (clock: {}, max_strategies: {})",
            owner,
            clock.name(),
            config.max_strategies
        );

        Ok(Self {
            guard: ReentrancyGuard::new(),
            state: RwLock::new(VaultState::new(owner, config, now)),
            clock,
            risk,
        })
    }

    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Run a mutating operation under the guard and write lock
    fn mutate<T>(
        &self,
        gate: Option<(&str, Role)>,
        op: impl FnOnce(&mut VaultState, Timestamp) -> VaultResult<T>,
    ) -> VaultResult<T> {
        let _token = self.guard.enter()?;
        let mut state = self.state.write();
        if let Some((caller, role)) = gate {
            state.access.check(caller, role)?;
        }
        let now = self.clock.now();
        op(&mut state, now)
    }

    fn view<T>(&self, read: impl FnOnce(&VaultState) -> T) -> VaultResult<T> {
        let state = self.state.try_read().ok_or(VaultError::Concurrency)?;
        Ok(read(&state))
    }

    // ------------------------------------------------------------------
    // Depositors
    // ------------------------------------------------------------------

    /// Deposit into the liquid pool. May trigger an automatic rebalance,
    /// whose per-strategy failures never fail the deposit.
    pub fn deposit(
        &self,
        account: &str,
        amount: Amount,
        risk_tolerance: Bps,
    ) -> VaultResult<Amount> {
        self.mutate(None, |state, now| {
            let shares = state.deposit(account, amount, risk_tolerance, now)?;
            if state.should_auto_rebalance(now) {
                info!("[VAULT] Drift above threshold after deposit, rebalancing");
                state.execute_rebalance(now);
            }
            Ok(shares)
        })
    }

    pub fn withdraw(&self, account: &str, shares: Amount) -> VaultResult<Amount> {
        self.mutate(None, |state, now| state.withdraw(account, shares, now))
    }

    /// Record advisory strategy preferences on an existing position
    pub fn set_preferred_strategies(
        &self,
        account: &str,
        strategies: Vec<StrategyId>,
    ) -> VaultResult<()> {
        self.mutate(None, |state, _| state.shares.set_preferred(account, strategies))
    }

    // ------------------------------------------------------------------
    // Registry (Manager)
    // ------------------------------------------------------------------

    pub fn add_strategy(
        &self,
        caller: &str,
        id: impl Into<StrategyId>,
        handle: StrategyHandle,
        max_allocation_bps: Bps,
    ) -> VaultResult<()> {
        let id = id.into();
        self.mutate(Some((caller, Role::Manager)), |state, now| {
            state.ensure_not_paused()?;
            state.add_strategy(id, handle, max_allocation_bps, &self.risk, now)
        })
    }

    /// Evacuate and deactivate a strategy. Allowed while paused.
    pub fn remove_strategy(&self, caller: &str, id: &StrategyId) -> VaultResult<Amount> {
        self.mutate(Some((caller, Role::Manager)), |state, now| {
            state.remove_strategy(id, now)
        })
    }

    pub fn upgrade_strategy(
        &self,
        caller: &str,
        id: &StrategyId,
        new_handle: StrategyHandle,
    ) -> VaultResult<Amount> {
        self.mutate(Some((caller, Role::Manager)), |state, now| {
            state.ensure_not_paused()?;
            state.upgrade_strategy(id, new_handle, &self.risk, now)
        })
    }

    pub fn update_allocation_target(&self, caller: &str, target: AllocationTarget) -> VaultResult<()> {
        self.mutate(Some((caller, Role::Manager)), |state, now| {
            state.ensure_not_paused()?;
            state.update_allocation_target(target, now)
        })
    }

    // ------------------------------------------------------------------
    // Keeper operations (Rebalancer)
    // ------------------------------------------------------------------

    pub fn rebalance(&self, caller: &str) -> VaultResult<RebalanceReport> {
        self.mutate(Some((caller, Role::Rebalancer)), |state, now| {
            state.ensure_not_paused()?;
            Ok(state.execute_rebalance(now))
        })
    }

    /// Rebalance only if the automatic trigger conditions hold
    pub fn rebalance_if_due(&self, caller: &str) -> VaultResult<Option<RebalanceReport>> {
        self.mutate(Some((caller, Role::Rebalancer)), |state, now| {
            state.ensure_not_paused()?;
            Ok(state
                .should_auto_rebalance(now)
                .then(|| state.execute_rebalance(now)))
        })
    }

    pub fn harvest_all(&self, caller: &str) -> VaultResult<HarvestReport> {
        self.mutate(Some((caller, Role::Rebalancer)), |state, now| {
            state.ensure_not_paused()?;
            Ok(state.harvest_all(now))
        })
    }

    /// Revalue every strategy; returns the ids quarantined by the automatic triggers
    pub fn refresh_valuations(&self, caller: &str) -> VaultResult<Vec<StrategyId>> {
        self.mutate(Some((caller, Role::Rebalancer)), |state, now| {
            Ok(state.refresh_valuations(now))
        })
    }

    // ------------------------------------------------------------------
    // Emergency (EmergencyOperator)
    // ------------------------------------------------------------------

    pub fn activate_emergency_mode(&self, caller: &str, reason: &str) -> VaultResult<()> {
        self.mutate(Some((caller, Role::EmergencyOperator)), |state, now| {
            state.activate_emergency(reason, now);
            Ok(())
        })
    }

    pub fn deactivate_emergency_mode(&self, caller: &str) -> VaultResult<bool> {
        self.mutate(Some((caller, Role::EmergencyOperator)), |state, now| {
            Ok(state.deactivate_emergency(now))
        })
    }

    pub fn emergency_exit_strategy(
        &self,
        caller: &str,
        id: &StrategyId,
        reason: &str,
    ) -> VaultResult<ExitOutcome> {
        self.mutate(Some((caller, Role::EmergencyOperator)), |state, now| {
            state.emergency_exit_strategy(id, reason, now)
        })
    }

    pub fn emergency_exit_all(&self, caller: &str, reason: &str) -> VaultResult<EvacuationReport> {
        self.mutate(Some((caller, Role::EmergencyOperator)), |state, now| {
            Ok(state.emergency_exit_all(reason, now))
        })
    }

    // ------------------------------------------------------------------
    // Administration (Admin)
    // ------------------------------------------------------------------

    pub fn update_vault_config(&self, caller: &str, config: VaultConfig) -> VaultResult<()> {
        self.mutate(Some((caller, Role::Admin)), |state, now| {
            state.ensure_not_paused()?;
            config.validate()?;
            let active = state.registry.active_count();
            if config.max_strategies < active {
                return Err(ConfigError::invalid(
                    "max_strategies",
                    format!("{} below active strategy count {}", config.max_strategies, active),
                )
                .into());
            }

            state.journal.set_capacity(config.journal_capacity);
            state.config = config;
            info!("[VAULT] Configuration updated by {}", caller);
            state.record(now, VaultEvent::ConfigUpdated);
            Ok(())
        })
    }

    pub fn grant_role(&self, caller: &str, account: &str, role: Role) -> VaultResult<bool> {
        self.mutate(Some((caller, Role::Admin)), |state, now| {
            let added = state.access.grant(account, role);
            if added {
                state.record(
                    now,
                    VaultEvent::RoleGranted {
                        account: account.to_string(),
                        role,
                    },
                );
            }
            Ok(added)
        })
    }

    pub fn revoke_role(&self, caller: &str, account: &str, role: Role) -> VaultResult<bool> {
        self.mutate(Some((caller, Role::Admin)), |state, now| {
            let removed = state.access.revoke(account, role)?;
            if removed {
                state.record(
                    now,
                    VaultEvent::RoleRevoked {
                        account: account.to_string(),
                        role,
                    },
                );
            }
            Ok(removed)
        })
    }

    // ------------------------------------------------------------------
    // Views
    // ------------------------------------------------------------------

    pub fn total_assets(&self) -> VaultResult<Amount> {
        self.view(|state| state.total_assets())
    }

    pub fn compute_drift(&self) -> VaultResult<DriftReport> {
        self.view(|state| state.compute_drift())
    }

    pub fn should_auto_rebalance(&self) -> VaultResult<bool> {
        let now = self.clock.now();
        self.view(|state| state.should_auto_rebalance(now))
    }

    pub fn pool_balance(&self) -> VaultResult<Amount> {
        self.view(|state| state.pool.balance())
    }

    pub fn strategy(&self, id: &StrategyId) -> VaultResult<StrategySummary> {
        self.view(|state| {
            state
                .registry
                .get(id)
                .map(|record| record.summary())
                .ok_or_else(|| VaultError::UnknownStrategy(id.clone()))
        })?
    }

    /// Active strategy ids in active-set order
    pub fn active_strategies(&self) -> VaultResult<Vec<StrategyId>> {
        self.view(|state| state.registry.active_ids().to_vec())
    }

    pub fn allocation_target(&self, id: &StrategyId) -> VaultResult<Option<AllocationTarget>> {
        self.view(|state| state.registry.target(id).cloned())
    }

    pub fn metrics(&self) -> VaultResult<PerformanceMetrics> {
        self.view(|state| state.metrics.clone())
    }

    pub fn config(&self) -> VaultResult<VaultConfig> {
        self.view(|state| state.config.clone())
    }

    pub fn is_paused(&self) -> VaultResult<bool> {
        self.view(|state| state.emergency.active)
    }

    pub fn emergency_status(&self) -> VaultResult<EmergencyStatus> {
        self.view(|state| state.emergency.clone())
    }

    pub fn has_role(&self, account: &str, role: Role) -> VaultResult<bool> {
        self.view(|state| state.access.has_role(account, role))
    }

    pub fn journal(&self) -> VaultResult<Vec<JournalEntry>> {
        self.view(|state| state.journal.entries().cloned().collect())
    }

    pub fn fees_owed(&self, recipient: &str) -> VaultResult<Amount> {
        self.view(|state| state.fee_balances.get(recipient).copied().unwrap_or_default())
    }

    pub fn position(&self, account: &str) -> VaultResult<Option<UserPosition>> {
        self.view(|state| state.shares.position(account).cloned())
    }

    pub fn share_price(&self) -> VaultResult<Amount> {
        self.view(|state| state.shares.share_price(state.total_assets()))
    }

    pub fn preview_deposit(&self, amount: Amount) -> VaultResult<Amount> {
        self.view(|state| state.shares.shares_for_deposit(amount, state.total_assets()))?
    }

    pub fn preview_withdraw(&self, shares: Amount) -> VaultResult<Amount> {
        self.view(|state| state.shares.assets_for_shares(shares, state.total_assets()))
    }

    pub fn snapshot(&self) -> VaultResult<VaultSnapshot> {
        let timestamp = self.clock.now();
        self.view(|state| {
            let total_assets = state.total_assets();
            let mut strategies: Vec<StrategySummary> =
                state.registry.records().map(|r| r.summary()).collect();
            strategies.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));
            let mut targets: Vec<AllocationTarget> = state.registry.targets().cloned().collect();
            targets.sort_by(|a, b| a.id.as_str().cmp(b.id.as_str()));

            VaultSnapshot {
                timestamp,
                pool_balance: state.pool.balance(),
                total_assets,
                total_shares: state.shares.total_shares(),
                share_price: state.shares.share_price(total_assets),
                emergency: state.emergency.clone(),
                config: state.config.clone(),
                metrics: state.metrics.clone(),
                strategies,
                targets,
                fee_balances: state.fee_balances.clone(),
            }
        })
    }
}
