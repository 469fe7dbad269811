//! Strategy Registry & Admission
//!
//! Owns the table of admitted strategies. Records are never deleted:
//! removal only drops the id from the dense active set (swap-removal), so
//! lookups and removals are O(1) and history stays queryable.

use keel_core::{
    AllocationTarget, Amount, BPS_DENOMINATOR, Bps, ConfigError, StrategyId, StrategyState,
    Timestamp,
};
use keel_ports::{StrategyError, StrategyHandle};
use keel_risk::RiskGateway;
use log::{info, warn};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{AdmissionError, VaultError, VaultResult};
use crate::journal::VaultEvent;
use crate::state::VaultState;

/// An admitted strategy and everything the vault tracks about it
#[derive(Clone)]
pub struct StrategyRecord {
    pub id: StrategyId,
    pub handle: StrategyHandle,
    pub name: String,
    pub target_allocation_bps: Bps,
    pub current_allocation_bps: Bps,
    /// Capital the vault believes the strategy holds (last known valuation)
    pub total_assets: Amount,
    pub risk_score: Bps,
    pub max_allocation_bps: Bps,
    pub active: bool,
    /// Quarantined; only cleared by upgrade or re-admission
    pub emergency: bool,
    pub last_harvest_time: Option<Timestamp>,
    pub cumulative_returns: Amount,
    /// Last harvest's yield in bps of tracked assets
    pub performance_score: Bps,
    pub added_at: Timestamp,
    pub consecutive_valuation_failures: u32,
}

impl StrategyRecord {
    pub fn new(
        id: StrategyId,
        handle: StrategyHandle,
        risk_score: Bps,
        max_allocation_bps: Bps,
        now: Timestamp,
    ) -> Self {
        Self {
            name: handle.name().to_string(),
            id,
            handle,
            target_allocation_bps: 0,
            current_allocation_bps: 0,
            total_assets: Decimal::ZERO,
            risk_score,
            max_allocation_bps,
            active: true,
            emergency: false,
            last_harvest_time: None,
            cumulative_returns: Decimal::ZERO,
            performance_score: 0,
            added_at: now,
            consecutive_valuation_failures: 0,
        }
    }

    pub fn state(&self) -> StrategyState {
        StrategyState::from_flags(self.active, self.emergency)
    }

    /// Active and not quarantined
    pub fn is_routable(&self) -> bool {
        self.state().is_routable()
    }

    /// Exclude from routing and forget the tracked position
    pub(crate) fn quarantine(&mut self) {
        self.emergency = true;
        self.total_assets = Decimal::ZERO;
        self.current_allocation_bps = 0;
    }

    pub fn summary(&self) -> StrategySummary {
        StrategySummary {
            id: self.id.clone(),
            name: self.name.clone(),
            state: self.state(),
            target_allocation_bps: self.target_allocation_bps,
            current_allocation_bps: self.current_allocation_bps,
            total_assets: self.total_assets,
            risk_score: self.risk_score,
            max_allocation_bps: self.max_allocation_bps,
            last_harvest_time: self.last_harvest_time,
            cumulative_returns: self.cumulative_returns,
            performance_score: self.performance_score,
            added_at: self.added_at,
            consecutive_valuation_failures: self.consecutive_valuation_failures,
        }
    }
}

impl fmt::Debug for StrategyRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StrategyRecord")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("state", &self.state())
            .field("target_allocation_bps", &self.target_allocation_bps)
            .field("total_assets", &self.total_assets)
            .finish_non_exhaustive()
    }
}

/// Read-only view of a record (no capability handle)
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StrategySummary {
    pub id: StrategyId,
    pub name: String,
    pub state: StrategyState,
    pub target_allocation_bps: Bps,
    pub current_allocation_bps: Bps,
    pub total_assets: Amount,
    pub risk_score: Bps,
    pub max_allocation_bps: Bps,
    pub last_harvest_time: Option<Timestamp>,
    pub cumulative_returns: Amount,
    pub performance_score: Bps,
    pub added_at: Timestamp,
    pub consecutive_valuation_failures: u32,
}

#[derive(Debug, Default)]
pub struct StrategyRegistry {
    records: HashMap<StrategyId, StrategyRecord>,
    /// Dense active set
    active: Vec<StrategyId>,
    /// id -> position in `active`
    positions: HashMap<StrategyId, usize>,
    targets: HashMap<StrategyId, AllocationTarget>,
}

impl StrategyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, id: &StrategyId) -> Option<&StrategyRecord> {
        self.records.get(id)
    }

    pub fn get_mut(&mut self, id: &StrategyId) -> Option<&mut StrategyRecord> {
        self.records.get_mut(id)
    }

    /// Record for an active (possibly quarantined) strategy
    pub fn get_active(&self, id: &StrategyId) -> VaultResult<&StrategyRecord> {
        match self.records.get(id) {
            None => Err(VaultError::UnknownStrategy(id.clone())),
            Some(record) if !record.active => Err(VaultError::StrategyInactive(id.clone())),
            Some(record) => Ok(record),
        }
    }

    pub fn get_active_mut(&mut self, id: &StrategyId) -> VaultResult<&mut StrategyRecord> {
        match self.records.get_mut(id) {
            None => Err(VaultError::UnknownStrategy(id.clone())),
            Some(record) if !record.active => Err(VaultError::StrategyInactive(id.clone())),
            Some(record) => Ok(record),
        }
    }

    pub fn is_active(&self, id: &StrategyId) -> bool {
        self.positions.contains_key(id)
    }

    pub fn active_ids(&self) -> &[StrategyId] {
        &self.active
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    /// Active, non-quarantined records in active-set order
    pub fn routable(&self) -> impl Iterator<Item = &StrategyRecord> {
        self.active
            .iter()
            .filter_map(|id| self.records.get(id))
            .filter(|record| record.is_routable())
    }

    /// Snapshot of routable ids, for batches that mutate records while iterating
    pub fn routable_ids(&self) -> Vec<StrategyId> {
        self.routable().map(|record| record.id.clone()).collect()
    }

    /// All records ever admitted, active or not
    pub fn records(&self) -> impl Iterator<Item = &StrategyRecord> {
        self.records.values()
    }

    /// Active strategy currently bound to this exact handle instance
    pub fn bound_to(&self, handle: &StrategyHandle) -> Option<&StrategyId> {
        self.active.iter().find(|id| {
            self.records
                .get(*id)
                .is_some_and(|r| std::ptr::addr_eq(Arc::as_ptr(&r.handle), Arc::as_ptr(handle)))
        })
    }

    /// Σ target bps over active strategies, optionally leaving one out
    pub fn total_target_bps(&self, excluding: Option<&StrategyId>) -> Bps {
        self.active
            .iter()
            .filter(|id| Some(*id) != excluding)
            .filter_map(|id| self.records.get(id))
            .map(|record| record.target_allocation_bps)
            .sum()
    }

    pub fn target(&self, id: &StrategyId) -> Option<&AllocationTarget> {
        self.targets.get(id)
    }

    pub fn targets(&self) -> impl Iterator<Item = &AllocationTarget> {
        self.targets.values()
    }

    /// Funding priority (0 if no explicit target)
    pub fn priority(&self, id: &StrategyId) -> u8 {
        self.targets.get(id).map(|t| t.priority).unwrap_or(0)
    }

    /// Insert or replace a record and append it to the active set
    pub(crate) fn insert(&mut self, record: StrategyRecord) {
        let id = record.id.clone();
        if !self.positions.contains_key(&id) {
            self.positions.insert(id.clone(), self.active.len());
            self.active.push(id.clone());
        }
        self.targets.remove(&id);
        self.records.insert(id, record);
    }

    /// Mark inactive and swap-remove from the active set
    pub(crate) fn deactivate(&mut self, id: &StrategyId) -> VaultResult<()> {
        let position = self
            .positions
            .remove(id)
            .ok_or_else(|| VaultError::StrategyInactive(id.clone()))?;

        self.active.swap_remove(position);
        if let Some(moved) = self.active.get(position) {
            self.positions.insert(moved.clone(), position);
        }

        self.targets.remove(id);
        if let Some(record) = self.records.get_mut(id) {
            record.active = false;
            record.target_allocation_bps = 0;
            record.current_allocation_bps = 0;
        }
        Ok(())
    }

    pub(crate) fn set_target(&mut self, target: AllocationTarget) -> VaultResult<()> {
        let record = self.get_active_mut(&target.id)?;
        record.target_allocation_bps = target.target_bps;
        self.targets.insert(target.id.clone(), target);
        Ok(())
    }
}

impl VaultState {
    /// Admit a new strategy after capacity and risk checks.
    ///
    /// Every check runs before any mutation; a rejection leaves the vault untouched.
    pub(crate) fn add_strategy(
        &mut self,
        id: StrategyId,
        handle: StrategyHandle,
        max_allocation_bps: Bps,
        risk: &RiskGateway,
        now: Timestamp,
    ) -> VaultResult<()> {
        if let Some(bound) = self.registry.bound_to(&handle) {
            return Err(AdmissionError::HandleInUse(bound.clone()).into());
        }
        if max_allocation_bps > BPS_DENOMINATOR {
            return Err(AdmissionError::MaxAllocationTooHigh(max_allocation_bps).into());
        }
        if self.registry.is_active(&id) {
            return Err(AdmissionError::AlreadyActive(id).into());
        }
        if self.registry.active_count() >= self.config.max_strategies {
            return Err(AdmissionError::CapacityReached {
                max: self.config.max_strategies,
            }
            .into());
        }

        let assessment = risk
            .assess(handle.as_ref(), self.config.max_risk_score)
            .map_err(AdmissionError::from)?;

        let record = StrategyRecord::new(
            id.clone(),
            handle,
            assessment.score,
            max_allocation_bps,
            now,
        );
        let name = record.name.clone();

        self.registry.insert(record);
        self.pool.approve(&id);

        info!(
            "[REGISTRY] Admitted {} ({}): risk={} ({:?}), max_allocation={}bps",
            id, name, assessment.score, assessment.label, max_allocation_bps
        );
        self.record(
            now,
            VaultEvent::StrategyAdded {
                id,
                name,
                risk_score: assessment.score,
                max_allocation_bps,
            },
        );
        Ok(())
    }

    /// Evacuate and deactivate a strategy
    pub(crate) fn remove_strategy(&mut self, id: &StrategyId, now: Timestamp) -> VaultResult<Amount> {
        let quarantined = self.registry.get_active(id)?.emergency;

        // A quarantined strategy was already exited and counted
        let recovered = if quarantined {
            Decimal::ZERO
        } else {
            let outcome = self.emergency_exit_strategy(id, "strategy removed", now)?;
            outcome.recovered.unwrap_or(Decimal::ZERO)
        };

        self.registry.deactivate(id)?;
        self.pool.revoke(id);
        self.refresh_allocation_bps();

        info!("[REGISTRY] Removed {}: recovered {}", id, recovered);
        self.record(
            now,
            VaultEvent::StrategyRemoved {
                id: id.clone(),
                recovered,
            },
        );
        Ok(recovered)
    }

    /// Rebind a strategy slot to a new handle, clearing quarantine
    pub(crate) fn upgrade_strategy(
        &mut self,
        id: &StrategyId,
        new_handle: StrategyHandle,
        risk: &RiskGateway,
        now: Timestamp,
    ) -> VaultResult<Amount> {
        self.registry.get_active(id)?;
        if let Some(bound) = self.registry.bound_to(&new_handle) {
            return Err(AdmissionError::HandleInUse(bound.clone()).into());
        }
        let assessment = risk
            .assess(new_handle.as_ref(), self.config.max_risk_score)
            .map_err(AdmissionError::from)?;

        let old = self.registry.get_active(id)?;
        let old_handle = old.handle.clone();
        let tracked = old.total_assets;
        let exited = old_handle
            .emergency_exit(&[])
            .and_then(|recovered| self.accept_returned(recovered, StrategyError::EmergencyExit));
        let recovered = match exited {
            Ok(recovered) => recovered,
            Err(e) => {
                warn!(
                    "[REGISTRY] Upgrade of {}: old handle exit failed, {} unrecovered: {}",
                    id, tracked, e
                );
                Decimal::ZERO
            }
        };

        let record = self.registry.get_active_mut(id)?;
        record.handle = new_handle;
        record.name = record.handle.name().to_string();
        record.risk_score = assessment.score;
        record.emergency = false;
        record.total_assets = Decimal::ZERO;
        record.current_allocation_bps = 0;
        record.consecutive_valuation_failures = 0;
        let name = record.name.clone();

        self.refresh_allocation_bps();

        info!("[REGISTRY] Upgraded {} to {} (recovered {})", id, name, recovered);
        self.record(
            now,
            VaultEvent::StrategyUpgraded {
                id: id.clone(),
                name,
                recovered,
            },
        );
        Ok(recovered)
    }

    /// Set a strategy's allocation target, keeping Σ targets ≤ 10000
    pub(crate) fn update_allocation_target(
        &mut self,
        target: AllocationTarget,
        now: Timestamp,
    ) -> VaultResult<()> {
        target.validate()?;

        let record = self.registry.get_active(&target.id)?;
        if target.target_bps > record.max_allocation_bps {
            return Err(ConfigError::invalid(
                "target_bps",
                format!(
                    "{} exceeds max allocation {} of {}",
                    target.target_bps, record.max_allocation_bps, target.id
                ),
            )
            .into());
        }

        let total = self.registry.total_target_bps(Some(&target.id)) + target.target_bps;
        if total > BPS_DENOMINATOR {
            return Err(ConfigError::AllocationOverflow { total }.into());
        }

        let (id, target_bps) = (target.id.clone(), target.target_bps);
        self.registry.set_target(target)?;

        info!("[REGISTRY] Target for {} set to {}bps (total {}bps)", id, target_bps, total);
        self.record(now, VaultEvent::AllocationUpdated { id, target_bps });
        Ok(())
    }
}
