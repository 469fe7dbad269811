//! Emergency Controller
//!
//! Vault-wide circuit breaker plus forced evacuation of strategies. An
//! evacuated strategy is always quarantined, whether or not its exit call
//! succeeded; whatever it did not hand back is recorded as unrecovered.

use keel_core::{Amount, StrategyId, Timestamp};
use keel_ports::StrategyError;
use log::{error, info, warn};
use rust_decimal::Decimal;
use serde::Serialize;

use crate::error::{VaultError, VaultResult};
use crate::journal::VaultEvent;
use crate::state::VaultState;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct EmergencyStatus {
    pub active: bool,
    pub reason: Option<String>,
    pub since: Option<Timestamp>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExitOutcome {
    pub id: StrategyId,
    /// `None` if the exit call failed
    pub recovered: Option<Amount>,
    /// Tracked assets not handed back
    pub unrecovered: Amount,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct EvacuationReport {
    pub exited: usize,
    pub failed: usize,
    pub recovered: Amount,
    pub unrecovered: Amount,
}

impl VaultState {
    pub(crate) fn ensure_not_paused(&self) -> VaultResult<()> {
        if self.emergency.active {
            return Err(VaultError::Paused {
                reason: self
                    .emergency
                    .reason
                    .clone()
                    .unwrap_or_else(|| "emergency mode".to_string()),
            });
        }
        Ok(())
    }

    pub(crate) fn activate_emergency(&mut self, reason: &str, now: Timestamp) {
        if self.emergency.active {
            warn!(
                "[EMERGENCY] Already active since {:?}, updating reason to '{}'",
                self.emergency.since, reason
            );
        } else {
            error!("[EMERGENCY] Emergency mode activated: {}", reason);
            self.emergency.since = Some(now);
        }
        self.emergency.active = true;
        self.emergency.reason = Some(reason.to_string());
        self.record(
            now,
            VaultEvent::EmergencyActivated {
                reason: reason.to_string(),
            },
        );
    }

    /// Returns `false` if emergency mode was not active
    pub(crate) fn deactivate_emergency(&mut self, now: Timestamp) -> bool {
        if !self.emergency.active {
            return false;
        }
        info!("[EMERGENCY] Emergency mode deactivated");
        self.emergency = EmergencyStatus::default();
        self.record(now, VaultEvent::EmergencyDeactivated);
        true
    }

    /// Pull everything out of one active strategy and quarantine it
    pub(crate) fn emergency_exit_strategy(
        &mut self,
        id: &StrategyId,
        reason: &str,
        now: Timestamp,
    ) -> VaultResult<ExitOutcome> {
        let record = self.registry.get_active(id)?;
        let handle = record.handle.clone();
        let tracked = record.total_assets;

        let exited = handle
            .emergency_exit(&[])
            .and_then(|recovered| self.accept_returned(recovered, StrategyError::EmergencyExit));
        let outcome = match exited {
            Ok(recovered) => {
                let unrecovered = (tracked - recovered).max(Decimal::ZERO);
                warn!(
                    "[EMERGENCY] Exited {} ({}): recovered {}, unrecovered {}",
                    id, reason, recovered, unrecovered
                );
                ExitOutcome {
                    id: id.clone(),
                    recovered: Some(recovered),
                    unrecovered,
                }
            }
            Err(source) => {
                let e = VaultError::EmergencyExit {
                    strategy: id.clone(),
                    source,
                };
                error!("[EMERGENCY] {} ({}), {} at risk", e, reason, tracked);
                ExitOutcome {
                    id: id.clone(),
                    recovered: None,
                    unrecovered: tracked,
                }
            }
        };

        if let Some(record) = self.registry.get_mut(id) {
            record.quarantine();
        }
        self.metrics.emergency_exit_count += 1;
        self.refresh_allocation_bps();

        self.record(
            now,
            VaultEvent::StrategyExited {
                id: id.clone(),
                reason: reason.to_string(),
                recovered: outcome.recovered,
                unrecovered: outcome.unrecovered,
            },
        );
        Ok(outcome)
    }

    /// Evacuate every routable strategy
    pub(crate) fn emergency_exit_all(&mut self, reason: &str, now: Timestamp) -> EvacuationReport {
        let mut report = EvacuationReport::default();

        for id in self.registry.routable_ids() {
            match self.emergency_exit_strategy(&id, reason, now) {
                Ok(outcome) => {
                    match outcome.recovered {
                        Some(recovered) => {
                            report.exited += 1;
                            report.recovered += recovered;
                        }
                        None => report.failed += 1,
                    }
                    report.unrecovered += outcome.unrecovered;
                }
                Err(e) => {
                    warn!("[EMERGENCY] {}", e);
                    report.failed += 1;
                }
            }
        }

        info!(
            "[EMERGENCY] Evacuation done: exited={}, failed={}, recovered={}, unrecovered={}",
            report.exited, report.failed, report.recovered, report.unrecovered
        );
        report
    }
}
