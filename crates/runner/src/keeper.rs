//! Keeper - periodic vault maintenance
//!
//! Each tick refreshes valuations, harvests every `harvest_every` ticks and
//! rebalances when the vault's automatic trigger says one is due. Vault
//! errors are logged and counted; a paused vault just skips the tick.

use keel_core::{AccountId, Amount, StrategyId};
use keel_vault::{HarvestReport, RebalanceReport, Vault, VaultError};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

/// Keeper configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KeeperConfig {
    /// Account the keeper calls the vault as (needs the Rebalancer role)
    pub account: AccountId,
    /// Tick interval in ms (live mode)
    pub interval_ms: u64,
    /// Harvest on every Nth tick
    pub harvest_every: u64,
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            account: "keeper".to_string(),
            interval_ms: 1000,
            harvest_every: 1,
        }
    }
}

/// What a single tick did
#[derive(Debug, Clone, Default)]
pub struct KeeperTick {
    pub quarantined: Vec<StrategyId>,
    pub harvest: Option<HarvestReport>,
    pub rebalance: Option<RebalanceReport>,
    pub paused: bool,
}

/// Totals over the keeper's lifetime
#[derive(Debug, Clone, Default, Serialize)]
pub struct KeeperStats {
    pub ticks: u64,
    pub harvests: u64,
    pub rebalances: u64,
    pub paused_ticks: u64,
    pub errors: u64,
    pub total_yield: Amount,
    pub quarantined: Vec<StrategyId>,
}

pub struct Keeper {
    vault: Arc<Vault>,
    config: KeeperConfig,
    stats: KeeperStats,
}

impl Keeper {
    pub fn new(vault: Arc<Vault>, config: KeeperConfig) -> Self {
        Self {
            vault,
            config,
            stats: KeeperStats::default(),
        }
    }

    pub fn stats(&self) -> &KeeperStats {
        &self.stats
    }

    pub fn config(&self) -> &KeeperConfig {
        &self.config
    }

    /// Run one maintenance pass
    pub fn tick(&mut self) -> KeeperTick {
        self.stats.ticks += 1;
        let account = self.config.account.clone();
        let mut tick = KeeperTick::default();

        match self.vault.refresh_valuations(&account) {
            Ok(quarantined) => {
                for id in &quarantined {
                    warn!("Keeper: strategy '{}' quarantined during refresh", id);
                }
                self.stats.quarantined.extend(quarantined.iter().cloned());
                tick.quarantined = quarantined;
            }
            Err(e) => self.record_error("refresh", &e),
        }

        if self.stats.ticks % self.config.harvest_every.max(1) == 0 {
            match self.vault.harvest_all(&account) {
                Ok(report) => {
                    self.stats.harvests += 1;
                    self.stats.total_yield += report.total_yield;
                    tick.harvest = Some(report);
                }
                Err(VaultError::Paused { reason }) => {
                    debug!("Keeper: vault paused ({}), skipping tick", reason);
                    tick.paused = true;
                }
                Err(e) => self.record_error("harvest", &e),
            }
        }

        if !tick.paused {
            match self.vault.rebalance_if_due(&account) {
                Ok(Some(report)) => {
                    self.stats.rebalances += 1;
                    tick.rebalance = Some(report);
                }
                Ok(None) => {}
                Err(VaultError::Paused { .. }) => tick.paused = true,
                Err(e) => self.record_error("rebalance", &e),
            }
        }

        if tick.paused {
            self.stats.paused_ticks += 1;
        }
        tick
    }

    fn record_error(&mut self, step: &str, error: &VaultError) {
        self.stats.errors += 1;
        warn!("Keeper {} failed: {}", step, error);
    }

    /// Tick on an interval until `shutdown` flips to true (or its sender drops)
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) -> KeeperStats {
        let mut interval = tokio::time::interval(Duration::from_millis(self.config.interval_ms));
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!(
            "Keeper '{}' started ({}ms interval)",
            self.config.account, self.config.interval_ms
        );

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick();
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }

        info!(
            "Keeper stopped after {} ticks ({} harvests, {} rebalances, {} errors)",
            self.stats.ticks, self.stats.harvests, self.stats.rebalances, self.stats.errors
        );
        self.stats
    }
}
