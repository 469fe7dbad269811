//! Bootstrap - Vault setup from configuration
//!
//! Handles initial setup of a runner:
//! - Building the risk oracle and the vault
//! - Admitting simulated strategies and setting their targets
//! - Granting the keeper its role and seeding deposits

use keel_core::{
    AccountId, AllocationTarget, Amount, BPS_DENOMINATOR, Bps, ConfigError, Role, StrategyId,
    VaultConfig,
};
use keel_ports::Clock;
use keel_risk::{RiskGateway, StaticRiskOracle};
use keel_strategy_sim::{FaultPlan, SimulatedStrategy};
use keel_vault::{AdmissionError, Vault, VaultError};
use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;

use crate::error::Result;
use crate::keeper::KeeperConfig;
use crate::simulation::SimulationConfig;

/// Demo configuration shipped with the binary
const DEMO_CONFIG: &str = include_str!("../config/demo.json");

/// One simulated strategy to admit
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StrategySpec {
    pub id: StrategyId,
    /// Display name, also the risk oracle key (defaults to the id)
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub apy_bps: Bps,
    /// Oracle score override for this strategy
    #[serde(default)]
    pub risk_score: Option<Bps>,
    #[serde(default = "full_allocation")]
    pub max_allocation_bps: Bps,
    /// Allocation target; 0 leaves the strategy unfunded
    #[serde(default)]
    pub target_bps: Bps,
    #[serde(default)]
    pub min_bps: Bps,
    #[serde(default = "full_allocation")]
    pub max_bps: Bps,
    #[serde(default)]
    pub priority: u8,
    #[serde(default)]
    pub faults: FaultPlan,
}

impl StrategySpec {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(self.id.as_str())
    }
}

fn full_allocation() -> Bps {
    BPS_DENOMINATOR
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DepositSpec {
    pub account: AccountId,
    pub amount: Amount,
    #[serde(default)]
    pub risk_tolerance: Bps,
}

/// Static risk oracle parameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RiskSpec {
    pub default_score: Bps,
    pub approval_threshold: Bps,
}

impl Default for RiskSpec {
    fn default() -> Self {
        Self {
            default_score: 5_000,
            approval_threshold: 8_000,
        }
    }
}

/// Runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    pub vault: VaultConfig,
    /// Vault owner; holds every role
    pub operator: AccountId,
    pub keeper: KeeperConfig,
    pub risk: RiskSpec,
    pub strategies: Vec<StrategySpec>,
    pub deposits: Vec<DepositSpec>,
    pub simulation: SimulationConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            vault: VaultConfig::default(),
            operator: "operator".to_string(),
            keeper: KeeperConfig::default(),
            risk: RiskSpec::default(),
            strategies: Vec::new(),
            deposits: Vec::new(),
            simulation: SimulationConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.vault.validate()?;
        Ok(config)
    }

    /// The bundled demo configuration
    pub fn demo() -> Result<Self> {
        Self::from_json(DEMO_CONFIG)
    }
}

/// A vault with its simulated strategies
pub struct VaultBootstrap {
    pub vault: Arc<Vault>,
    /// Admitted strategies, in configuration order
    pub strategies: Vec<(StrategyId, Arc<SimulatedStrategy>)>,
    /// Strategies the risk checks refused
    pub rejected: Vec<StrategyId>,
}

impl VaultBootstrap {
    /// Build the vault described by `config`, reading time from `clock`
    pub fn with_clock(config: &RunnerConfig, clock: Arc<dyn Clock>) -> Result<Self> {
        let mut oracle =
            StaticRiskOracle::new(config.risk.default_score, config.risk.approval_threshold);
        for spec in &config.strategies {
            if let Some(score) = spec.risk_score {
                oracle.set_score(spec.name(), score);
            }
        }

        let operator = config.operator.as_str();
        let vault = Arc::new(Vault::new(
            operator,
            config.vault.clone(),
            RiskGateway::new(Arc::new(oracle)),
            clock,
        )?);

        if config.keeper.account != operator {
            vault.grant_role(operator, &config.keeper.account, Role::Rebalancer)?;
        }

        let mut strategies = Vec::with_capacity(config.strategies.len());
        let mut rejected = Vec::new();

        for spec in &config.strategies {
            let strategy = Arc::new(
                SimulatedStrategy::new(spec.name())
                    .with_apy(spec.apy_bps)
                    .with_faults(spec.faults),
            );

            let admitted = vault.add_strategy(
                operator,
                spec.id.clone(),
                strategy.clone(),
                spec.max_allocation_bps,
            );
            match admitted {
                Ok(()) => {}
                Err(VaultError::Admission(e @ AdmissionError::Risk(_))) => {
                    warn!("Strategy '{}' rejected: {}", spec.id, e);
                    rejected.push(spec.id.clone());
                    continue;
                }
                Err(e) => return Err(e.into()),
            }

            if spec.target_bps > 0 {
                vault.update_allocation_target(
                    operator,
                    AllocationTarget::new(spec.id.clone(), spec.target_bps)
                        .with_band(spec.min_bps, spec.max_bps)
                        .with_priority(spec.priority),
                )?;
            }

            info!(
                "Registered strategy '{}' ({}) with APY {}bps and target {}bps",
                spec.id,
                spec.name(),
                spec.apy_bps,
                spec.target_bps
            );
            strategies.push((spec.id.clone(), strategy));
        }

        for deposit in &config.deposits {
            let shares = vault.deposit(&deposit.account, deposit.amount, deposit.risk_tolerance)?;
            info!(
                "Seed deposit of {} by '{}' minted {} shares",
                deposit.amount, deposit.account, shares
            );
        }

        Ok(Self {
            vault,
            strategies,
            rejected,
        })
    }

    /// Simulated strategy by id
    pub fn strategy(&self, id: &str) -> Option<&Arc<SimulatedStrategy>> {
        self.strategies
            .iter()
            .find(|(sid, _)| sid.as_str() == id)
            .map(|(_, strategy)| strategy)
    }
}
