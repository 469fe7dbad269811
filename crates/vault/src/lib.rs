//! Keel Vault
//!
//! Orchestration engine for a multi-strategy yield vault. The vault pools
//! depositor capital and allocates it across pluggable strategies:
//! - **Registry**: admission (capacity + risk checks), removal, upgrade
//! - **Planner**: drift of each strategy's weight against its target
//! - **Rebalance**: pool <-> strategy capital moves, isolated per strategy
//! - **Harvest**: yield collection, performance and management fees
//! - **Emergency**: global pause and forced evacuation (quarantine)
//! - **Accounting**: vault value with cached fallback for failed valuations
//!
//! ## Architecture
//!
//! ```text
//!  Depositors ──► deposit / withdraw ──┐
//!  Keeper ──► harvest / rebalance ─────┤
//!  Operators ──► admin / emergency ────┤
//!                                      ▼
//!                   ┌──────────────────────────────────────┐
//!                   │ Vault                                │
//!                   │  ReentrancyGuard ─► RwLock<State>    │
//!                   │  AccessControl ─► pause check        │
//!                   │                                      │
//!                   │  ┌────────────┐    ┌──────────────┐  │
//!                   │  │ Registry   │◄───│ RiskGateway  │◄─┼── RiskOracle
//!                   │  └─────┬──────┘    └──────────────┘  │
//!                   │        │                             │
//!                   │  ┌─────▼──────┐    ┌──────────────┐  │
//!                   │  │ Planner    │───►│ Rebalance    │  │
//!                   │  └────────────┘    └──────┬───────┘  │
//!                   │  ┌────────────┐           │          │
//!                   │  │ Harvest    │───┐       │          │
//!                   │  └────────────┘   ▼       ▼          │
//!                   │              ┌──────────────────┐    │
//!                   │              │ LiquidPool       │    │
//!                   │              └──────────────────┘    │
//!                   │  Emergency ─► quarantine / pause     │
//!                   │  Journal (bounded event log)         │
//!                   └──────────────────┬───────────────────┘
//!                                      │ execute / harvest /
//!                                      │ emergency_exit / balance
//!                                      ▼
//!                              Strategy capabilities
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use keel_vault::Vault;
//!
//! let vault = Vault::new("owner", VaultConfig::default(), risk, clock)?;
//! vault.add_strategy("owner", "lending", lending, 6_000)?;
//! vault.update_allocation_target("owner", AllocationTarget::new("lending", 6_000))?;
//!
//! vault.deposit("alice", dec!(1000), 5_000)?;
//! let report = vault.rebalance("owner")?;
//! ```

mod access;
mod accounting;
mod emergency;
mod error;
mod guard;
mod harvest;
mod journal;
mod planner;
mod pool;
mod rebalance;
mod registry;
mod shares;
mod state;
mod vault;

pub use access::AccessControl;
pub use emergency::{EmergencyStatus, EvacuationReport, ExitOutcome};
pub use error::{AdmissionError, VaultError, VaultResult};
pub use guard::{GuardToken, ReentrancyGuard};
pub use harvest::HarvestReport;
pub use journal::{FeeKind, Journal, JournalEntry, VaultEvent};
pub use planner::{DriftEntry, DriftReport};
pub use pool::LiquidPool;
pub use rebalance::RebalanceReport;
pub use registry::{StrategyRecord, StrategyRegistry, StrategySummary};
pub use shares::ShareLedger;
pub use vault::{Vault, VaultSnapshot};
