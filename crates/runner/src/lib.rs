//! Keel Runner - Keeper and Simulation Driver
//!
//! Drives a vault the way an off-chain keeper would:
//!
//! - **Bootstrap**: Builds a vault, simulated strategies and seed deposits from JSON
//! - **Keeper**: Periodic valuation refresh, harvest and auto-rebalance check
//! - **Simulation**: Steps a manual clock and accrues jittered yield between keeper ticks
//!
//! ## Architecture
//!
//! ```text
//!      config.json
//!           │
//!           ▼
//!  ┌─────────────────┐        ┌──────────────────────────┐
//!  │ VaultBootstrap  │───────►│ Vault                    │
//!  │ - risk oracle   │        │  registry / pool / fees  │
//!  │ - strategies    │        └────────────▲─────────────┘
//!  │ - deposits      │                     │ refresh / harvest /
//!  └─────────────────┘                     │ rebalance_if_due
//!                                ┌─────────┴─────────┐
//!                                │      Keeper       │◄── tokio interval
//!                                └─────────▲─────────┘    (live mode)
//!                                          │ tick
//!                                ┌─────────┴─────────┐
//!                                │  YieldSimulation  │◄── ManualClock steps
//!                                │  (accrues APY)    │    (simulated mode)
//!                                └───────────────────┘
//! ```

pub mod bootstrap;
pub mod error;
pub mod keeper;
pub mod simulation;

// Re-export main types
pub use bootstrap::{DepositSpec, RiskSpec, RunnerConfig, StrategySpec, VaultBootstrap};
pub use error::{Result, RunnerError};
pub use keeper::{Keeper, KeeperConfig, KeeperStats, KeeperTick};
pub use simulation::{SimulationConfig, SimulationResults, YieldSimulation};
