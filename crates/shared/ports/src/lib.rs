//! Keel Ports
//!
//! Port definitions (traits) for the Keel vault orchestrator.
//! These define the boundaries between the vault engine and the external
//! modules it coordinates: strategies, the risk oracle, and time.

mod clock;
mod error;
mod risk;
mod strategy;

pub use clock::Clock;
pub use error::{OracleError, OracleResult, StrategyError, StrategyResult};
pub use risk::{RiskAssessment, RiskLabel, RiskOracle};
pub use strategy::{Strategy, StrategyHandle};
