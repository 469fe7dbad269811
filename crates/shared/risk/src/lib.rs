//! Keel Risk
//!
//! Admission-time risk checks. The vault never talks to a risk oracle
//! directly; it goes through [`RiskGateway`], which applies the vault's
//! configured score cap on top of the oracle's own verdict.
//!
//! [`StaticRiskOracle`] is a table-driven oracle for simulations and tests.

mod error;
mod gateway;
mod static_oracle;

pub use error::{RiskError, RiskResult};
pub use gateway::RiskGateway;
pub use static_oracle::StaticRiskOracle;
