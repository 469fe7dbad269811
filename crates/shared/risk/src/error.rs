use keel_core::Bps;
use keel_ports::{OracleError, RiskLabel};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RiskError {
    #[error("Risk oracle did not approve {strategy}: score {score} ({label:?})")]
    NotApproved {
        strategy: String,
        score: Bps,
        label: RiskLabel,
    },

    #[error("Risk score {score} for {strategy} exceeds cap {cap}")]
    ScoreTooHigh {
        strategy: String,
        score: Bps,
        cap: Bps,
    },

    #[error(transparent)]
    Oracle(#[from] OracleError),
}

pub type RiskResult<T> = std::result::Result<T, RiskError>;
