use thiserror::Error;

/// Failures reported by a strategy capability
///
/// The vault treats every variant as isolated to the strategy that raised it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrategyError {
    #[error("Execution failed: {0}")]
    Execution(String),

    #[error("Harvest failed: {0}")]
    Harvest(String),

    #[error("Emergency exit failed: {0}")]
    EmergencyExit(String),

    #[error("Valuation failed: {0}")]
    Valuation(String),
}

pub type StrategyResult<T> = std::result::Result<T, StrategyError>;

/// Failures reported by the risk oracle
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum OracleError {
    #[error("Risk oracle unavailable: {0}")]
    Unavailable(String),

    #[error("Risk score {0} out of range")]
    ScoreOutOfRange(u32),
}

pub type OracleResult<T> = std::result::Result<T, OracleError>;
