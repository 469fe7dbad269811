//! Vault errors

use keel_core::{AccountId, Amount, Bps, ConfigError, Role, StrategyId};
use keel_ports::StrategyError;
use keel_risk::RiskError;
use thiserror::Error;

/// Reasons a strategy is refused admission
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AdmissionError {
    #[error("Handle is already bound to active strategy {0}")]
    HandleInUse(StrategyId),

    #[error("Max allocation {0} bps exceeds 10000")]
    MaxAllocationTooHigh(Bps),

    #[error("Strategy {0} is already active")]
    AlreadyActive(StrategyId),

    #[error("Strategy capacity reached: {max} active")]
    CapacityReached { max: usize },

    #[error(transparent)]
    Risk(#[from] RiskError),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VaultError {
    #[error("Admission rejected: {0}")]
    Admission(#[from] AdmissionError),

    #[error("Execution failed for {strategy}: {source}")]
    Execution {
        strategy: StrategyId,
        source: StrategyError,
    },

    #[error("Harvest failed for {strategy}: {source}")]
    Harvest {
        strategy: StrategyId,
        source: StrategyError,
    },

    #[error("Emergency exit failed for {strategy}: {source}")]
    EmergencyExit {
        strategy: StrategyId,
        source: StrategyError,
    },

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Reentrant call rejected: another vault operation is in progress")]
    Concurrency,

    #[error("Unauthorized: {caller} lacks role {role:?}")]
    Unauthorized { caller: AccountId, role: Role },

    #[error("Vault is paused: {reason}")]
    Paused { reason: String },

    #[error("Unknown strategy: {0}")]
    UnknownStrategy(StrategyId),

    #[error("Strategy {0} is not active")]
    StrategyInactive(StrategyId),

    #[error("No position for account {0}")]
    UnknownAccount(AccountId),

    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: Amount, available: Amount },

    #[error("Insufficient shares: requested {requested}, held {held}")]
    InsufficientShares { requested: Amount, held: Amount },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
}

pub type VaultResult<T> = std::result::Result<T, VaultError>;
