mod allocation;
mod config;
mod metrics;
mod role;
mod strategy;
mod user;

pub use allocation::AllocationTarget;
pub use config::{
    ConfigError, MAX_MANAGEMENT_FEE_BPS, MAX_PERFORMANCE_FEE_BPS, MIN_REBALANCE_COOLDOWN_SECS,
    VaultConfig, VaultFlags,
};
pub use metrics::PerformanceMetrics;
pub use role::Role;
pub use strategy::{StrategyId, StrategyState};
pub use user::{AccountId, UserPosition};
