//! Keel Core Domain
//!
//! Pure domain types for the Keel vault orchestrator.
//! This crate contains no async, no I/O, and is 100% unit testable.

pub mod entities;
pub mod values;

// Re-export commonly used types at crate root
pub use entities::{
    // Access control
    AccountId,
    // Allocation
    AllocationTarget,
    // Configuration
    ConfigError,
    // Metrics
    PerformanceMetrics,
    Role,
    // Strategy identity & lifecycle
    StrategyId,
    StrategyState,
    // Depositors
    UserPosition,
    VaultConfig,
    VaultFlags,
};
pub use values::{
    Amount, BPS_DENOMINATOR, Bps, MAX_REPORTED_AMOUNT, Timestamp, apply_bps, ratio_bps,
    reported_amount,
};
