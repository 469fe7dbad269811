//! Vault configuration
//!
//! Loaded from JSON (every field has a default) and validated before the
//! vault accepts it.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::values::{Amount, BPS_DENOMINATOR, Bps};

/// Rebalances are never allowed more often than every 4 hours
pub const MIN_REBALANCE_COOLDOWN_SECS: u64 = 4 * 60 * 60;

/// Performance fee cap (30%)
pub const MAX_PERFORMANCE_FEE_BPS: Bps = 3_000;

/// Management fee cap (5% per year)
pub const MAX_MANAGEMENT_FEE_BPS: Bps = 500;

/// Configuration errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid {field}: {reason}")]
    InvalidParameter { field: &'static str, reason: String },

    #[error("Allocation targets exceed 100%: {total} bps")]
    AllocationOverflow { total: Bps },

    #[error("Failed to read config {path}: {error}")]
    Io { path: String, error: String },

    #[error("Failed to parse config: {0}")]
    Parse(String),
}

impl ConfigError {
    pub fn invalid(field: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::InvalidParameter {
            field,
            reason: reason.into(),
        }
    }
}

/// Behaviour switches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultFlags {
    /// Deposits may trigger a rebalance when drift warrants it
    pub auto_rebalance: bool,
    /// Allows automatic quarantine of failing or losing strategies
    pub emergency_mode_enabled: bool,
    /// Net harvested yield is redeployed into the strategy that produced it
    pub yield_compounding: bool,
}

impl Default for VaultFlags {
    fn default() -> Self {
        Self {
            auto_rebalance: true,
            emergency_mode_enabled: true,
            yield_compounding: false,
        }
    }
}

/// Vault-wide parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultConfig {
    /// Maximum number of simultaneously active strategies
    pub max_strategies: usize,
    /// Drift (bps) at which a rebalance is warranted
    pub rebalance_threshold_bps: Bps,
    /// Highest risk score accepted at admission
    pub max_risk_score: Bps,
    /// Valuation loss (bps of tracked assets) that triggers an automatic exit
    pub emergency_exit_threshold_bps: Bps,
    /// Fee on harvested yield
    pub performance_fee_bps: Bps,
    /// Annual fee on TVL
    pub management_fee_bps: Bps,
    pub flags: VaultFlags,
    pub min_deposit: Amount,
    pub max_deposit: Amount,
    /// Minimum time between automatic rebalances
    pub rebalance_cooldown_secs: u64,
    /// Consecutive failed valuations served from cache before quarantine
    pub max_stale_valuations: u32,
    /// Account credited with collected fees
    pub fee_recipient: String,
    /// Number of journal entries kept in memory
    pub journal_capacity: usize,
}

impl Default for VaultConfig {
    fn default() -> Self {
        Self {
            max_strategies: 15,
            rebalance_threshold_bps: 500,
            max_risk_score: 7_000,
            emergency_exit_threshold_bps: 2_000,
            performance_fee_bps: 1_000,
            management_fee_bps: 200,
            flags: VaultFlags::default(),
            min_deposit: dec!(1),
            max_deposit: dec!(1_000_000),
            rebalance_cooldown_secs: MIN_REBALANCE_COOLDOWN_SECS,
            max_stale_valuations: 3,
            fee_recipient: "treasury".to_string(),
            journal_capacity: 1_024,
        }
    }
}

impl VaultConfig {
    /// Load configuration from a JSON file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(|e| ConfigError::Io {
            path: path.as_ref().display().to_string(),
            error: e.to_string(),
        })?;

        Self::from_json(&content)
    }

    /// Parse and validate configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Check every parameter against its allowed range
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_strategies == 0 {
            return Err(ConfigError::invalid("max_strategies", "must be at least 1"));
        }

        for (field, value) in [
            ("rebalance_threshold_bps", self.rebalance_threshold_bps),
            ("max_risk_score", self.max_risk_score),
            ("emergency_exit_threshold_bps", self.emergency_exit_threshold_bps),
        ] {
            if value > BPS_DENOMINATOR {
                return Err(ConfigError::invalid(
                    field,
                    format!("{} exceeds {}", value, BPS_DENOMINATOR),
                ));
            }
        }

        if self.performance_fee_bps > MAX_PERFORMANCE_FEE_BPS {
            return Err(ConfigError::invalid(
                "performance_fee_bps",
                format!("{} exceeds cap {}", self.performance_fee_bps, MAX_PERFORMANCE_FEE_BPS),
            ));
        }
        if self.management_fee_bps > MAX_MANAGEMENT_FEE_BPS {
            return Err(ConfigError::invalid(
                "management_fee_bps",
                format!("{} exceeds cap {}", self.management_fee_bps, MAX_MANAGEMENT_FEE_BPS),
            ));
        }

        if self.min_deposit < Decimal::ZERO {
            return Err(ConfigError::invalid("min_deposit", "must not be negative"));
        }
        if self.min_deposit > self.max_deposit {
            return Err(ConfigError::invalid(
                "max_deposit",
                format!("{} below min_deposit {}", self.max_deposit, self.min_deposit),
            ));
        }

        if self.rebalance_cooldown_secs < MIN_REBALANCE_COOLDOWN_SECS {
            return Err(ConfigError::invalid(
                "rebalance_cooldown_secs",
                format!(
                    "{} below minimum {}",
                    self.rebalance_cooldown_secs, MIN_REBALANCE_COOLDOWN_SECS
                ),
            ));
        }

        if self.journal_capacity == 0 {
            return Err(ConfigError::invalid("journal_capacity", "must be at least 1"));
        }

        Ok(())
    }

    /// Is `amount` an acceptable single deposit?
    pub fn deposit_in_range(&self, amount: Amount) -> bool {
        amount >= self.min_deposit && amount <= self.max_deposit && amount > Decimal::ZERO
    }
}
