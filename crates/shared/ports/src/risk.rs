use keel_core::{BPS_DENOMINATOR, Bps};
use serde::{Deserialize, Serialize};

use crate::error::OracleResult;
use crate::strategy::Strategy;

/// Coarse risk bucket reported alongside the score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RiskLabel {
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLabel {
    /// Bucket a 0 - 10000 score
    pub fn from_score(score: Bps) -> Self {
        match score {
            0..=2_500 => RiskLabel::Low,
            2_501..=5_000 => RiskLabel::Medium,
            5_001..=7_500 => RiskLabel::High,
            _ => RiskLabel::Critical,
        }
    }
}

/// Oracle verdict on a strategy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RiskAssessment {
    /// 0 (safe) - 10000 (certain loss)
    pub score: Bps,
    pub label: RiskLabel,
    pub approved: bool,
}

impl RiskAssessment {
    pub fn approved(score: Bps) -> Self {
        Self {
            score: score.min(BPS_DENOMINATOR),
            label: RiskLabel::from_score(score),
            approved: true,
        }
    }

    pub fn rejected(score: Bps) -> Self {
        Self {
            approved: false,
            ..Self::approved(score)
        }
    }
}

/// Port for the external risk scorer consulted before admission
pub trait RiskOracle: Send + Sync {
    fn assess_strategy_risk(&self, strategy: &dyn Strategy) -> OracleResult<RiskAssessment>;
}
