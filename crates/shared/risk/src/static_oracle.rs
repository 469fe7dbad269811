use keel_core::Bps;
use keel_ports::{OracleResult, RiskAssessment, RiskOracle, Strategy};
use std::collections::HashMap;

/// Table-driven risk oracle keyed by strategy name
///
/// Strategies not in the table get `default_score`. Anything scoring above
/// `approval_threshold` is not approved.
#[derive(Debug, Clone)]
pub struct StaticRiskOracle {
    scores: HashMap<String, Bps>,
    default_score: Bps,
    approval_threshold: Bps,
}

impl StaticRiskOracle {
    pub fn new(default_score: Bps, approval_threshold: Bps) -> Self {
        Self {
            scores: HashMap::new(),
            default_score,
            approval_threshold,
        }
    }

    /// Set the score for a named strategy
    pub fn with_score(mut self, name: impl Into<String>, score: Bps) -> Self {
        self.scores.insert(name.into(), score);
        self
    }

    pub fn set_score(&mut self, name: impl Into<String>, score: Bps) {
        self.scores.insert(name.into(), score);
    }

    fn score_for(&self, name: &str) -> Bps {
        self.scores.get(name).copied().unwrap_or(self.default_score)
    }
}

impl Default for StaticRiskOracle {
    fn default() -> Self {
        Self::new(5_000, 8_000)
    }
}

impl RiskOracle for StaticRiskOracle {
    fn assess_strategy_risk(&self, strategy: &dyn Strategy) -> OracleResult<RiskAssessment> {
        let score = self.score_for(strategy.name());
        Ok(if score <= self.approval_threshold {
            RiskAssessment::approved(score)
        } else {
            RiskAssessment::rejected(score)
        })
    }
}
