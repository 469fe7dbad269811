use keel_core::{BPS_DENOMINATOR, Bps};
use keel_ports::{OracleError, RiskAssessment, RiskOracle, Strategy};
use log::{debug, warn};
use std::sync::Arc;

use crate::error::{RiskError, RiskResult};

/// Admission gate in front of the risk oracle
#[derive(Clone)]
pub struct RiskGateway {
    oracle: Arc<dyn RiskOracle>,
}

impl RiskGateway {
    pub fn new(oracle: Arc<dyn RiskOracle>) -> Self {
        Self { oracle }
    }

    /// Score `strategy` and check it may be admitted under `max_score`
    ///
    /// Passes only if the oracle approves AND the score is within the cap.
    pub fn assess(&self, strategy: &dyn Strategy, max_score: Bps) -> RiskResult<RiskAssessment> {
        let assessment = self.oracle.assess_strategy_risk(strategy)?;

        if assessment.score > BPS_DENOMINATOR {
            return Err(OracleError::ScoreOutOfRange(assessment.score).into());
        }

        if !assessment.approved {
            warn!(
                "[RISK] Oracle rejected {}: score={} label={:?}",
                strategy.name(),
                assessment.score,
                assessment.label
            );
            return Err(RiskError::NotApproved {
                strategy: strategy.name().to_string(),
                score: assessment.score,
                label: assessment.label,
            });
        }

        if assessment.score > max_score {
            warn!(
                "[RISK] {} score {} above cap {}",
                strategy.name(),
                assessment.score,
                max_score
            );
            return Err(RiskError::ScoreTooHigh {
                strategy: strategy.name().to_string(),
                score: assessment.score,
                cap: max_score,
            });
        }

        debug!(
            "[RISK] {} approved: score={} label={:?}",
            strategy.name(),
            assessment.score,
            assessment.label
        );
        Ok(assessment)
    }
}
