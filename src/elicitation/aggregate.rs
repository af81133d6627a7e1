//! Payoff aggregation across both stages.
//!
//! Exactly one stage governs the paid amount; amounts are never blended. The
//! cross-stage totals are informational only.

use crate::elicitation::bdm::ResolvedPayoff;
use crate::elicitation::error::{EngineError, EngineResult};
use crate::elicitation::round::{Branch, Stage};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Default participation fee added to each paid amount.
pub const DEFAULT_PARTICIPATION_FEE: f64 = 5.0;

/// Already-resolved stage-1 outcome, supplied by the stage-1 collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Stage1Result {
    pub payoff_today: f64,
    pub payoff_one_month: f64,
    pub paying_round: usize,
    #[serde(default)]
    pub paying_asset: Option<Branch>,
}

/// The payment actually made to the participant.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FinalPayment {
    pub stage: Stage,
    /// Paying round within the governing stage.
    pub round: usize,
    pub final_paying_round: usize,
    pub today: f64,
    pub one_month: f64,
}

/// Both stages summed plus the fee. Not paid; shown for information.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PayoffSummary {
    pub total_today: f64,
    pub total_one_month: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PayoffAggregator {
    fee: f64,
}

impl Default for PayoffAggregator {
    fn default() -> Self {
        Self::new(DEFAULT_PARTICIPATION_FEE)
    }
}

impl PayoffAggregator {
    pub fn new(fee: f64) -> Self {
        Self { fee }
    }

    pub fn fee(&self) -> f64 {
        self.fee
    }

    /// Select the governing stage and add the fee to its amounts.
    pub fn aggregate(
        &self,
        stage1: &Stage1Result,
        stage2: &ResolvedPayoff,
        final_paying_round: usize,
        stage1_count: usize,
    ) -> EngineResult<FinalPayment> {
        let payment = if final_paying_round <= stage1_count {
            FinalPayment {
                stage: Stage::One,
                round: stage1.paying_round,
                final_paying_round,
                today: stage1.payoff_today + self.fee,
                one_month: stage1.payoff_one_month + self.fee,
            }
        } else {
            let round = stage2.paying_round.ok_or(EngineError::MissingPayingRound)?;
            FinalPayment {
                stage: Stage::Two,
                round,
                final_paying_round,
                today: stage2.payoff_today + self.fee,
                one_month: stage2.payoff_one_month + self.fee,
            }
        };
        info!(
            stage = payment.stage.number(),
            round = payment.round,
            today = payment.today,
            one_month = payment.one_month,
            "Final payment selected"
        );
        Ok(payment)
    }

    /// Informational totals over both stages.
    pub fn summary(&self, stage1: &Stage1Result, stage2: &ResolvedPayoff) -> PayoffSummary {
        PayoffSummary {
            total_today: stage1.payoff_today + stage2.payoff_today + self.fee,
            total_one_month: stage1.payoff_one_month + stage2.payoff_one_month + self.fee,
        }
    }
}
