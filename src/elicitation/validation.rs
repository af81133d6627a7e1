//! Certainty-equivalent validation and the per-participant response log.

use crate::elicitation::catalog::RoundCatalog;
use crate::elicitation::error::{CeRejection, EngineError, EngineResult};
use crate::elicitation::round::Round;
use crate::elicitation::selector::MechanismState;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, warn};

/// A stated certainty equivalent for one round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ElicitationRecord {
    pub round: usize,
    pub ce: f64,
}

/// Accept `value` if it lies within the round's outcome interval.
pub fn validate_ce(round: &Round, value: f64) -> Result<f64, CeRejection> {
    if value.is_finite() && round.contains(value) {
        Ok(value)
    } else {
        Err(CeRejection {
            low: round.low(),
            high: round.high(),
        })
    }
}

/// Stated CEs keyed by round. Each active round is answered at most once.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ElicitationLog {
    responses: BTreeMap<usize, f64>,
}

impl ElicitationLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validate and store a response.
    pub fn record(
        &mut self,
        state: &MechanismState,
        stage2: &RoundCatalog,
        round: usize,
        value: f64,
    ) -> EngineResult<ElicitationRecord> {
        if !state.is_active(round) {
            return Err(EngineError::RoundNotActive { round });
        }
        if self.responses.contains_key(&round) {
            return Err(EngineError::AlreadyElicited { round });
        }
        let ce = validate_ce(stage2.round(round)?, value).map_err(|rejection| {
            warn!(round, value, %rejection, "Rejected certainty equivalent");
            EngineError::CeOutOfRange { round, rejection }
        })?;
        self.responses.insert(round, ce);
        debug!(round, ce, "Recorded certainty equivalent");
        Ok(ElicitationRecord { round, ce })
    }

    pub fn ce_for(&self, round: usize) -> Option<f64> {
        self.responses.get(&round).copied()
    }

    /// Active rounds still awaiting a response, in round order.
    pub fn pending_rounds(&self, state: &MechanismState) -> Vec<usize> {
        state
            .active_rounds()
            .iter()
            .copied()
            .filter(|round| !self.responses.contains_key(round))
            .collect()
    }

    /// Next round to present, if any.
    pub fn next_round(&self, state: &MechanismState) -> Option<usize> {
        state
            .active_rounds()
            .iter()
            .copied()
            .find(|round| !self.responses.contains_key(round))
    }

    pub fn is_complete(&self, state: &MechanismState) -> bool {
        self.next_round(state).is_none()
    }

    pub fn records(&self) -> Vec<ElicitationRecord> {
        self.responses
            .iter()
            .map(|(&round, &ce)| ElicitationRecord { round, ce })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.responses.len()
    }

    pub fn is_empty(&self) -> bool {
        self.responses.is_empty()
    }
}
