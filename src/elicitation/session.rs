//! Stage-2 session lifecycle
//!
//! Ties the components together for one participant:
//!
//! ```text
//! begin ──▶ MechanismState::draw ──▶ submit_ce* ──▶ finalize ──▶ SessionOutcome
//!                 (once)                            (once, cached)
//! ```
//!
//! Draws happen in `begin`; `finalize` resolves and aggregates once and caches
//! the outcome, so repeated reads for display never touch the RNG again.

use crate::elicitation::aggregate::{FinalPayment, PayoffAggregator, PayoffSummary, Stage1Result};
use crate::elicitation::bdm::{resolve_state, ResolvedPayoff};
use crate::elicitation::catalog::ExperimentCatalog;
use crate::elicitation::error::{EngineError, EngineResult};
use crate::elicitation::rng::MechanismRng;
use crate::elicitation::round::Stage;
use crate::elicitation::selector::{filter_degenerate, MechanismState, PoolSlot};
use crate::elicitation::validation::{ElicitationLog, ElicitationRecord};
use serde::Serialize;
use tracing::{debug, info};

/// Session parameters that do not vary by participant.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SessionParams {
    pub participation_fee: f64,
    pub price_decimals: u32,
}

/// Everything computed at the end of stage 2.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionOutcome {
    pub resolved: ResolvedPayoff,
    pub final_payment: FinalPayment,
    pub summary: PayoffSummary,
    pub pool_slot: PoolSlot,
}

/// Serializable audit record of a participant's stage 2.
#[derive(Debug, Clone, Serialize)]
pub struct SessionReport {
    pub seed: u64,
    pub samples_drawn: u64,
    pub participation_fee: f64,
    pub stage1: Stage1Result,
    pub mechanism: MechanismState,
    pub responses: Vec<ElicitationRecord>,
    pub outcome: Option<SessionOutcome>,
}

/// The stage-1 paying round must index the stage-1 catalog.
fn check_stage1_result(catalog: &ExperimentCatalog, stage1: &Stage1Result) -> EngineResult<()> {
    let len = catalog.stage1().len();
    if stage1.paying_round == 0 || stage1.paying_round > len {
        return Err(EngineError::RoundOutOfRange {
            stage: Stage::One,
            index: stage1.paying_round,
            len,
        });
    }
    Ok(())
}

#[derive(Debug)]
pub struct Stage2Session {
    catalog: ExperimentCatalog,
    stage1: Stage1Result,
    aggregator: PayoffAggregator,
    state: MechanismState,
    log: ElicitationLog,
    rng: MechanismRng,
    outcome: Option<SessionOutcome>,
}

impl Stage2Session {
    /// Start stage 2: run the mechanism draws.
    pub fn begin(
        catalog: ExperimentCatalog,
        stage1: Stage1Result,
        params: SessionParams,
        mut rng: MechanismRng,
    ) -> EngineResult<Self> {
        check_stage1_result(&catalog, &stage1)?;
        let state = MechanismState::draw(&catalog, params.price_decimals, &mut rng)?;
        info!(
            seed = rng.seed(),
            active_rounds = state.active_rounds().len(),
            "Stage 2 session started"
        );
        Ok(Self {
            catalog,
            stage1,
            aggregator: PayoffAggregator::new(params.participation_fee),
            state,
            log: ElicitationLog::new(),
            rng,
            outcome: None,
        })
    }

    /// Continue from draws made earlier, e.g. rebuilt with
    /// [`MechanismState::from_draws`]. `rng` is only used for the lottery at
    /// resolution.
    pub fn resume(
        catalog: ExperimentCatalog,
        stage1: Stage1Result,
        params: SessionParams,
        state: MechanismState,
        rng: MechanismRng,
    ) -> EngineResult<Self> {
        check_stage1_result(&catalog, &stage1)?;
        if state.stage1_round_count() != catalog.stage1().len() {
            return Err(EngineError::InvalidConfig(format!(
                "mechanism state pools {} stage-1 rounds, catalog has {}",
                state.stage1_round_count(),
                catalog.stage1().len()
            )));
        }
        if state.active_rounds() != filter_degenerate(catalog.stage2().rounds()).as_slice() {
            return Err(EngineError::InvalidConfig(
                "mechanism state active rounds do not match the stage-2 catalog".to_string(),
            ));
        }
        Ok(Self {
            catalog,
            stage1,
            aggregator: PayoffAggregator::new(params.participation_fee),
            state,
            log: ElicitationLog::new(),
            rng,
            outcome: None,
        })
    }

    pub fn state(&self) -> &MechanismState {
        &self.state
    }

    pub fn catalog(&self) -> &ExperimentCatalog {
        &self.catalog
    }

    pub fn log(&self) -> &ElicitationLog {
        &self.log
    }

    /// Next round awaiting a CE.
    pub fn next_round(&self) -> Option<usize> {
        self.log.next_round(&self.state)
    }

    /// Record a stated CE. Out-of-range values come back as a recoverable
    /// [`EngineError::CeOutOfRange`] and leave the session unchanged.
    pub fn submit_ce(&mut self, round: usize, value: f64) -> EngineResult<ElicitationRecord> {
        self.log.record(&self.state, self.catalog.stage2(), round, value)
    }

    /// Resolve and aggregate. Runs once; later calls return the cached outcome.
    pub fn finalize(&mut self) -> EngineResult<&SessionOutcome> {
        match self.outcome {
            Some(ref outcome) => {
                debug!("Returning cached stage-2 outcome");
                Ok(outcome)
            }
            None => {
                let pending = self.log.pending_rounds(&self.state);
                if !pending.is_empty() {
                    return Err(EngineError::ElicitationIncomplete { pending });
                }
                let outcome = self.compute_outcome()?;
                Ok(&*self.outcome.insert(outcome))
            }
        }
    }

    fn compute_outcome(&mut self) -> EngineResult<SessionOutcome> {
        let resolved = resolve_state(&self.state, self.catalog.stage2(), &self.log, &mut self.rng)?;
        let final_payment = self.aggregator.aggregate(
            &self.stage1,
            &resolved,
            self.state.final_paying_round(),
            self.state.stage1_round_count(),
        )?;
        let summary = self.aggregator.summary(&self.stage1, &resolved);
        let pool_slot = self.state.pool_slot()?;
        Ok(SessionOutcome {
            resolved,
            final_payment,
            summary,
            pool_slot,
        })
    }

    pub fn outcome(&self) -> Option<&SessionOutcome> {
        self.outcome.as_ref()
    }

    pub fn report(&self) -> SessionReport {
        SessionReport {
            seed: self.rng.seed(),
            samples_drawn: self.rng.samples_drawn(),
            participation_fee: self.aggregator.fee(),
            stage1: self.stage1,
            mechanism: self.state.clone(),
            responses: self.log.records(),
            outcome: self.outcome.clone(),
        }
    }
}
