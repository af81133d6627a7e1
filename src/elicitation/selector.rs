//! Round selection and mechanism draws
//!
//! Filters degenerate rounds and performs the three per-participant draws:
//! 1. stage-2 paying round, uniform over active rounds
//! 2. BDM comparison price, uniform over the paying round's outcome interval
//! 3. final paying round, uniform over the pooled stage-1 + active stage-2 rounds
//!
//! The draws happen once in [`MechanismState::draw`]. The resulting state is
//! frozen; everything downstream reads it and never redraws.

use crate::elicitation::catalog::{ExperimentCatalog, RoundCatalog};
use crate::elicitation::error::{EngineError, EngineResult};
use crate::elicitation::rng::MechanismRng;
use crate::elicitation::round::{round_to, Round, Stage};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Default rounding of the comparison price.
pub const DEFAULT_PRICE_DECIMALS: u32 = 2;

// =============================================================================
// Draw primitives
// =============================================================================

/// 1-based indices of non-degenerate rounds, in catalog order.
pub fn filter_degenerate(rounds: &[Round]) -> Vec<usize> {
    rounds
        .iter()
        .enumerate()
        .filter(|(_, round)| !round.is_degenerate())
        .map(|(i, _)| i + 1)
        .collect()
}

/// Uniform choice of the stage-2 paying round. `None` when nothing is active;
/// no randomness is consumed in that case.
pub fn draw_paying_round(active_rounds: &[usize], rng: &mut MechanismRng) -> Option<usize> {
    if active_rounds.is_empty() {
        return None;
    }
    active_rounds.choose(rng.rng()).copied()
}

/// Uniform comparison price over `[low, high]`, rounded to `decimals`.
///
/// The rounded value is clamped back into the interval so outcome values with
/// more precision than `decimals` cannot push the price outside it.
pub fn draw_comparison_price(round: &Round, decimals: u32, rng: &mut MechanismRng) -> f64 {
    let (low, high) = (round.low(), round.high());
    let raw: f64 = rng.rng().gen_range(low..=high);
    round_to(raw, decimals).clamp(low, high)
}

/// Uniform draw over `[1, stage1_count + active_count]`.
pub fn draw_final_paying_round(
    stage1_count: usize,
    active_count: usize,
    rng: &mut MechanismRng,
) -> EngineResult<usize> {
    let pool = stage1_count + active_count;
    if pool == 0 {
        return Err(EngineError::EmptyPaymentPool);
    }
    Ok(rng.rng().gen_range(1..=pool))
}

/// Where the final paying round lands in the pooled index space.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum PoolSlot {
    /// Slot `round` of stage 1.
    Stage1 { round: usize },
    /// Position `active_position` (1-based) among active stage-2 rounds,
    /// which is stage-2 round `round`.
    Stage2 { active_position: usize, round: usize },
}

impl PoolSlot {
    pub fn stage(&self) -> Stage {
        match self {
            PoolSlot::Stage1 { .. } => Stage::One,
            PoolSlot::Stage2 { .. } => Stage::Two,
        }
    }
}

/// Map a pooled index back to its stage. `1..=stage1_count` is stage 1, the
/// remainder indexes the active stage-2 rounds.
pub fn locate_final_round(
    final_paying_round: usize,
    stage1_count: usize,
    active_rounds: &[usize],
) -> EngineResult<PoolSlot> {
    let pool = stage1_count + active_rounds.len();
    if final_paying_round == 0 || final_paying_round > pool {
        return Err(EngineError::InvalidConfig(format!(
            "final paying round {} outside pool of {}",
            final_paying_round, pool
        )));
    }
    if final_paying_round <= stage1_count {
        return Ok(PoolSlot::Stage1 { round: final_paying_round });
    }
    let active_position = final_paying_round - stage1_count;
    Ok(PoolSlot::Stage2 {
        active_position,
        round: active_rounds[active_position - 1],
    })
}

// =============================================================================
// Mechanism state
// =============================================================================

/// Per-participant draws, frozen after construction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MechanismState {
    stage1_round_count: usize,
    active_rounds: Vec<usize>,
    paying_round_stage2: Option<usize>,
    comparison_price: Option<f64>,
    final_paying_round: usize,
}

impl MechanismState {
    /// Run all draws for one participant.
    pub fn draw(
        catalog: &ExperimentCatalog,
        price_decimals: u32,
        rng: &mut MechanismRng,
    ) -> EngineResult<Self> {
        let stage2 = catalog.stage2();
        let stage1_round_count = catalog.stage1().len();
        let active_rounds = filter_degenerate(stage2.rounds());
        debug!(
            total = stage2.len(),
            active = active_rounds.len(),
            "Filtered degenerate stage-2 rounds"
        );

        let paying_round_stage2 = draw_paying_round(&active_rounds, rng);
        let comparison_price = match paying_round_stage2 {
            Some(index) => Some(draw_comparison_price(stage2.round(index)?, price_decimals, rng)),
            None => None,
        };
        let final_paying_round =
            draw_final_paying_round(stage1_round_count, active_rounds.len(), rng)?;

        info!(
            paying_round = ?paying_round_stage2,
            comparison_price = ?comparison_price,
            final_paying_round,
            stage1_rounds = stage1_round_count,
            "Mechanism draws complete"
        );

        Ok(Self {
            stage1_round_count,
            active_rounds,
            paying_round_stage2,
            comparison_price,
            final_paying_round,
        })
    }

    /// Assemble a state from already-drawn values (replay of a stored run).
    pub fn from_draws(
        stage2: &RoundCatalog,
        stage1_round_count: usize,
        paying_round_stage2: Option<usize>,
        comparison_price: Option<f64>,
        final_paying_round: usize,
    ) -> EngineResult<Self> {
        let active_rounds = filter_degenerate(stage2.rounds());
        match (paying_round_stage2, comparison_price) {
            (Some(round), Some(price)) => {
                if !active_rounds.contains(&round) {
                    return Err(EngineError::RoundNotActive { round });
                }
                let r = stage2.round(round)?;
                if !r.contains(price) {
                    return Err(EngineError::InvalidConfig(format!(
                        "comparison price {} outside [{}, {}]",
                        price,
                        r.low(),
                        r.high()
                    )));
                }
            }
            (None, None) => {
                if !active_rounds.is_empty() {
                    return Err(EngineError::InvalidConfig(
                        "active rounds exist but no paying round given".to_string(),
                    ));
                }
            }
            _ => {
                return Err(EngineError::InvalidConfig(
                    "paying round and comparison price must be given together".to_string(),
                ))
            }
        }
        locate_final_round(final_paying_round, stage1_round_count, &active_rounds)?;
        Ok(Self {
            stage1_round_count,
            active_rounds,
            paying_round_stage2,
            comparison_price,
            final_paying_round,
        })
    }

    pub fn stage1_round_count(&self) -> usize {
        self.stage1_round_count
    }

    pub fn active_rounds(&self) -> &[usize] {
        &self.active_rounds
    }

    pub fn is_active(&self, round: usize) -> bool {
        self.active_rounds.contains(&round)
    }

    pub fn paying_round_stage2(&self) -> Option<usize> {
        self.paying_round_stage2
    }

    pub fn comparison_price(&self) -> Option<f64> {
        self.comparison_price
    }

    pub fn final_paying_round(&self) -> usize {
        self.final_paying_round
    }

    /// Slot of the final paying round in the pooled index space.
    pub fn pool_slot(&self) -> EngineResult<PoolSlot> {
        locate_final_round(self.final_paying_round, self.stage1_round_count, &self.active_rounds)
    }

    /// Stage whose payoff is actually paid.
    pub fn governing_stage(&self) -> Stage {
        if self.final_paying_round <= self.stage1_round_count {
            Stage::One
        } else {
            Stage::Two
        }
    }
}
