//! BDM resolution
//!
//! Compares the drawn comparison price with the stated certainty equivalent:
//! - `price < ce`: the participant plays the lottery of the paying round
//! - `price >= ce`: the participant receives `price` in one month
//!
//! The sure amount today is paid in both cases. Equality resolves to the sure
//! amount; only a strictly lower price sends the participant to the lottery.

use crate::elicitation::catalog::RoundCatalog;
use crate::elicitation::error::{EngineError, EngineResult};
use crate::elicitation::rng::MechanismRng;
use crate::elicitation::round::{Branch, Round};
use crate::elicitation::selector::MechanismState;
use crate::elicitation::validation::ElicitationLog;
use rand::distributions::{Distribution, WeightedIndex};
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::info;

/// How the stage-2 one-month amount was determined.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentMethod {
    Lottery,
    SureAmount,
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PaymentMethod::Lottery => write!(f, "Lottery"),
            PaymentMethod::SureAmount => write!(f, "Sure amount"),
        }
    }
}

/// Stage-2 payoff after BDM resolution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedPayoff {
    /// Stage-2 paying round, `None` when no round was active.
    pub paying_round: Option<usize>,
    pub payoff_today: f64,
    pub payoff_one_month: f64,
    /// Branch paid out when the lottery was played.
    pub executed_asset: Option<Branch>,
    pub method: PaymentMethod,
    pub comparison_price: Option<f64>,
    pub stated_ce: Option<f64>,
    /// The paying round's lottery, kept for the results display.
    pub lottery: Option<Round>,
}

impl ResolvedPayoff {
    /// Payoff when stage 2 had no active round.
    pub fn no_paying_round() -> Self {
        Self {
            paying_round: None,
            payoff_today: 0.0,
            payoff_one_month: 0.0,
            executed_asset: None,
            method: PaymentMethod::SureAmount,
            comparison_price: None,
            stated_ce: None,
            lottery: None,
        }
    }
}

/// Draw the lottery branch of `round`. A zero-probability B branch skips the
/// draw entirely and pays A.
pub fn play_lottery(round_index: usize, round: &Round, rng: &mut MechanismRng) -> EngineResult<Branch> {
    if round.prob_b == 0.0 {
        return Ok(Branch::A);
    }
    let weights = WeightedIndex::<f64>::new([round.prob_a, round.prob_b]).map_err(|e| {
        EngineError::LotteryWeights {
            round: round_index,
            reason: e.to_string(),
        }
    })?;
    Ok(match weights.sample(rng.rng()) {
        0 => Branch::A,
        _ => Branch::B,
    })
}

/// Resolve one paying round.
pub fn resolve(
    round_index: usize,
    round: &Round,
    ce: f64,
    comparison_price: f64,
    rng: &mut MechanismRng,
) -> EngineResult<ResolvedPayoff> {
    let (method, executed_asset, payoff_one_month) = if comparison_price < ce {
        let branch = play_lottery(round_index, round, rng)?;
        (PaymentMethod::Lottery, Some(branch), round.outcome(branch))
    } else {
        (PaymentMethod::SureAmount, None, comparison_price)
    };

    Ok(ResolvedPayoff {
        paying_round: Some(round_index),
        payoff_today: round.sure_amount_today,
        payoff_one_month,
        executed_asset,
        method,
        comparison_price: Some(comparison_price),
        stated_ce: Some(ce),
        lottery: Some(*round),
    })
}

/// Resolve the frozen mechanism state against the participant's responses.
pub fn resolve_state(
    state: &MechanismState,
    stage2: &RoundCatalog,
    log: &ElicitationLog,
    rng: &mut MechanismRng,
) -> EngineResult<ResolvedPayoff> {
    let (round_index, price) = match (state.paying_round_stage2(), state.comparison_price()) {
        (Some(round), Some(price)) => (round, price),
        _ => {
            info!("No active stage-2 round; stage-2 payoff is zero");
            return Ok(ResolvedPayoff::no_paying_round());
        }
    };
    let round = stage2.round(round_index)?;
    let ce = log
        .ce_for(round_index)
        .ok_or(EngineError::MissingElicitation { round: round_index })?;

    let resolved = resolve(round_index, round, ce, price, rng)?;
    info!(
        round = round_index,
        ce,
        price,
        method = %resolved.method,
        asset = ?resolved.executed_asset,
        one_month = resolved.payoff_one_month,
        "Resolved BDM paying round"
    );
    Ok(resolved)
}
