//! Engine error types.
//!
//! Only [`EngineError::CeOutOfRange`] is recoverable: the caller re-prompts the
//! participant. Every other variant means a collaborator broke its contract
//! (bad catalog, missing stage-1 result, resolution out of order) and the run
//! must abort instead of paying a defaulted amount.

use crate::elicitation::round::Stage;

/// A stated certainty equivalent fell outside the lottery's outcome interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CeRejection {
    pub low: f64,
    pub high: f64,
}

impl std::fmt::Display for CeRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Please enter a value between {} and {}.", self.low, self.high)
    }
}

impl std::error::Error for CeRejection {}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Round index outside the stage catalog (1-based).
    RoundOutOfRange { stage: Stage, index: usize, len: usize },
    /// Round data violates the catalog invariants.
    InvalidRound { stage: Stage, index: usize, reason: String },
    /// Stated CE rejected at the boundary. Recoverable.
    CeOutOfRange { round: usize, rejection: CeRejection },
    /// CE submitted for a round that is degenerate or not in the stage.
    RoundNotActive { round: usize },
    /// CE already recorded for this round.
    AlreadyElicited { round: usize },
    /// Resolution requested before every active round was answered.
    ElicitationIncomplete { pending: Vec<usize> },
    /// No CE on record for the paying round.
    MissingElicitation { round: usize },
    /// Stage 2 governs payment but no stage-2 paying round was drawn.
    MissingPayingRound,
    /// The stage-1 collaborator supplied no resolved result.
    MissingStage1Result,
    /// Neither stage has a round eligible for the final draw.
    EmptyPaymentPool,
    /// Lottery weights could not form a distribution.
    LotteryWeights { round: usize, reason: String },
    /// Engine configuration rejected.
    InvalidConfig(String),
}

impl EngineError {
    /// Whether the caller may retry with corrected input.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::CeOutOfRange { .. })
    }
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::RoundOutOfRange { stage, index, len } => {
                write!(f, "Round {} out of range for {} ({} rounds)", index, stage, len)
            }
            Self::InvalidRound { stage, index, reason } => {
                write!(f, "Invalid round {} in {}: {}", index, stage, reason)
            }
            Self::CeOutOfRange { round, rejection } => {
                write!(f, "Round {}: {}", round, rejection)
            }
            Self::RoundNotActive { round } => {
                write!(f, "Round {} is not an active elicitation round", round)
            }
            Self::AlreadyElicited { round } => {
                write!(f, "Round {} already has a stated certainty equivalent", round)
            }
            Self::ElicitationIncomplete { pending } => {
                write!(f, "Elicitation incomplete, pending rounds: {:?}", pending)
            }
            Self::MissingElicitation { round } => {
                write!(f, "No certainty equivalent recorded for paying round {}", round)
            }
            Self::MissingPayingRound => {
                write!(f, "Stage 2 governs payment but no stage-2 paying round exists")
            }
            Self::MissingStage1Result => write!(f, "Stage 1 result missing"),
            Self::EmptyPaymentPool => {
                write!(f, "No rounds in either stage are eligible for payment")
            }
            Self::LotteryWeights { round, reason } => {
                write!(f, "Invalid lottery weights in round {}: {}", round, reason)
            }
            Self::InvalidConfig(msg) => write!(f, "Invalid engine config: {}", msg),
        }
    }
}

impl std::error::Error for EngineError {}

pub type EngineResult<T> = Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rejection_message_format() {
        let rejection = CeRejection { low: 30.0, high: 50.5 };
        assert_eq!(rejection.to_string(), "Please enter a value between 30 and 50.5.");
    }

    #[test]
    fn test_only_ce_rejection_is_recoverable() {
        let rejection = CeRejection { low: 1.0, high: 2.0 };
        assert!(EngineError::CeOutOfRange { round: 1, rejection }.is_recoverable());
        assert!(!EngineError::MissingStage1Result.is_recoverable());
        assert!(!EngineError::EmptyPaymentPool.is_recoverable());
        assert!(!EngineError::RoundOutOfRange { stage: Stage::Two, index: 9, len: 3 }.is_recoverable());
    }
}
