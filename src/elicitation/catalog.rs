//! Round catalogs per stage.
//!
//! Read-only after construction. Indices are 1-based, matching round numbers
//! shown to participants.

use crate::elicitation::error::{EngineError, EngineResult};
use crate::elicitation::round::{Round, Stage};
use serde::Serialize;

/// Ordered rounds of one stage.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RoundCatalog {
    stage: Stage,
    rounds: Vec<Round>,
}

impl RoundCatalog {
    /// Build a catalog, validating every round.
    pub fn new(stage: Stage, rounds: Vec<Round>) -> EngineResult<Self> {
        for (i, round) in rounds.iter().enumerate() {
            round.check().map_err(|reason| EngineError::InvalidRound {
                stage,
                index: i + 1,
                reason,
            })?;
        }
        Ok(Self { stage, rounds })
    }

    pub fn stage(&self) -> Stage {
        self.stage
    }

    pub fn len(&self) -> usize {
        self.rounds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rounds.is_empty()
    }

    /// Round by 1-based index.
    pub fn round(&self, index: usize) -> EngineResult<&Round> {
        index
            .checked_sub(1)
            .and_then(|i| self.rounds.get(i))
            .ok_or(EngineError::RoundOutOfRange {
                stage: self.stage,
                index,
                len: self.rounds.len(),
            })
    }

    pub fn rounds(&self) -> &[Round] {
        &self.rounds
    }

    /// `(index, round)` pairs in catalog order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Round)> {
        self.rounds.iter().enumerate().map(|(i, r)| (i + 1, r))
    }

    /// Keep only the first `len` rounds (shortened demo sessions).
    pub fn truncated(mut self, len: usize) -> Self {
        self.rounds.truncate(len);
        self
    }
}

/// Catalogs of both stages.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExperimentCatalog {
    stage1: RoundCatalog,
    stage2: RoundCatalog,
}

impl ExperimentCatalog {
    pub fn new(stage1: RoundCatalog, stage2: RoundCatalog) -> EngineResult<Self> {
        if stage1.stage() != Stage::One || stage2.stage() != Stage::Two {
            return Err(EngineError::InvalidConfig(format!(
                "catalog stages out of order: {} / {}",
                stage1.stage(),
                stage2.stage()
            )));
        }
        Ok(Self { stage1, stage2 })
    }

    pub fn stage(&self, stage: Stage) -> &RoundCatalog {
        match stage {
            Stage::One => &self.stage1,
            Stage::Two => &self.stage2,
        }
    }

    pub fn round(&self, stage: Stage, index: usize) -> EngineResult<&Round> {
        self.stage(stage).round(index)
    }

    pub fn stage1(&self) -> &RoundCatalog {
        &self.stage1
    }

    pub fn stage2(&self) -> &RoundCatalog {
        &self.stage2
    }
}
