//! Session configuration
//!
//! A session file describes one participant's stage 2: engine parameters, the
//! round catalogs, the stage-1 result handed over by the stage-1 collaborator,
//! and (for batch runs) the stated certainty equivalents.
//!
//! ```toml
//! [engine]
//! participation_fee = 5.0
//! seed = 42
//!
//! [stage1.result]
//! payoff_today = 10.0
//! payoff_one_month = 20.0
//! paying_round = 1
//!
//! [[stage1.rounds]]
//! sure_amount_today = 10.0
//! outcome_a = 15.0
//! outcome_b = 30.0
//! prob_a = 0.5
//! prob_b = 0.5
//!
//! [[stage2.rounds]]
//! sure_amount_today = 12.0
//! outcome_a = 30.0
//! outcome_b = 50.0
//! prob_a = 0.4
//! prob_b = 0.6
//!
//! [[stage2.responses]]
//! round = 1
//! ce = 40.0
//! ```

use crate::elicitation::{
    ElicitationRecord, EngineError, ExperimentCatalog, MechanismRng, Round, RoundCatalog,
    SessionParams, Stage, Stage1Result, Stage2Session, DEFAULT_PARTICIPATION_FEE,
    DEFAULT_PRICE_DECIMALS,
};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Engine parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Fixed fee added to each paid amount.
    #[serde(default = "default_participation_fee")]
    pub participation_fee: f64,

    /// Decimal places of the comparison price.
    #[serde(default = "default_price_decimals")]
    pub price_decimals: u32,

    /// RNG seed. Unset means a fresh OS-derived seed per run (recorded in the report).
    #[serde(default)]
    pub seed: Option<u64>,

    /// Only use the first N stage-2 rounds (shortened demo sessions).
    #[serde(default)]
    pub stage2_length: Option<usize>,
}

fn default_participation_fee() -> f64 {
    DEFAULT_PARTICIPATION_FEE
}

fn default_price_decimals() -> u32 {
    DEFAULT_PRICE_DECIMALS
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            participation_fee: DEFAULT_PARTICIPATION_FEE,
            price_decimals: DEFAULT_PRICE_DECIMALS,
            seed: None,
            stage2_length: None,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> Result<(), EngineError> {
        if !self.participation_fee.is_finite() || self.participation_fee < 0.0 {
            return Err(EngineError::InvalidConfig(format!(
                "participation_fee must be a non-negative number, got {}",
                self.participation_fee
            )));
        }
        if self.price_decimals > 6 {
            return Err(EngineError::InvalidConfig(format!(
                "price_decimals must be at most 6, got {}",
                self.price_decimals
            )));
        }
        Ok(())
    }

    pub fn session_params(&self) -> SessionParams {
        SessionParams {
            participation_fee: self.participation_fee,
            price_decimals: self.price_decimals,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage1Section {
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub result: Option<Stage1Result>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Stage2Section {
    #[serde(default)]
    pub rounds: Vec<Round>,
    #[serde(default)]
    pub responses: Vec<ElicitationRecord>,
}

/// One participant session as read from disk.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SessionFile {
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub stage1: Stage1Section,
    #[serde(default)]
    pub stage2: Stage2Section,
}

impl SessionFile {
    /// Load from TOML file
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let session: Self = toml::from_str(&contents)?;
        session.engine.validate()?;
        Ok(session)
    }

    /// Load from `BDM_SESSION_PATH`, falling back to `session.toml`.
    pub fn from_env() -> anyhow::Result<Self> {
        let path =
            std::env::var("BDM_SESSION_PATH").unwrap_or_else(|_| "session.toml".to_string());
        tracing::debug!("Loading session from {}", path);
        Self::load(&path)
    }

    /// Save to TOML file
    pub fn save(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let contents = toml::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Build validated catalogs, applying `stage2_length`.
    pub fn catalog(&self) -> Result<ExperimentCatalog, EngineError> {
        let stage1 = RoundCatalog::new(Stage::One, self.stage1.rounds.clone())?;
        let mut stage2 = RoundCatalog::new(Stage::Two, self.stage2.rounds.clone())?;
        if let Some(len) = self.engine.stage2_length {
            stage2 = stage2.truncated(len);
        }
        ExperimentCatalog::new(stage1, stage2)
    }

    /// The stage-1 result; its absence is a broken collaborator contract.
    pub fn stage1_result(&self) -> Result<Stage1Result, EngineError> {
        self.stage1.result.ok_or(EngineError::MissingStage1Result)
    }

    /// Start stage 2 and submit the recorded responses in file order. A
    /// stage-1 paying round outside the stage-1 catalog is rejected.
    pub fn start_session(&self, rng: MechanismRng) -> Result<Stage2Session, EngineError> {
        let catalog = self.catalog()?;
        let stage1 = self.stage1_result()?;
        let mut session = Stage2Session::begin(catalog, stage1, self.engine.session_params(), rng)?;
        for record in &self.stage2.responses {
            session.submit_ce(record.round, record.ce)?;
        }
        Ok(session)
    }
}
