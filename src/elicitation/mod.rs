//! BDM Elicitation Engine
//!
//! Payoff resolution for stage 2 of the save/invest experiment.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────┐
//! │ ExperimentCatalog│  rounds per stage (read-only)
//! └────────┬─────────┘
//!          ▼
//! ┌──────────────────┐        ┌──────────────┐
//! │ MechanismState   │◀───────│ MechanismRng │  seeded ChaCha8
//! │ (draws, frozen)  │        └──────┬───────┘
//! └────────┬─────────┘               │
//!          ▼                         │
//! ┌──────────────────┐               │
//! │ ElicitationLog   │  validated CEs│
//! └────────┬─────────┘               │
//!          ▼                         ▼
//! ┌──────────────────┐        ┌──────────────┐
//! │ bdm::resolve     │───────▶│ lottery draw │
//! └────────┬─────────┘        └──────────────┘
//!          ▼
//! ┌──────────────────┐
//! │ PayoffAggregator │  stage 1 vs stage 2, + fee
//! └──────────────────┘
//! ```
//!
//! # Determinism Guarantees
//!
//! - **RNG**: all randomness flows through `MechanismRng`; a seed replays a run
//! - **Draws**: paying round, comparison price and final round are drawn once
//! - **Resolution**: computed once per session and cached

pub mod aggregate;
pub mod bdm;
pub mod catalog;
pub mod error;
pub mod rng;
pub mod round;
pub mod selector;
pub mod session;
pub mod validation;

// Re-exports for convenience
pub use aggregate::{
    FinalPayment, PayoffAggregator, PayoffSummary, Stage1Result, DEFAULT_PARTICIPATION_FEE,
};
pub use bdm::{play_lottery, resolve, resolve_state, PaymentMethod, ResolvedPayoff};
pub use catalog::{ExperimentCatalog, RoundCatalog};
pub use error::{CeRejection, EngineError, EngineResult};
pub use rng::MechanismRng;
pub use round::{round_to, Branch, Round, Stage};
pub use selector::{
    draw_comparison_price, draw_final_paying_round, draw_paying_round, filter_degenerate,
    locate_final_round, MechanismState, PoolSlot, DEFAULT_PRICE_DECIMALS,
};
pub use session::{SessionOutcome, SessionParams, SessionReport, Stage2Session};
pub use validation::{validate_ce, ElicitationLog, ElicitationRecord};
