//! BDM Payoff Library
//!
//! Incentive-compatible elicitation and payment resolution for stage 2 of the
//! save/invest experiment. Exposes the engine for the CLI and for tests.

pub mod config;
pub mod elicitation;

pub use config::{EngineConfig, SessionFile};
