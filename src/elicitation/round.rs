//! Round definitions
//!
//! A round offers a sure payment today against a two-branch lottery paid in
//! one month. Rounds are immutable configuration loaded once per session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tolerance for `prob_a + prob_b == 1`.
pub const PROBABILITY_SUM_TOLERANCE: f64 = 1e-9;

/// Experiment stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    One,
    Two,
}

impl Stage {
    pub fn number(&self) -> u8 {
        match self {
            Stage::One => 1,
            Stage::Two => 2,
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stage {}", self.number())
    }
}

/// Lottery branch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Branch {
    A,
    B,
}

impl fmt::Display for Branch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Branch::A => write!(f, "A"),
            Branch::B => write!(f, "B"),
        }
    }
}

/// One elicitation round.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Round {
    /// Certain payment available today.
    pub sure_amount_today: f64,
    /// One-month payoff of branch A.
    pub outcome_a: f64,
    /// One-month payoff of branch B.
    pub outcome_b: f64,
    pub prob_a: f64,
    pub prob_b: f64,
}

impl Round {
    pub fn new(sure_amount_today: f64, outcome_a: f64, outcome_b: f64, prob_a: f64, prob_b: f64) -> Self {
        Self {
            sure_amount_today,
            outcome_a,
            outcome_b,
            prob_a,
            prob_b,
        }
    }

    /// Check field invariants. Returns the violated constraint on failure.
    pub fn check(&self) -> Result<(), String> {
        let fields = [
            ("sure_amount_today", self.sure_amount_today),
            ("outcome_a", self.outcome_a),
            ("outcome_b", self.outcome_b),
            ("prob_a", self.prob_a),
            ("prob_b", self.prob_b),
        ];
        for (name, value) in fields {
            if !value.is_finite() {
                return Err(format!("{} is not finite", name));
            }
        }
        for (name, p) in [("prob_a", self.prob_a), ("prob_b", self.prob_b)] {
            if !(0.0..=1.0).contains(&p) {
                return Err(format!("{} = {} outside [0, 1]", name, p));
            }
        }
        if !(self.high() - self.low()).is_finite() {
            return Err("outcome interval width is not finite".to_string());
        }
        let sum = self.prob_a + self.prob_b;
        if (sum - 1.0).abs() > PROBABILITY_SUM_TOLERANCE {
            return Err(format!("prob_a + prob_b = {} (expected 1)", sum));
        }
        Ok(())
    }

    /// A round is degenerate when both branches pay the same or branch B can
    /// never occur. Degenerate rounds carry no elicitation information.
    pub fn is_degenerate(&self) -> bool {
        self.outcome_a == self.outcome_b || self.prob_a == 1.0
    }

    /// Lower end of the outcome interval.
    pub fn low(&self) -> f64 {
        self.outcome_a.min(self.outcome_b)
    }

    /// Upper end of the outcome interval.
    pub fn high(&self) -> f64 {
        self.outcome_a.max(self.outcome_b)
    }

    /// Whether `value` lies in `[low, high]`.
    pub fn contains(&self, value: f64) -> bool {
        value >= self.low() && value <= self.high()
    }

    pub fn outcome(&self, branch: Branch) -> f64 {
        match branch {
            Branch::A => self.outcome_a,
            Branch::B => self.outcome_b,
        }
    }

    /// Probability-weighted one-month payoff.
    pub fn expected_value(&self) -> f64 {
        self.prob_a * self.outcome_a + self.prob_b * self.outcome_b
    }

    /// Branch probabilities as whole percentages, as shown to participants.
    pub fn display_percentages(&self) -> (u32, u32) {
        (
            (self.prob_a * 100.0).round() as u32,
            (self.prob_b * 100.0).round() as u32,
        )
    }
}

/// Round `value` to `places` decimal places.
pub fn round_to(value: f64, places: u32) -> f64 {
    let factor = 10f64.powi(places as i32);
    (value * factor).round() / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_degenerate_equal_outcomes() {
        assert!(Round::new(10.0, 30.0, 30.0, 0.5, 0.5).is_degenerate());
    }

    #[test]
    fn test_degenerate_certain_a() {
        assert!(Round::new(10.0, 30.0, 50.0, 1.0, 0.0).is_degenerate());
    }

    #[test]
    fn test_certain_b_is_not_degenerate() {
        // Only prob_a == 1 counts; a certain B branch is still elicited.
        assert!(!Round::new(10.0, 30.0, 50.0, 0.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_degenerate_matches_definition_over_grid() {
        let outcomes = [0.0, 10.0, 25.5];
        let probs = [0.0, 0.3, 0.5, 1.0];
        for &a in &outcomes {
            for &b in &outcomes {
                for &pa in &probs {
                    let round = Round::new(5.0, a, b, pa, 1.0 - pa);
                    assert_eq!(round.is_degenerate(), a == b || pa == 1.0);
                }
            }
        }
    }

    #[test]
    fn test_interval_is_ordered() {
        let round = Round::new(12.0, 50.0, 30.0, 0.4, 0.6);
        assert_eq!(round.low(), 30.0);
        assert_eq!(round.high(), 50.0);
        assert!(round.contains(30.0));
        assert!(round.contains(50.0));
        assert!(!round.contains(50.01));
    }

    #[test]
    fn test_check_rejects_bad_probabilities() {
        assert!(Round::new(1.0, 2.0, 3.0, 0.4, 0.5).check().is_err());
        assert!(Round::new(1.0, 2.0, 3.0, -0.1, 1.1).check().is_err());
        assert!(Round::new(1.0, f64::NAN, 3.0, 0.5, 0.5).check().is_err());
        assert!(Round::new(1.0, 2.0, 3.0, 0.7, 0.3).check().is_ok());
    }

    #[test]
    fn test_display_percentages() {
        assert_eq!(Round::new(1.0, 2.0, 3.0, 0.35, 0.65).display_percentages(), (35, 65));
    }

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(35.456, 2), 35.46);
        assert_eq!(round_to(35.0, 2), 35.0);
    }

    #[test]
    fn test_check_rejects_unbounded_interval_width() {
        let round = Round::new(10.0, -1e308, 1e308, 0.5, 0.5);
        assert!(round.low().is_finite() && round.high().is_finite());
        let reason = round.check().unwrap_err();
        assert!(reason.contains("width"), "{}", reason);
        assert!(Round::new(10.0, -1e300, 1e300, 0.5, 0.5).check().is_ok());
    }
}
