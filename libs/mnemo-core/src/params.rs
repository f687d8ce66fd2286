//! Scheduling parameters.
//!
//! One ParameterSet per user, with optional per-deck overrides merged on
//! top. The weight vector follows FSRS-4.5 (17 weights); the defaults are
//! the published research-derived values.

use serde::{Deserialize, Serialize};

use crate::error::{Result, SchedulerError};

/// Number of FSRS-4.5 weights.
pub const WEIGHT_COUNT: usize = 17;

/// Per-user scheduling configuration.
///
/// Read-only to the scheduling engine. Replaced wholesale by the optimizer,
/// never partially mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterSet {
    /// FSRS-4.5 weights.
    pub weights: [f64; WEIGHT_COUNT],
    /// Minute offsets for the Learning phase.
    pub learning_steps: Vec<u32>,
    /// Minute offsets for the Relearning phase.
    pub relearning_steps: Vec<u32>,
    /// Interval granted on graduating from Learning.
    pub graduating_interval_days: u32,
    /// Interval granted when a New/Learning card is rated Easy.
    pub easy_interval_days: u32,
    pub minimum_interval_days: u32,
    pub maximum_interval_days: u32,
    /// Target recall probability at review time, in (0, 1].
    pub desired_retention: f64,
    /// Extra damping applied to the post-lapse stability, in (0, 1].
    pub lapse_multiplier: f64,
    pub min_stability: f64,
    pub max_stability: f64,
    pub min_difficulty: f64,
    pub max_difficulty: f64,
}

impl Default for ParameterSet {
    fn default() -> Self {
        Self {
            weights: [
                0.4, 0.6, 2.4, 5.8, // w[0-3]: initial stability for Again, Hard, Good, Easy
                4.93,  // w[4]: initial difficulty base
                0.94,  // w[5]: initial difficulty modifier
                0.86,  // w[6]: difficulty delta per grade
                0.01,  // w[7]: mean reversion weight
                1.49,  // w[8]: stability growth base
                0.14,  // w[9]: stability decay
                0.94,  // w[10]: retrievability effect
                2.18,  // w[11]: forget stability base
                0.05,  // w[12]: difficulty on forget
                0.34,  // w[13]: stability on forget
                1.26,  // w[14]: retrievability on forget
                0.29,  // w[15]: hard penalty
                2.61,  // w[16]: easy bonus
            ],
            learning_steps: vec![1, 10],
            relearning_steps: vec![10],
            graduating_interval_days: 1,
            easy_interval_days: 4,
            minimum_interval_days: 1,
            maximum_interval_days: 36500,
            desired_retention: 0.9,
            lapse_multiplier: 1.0,
            min_stability: 0.1,
            max_stability: 36500.0,
            min_difficulty: 1.0,
            max_difficulty: 10.0,
        }
    }
}

impl ParameterSet {
    /// Check every invariant the formulas rely on.
    ///
    /// A violated invariant is fatal: the set must be rejected, not
    /// repaired, so that a modeling bug upstream stays visible.
    pub fn validate(&self) -> Result<()> {
        for (i, w) in self.weights.iter().enumerate() {
            if !w.is_finite() || *w < 0.0 {
                return Err(SchedulerError::InvariantViolation(format!(
                    "weight w{i} must be finite and non-negative, got {w}"
                )));
            }
        }
        if !(self.desired_retention > 0.0 && self.desired_retention <= 1.0) {
            return Err(SchedulerError::InvariantViolation(format!(
                "desired_retention must be in (0, 1], got {}",
                self.desired_retention
            )));
        }
        if !(self.lapse_multiplier > 0.0 && self.lapse_multiplier <= 1.0) {
            return Err(SchedulerError::InvariantViolation(format!(
                "lapse_multiplier must be in (0, 1], got {}",
                self.lapse_multiplier
            )));
        }
        if self.minimum_interval_days == 0 || self.minimum_interval_days > self.maximum_interval_days
        {
            return Err(SchedulerError::InvariantViolation(format!(
                "interval bounds must satisfy 1 <= minimum <= maximum, got {}..{}",
                self.minimum_interval_days, self.maximum_interval_days
            )));
        }
        if self.graduating_interval_days == 0 || self.easy_interval_days == 0 {
            return Err(SchedulerError::InvariantViolation(
                "graduating and easy intervals must be positive".to_string(),
            ));
        }
        if !(self.min_stability > 0.0 && self.min_stability < self.max_stability) {
            return Err(SchedulerError::InvariantViolation(format!(
                "stability bounds must satisfy 0 < min < max, got {}..{}",
                self.min_stability, self.max_stability
            )));
        }
        if !(self.min_difficulty > 0.0 && self.min_difficulty < self.max_difficulty) {
            return Err(SchedulerError::InvariantViolation(format!(
                "difficulty bounds must satisfy 0 < min < max, got {}..{}",
                self.min_difficulty, self.max_difficulty
            )));
        }
        Ok(())
    }

    /// Merge per-deck overrides on top of this set and re-validate.
    pub fn with_overrides(&self, overrides: &DeckOverrides) -> Result<ParameterSet> {
        let merged = ParameterSet {
            weights: self.weights,
            learning_steps: overrides
                .learning_steps
                .clone()
                .unwrap_or_else(|| self.learning_steps.clone()),
            relearning_steps: overrides
                .relearning_steps
                .clone()
                .unwrap_or_else(|| self.relearning_steps.clone()),
            graduating_interval_days: overrides
                .graduating_interval_days
                .unwrap_or(self.graduating_interval_days),
            easy_interval_days: overrides.easy_interval_days.unwrap_or(self.easy_interval_days),
            minimum_interval_days: overrides
                .minimum_interval_days
                .unwrap_or(self.minimum_interval_days),
            maximum_interval_days: overrides
                .maximum_interval_days
                .unwrap_or(self.maximum_interval_days),
            desired_retention: overrides.desired_retention.unwrap_or(self.desired_retention),
            lapse_multiplier: overrides.lapse_multiplier.unwrap_or(self.lapse_multiplier),
            min_stability: self.min_stability,
            max_stability: self.max_stability,
            min_difficulty: self.min_difficulty,
            max_difficulty: self.max_difficulty,
        };
        merged.validate()?;
        Ok(merged)
    }
}

/// Per-deck settings (all fields optional overrides).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeckOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub learning_steps: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub relearning_steps: Option<Vec<u32>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub graduating_interval_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easy_interval_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_interval_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_interval_days: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub desired_retention: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lapse_multiplier: Option<f64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_set_is_valid() {
        ParameterSet::default().validate().unwrap();
    }

    #[test]
    fn negative_weight_is_rejected() {
        let mut params = ParameterSet::default();
        params.weights[8] = -1.0;
        assert!(matches!(
            params.validate(),
            Err(SchedulerError::InvariantViolation(_))
        ));
    }

    #[test]
    fn retention_outside_unit_interval_is_rejected() {
        let mut params = ParameterSet::default();
        params.desired_retention = 0.0;
        assert!(params.validate().is_err());
        params.desired_retention = 1.2;
        assert!(params.validate().is_err());
    }

    #[test]
    fn inverted_interval_bounds_are_rejected() {
        let mut params = ParameterSet::default();
        params.minimum_interval_days = 100;
        params.maximum_interval_days = 10;
        assert!(params.validate().is_err());
    }

    #[test]
    fn inverted_stability_bounds_are_rejected() {
        let mut params = ParameterSet::default();
        params.min_stability = params.max_stability;
        assert!(params.validate().is_err());
    }

    #[test]
    fn overrides_merge_on_top_of_base() {
        let base = ParameterSet::default();
        let overrides = DeckOverrides {
            desired_retention: Some(0.85),
            learning_steps: Some(vec![5, 25]),
            ..Default::default()
        };
        let merged = base.with_overrides(&overrides).unwrap();
        assert_eq!(merged.desired_retention, 0.85);
        assert_eq!(merged.learning_steps, vec![5, 25]);
        assert_eq!(merged.easy_interval_days, base.easy_interval_days);
        assert_eq!(merged.weights, base.weights);
    }

    #[test]
    fn invalid_override_is_rejected_not_clamped() {
        let base = ParameterSet::default();
        let overrides = DeckOverrides {
            desired_retention: Some(1.5),
            ..Default::default()
        };
        assert!(base.with_overrides(&overrides).is_err());
    }
}
