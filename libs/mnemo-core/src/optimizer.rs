//! Per-user weight fitting.
//!
//! Refits the FSRS weight vector against a user's realized review outcomes.
//! The search is deliberately conservative: each weight may move by at most
//! a fixed fraction of its current value per invocation, so a refit can
//! never destabilize existing schedules. Applying the returned candidate is
//! the caller's decision, which keeps a rollback path open.

use tracing::{debug, info};

use crate::error::{Result, SchedulerError};
use crate::model;
use crate::params::{ParameterSet, WEIGHT_COUNT};
use crate::types::ReviewEvent;

/// Review-count milestone at which the first refit becomes due.
pub const FIRST_MILESTONE: u32 = 50;

/// Whether a refit is due, and why.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OptimizeCheck {
    pub should: bool,
    pub reason: String,
}

/// Decide whether the user's review count warrants a refit.
///
/// Triggers at the first milestone, then every doubling of the count at
/// which the weights were last optimized.
pub fn check_needed(review_count: u32, last_optimized_at: u32) -> OptimizeCheck {
    if last_optimized_at == 0 {
        if review_count >= FIRST_MILESTONE {
            return OptimizeCheck {
                should: true,
                reason: format!("reached first milestone of {FIRST_MILESTONE} reviews"),
            };
        }
        return OptimizeCheck {
            should: false,
            reason: format!(
                "{review_count} of {FIRST_MILESTONE} reviews toward first milestone"
            ),
        };
    }
    let next = last_optimized_at.saturating_mul(2);
    if review_count >= next {
        OptimizeCheck {
            should: true,
            reason: format!("review count doubled since last refit at {last_optimized_at}"),
        }
    } else {
        OptimizeCheck {
            should: false,
            reason: format!("{review_count} of {next} reviews toward next refit"),
        }
    }
}

/// Candidate produced by a refit.
#[derive(Debug, Clone)]
pub struct OptimizerOutcome {
    pub candidate: ParameterSet,
    /// Combined sample-size and calibration quality score in [0, 1].
    pub confidence: f64,
    /// Number of history events that carried predictive signal.
    pub sample_size: usize,
}

/// Optimizer configuration.
#[derive(Debug, Clone)]
pub struct Optimizer {
    /// Minimum usable history before a refit is attempted.
    pub min_sample: usize,
    /// Per-invocation cap on each weight's relative movement.
    pub max_delta_fraction: f64,
    /// Coordinate-descent passes over the weight vector.
    pub passes: usize,
}

impl Default for Optimizer {
    fn default() -> Self {
        Self {
            min_sample: FIRST_MILESTONE as usize,
            max_delta_fraction: 0.10,
            passes: 2,
        }
    }
}

impl Optimizer {
    /// Fit a candidate weight vector against the user's review history.
    ///
    /// Only events whose prior state carried a usable memory prediction
    /// (positive stability before the review) contribute. Candidates that
    /// violate a ParameterSet invariant are rejected outright; nothing is
    /// clamped into validity.
    pub fn optimize(
        &self,
        history: &[ReviewEvent],
        current: &ParameterSet,
    ) -> Result<OptimizerOutcome> {
        current.validate()?;

        let sample: Vec<Observation> = history
            .iter()
            .filter(|e| e.stability_before > 0.0)
            .map(|e| Observation {
                elapsed_days: e.elapsed_days,
                stability: e.stability_before,
                recalled: e.rating.is_success(),
            })
            .collect();

        if sample.len() < self.min_sample {
            return Err(SchedulerError::InsufficientData {
                required: self.min_sample,
                actual: sample.len(),
            });
        }

        let base = current.weights;
        let mut best = base;
        let mut best_loss = calibration_loss(&best, current, &sample);

        for _ in 0..self.passes {
            for i in 0..WEIGHT_COUNT {
                // Probe within the movement budget around the *original*
                // weight, so repeated passes cannot compound past the cap.
                let budget = self.max_delta_fraction * base[i].abs();
                for probe in [
                    base[i] - budget,
                    base[i] - budget / 2.0,
                    base[i] + budget / 2.0,
                    base[i] + budget,
                ] {
                    let mut weights = best;
                    weights[i] = probe;
                    let candidate = ParameterSet {
                        weights,
                        ..current.clone()
                    };
                    if let Err(err) = candidate.validate() {
                        debug!(weight = i, probe, %err, "rejected candidate");
                        continue;
                    }
                    let loss = calibration_loss(&weights, current, &sample);
                    if loss < best_loss {
                        best_loss = loss;
                        best = weights;
                    }
                }
            }
        }

        let candidate = ParameterSet {
            weights: best,
            ..current.clone()
        };
        candidate.validate()?;

        let confidence = confidence_score(best_loss, sample.len(), self.min_sample);
        info!(
            sample_size = sample.len(),
            loss = best_loss,
            confidence,
            "optimizer produced candidate"
        );

        Ok(OptimizerOutcome {
            candidate,
            confidence,
            sample_size: sample.len(),
        })
    }
}

struct Observation {
    elapsed_days: f64,
    stability: f64,
    recalled: bool,
}

/// Brier score of predicted retrievability against observed outcomes.
///
/// The prediction replays each review at the stability the card had then,
/// rescaled by how the candidate's growth terms differ from the current
/// ones, so weight changes actually move the score.
fn calibration_loss(weights: &[f64; WEIGHT_COUNT], current: &ParameterSet, sample: &[Observation]) -> f64 {
    let growth_scale = growth_scale(weights) / growth_scale(&current.weights);
    let sum: f64 = sample
        .iter()
        .map(|obs| {
            let predicted = model::retrievability(obs.elapsed_days, obs.stability * growth_scale);
            let outcome = if obs.recalled { 1.0 } else { 0.0 };
            (predicted - outcome).powi(2)
        })
        .sum();
    sum / sample.len() as f64
}

/// Scalar summary of how aggressively a weight vector grows stability.
fn growth_scale(weights: &[f64; WEIGHT_COUNT]) -> f64 {
    // Mid-range reference card: D = 5, R = 0.9, S = 1.
    let d_factor = 11.0 - 5.0;
    let r_factor = (weights[10] * 0.1).exp() - 1.0;
    weights[8].exp() * d_factor * r_factor + 1.0
}

/// Confidence grows with both calibration quality and sample size.
fn confidence_score(loss: f64, sample_size: usize, min_sample: usize) -> f64 {
    // An uninformed predictor scores 0.25; anything at or past that earns 0.
    let calibration = (1.0 - loss / 0.25).clamp(0.0, 1.0);
    let saturation =
        1.0 - (min_sample as f64 / (sample_size + min_sample) as f64).sqrt();
    (calibration * saturation).clamp(0.0, 1.0)
}
