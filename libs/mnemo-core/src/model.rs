//! FSRS-4.5 memory model.
//!
//! Pure functions over the DSR state:
//! - Difficulty (D): intrinsic card hardness, 1-10
//! - Stability (S): days until retrievability decays to the 90% reference
//! - Retrievability (R): probability of recall after a given elapsed time
//!
//! All functions are deterministic and free of I/O. Callers route New cards
//! through [`initial_stability`]/[`initial_difficulty`] before using the
//! update functions, so `stability == 0` never reaches a division.

use crate::params::ParameterSet;
use crate::types::Rating;

/// Forgetting-curve factor: R(t) = (1 + t / (FACTOR * S))^-1, chosen so
/// that R(S) = 0.9.
const FACTOR: f64 = 9.0;

/// Initial stability for a card's first rating.
///
/// S0(G) = w[G-1], clamped to the configured stability bounds.
pub fn initial_stability(rating: Rating, params: &ParameterSet) -> f64 {
    let s0 = params.weights[(rating.grade() - 1) as usize];
    s0.clamp(params.min_stability, params.max_stability)
}

/// Initial difficulty for a card's first rating.
///
/// D0(G) = w[4] - w[5] * (G - 3), clamped to the difficulty bounds.
pub fn initial_difficulty(rating: Rating, params: &ParameterSet) -> f64 {
    let d0 = params.weights[4] - params.weights[5] * (rating.grade() as f64 - 3.0);
    d0.clamp(params.min_difficulty, params.max_difficulty)
}

/// Probability of recall after `elapsed_days` at the given stability.
///
/// Monotonically decreasing in elapsed time, increasing in stability.
/// Returns 1.0 at t = 0 for any positive stability, and 0.0 when stability
/// is not positive (a New card that has not been seeded yet).
pub fn retrievability(elapsed_days: f64, stability: f64) -> f64 {
    if stability <= 0.0 {
        return 0.0;
    }
    (1.0 + elapsed_days.max(0.0) / (FACTOR * stability)).powf(-1.0)
}

/// Next stability after a rating.
///
/// Success ratings grow stability through the retrievability term; Again
/// shrinks it through the forget formula and the configured lapse
/// multiplier. The lapse result never exceeds the previous stability.
pub fn next_stability(
    stability: f64,
    difficulty: f64,
    rating: Rating,
    elapsed_days: f64,
    params: &ParameterSet,
) -> f64 {
    let r = retrievability(elapsed_days, stability);
    match rating {
        Rating::Again => next_forget_stability(stability, difficulty, r, params),
        _ => next_recall_stability(stability, difficulty, r, rating, params),
    }
}

/// S' = S * (e^w[8] * (11 - D) * S^-w[9] * (e^(w[10]*(1-R)) - 1) + 1) * modifier
fn next_recall_stability(
    stability: f64,
    difficulty: f64,
    retrievability: f64,
    rating: Rating,
    params: &ParameterSet,
) -> f64 {
    let w = &params.weights;
    let d_factor = (11.0 - difficulty).max(0.1);
    let s_decay = stability.powf(-w[9]);
    let r_factor = (w[10] * (1.0 - retrievability)).exp() - 1.0;
    let growth = w[8].exp() * d_factor * s_decay * r_factor + 1.0;

    let modifier = match rating {
        Rating::Hard => w[15],
        Rating::Easy => w[16],
        _ => 1.0,
    };

    (stability * growth * modifier).clamp(params.min_stability, params.max_stability)
}

/// S' = w[11] * D^-w[12] * ((S+1)^w[13] - 1) * e^(w[14]*(1-R)) * lapse_multiplier
fn next_forget_stability(
    stability: f64,
    difficulty: f64,
    retrievability: f64,
    params: &ParameterSet,
) -> f64 {
    let w = &params.weights;
    let d_factor = difficulty.max(1.0).powf(-w[12]);
    let s_factor = (stability + 1.0).powf(w[13]) - 1.0;
    let r_factor = (w[14] * (1.0 - retrievability)).exp();

    let new_s = w[11] * d_factor * s_factor * r_factor * params.lapse_multiplier;
    // A lapse never leaves the card stronger than it was.
    new_s.min(stability).clamp(params.min_stability, params.max_stability)
}

/// Next difficulty after a rating.
///
/// Moves with the rating sign, mean-reverts toward the neutral (Easy
/// initial) difficulty, and clamps to the difficulty bounds.
pub fn next_difficulty(difficulty: f64, rating: Rating, params: &ParameterSet) -> f64 {
    let w = &params.weights;
    let shifted = difficulty - w[6] * (rating.grade() as f64 - 3.0);
    let target = initial_difficulty(Rating::Easy, params);
    let reverted = w[7] * target + (1.0 - w[7]) * shifted;
    reverted.clamp(params.min_difficulty, params.max_difficulty)
}

/// Whole-day interval at which retrievability decays to `desired_retention`.
///
/// Inverse of the forgetting curve: I = FACTOR * S * (1/r - 1), clamped to
/// the configured interval bounds.
pub fn next_interval(stability: f64, desired_retention: f64, params: &ParameterSet) -> u32 {
    let raw = FACTOR * stability * (1.0 / desired_retention - 1.0);
    let days = raw.floor().max(0.0).min(u32::MAX as f64) as u32;
    days.clamp(params.minimum_interval_days, params.maximum_interval_days)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> ParameterSet {
        ParameterSet::default()
    }

    #[test]
    fn initial_stability_increases_with_rating() {
        let p = params();
        let s: Vec<f64> = Rating::ALL
            .iter()
            .map(|r| initial_stability(*r, &p))
            .collect();
        assert!(s[0] < s[1] && s[1] < s[2] && s[2] < s[3]);
    }

    #[test]
    fn initial_difficulty_decreases_with_rating() {
        let p = params();
        let d: Vec<f64> = Rating::ALL
            .iter()
            .map(|r| initial_difficulty(*r, &p))
            .collect();
        assert!(d[0] > d[1] && d[1] > d[2] && d[2] > d[3]);
    }

    #[test]
    fn retrievability_is_one_at_zero_elapsed() {
        for stability in [0.1, 1.0, 50.0] {
            assert!((retrievability(0.0, stability) - 1.0).abs() < 1e-9);
        }
    }

    #[test]
    fn retrievability_is_half_at_nine_stabilities() {
        // R(9S) = 0.5 under the power curve with factor 9.
        assert!((retrievability(90.0, 10.0) - 0.5).abs() < 1e-9);
    }

    #[test]
    fn retrievability_handles_zero_stability() {
        assert_eq!(retrievability(1.0, 0.0), 0.0);
        assert_eq!(retrievability(0.0, 0.0), 0.0);
    }

    #[test]
    fn retrievability_monotone_in_elapsed_and_stability() {
        assert!(retrievability(1.0, 10.0) > retrievability(5.0, 10.0));
        assert!(retrievability(5.0, 20.0) > retrievability(5.0, 10.0));
    }

    #[test]
    fn recall_grows_stability() {
        let p = params();
        let s = next_stability(5.0, 5.0, Rating::Good, 5.0, &p);
        assert!(s > 5.0);
    }

    #[test]
    fn lapse_shrinks_stability() {
        let p = params();
        let s = next_stability(10.0, 5.0, Rating::Again, 10.0, &p);
        assert!(s < 10.0);
        assert!(s >= p.min_stability);
    }

    #[test]
    fn lapse_multiplier_damps_post_lapse_stability() {
        let mut damped = params();
        damped.lapse_multiplier = 0.5;
        let full = next_stability(10.0, 5.0, Rating::Again, 10.0, &params());
        let half = next_stability(10.0, 5.0, Rating::Again, 10.0, &damped);
        assert!(half < full);
    }

    #[test]
    fn hard_penalty_and_easy_bonus_order_stability() {
        let p = params();
        let hard = next_stability(10.0, 5.0, Rating::Hard, 10.0, &p);
        let good = next_stability(10.0, 5.0, Rating::Good, 10.0, &p);
        let easy = next_stability(10.0, 5.0, Rating::Easy, 10.0, &p);
        assert!(hard < good && good < easy);
    }

    #[test]
    fn difficulty_stays_in_bounds_under_any_sequence() {
        let p = params();
        for start in [1.0, 5.5, 10.0] {
            let mut d = start;
            for rating in [
                Rating::Again,
                Rating::Again,
                Rating::Easy,
                Rating::Easy,
                Rating::Easy,
                Rating::Again,
                Rating::Hard,
                Rating::Good,
            ] {
                d = next_difficulty(d, rating, &p);
                assert!((p.min_difficulty..=p.max_difficulty).contains(&d));
            }
        }
    }

    #[test]
    fn difficulty_moves_with_rating_sign() {
        let p = params();
        assert!(next_difficulty(5.0, Rating::Again, &p) > 5.0);
        assert!(next_difficulty(5.0, Rating::Easy, &p) < 5.0);
    }

    #[test]
    fn interval_monotone_in_stability() {
        let p = params();
        let mut last = 0;
        for stability in [0.5, 2.0, 10.0, 40.0, 200.0] {
            let days = next_interval(stability, p.desired_retention, &p);
            assert!(days >= last);
            last = days;
        }
    }

    #[test]
    fn interval_monotone_in_retention() {
        let p = params();
        let relaxed = next_interval(20.0, 0.8, &p);
        let strict = next_interval(20.0, 0.95, &p);
        assert!(strict <= relaxed);
    }

    #[test]
    fn interval_respects_bounds() {
        let p = params();
        assert_eq!(next_interval(0.01, p.desired_retention, &p), p.minimum_interval_days);
        assert_eq!(
            next_interval(1.0e9, p.desired_retention, &p),
            p.maximum_interval_days
        );
    }

    #[test]
    fn interval_at_retention_ninety_matches_stability() {
        // With r = 0.9 the inverse curve gives I = S exactly.
        let p = params();
        assert_eq!(next_interval(20.0, 0.9, &p), 20);
    }
}
