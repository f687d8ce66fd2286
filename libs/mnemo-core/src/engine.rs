//! Card state machine over the memory model.
//!
//! Wraps the pure FSRS functions with the phase transition rules
//! (new -> learning -> review <-> relearning) and produces the full next
//! card state for a rating event. Buried and suspended cards reject
//! ratings; every other (phase, rating) pair maps to exactly one target
//! phase.

use chrono::{DateTime, Duration, Utc};
use tracing::debug;

use crate::error::{Result, SchedulerError};
use crate::model;
use crate::params::ParameterSet;
use crate::types::{CardMemoryState, CardPhase, Rating};

const MINUTES_PER_DAY: f64 = 1440.0;

/// Interval granted by a scheduling decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntervalKind {
    /// Intra-day step, used while learning or relearning.
    Minutes(u32),
    /// Calendar interval, used in the review phase.
    Days(u32),
}

impl IntervalKind {
    /// Interval length in fractional days.
    pub fn as_days(self) -> f64 {
        match self {
            Self::Minutes(m) => f64::from(m) / MINUTES_PER_DAY,
            Self::Days(d) => f64::from(d),
        }
    }

    fn duration(self) -> Duration {
        match self {
            Self::Minutes(m) => Duration::minutes(i64::from(m)),
            Self::Days(d) => Duration::days(i64::from(d)),
        }
    }
}

/// Result of applying one rating to a card.
#[derive(Debug, Clone)]
pub struct SchedulingOutcome {
    pub new_state: CardMemoryState,
    pub next_due: DateTime<Utc>,
    pub interval: IntervalKind,
}

/// Outcomes for all four ratings, for answer-button previews.
#[derive(Debug, Clone)]
pub struct SchedulePreview {
    pub again: SchedulingOutcome,
    pub hard: SchedulingOutcome,
    pub good: SchedulingOutcome,
    pub easy: SchedulingOutcome,
}

/// Scheduling engine bound to one read-only ParameterSet.
#[derive(Debug, Clone, Copy)]
pub struct SchedulingEngine<'a> {
    params: &'a ParameterSet,
}

impl<'a> SchedulingEngine<'a> {
    pub fn new(params: &'a ParameterSet) -> Self {
        Self { params }
    }

    /// Apply a rating to a card and compute its next state.
    ///
    /// Deterministic pure function of (state, rating, now); the caller owns
    /// persistence of the returned state.
    pub fn apply(
        &self,
        state: &CardMemoryState,
        rating: Rating,
        now: DateTime<Utc>,
    ) -> Result<SchedulingOutcome> {
        if !state.phase.is_schedulable() {
            return Err(SchedulerError::CardNotSchedulable(state.phase));
        }

        let elapsed_days = realized_elapsed_days(state, now);

        let (stability, difficulty) = if state.phase == CardPhase::New {
            (
                model::initial_stability(rating, self.params),
                model::initial_difficulty(rating, self.params),
            )
        } else {
            (
                model::next_stability(
                    state.stability,
                    state.difficulty,
                    rating,
                    elapsed_days,
                    self.params,
                ),
                model::next_difficulty(state.difficulty, rating, self.params),
            )
        };

        let lapsed =
            rating == Rating::Again && matches!(state.phase, CardPhase::Review | CardPhase::Relearning);
        let (phase, step_index, interval) = self.transition(state, rating, stability);

        if lapsed {
            debug!(stability, interval_days = interval.as_days(), "card lapsed");
        } else if state.phase != CardPhase::Review && phase == CardPhase::Review {
            debug!(stability, interval_days = interval.as_days(), "card graduated");
        }

        let next_due = now + interval.duration();
        let new_state = CardMemoryState {
            phase,
            stability,
            difficulty,
            due_at: Some(next_due),
            elapsed_days,
            scheduled_days: interval.as_days(),
            reps: state.reps + 1,
            lapses: state.lapses + u32::from(lapsed),
            step_index,
        };

        Ok(SchedulingOutcome {
            new_state,
            next_due,
            interval,
        })
    }

    /// Compute the outcome of every rating without committing any of them.
    pub fn preview(&self, state: &CardMemoryState, now: DateTime<Utc>) -> Result<SchedulePreview> {
        Ok(SchedulePreview {
            again: self.apply(state, Rating::Again, now)?,
            hard: self.apply(state, Rating::Hard, now)?,
            good: self.apply(state, Rating::Good, now)?,
            easy: self.apply(state, Rating::Easy, now)?,
        })
    }

    /// Target phase, step position, and interval for one transition.
    ///
    /// `stability` is the freshly computed post-rating stability: lapse
    /// intervals derive from it rather than from any fixed delay.
    fn transition(
        &self,
        state: &CardMemoryState,
        rating: Rating,
        stability: f64,
    ) -> (CardPhase, u32, IntervalKind) {
        let p = self.params;
        match state.phase {
            CardPhase::New => match rating {
                Rating::Easy => (CardPhase::Review, 0, IntervalKind::Days(p.easy_interval_days)),
                Rating::Again => (
                    CardPhase::Learning,
                    0,
                    IntervalKind::Minutes(first_step(&p.learning_steps, stability)),
                ),
                _ => match p.learning_steps.first() {
                    Some(minutes) => (CardPhase::Learning, 0, IntervalKind::Minutes(*minutes)),
                    None => (
                        CardPhase::Review,
                        0,
                        IntervalKind::Days(p.graduating_interval_days),
                    ),
                },
            },
            CardPhase::Learning => match rating {
                Rating::Easy => (CardPhase::Review, 0, IntervalKind::Days(p.easy_interval_days)),
                Rating::Again => (
                    CardPhase::Learning,
                    0,
                    IntervalKind::Minutes(first_step(&p.learning_steps, stability)),
                ),
                _ => {
                    let next = state.step_index + 1;
                    match p.learning_steps.get(next as usize) {
                        Some(minutes) => {
                            (CardPhase::Learning, next, IntervalKind::Minutes(*minutes))
                        }
                        None => (
                            CardPhase::Review,
                            0,
                            IntervalKind::Days(p.graduating_interval_days),
                        ),
                    }
                }
            },
            CardPhase::Review => match rating {
                // Lapse: the short interval follows the reduced stability,
                // never a hardcoded delay.
                Rating::Again => (
                    CardPhase::Relearning,
                    0,
                    IntervalKind::Minutes(stability_step_minutes(stability)),
                ),
                _ => (
                    CardPhase::Review,
                    0,
                    IntervalKind::Days(model::next_interval(stability, p.desired_retention, p)),
                ),
            },
            CardPhase::Relearning => match rating {
                Rating::Again => (
                    CardPhase::Relearning,
                    0,
                    IntervalKind::Minutes(stability_step_minutes(stability)),
                ),
                Rating::Easy => (
                    CardPhase::Review,
                    0,
                    IntervalKind::Days(model::next_interval(stability, p.desired_retention, p)),
                ),
                _ => {
                    let next = state.step_index + 1;
                    match p.relearning_steps.get(next as usize) {
                        Some(minutes) => {
                            (CardPhase::Relearning, next, IntervalKind::Minutes(*minutes))
                        }
                        None => (
                            CardPhase::Review,
                            0,
                            IntervalKind::Days(model::next_interval(
                                stability,
                                p.desired_retention,
                                p,
                            )),
                        ),
                    }
                }
            },
            // Unreachable: rejected above.
            CardPhase::Buried | CardPhase::Suspended => unreachable!("checked by apply"),
        }
    }
}

/// First learning-step offset, falling back to a stability-derived step
/// when no steps are configured.
fn first_step(steps: &[u32], stability: f64) -> u32 {
    steps
        .first()
        .copied()
        .unwrap_or_else(|| stability_step_minutes(stability))
}

/// Short interval in minutes derived from stability, bounded to
/// [10 minutes, 1 day].
fn stability_step_minutes(stability: f64) -> u32 {
    (stability * 60.0).clamp(10.0, MINUTES_PER_DAY) as u32
}

/// Days since the previous review, reconstructed from the due time and the
/// interval that produced it. Zero for a card that was never reviewed.
fn realized_elapsed_days(state: &CardMemoryState, now: DateTime<Utc>) -> f64 {
    match state.due_at {
        Some(due) => {
            let scheduled_secs = (state.scheduled_days * 86400.0) as i64;
            let last_review = due - Duration::seconds(scheduled_secs);
            let elapsed = now.signed_duration_since(last_review);
            (elapsed.num_seconds() as f64 / 86400.0).max(0.0)
        }
        None => 0.0,
    }
}
