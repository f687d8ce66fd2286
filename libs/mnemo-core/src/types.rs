//! Core types shared by the scheduler, optimizer, and session layers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::SchedulerError;

/// Card identifier assigned by the card source.
pub type CardId = i64;

/// Rating for a review.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Rating {
    Again,
    Hard,
    Good,
    Easy,
}

impl Rating {
    /// Convert to the 4-point grade value (1-4) used by the FSRS formulas.
    pub fn grade(self) -> u8 {
        match self {
            Self::Again => 1,
            Self::Hard => 2,
            Self::Good => 3,
            Self::Easy => 4,
        }
    }

    /// Create from a 4-point grade value.
    ///
    /// Any value outside 1-4 is a contract violation.
    pub fn from_grade(value: u8) -> Result<Self, SchedulerError> {
        match value {
            1 => Ok(Self::Again),
            2 => Ok(Self::Hard),
            3 => Ok(Self::Good),
            4 => Ok(Self::Easy),
            other => Err(SchedulerError::InvalidRating(other)),
        }
    }

    /// Whether the learner recalled the card.
    pub fn is_success(self) -> bool {
        !matches!(self, Self::Again)
    }

    /// All ratings in grade order.
    pub const ALL: [Rating; 4] = [Self::Again, Self::Hard, Self::Good, Self::Easy];
}

/// Card lifecycle phase.
///
/// Buried and Suspended cards are excluded from due-selection by the card
/// source and reject rating events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CardPhase {
    New,
    Learning,
    Review,
    Relearning,
    Buried,
    Suspended,
}

impl Default for CardPhase {
    fn default() -> Self {
        Self::New
    }
}

impl CardPhase {
    /// Whether a rating event may be applied in this phase.
    pub fn is_schedulable(self) -> bool {
        !matches!(self, Self::Buried | Self::Suspended)
    }
}

/// Memory state for one (user, card, deck) triple.
///
/// Mutated only by the scheduling engine; prior values are preserved in the
/// review log, never edited in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CardMemoryState {
    pub phase: CardPhase,
    /// Memory half-life proxy in days. Zero until the first rating.
    pub stability: f64,
    /// Intrinsic hardness in [1, 10]. Zero until the first rating.
    pub difficulty: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub due_at: Option<DateTime<Utc>>,
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub reps: u32,
    pub lapses: u32,
    /// Position within the learning/relearning steps. Only meaningful while
    /// the phase is Learning or Relearning.
    pub step_index: u32,
}

impl Default for CardMemoryState {
    fn default() -> Self {
        Self {
            phase: CardPhase::New,
            stability: 0.0,
            difficulty: 0.0,
            due_at: None,
            elapsed_days: 0.0,
            scheduled_days: 0.0,
            reps: 0,
            lapses: 0,
            step_index: 0,
        }
    }
}

/// Append-only record of one rating.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEvent {
    pub card_id: CardId,
    pub rating: Rating,
    pub response_time_ms: u32,
    pub phase_before: CardPhase,
    pub phase_after: CardPhase,
    pub stability_before: f64,
    pub stability_after: f64,
    pub difficulty_before: f64,
    pub difficulty_after: f64,
    /// Days since the previous review as realized, not as planned.
    pub elapsed_days: f64,
    pub scheduled_days: f64,
    pub reviewed_at: DateTime<Utc>,
}
