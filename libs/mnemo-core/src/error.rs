//! Error types for mnemo-core.

use crate::types::CardPhase;
use thiserror::Error;

/// Result type alias using SchedulerError.
pub type Result<T> = std::result::Result<T, SchedulerError>;

/// Errors raised by the scheduling core.
///
/// All variants are contract violations: they indicate a caller bug or a
/// corrupted ParameterSet, never a transient condition. None of them is
/// retryable.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("invalid rating value: {0}")]
    InvalidRating(u8),

    #[error("card in phase {0:?} cannot receive ratings")]
    CardNotSchedulable(CardPhase),

    #[error("insufficient review history: need {required}, have {actual}")]
    InsufficientData { required: usize, actual: usize },

    #[error("invariant violated: {0}")]
    InvariantViolation(String),
}
