//! Error types for the session layer.

use mnemo_core::{CardId, SchedulerError};
use thiserror::Error;

use crate::batch::SinkError;
use crate::storage::StorageError;

/// Result type alias using SessionError.
pub type Result<T> = std::result::Result<T, SessionError>;

/// Errors raised while running a review session.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("card {0} is not in the current session")]
    CardNotInSession(CardId),

    #[error("card {0} was already completed this session")]
    CardAlreadyCompleted(CardId),

    #[error("session is not complete: {remaining} cards outstanding")]
    SessionNotComplete { remaining: usize },

    /// Advisory local pre-check; the batch sink re-validates at write time.
    #[error("daily review limit reached")]
    DailyLimitReached,

    /// Authoritative rejection from the persistence collaborator.
    #[error("daily review limit rejected by the backend")]
    DailyLimitRejected,

    #[error("response time must be positive")]
    InvalidResponseTime,

    #[error(transparent)]
    Scheduler(#[from] SchedulerError),

    #[error("session cache error: {0}")]
    Storage(#[from] StorageError),

    /// Flush failed; the buffered session stays intact and the same
    /// session id may be retried.
    #[error("flush failed: {0}")]
    Flush(SinkError),
}
