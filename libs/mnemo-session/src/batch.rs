//! Batch flush contracts with the persistence collaborator.
//!
//! The session layer emits one [`BatchWriteRequest`] per completed session
//! and expects the sink to apply it at most once per session id. Everything
//! past the sink (wire format, storage schema, retry transport) is the
//! collaborator's business.

use mnemo_core::{CardId, CardMemoryState, ReviewEvent};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// One session's finalized output: ordered events plus the final memory
/// state per card.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchWriteRequest {
    /// Deduplication key: the sink must apply at most one batch per id.
    pub session_id: Uuid,
    /// Review events in the order they were rated.
    pub events: Vec<ReviewEvent>,
    pub final_states: Vec<CardSnapshot>,
}

/// Final memory state for one card in the batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CardSnapshot {
    pub card_id: CardId,
    pub state: CardMemoryState,
}

/// Acknowledgement from the sink.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlushReceipt {
    pub session_id: Uuid,
    pub persisted_events: usize,
    /// True when the sink had already applied this session id; the retry
    /// was absorbed, not double-counted.
    pub duplicate: bool,
}

/// Errors a sink may answer with.
#[derive(Debug, Error)]
pub enum SinkError {
    /// Authoritative daily-limit decision; the local pre-check was only
    /// advisory.
    #[error("daily review limit rejected by the backend")]
    DailyLimitRejected,

    #[error("backend error: {status} - {message}")]
    Backend { status: u16, message: String },

    #[error("network error: {0}")]
    Network(String),
}

/// Persistence collaborator accepting finalized batches.
///
/// `persist` is the session layer's only suspension point.
pub trait BatchSink {
    fn persist(
        &mut self,
        request: &BatchWriteRequest,
    ) -> impl std::future::Future<Output = Result<FlushReceipt, SinkError>> + Send;
}
