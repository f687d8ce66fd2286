//! Review session orchestration.
//!
//! One SessionManager instance owns one bounded queue of cards and
//! serializes every rating against it; callers pin a session to a single
//! execution context. Rating is synchronous; the only suspension point is
//! [`SessionManager::flush`].

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use mnemo_core::{
    CardId, CardMemoryState, CardPhase, ParameterSet, Rating, ReviewEvent, SchedulePreview,
    SchedulingEngine,
};

use crate::batch::{BatchSink, BatchWriteRequest, CardSnapshot, FlushReceipt, SinkError};
use crate::cache::SessionCache;
use crate::error::{Result, SessionError};

/// Default number of cards per session.
pub const DEFAULT_CAPACITY: usize = 10;

/// Session tuning.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub capacity: usize,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capacity: DEFAULT_CAPACITY,
        }
    }
}

/// A card handed to the session by the card source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCard {
    pub id: CardId,
    pub state: CardMemoryState,
}

/// Result of rating one card within the session.
#[derive(Debug, Clone)]
pub struct RatingOutcome {
    pub state: CardMemoryState,
    pub next_due: DateTime<Utc>,
    /// The card received its completing rating.
    pub completed: bool,
    /// The card went back to the tail of the queue.
    pub requeued: bool,
}

/// Everything needed to rebuild a session after a reload.
#[derive(Debug, Serialize, Deserialize)]
struct SessionSnapshot {
    session_id: Uuid,
    queue: VecDeque<CardId>,
    states: HashMap<CardId, CardMemoryState>,
    history: HashMap<CardId, Vec<Rating>>,
    order: Vec<CardId>,
    completed: HashSet<CardId>,
    events: Vec<ReviewEvent>,
}

/// Owns one review session: queue, rating loop, local cache, batch flush.
pub struct SessionManager {
    params: ParameterSet,
    cache: SessionCache,
    cache_key: String,
    session_id: Uuid,
    queue: VecDeque<CardId>,
    states: HashMap<CardId, CardMemoryState>,
    history: HashMap<CardId, Vec<Rating>>,
    /// Distinct cards in enqueue order; drives completion accounting.
    order: Vec<CardId>,
    completed: HashSet<CardId>,
    events: Vec<ReviewEvent>,
}

impl SessionManager {
    /// Build a session queue interleaving due and new cards, bounded by
    /// capacity and the caller's remaining daily quota.
    ///
    /// The quota check here is the advisory fast path; the batch sink
    /// remains the authority at write time.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        params: ParameterSet,
        due: Vec<SessionCard>,
        fresh: Vec<SessionCard>,
        quota_remaining: u32,
        config: &SessionConfig,
        cache: SessionCache,
        cache_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        params.validate()?;
        if quota_remaining == 0 {
            return Err(SessionError::DailyLimitReached);
        }
        let capacity = config.capacity.min(quota_remaining as usize);

        let mut order = Vec::new();
        let mut states = HashMap::new();
        let mut due_iter = due.into_iter();
        let mut fresh_iter = fresh.into_iter();
        let mut take_due = true;
        while order.len() < capacity {
            let next = if take_due {
                due_iter.next().or_else(|| fresh_iter.next())
            } else {
                fresh_iter.next().or_else(|| due_iter.next())
            };
            take_due = !take_due;
            match next {
                Some(card) => {
                    if states.contains_key(&card.id) {
                        continue;
                    }
                    order.push(card.id);
                    states.insert(card.id, card.state);
                }
                None => break,
            }
        }

        let mut manager = Self {
            params,
            cache,
            cache_key: cache_key.into(),
            session_id: Uuid::new_v4(),
            queue: order.iter().copied().collect(),
            states,
            history: HashMap::new(),
            order,
            completed: HashSet::new(),
            events: Vec::new(),
        };
        info!(
            session_id = %manager.session_id,
            cards = manager.order.len(),
            "session started"
        );
        manager.persist_snapshot(now);
        Ok(manager)
    }

    /// Restore a session previously written to the local cache, if one is
    /// still there and within its TTL.
    pub fn resume(
        params: ParameterSet,
        mut cache: SessionCache,
        cache_key: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Result<Option<Self>> {
        params.validate()?;
        let cache_key = cache_key.into();
        let Some(snapshot) = cache.get::<SessionSnapshot>(&cache_key, now)? else {
            return Ok(None);
        };
        info!(session_id = %snapshot.session_id, "session resumed from cache");
        Ok(Some(Self {
            params,
            cache,
            cache_key,
            session_id: snapshot.session_id,
            queue: snapshot.queue,
            states: snapshot.states,
            history: snapshot.history,
            order: snapshot.order,
            completed: snapshot.completed,
            events: snapshot.events,
        }))
    }

    /// Apply a rating to a queued card.
    ///
    /// Again while the card is still learning or relearning re-cycles it to
    /// the tail of the queue; every other outcome completes the card.
    /// Completion count, not phase purity, determines session length.
    pub fn rate(
        &mut self,
        card_id: CardId,
        rating: Rating,
        response_time_ms: u32,
        now: DateTime<Utc>,
    ) -> Result<RatingOutcome> {
        if response_time_ms == 0 {
            return Err(SessionError::InvalidResponseTime);
        }
        if self.completed.contains(&card_id) {
            return Err(SessionError::CardAlreadyCompleted(card_id));
        }
        let position = self
            .queue
            .iter()
            .position(|id| *id == card_id)
            .ok_or(SessionError::CardNotInSession(card_id))?;
        let before = self
            .states
            .get(&card_id)
            .cloned()
            .ok_or(SessionError::CardNotInSession(card_id))?;

        let outcome = SchedulingEngine::new(&self.params).apply(&before, rating, now)?;
        let after = &outcome.new_state;

        self.events.push(ReviewEvent {
            card_id,
            rating,
            response_time_ms,
            phase_before: before.phase,
            phase_after: after.phase,
            stability_before: before.stability,
            stability_after: after.stability,
            difficulty_before: before.difficulty,
            difficulty_after: after.difficulty,
            elapsed_days: after.elapsed_days,
            scheduled_days: before.scheduled_days,
            reviewed_at: now,
        });

        self.queue.remove(position);
        let requeued = rating == Rating::Again
            && matches!(after.phase, CardPhase::Learning | CardPhase::Relearning);
        if requeued {
            self.queue.push_back(card_id);
            debug!(card_id, "card re-cycled to queue tail");
        } else {
            self.completed.insert(card_id);
            debug!(card_id, phase = ?after.phase, "card completed");
        }

        self.history.entry(card_id).or_default().push(rating);
        self.states.insert(card_id, after.clone());
        self.persist_snapshot(now);

        Ok(RatingOutcome {
            state: after.clone(),
            next_due: outcome.next_due,
            completed: !requeued,
            requeued,
        })
    }

    /// Scheduling outcomes for all four ratings of a card, without
    /// committing any of them.
    pub fn preview(&self, card_id: CardId, now: DateTime<Utc>) -> Result<SchedulePreview> {
        let state = self
            .states
            .get(&card_id)
            .ok_or(SessionError::CardNotInSession(card_id))?;
        Ok(SchedulingEngine::new(&self.params).preview(state, now)?)
    }

    /// True once every distinct card has received its completing rating.
    pub fn is_complete(&self) -> bool {
        self.completed.len() == self.order.len()
    }

    /// The card currently at the head of the queue.
    pub fn current_card(&self) -> Option<CardId> {
        self.queue.front().copied()
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    /// Buffered events in rating order.
    pub fn events(&self) -> &[ReviewEvent] {
        &self.events
    }

    /// Ratings a card has received within this session.
    pub fn card_history(&self, card_id: CardId) -> &[Rating] {
        self.history.get(&card_id).map_or(&[], Vec::as_slice)
    }

    /// The batch this session will hand to the sink.
    pub fn batch_request(&self) -> BatchWriteRequest {
        BatchWriteRequest {
            session_id: self.session_id,
            events: self.events.clone(),
            final_states: self
                .order
                .iter()
                .map(|id| CardSnapshot {
                    card_id: *id,
                    state: self.states[id].clone(),
                })
                .collect(),
        }
    }

    /// Send the finalized batch to the persistence collaborator.
    ///
    /// All-or-nothing: a failed flush leaves every buffered event and the
    /// cache entry intact, and the same session id may be retried safely
    /// because the sink deduplicates on it. The cache entry is cleared only
    /// after the sink acknowledges.
    pub async fn flush<S: BatchSink>(&mut self, sink: &mut S) -> Result<FlushReceipt> {
        if !self.is_complete() {
            return Err(SessionError::SessionNotComplete {
                remaining: self.order.len() - self.completed.len(),
            });
        }
        let request = self.batch_request();
        match sink.persist(&request).await {
            Ok(receipt) => {
                if receipt.duplicate {
                    debug!(session_id = %self.session_id, "sink absorbed duplicate flush");
                }
                if let Err(err) = self.cache.remove(&self.cache_key) {
                    warn!(%err, "failed to clear session cache after flush");
                }
                info!(
                    session_id = %self.session_id,
                    events = request.events.len(),
                    "session flushed"
                );
                Ok(receipt)
            }
            Err(SinkError::DailyLimitRejected) => Err(SessionError::DailyLimitRejected),
            Err(err) => Err(SessionError::Flush(err)),
        }
    }

    /// Walk away without flushing. The cache entry stays behind so the
    /// session can be resumed later.
    pub fn abandon(self) {
        info!(session_id = %self.session_id, "session abandoned, cache left resumable");
    }

    /// Best-effort local persistence; a failing cache tier degrades to
    /// in-memory operation instead of failing the session.
    fn persist_snapshot(&mut self, now: DateTime<Utc>) {
        let snapshot = SessionSnapshot {
            session_id: self.session_id,
            queue: self.queue.clone(),
            states: self.states.clone(),
            history: self.history.clone(),
            order: self.order.clone(),
            completed: self.completed.clone(),
            events: self.events.clone(),
        };
        if let Err(err) = self.cache.put(&self.cache_key, &snapshot, now) {
            warn!(%err, "failed to persist session snapshot");
        }
    }
}
