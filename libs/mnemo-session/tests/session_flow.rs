//! End-to-end session scenarios: queue lifecycle, re-cycling, batch flush
//! idempotency, and cache resumption.

use std::collections::HashMap;

use chrono::Utc;
use pretty_assertions::assert_eq;
use uuid::Uuid;

use mnemo_core::{CardMemoryState, CardPhase, ParameterSet, Rating};
use mnemo_session::{
    BatchSink, BatchWriteRequest, CacheConfig, FlushReceipt, MemoryBackend, SessionCache,
    SessionCard, SessionConfig, SessionError, SessionManager, SinkError,
};

/// In-memory sink that honors the session-id deduplication contract.
#[derive(Default)]
struct MockSink {
    applied: HashMap<Uuid, usize>,
    fail_next: bool,
    reject_quota: bool,
}

impl BatchSink for MockSink {
    async fn persist(
        &mut self,
        request: &BatchWriteRequest,
    ) -> Result<FlushReceipt, SinkError> {
        if self.fail_next {
            self.fail_next = false;
            return Err(SinkError::Network("connection reset".to_string()));
        }
        if self.reject_quota {
            return Err(SinkError::DailyLimitRejected);
        }
        let duplicate = self.applied.contains_key(&request.session_id);
        if !duplicate {
            self.applied.insert(request.session_id, request.events.len());
        }
        Ok(FlushReceipt {
            session_id: request.session_id,
            persisted_events: self.applied[&request.session_id],
            duplicate,
        })
    }
}

fn cache() -> SessionCache {
    SessionCache::new(Box::new(MemoryBackend::new()), CacheConfig::default())
}

fn new_card(id: i64) -> SessionCard {
    SessionCard {
        id,
        state: CardMemoryState::default(),
    }
}

fn review_card(id: i64, stability: f64, difficulty: f64) -> SessionCard {
    let now = Utc::now();
    SessionCard {
        id,
        state: CardMemoryState {
            phase: CardPhase::Review,
            stability,
            difficulty,
            due_at: Some(now),
            elapsed_days: 0.0,
            scheduled_days: stability,
            reps: 5,
            lapses: 0,
            step_index: 0,
        },
    }
}

fn start_session(due: Vec<SessionCard>, fresh: Vec<SessionCard>) -> SessionManager {
    SessionManager::start(
        ParameterSet::default(),
        due,
        fresh,
        100,
        &SessionConfig::default(),
        cache(),
        "session:flow-test",
        Utc::now(),
    )
    .expect("session should start")
}

/// New card rated [Again, Again, Good]: re-cycled twice in Learning, then
/// graduates and counts as exactly one completed card.
#[test]
fn new_card_again_again_good_graduates_once() {
    let now = Utc::now();
    let mut session = start_session(vec![], vec![new_card(1)]);

    let first = session.rate(1, Rating::Again, 1500, now).unwrap();
    assert_eq!(first.state.phase, CardPhase::Learning);
    assert!(first.requeued);
    assert!(!session.is_complete());

    let second = session.rate(1, Rating::Again, 1300, now).unwrap();
    assert_eq!(second.state.phase, CardPhase::Learning);
    assert!(second.requeued);
    assert!(!session.is_complete());

    let third = session.rate(1, Rating::Good, 1100, now).unwrap();
    assert!(third.completed);
    assert!(session.is_complete());

    assert_eq!(third.state.reps, 3);
    // Lapses only count from Review/Relearning.
    assert_eq!(third.state.lapses, 0);
    assert_eq!(session.events().len(), 3);
}

/// Review card rated Again: enters Relearning with a lapse and a short
/// interval derived from its reduced stability, not a fixed delay.
#[test]
fn review_lapse_interval_follows_reduced_stability() {
    let now = Utc::now();
    let mut session = start_session(
        vec![review_card(1, 20.0, 5.0), review_card(2, 0.5, 9.0)],
        vec![],
    );

    let strong = session.rate(1, Rating::Again, 2000, now).unwrap();
    assert_eq!(strong.state.phase, CardPhase::Relearning);
    assert_eq!(strong.state.lapses, 1);
    assert!(strong.state.stability < 20.0);

    let weak = session.rate(2, Rating::Again, 2000, now).unwrap();
    assert_eq!(weak.state.lapses, 1);

    // Both due within the day, but the stronger card waits longer: the
    // interval tracks stability.
    let strong_wait = strong.next_due - now;
    let weak_wait = weak.next_due - now;
    assert!(strong_wait <= chrono::Duration::days(1));
    assert!(weak_wait >= chrono::Duration::minutes(10));
    assert!(strong_wait > weak_wait);
}

/// Completion requires exactly one completing rating per distinct card,
/// regardless of how often Again re-cycles cards in between.
#[test]
fn session_completion_law() {
    let now = Utc::now();
    let mut session = start_session(
        vec![review_card(1, 10.0, 5.0)],
        vec![new_card(2), new_card(3)],
    );

    let mut completing = 0;
    // Keep rating the head of the queue: Again twice for each card first.
    while let Some(card_id) = session.current_card() {
        let seen = session.card_history(card_id).len();
        let rating = if seen < 2 { Rating::Again } else { Rating::Good };
        let outcome = session.rate(card_id, rating, 800, now).unwrap();
        if outcome.completed {
            completing += 1;
        }
    }

    assert!(session.is_complete());
    assert_eq!(completing, 3);
    // 3 cards x (2 Again + 1 Good).
    assert_eq!(session.events().len(), 9);
}

#[tokio::test]
async fn flush_is_idempotent_under_retry() -> anyhow::Result<()> {
    let now = Utc::now();
    let mut session = start_session(vec![], vec![new_card(1), new_card(2)]);
    session.rate(1, Rating::Good, 900, now)?;
    session.rate(2, Rating::Easy, 700, now)?;

    let mut sink = MockSink::default();
    let first = session.flush(&mut sink).await?;
    assert!(!first.duplicate);
    assert_eq!(first.persisted_events, 2);

    // Retrying the same session id must not double-count reviews.
    let second = session.flush(&mut sink).await?;
    assert!(second.duplicate);
    assert_eq!(sink.applied.len(), 1);
    assert_eq!(sink.applied[&session.session_id()], 2);
    Ok(())
}

#[tokio::test]
async fn failed_flush_keeps_the_session_intact() -> anyhow::Result<()> {
    let now = Utc::now();
    let mut session = start_session(vec![], vec![new_card(1)]);
    session.rate(1, Rating::Good, 900, now)?;
    let session_id = session.session_id();

    let mut sink = MockSink {
        fail_next: true,
        ..MockSink::default()
    };
    let err = session.flush(&mut sink).await.unwrap_err();
    assert!(matches!(err, SessionError::Flush(_)));
    // Nothing was lost and nothing was applied.
    assert_eq!(session.events().len(), 1);
    assert!(sink.applied.is_empty());

    // A retry with the same session id succeeds.
    let receipt = session.flush(&mut sink).await?;
    assert_eq!(receipt.session_id, session_id);
    assert!(!receipt.duplicate);
    Ok(())
}

#[tokio::test]
async fn authoritative_quota_rejection_is_surfaced() {
    let now = Utc::now();
    let mut session = start_session(vec![], vec![new_card(1)]);
    session.rate(1, Rating::Good, 900, now).unwrap();

    let mut sink = MockSink {
        reject_quota: true,
        ..MockSink::default()
    };
    let err = session.flush(&mut sink).await.unwrap_err();
    assert!(matches!(err, SessionError::DailyLimitRejected));
    // The session still shows as in progress for the UI.
    assert_eq!(session.events().len(), 1);
}

#[tokio::test]
async fn incomplete_session_refuses_to_flush() {
    let now = Utc::now();
    let mut session = start_session(vec![], vec![new_card(1), new_card(2)]);
    session.rate(1, Rating::Good, 900, now).unwrap();

    let mut sink = MockSink::default();
    let err = session.flush(&mut sink).await.unwrap_err();
    assert!(matches!(
        err,
        SessionError::SessionNotComplete { remaining: 1 }
    ));
    assert!(sink.applied.is_empty());
}

/// The batch preserves rating order and carries one final state per
/// distinct card.
#[test]
fn batch_request_shape() {
    let now = Utc::now();
    let mut session = start_session(vec![review_card(1, 10.0, 5.0)], vec![new_card(2)]);
    session.rate(1, Rating::Again, 500, now).unwrap();
    session.rate(2, Rating::Easy, 400, now).unwrap();
    session.rate(1, Rating::Good, 300, now).unwrap();

    let batch = session.batch_request();
    let order: Vec<(i64, Rating)> = batch.events.iter().map(|e| (e.card_id, e.rating)).collect();
    assert_eq!(
        order,
        vec![(1, Rating::Again), (2, Rating::Easy), (1, Rating::Good)]
    );
    assert_eq!(batch.final_states.len(), 2);

    let lapsed = batch.final_states.iter().find(|s| s.card_id == 1).unwrap();
    assert_eq!(lapsed.state.lapses, 1);
    assert_eq!(lapsed.state.reps, 7);
}
