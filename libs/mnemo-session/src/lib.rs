//! Review-session layer over the scheduling core.
//!
//! Provides:
//! - SessionManager: bounded queue, rating loop, atomic batch flush
//! - Local session cache with a probed storage fallback chain
//! - Daily quota tracking (advisory; the sink stays authoritative)
//! - Batch contracts with the persistence collaborator
//!
//! One session is owned by one execution context; rating is synchronous
//! and flush is the only operation that awaits.

pub mod batch;
pub mod cache;
pub mod error;
pub mod quota;
pub mod session;
pub mod storage;

pub use batch::{BatchSink, BatchWriteRequest, CardSnapshot, FlushReceipt, SinkError};
pub use cache::{CacheConfig, SessionCache};
pub use error::{Result, SessionError};
pub use quota::{DailyQuota, QuotaPolicy, UserTier};
pub use session::{
    RatingOutcome, SessionCard, SessionConfig, SessionManager, DEFAULT_CAPACITY,
};
pub use storage::{select_backend, MemoryBackend, StorageBackend, StorageError};
