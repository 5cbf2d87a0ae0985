//! Store interface the standby executor reads replica state through.

use async_trait::async_trait;
use uuid::Uuid;

use crate::config::EventEncoding;
use crate::mutable_state::{ActivityInfo, MutableStateSnapshot};
use crate::timer_sequence::ActivityTimerStub;

#[derive(Debug, thiserror::Error)]
pub enum StateStoreError {
    /// The optimistic-concurrency condition on a refresh write failed; a
    /// replication apply landed between load and write.
    #[error("mutable state changed concurrently (expected next event id {expected})")]
    ConditionFailed { expected: i64 },
    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
    #[error("{0}")]
    Message(String),
}

pub type StateStoreResult<T> = Result<T, StateStoreError>;

/// The activity-timer refresh: the only write the standby path performs.
///
/// Upserts one activity's timer bookkeeping and enqueues one timer task.
/// It produces no history events and must be applied only while the
/// execution's next event id still matches `condition_next_event_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct TimerRefreshRequest {
    pub namespace_id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    /// Next event id observed at load time; the store must reject the write
    /// if the stored value differs.
    pub condition_next_event_id: i64,
    pub activity: ActivityInfo,
    pub timer: ActivityTimerStub,
    pub encoding: EventEncoding,
}

/// Read access to replicated workflow execution state, plus the single
/// conditional write path.
#[async_trait]
pub trait ExecutionStateStore: Send + Sync {
    /// Current snapshot for the execution, or `None` if it does not exist
    /// on this replica (never created, or deleted after retention).
    async fn load(
        &self,
        namespace_id: Uuid,
        workflow_id: &str,
        run_id: Uuid,
    ) -> StateStoreResult<Option<MutableStateSnapshot>>;

    /// Apply an activity-timer refresh under optimistic concurrency.
    async fn refresh_activity_timer(&self, request: TimerRefreshRequest) -> StateStoreResult<()>;
}
