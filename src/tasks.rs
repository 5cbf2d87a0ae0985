//! Timer task data model.
//!
//! Timer tasks are created by the active cluster and observed read-only on
//! the standby side through the shard's timer queue. The executor never
//! mutates a task; it only decides whether the task's effect is already
//! visible in the local replica.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// First event id of any workflow run.
pub const FIRST_EVENT_ID: i64 = 1;

/// Sentinel end-of-range event id ("fetch to the end of history").
pub const END_EVENT_ID: i64 = i64::MAX;

/// The kind of work a timer task represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimerTaskKind {
    /// A user-requested timer started by workflow code.
    UserTimer,
    /// An activity timeout (subtype in [`TimeoutKind`]).
    ActivityTimeout,
    /// A decision timeout (subtype in [`TimeoutKind`]).
    DecisionTimeout,
    /// Delay before the first decision of a retried/cron workflow.
    WorkflowBackoffTimer,
    /// The workflow execution's own run timeout.
    WorkflowTimeout,
    /// Activity retry backoff; owned entirely by the active side.
    ActivityRetryTimer,
    /// Decision retry backoff; owned entirely by the active side.
    DecisionRetryTimer,
}

/// Timeout subtype carried by activity and decision timeout tasks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TimeoutKind {
    ScheduleToStart,
    ScheduleToClose,
    StartToClose,
    Heartbeat,
}

/// One scheduled timer task as read from the shard's timer queue.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerTaskInfo {
    /// Queue-assigned id, monotonic within the shard.
    pub task_id: i64,
    pub kind: TimerTaskKind,
    /// Meaningful only for activity and decision timeout tasks.
    pub timeout_kind: TimeoutKind,
    pub namespace_id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    /// Failover version of the cluster that created the task.
    pub version: i64,
    /// When the timer becomes due on the shard clock.
    pub visibility_timestamp: DateTime<Utc>,
    /// The scheduling event the task points at (timer started event for user
    /// timers, schedule event for activities and decisions). Unused for
    /// workflow-level timers.
    pub event_id: i64,
    /// Decision attempt the task was cut for; compared by the decision
    /// timeout predicate.
    pub schedule_attempt: i32,
}

impl TimerTaskInfo {
    /// Whether the task carries any reconciliation work for the standby side.
    ///
    /// Retry timers and decision schedule-to-start timeouts are resolved
    /// entirely by the active cluster; the standby side acks them unseen.
    pub fn is_standby_actionable(&self) -> bool {
        match self.kind {
            TimerTaskKind::ActivityRetryTimer | TimerTaskKind::DecisionRetryTimer => false,
            TimerTaskKind::DecisionTimeout => self.timeout_kind != TimeoutKind::ScheduleToStart,
            _ => true,
        }
    }
}
