//! Replica snapshot model for one workflow execution.
//!
//! On the standby path mutable state is produced exclusively by the history
//! replication applier; the executor reads an owned snapshot and never holds
//! it across calls. The pending maps are the ground truth the predicates
//! check against: once an event has fired on the active side and replicated
//! here, the corresponding pending entry is gone.

use std::collections::HashMap;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::tasks::TimeoutKind;

/// Workflow execution status as reconstructed from replicated history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkflowStatus {
    Running,
    Completed,
    Failed,
    Terminated,
    TimedOut,
    Canceled,
    ContinuedAsNew,
}

impl WorkflowStatus {
    pub fn is_running(self) -> bool {
        matches!(self, WorkflowStatus::Running)
    }
}

/// Which activity timer tasks the replica has already created.
///
/// Mirrors the active side's per-activity timer bookkeeping so the standby
/// refresh path can tell "timer exists" from "timer should exist".
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreatedActivityTimers {
    pub schedule_to_start: bool,
    pub schedule_to_close: bool,
    pub start_to_close: bool,
    pub heartbeat: bool,
}

impl CreatedActivityTimers {
    pub fn get(&self, kind: TimeoutKind) -> bool {
        match kind {
            TimeoutKind::ScheduleToStart => self.schedule_to_start,
            TimeoutKind::ScheduleToClose => self.schedule_to_close,
            TimeoutKind::StartToClose => self.start_to_close,
            TimeoutKind::Heartbeat => self.heartbeat,
        }
    }

    pub fn set(&mut self, kind: TimeoutKind, created: bool) {
        match kind {
            TimeoutKind::ScheduleToStart => self.schedule_to_start = created,
            TimeoutKind::ScheduleToClose => self.schedule_to_close = created,
            TimeoutKind::StartToClose => self.start_to_close = created,
            TimeoutKind::Heartbeat => self.heartbeat = created,
        }
    }
}

/// A pending (scheduled, not yet closed) activity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub activity_id: String,
    pub schedule_event_id: i64,
    pub started_event_id: Option<i64>,
    /// Failover version of the schedule event.
    pub version: i64,
    pub attempt: i32,
    pub scheduled_time: DateTime<Utc>,
    pub started_time: Option<DateTime<Utc>>,
    pub schedule_to_start_timeout: Option<Duration>,
    pub schedule_to_close_timeout: Option<Duration>,
    pub start_to_close_timeout: Option<Duration>,
    pub heartbeat_timeout: Option<Duration>,
    pub last_heartbeat_time: Option<DateTime<Utc>>,
    pub created_timers: CreatedActivityTimers,
}

impl ActivityInfo {
    /// The instant heartbeat deadlines are measured from: the most recent
    /// heartbeat, falling back to the started time.
    pub fn heartbeat_reference(&self) -> Option<DateTime<Utc>> {
        match (self.last_heartbeat_time, self.started_time) {
            (Some(heartbeat), Some(started)) => Some(heartbeat.max(started)),
            (Some(heartbeat), None) => Some(heartbeat),
            (None, started) => started,
        }
    }

    /// Effective heartbeat deadline, if the activity has started and carries
    /// a heartbeat timeout.
    pub fn heartbeat_deadline(&self) -> Option<DateTime<Utc>> {
        let timeout = self.heartbeat_timeout?;
        let reference = self.heartbeat_reference()?;
        Some(reference + chrono::Duration::from_std(timeout).ok()?)
    }
}

/// A pending user timer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimerInfo {
    pub timer_id: String,
    pub started_event_id: i64,
    /// Failover version of the timer started event.
    pub version: i64,
    pub expiry_time: DateTime<Utc>,
}

/// The in-flight decision, if one is scheduled.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionInfo {
    pub schedule_event_id: i64,
    pub started_event_id: Option<i64>,
    /// Failover version of the schedule event.
    pub version: i64,
    pub attempt: i32,
    pub scheduled_time: DateTime<Utc>,
}

/// Owned snapshot of a workflow execution's replica state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MutableStateSnapshot {
    pub namespace_id: Uuid,
    pub workflow_id: String,
    pub run_id: Uuid,
    pub status: WorkflowStatus,
    /// Next event id the replica would assign; also the optimistic-concurrency
    /// condition for the refresh write.
    pub next_event_id: i64,
    /// Failover version of the workflow started event.
    pub start_version: i64,
    /// Pending activities keyed by schedule event id.
    pub pending_activities: HashMap<i64, ActivityInfo>,
    /// Pending user timers keyed by timer id.
    pub pending_timers: HashMap<String, TimerInfo>,
    pub decision: Option<DecisionInfo>,
}

impl MutableStateSnapshot {
    pub fn is_running(&self) -> bool {
        self.status.is_running()
    }

    pub fn activity(&self, schedule_event_id: i64) -> Option<&ActivityInfo> {
        self.pending_activities.get(&schedule_event_id)
    }

    /// Pending user timer whose started event is `started_event_id`.
    ///
    /// Timer tasks carry the started event id, not the timer id, so the
    /// lookup scans the pending map. Pending-timer counts are tiny in
    /// practice (bounded by concurrently open timers in one workflow).
    pub fn user_timer_by_started_event(&self, started_event_id: i64) -> Option<&TimerInfo> {
        self.pending_timers
            .values()
            .find(|timer| timer.started_event_id == started_event_id)
    }

    /// Whether the run has ever scheduled a decision. A fresh run holds only
    /// its started event, so the next event id still points just past it.
    pub fn has_scheduled_first_decision(&self) -> bool {
        self.next_event_id > crate::tasks::FIRST_EVENT_ID + 1
    }
}
