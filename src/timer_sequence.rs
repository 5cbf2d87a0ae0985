//! Next-activity-timer computation.
//!
//! Activity timers are created lazily, one at a time: only the earliest
//! deadline across all pending activities gets a timer task, and the next
//! one is cut when that timer fires or its activity closes. On the standby
//! side this computation backs the single write path, recreating a
//! heartbeat timer after a newer heartbeat invalidated the one in flight.

use chrono::{DateTime, Utc};

use crate::mutable_state::ActivityInfo;
use crate::tasks::TimeoutKind;

/// A timer task the replica should create, as handed to the store.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTimerStub {
    pub schedule_event_id: i64,
    pub timeout_kind: TimeoutKind,
    pub visibility_timestamp: DateTime<Utc>,
    pub attempt: i32,
    pub version: i64,
}

/// Bookkeeping update produced when the next activity timer is missing:
/// the activity with its created-flag set, plus the timer stub to enqueue.
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityTimerRefresh {
    pub activity: ActivityInfo,
    pub timer: ActivityTimerStub,
}

/// Deterministic ordering for equal deadlines.
fn kind_rank(kind: TimeoutKind) -> u8 {
    match kind {
        TimeoutKind::ScheduleToStart => 0,
        TimeoutKind::StartToClose => 1,
        TimeoutKind::Heartbeat => 2,
        TimeoutKind::ScheduleToClose => 3,
    }
}

fn candidate_deadlines(activity: &ActivityInfo) -> Vec<(TimeoutKind, DateTime<Utc>)> {
    let mut candidates = Vec::with_capacity(4);
    let to_chrono = |timeout: std::time::Duration| chrono::Duration::from_std(timeout).ok();

    if activity.started_event_id.is_none() {
        if let Some(delta) = activity.schedule_to_start_timeout.and_then(to_chrono) {
            candidates.push((TimeoutKind::ScheduleToStart, activity.scheduled_time + delta));
        }
    }
    if let Some(started) = activity.started_time {
        if let Some(delta) = activity.start_to_close_timeout.and_then(to_chrono) {
            candidates.push((TimeoutKind::StartToClose, started + delta));
        }
        if let Some(deadline) = activity.heartbeat_deadline() {
            candidates.push((TimeoutKind::Heartbeat, deadline));
        }
    }
    if let Some(delta) = activity.schedule_to_close_timeout.and_then(to_chrono) {
        candidates.push((TimeoutKind::ScheduleToClose, activity.scheduled_time + delta));
    }
    candidates
}

/// The earliest activity timer across `activities`, if it has not been
/// created yet.
///
/// Returns `None` both when no activity carries a timeout and when the
/// earliest timer already exists; the caller writes only on `Some`.
pub fn next_activity_timer(activities: &[ActivityInfo]) -> Option<ActivityTimerRefresh> {
    let mut earliest: Option<(&ActivityInfo, TimeoutKind, DateTime<Utc>)> = None;

    for activity in activities {
        for (kind, deadline) in candidate_deadlines(activity) {
            let replace = match earliest {
                None => true,
                Some((current, current_kind, current_deadline)) => {
                    (
                        deadline,
                        activity.schedule_event_id,
                        kind_rank(kind),
                    ) < (
                        current_deadline,
                        current.schedule_event_id,
                        kind_rank(current_kind),
                    )
                }
            };
            if replace {
                earliest = Some((activity, kind, deadline));
            }
        }
    }

    let (activity, kind, deadline) = earliest?;
    if activity.created_timers.get(kind) {
        return None;
    }

    let mut updated = activity.clone();
    updated.created_timers.set(kind, true);
    let timer = ActivityTimerStub {
        schedule_event_id: updated.schedule_event_id,
        timeout_kind: kind,
        visibility_timestamp: deadline,
        attempt: updated.attempt,
        version: updated.version,
    };
    Some(ActivityTimerRefresh {
        activity: updated,
        timer,
    })
}
