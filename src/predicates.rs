//! Per-kind reconciliation predicates.
//!
//! Each predicate answers one question: is the effect this timer task was
//! cut for already visible in the local replica? `Complete` means the
//! active side fired the timer (or a branch change superseded it) and the
//! replica caught up; `Pending` means the replica still shows the timer's
//! subject open, and carries the first event id the active side would
//! write after firing, which is where a history fetch must start.

use crate::mutable_state::MutableStateSnapshot;
use crate::tasks::{TimeoutKind, TimerTaskInfo, TimerTaskKind};
use crate::timer_sequence::{self, ActivityTimerRefresh};

/// Reconciliation answer for one task against one snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PredicateOutcome {
    /// The task's effect is already reflected; ack it.
    Complete,
    /// The replica has not caught up. `next_event_id` is the first event
    /// the active side would write when firing this timer.
    Pending { next_event_id: i64 },
}

/// Predicate result plus any bookkeeping repair to apply before acking.
#[derive(Debug, Clone, PartialEq)]
pub struct TaskVerdict {
    pub outcome: PredicateOutcome,
    /// Activity-timer refresh to persist on the ack path. Only ever set for
    /// activity timeout tasks.
    pub refresh: Option<ActivityTimerRefresh>,
}

impl TaskVerdict {
    fn complete() -> Self {
        Self {
            outcome: PredicateOutcome::Complete,
            refresh: None,
        }
    }

    fn pending(next_event_id: i64) -> Self {
        Self {
            outcome: PredicateOutcome::Pending { next_event_id },
            refresh: None,
        }
    }
}

/// Dispatch on the task kind.
pub fn evaluate(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    match task.kind {
        TimerTaskKind::UserTimer => user_timer(task, state),
        TimerTaskKind::ActivityTimeout => activity_timeout(task, state),
        TimerTaskKind::DecisionTimeout => decision_timeout(task, state),
        TimerTaskKind::WorkflowBackoffTimer => workflow_backoff(task, state),
        TimerTaskKind::WorkflowTimeout => workflow_timeout(task, state),
        // Owned by the active side; the executor acks these before loading
        // state, so reaching here means the caller skipped that fast path.
        TimerTaskKind::ActivityRetryTimer | TimerTaskKind::DecisionRetryTimer => {
            TaskVerdict::complete()
        }
    }
}

fn user_timer(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    let Some(timer) = state.user_timer_by_started_event(task.event_id) else {
        // Fired (and removed) on the replica, or garbage-collected; either
        // way there is nothing left to wait for.
        return TaskVerdict::complete();
    };
    if timer.version != task.version {
        return TaskVerdict::complete();
    }
    TaskVerdict::pending(timer.started_event_id + 1)
}

fn activity_timeout(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    let Some(activity) = state.activity(task.event_id) else {
        return TaskVerdict {
            outcome: PredicateOutcome::Complete,
            refresh: next_timer_refresh(task, state),
        };
    };
    if activity.version != task.version {
        return TaskVerdict::complete();
    }

    if task.timeout_kind == TimeoutKind::Heartbeat {
        if let Some(deadline) = activity.heartbeat_deadline() {
            if task.visibility_timestamp < deadline {
                // A later heartbeat pushed the deadline past this task; the
                // task is a stale shadow and the current timer bookkeeping
                // may need rebuilding at the new deadline.
                return TaskVerdict {
                    outcome: PredicateOutcome::Complete,
                    refresh: next_timer_refresh(task, state),
                };
            }
        }
    }

    TaskVerdict::pending(activity.schedule_event_id + 1)
}

/// Recompute the earliest pending activity timer on the ack path.
///
/// When the acked task is a heartbeat timeout superseded by a newer
/// heartbeat (task cut before the heartbeat arrived), the activity's
/// created-heartbeat flag is cleared first so the sequence recreates the
/// timer at the moved deadline. A set flag whose timer is genuinely current
/// suppresses any write.
fn next_timer_refresh(
    task: &TimerTaskInfo,
    state: &MutableStateSnapshot,
) -> Option<ActivityTimerRefresh> {
    let mut activities: Vec<_> = state.pending_activities.values().cloned().collect();

    if task.timeout_kind == TimeoutKind::Heartbeat {
        if let Some(activity) = state.activity(task.event_id) {
            let superseded = activity
                .heartbeat_reference()
                .is_some_and(|reference| task.visibility_timestamp < reference);
            if superseded {
                if let Some(entry) = activities
                    .iter_mut()
                    .find(|a| a.schedule_event_id == task.event_id)
                {
                    entry.created_timers.set(TimeoutKind::Heartbeat, false);
                }
            }
        }
    }

    timer_sequence::next_activity_timer(&activities)
}

fn decision_timeout(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    if task.timeout_kind == TimeoutKind::ScheduleToStart {
        // Speculative decisions are an active-side concern only.
        return TaskVerdict::complete();
    }
    let Some(decision) = &state.decision else {
        return TaskVerdict::complete();
    };
    if decision.version != task.version {
        return TaskVerdict::complete();
    }
    if decision.schedule_event_id != task.event_id {
        return TaskVerdict::complete();
    }
    if decision.attempt != task.schedule_attempt {
        return TaskVerdict::complete();
    }
    let Some(started_event_id) = decision.started_event_id else {
        // Scheduled but never started; the start-to-close clock never began.
        return TaskVerdict::complete();
    };
    TaskVerdict::pending(started_event_id + 1)
}

fn workflow_backoff(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    if state.start_version != task.version {
        return TaskVerdict::complete();
    }
    if state.has_scheduled_first_decision() {
        return TaskVerdict::complete();
    }
    // The backoff fires into the first decision schedule, which becomes the
    // replica's next event.
    TaskVerdict::pending(state.next_event_id)
}

fn workflow_timeout(task: &TimerTaskInfo, state: &MutableStateSnapshot) -> TaskVerdict {
    if state.start_version != task.version {
        return TaskVerdict::complete();
    }
    if !state.is_running() {
        return TaskVerdict::complete();
    }
    TaskVerdict::pending(state.next_event_id)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::time::Duration;

    use chrono::{DateTime, Utc};
    use uuid::Uuid;

    use super::*;
    use crate::mutable_state::{
        ActivityInfo, CreatedActivityTimers, DecisionInfo, TimerInfo, WorkflowStatus,
    };

    const VERSION: i64 = 100;

    fn state() -> MutableStateSnapshot {
        MutableStateSnapshot {
            namespace_id: Uuid::new_v4(),
            workflow_id: "wf".to_string(),
            run_id: Uuid::new_v4(),
            status: WorkflowStatus::Running,
            next_event_id: 10,
            start_version: VERSION,
            pending_activities: HashMap::new(),
            pending_timers: HashMap::new(),
            decision: None,
        }
    }

    fn task(kind: TimerTaskKind, timeout_kind: TimeoutKind, event_id: i64) -> TimerTaskInfo {
        TimerTaskInfo {
            task_id: 1,
            kind,
            timeout_kind,
            namespace_id: Uuid::new_v4(),
            workflow_id: "wf".to_string(),
            run_id: Uuid::new_v4(),
            version: VERSION,
            visibility_timestamp: Utc::now(),
            event_id,
            schedule_attempt: 0,
        }
    }

    fn timer_info(started_event_id: i64) -> TimerInfo {
        TimerInfo {
            timer_id: "timer".to_string(),
            started_event_id,
            version: VERSION,
            expiry_time: Utc::now(),
        }
    }

    fn activity_info(schedule_event_id: i64) -> ActivityInfo {
        ActivityInfo {
            activity_id: "activity".to_string(),
            schedule_event_id,
            started_event_id: None,
            version: VERSION,
            attempt: 0,
            scheduled_time: Utc::now(),
            started_time: None,
            schedule_to_start_timeout: None,
            schedule_to_close_timeout: None,
            start_to_close_timeout: None,
            heartbeat_timeout: None,
            last_heartbeat_time: None,
            created_timers: CreatedActivityTimers::default(),
        }
    }

    fn started_heartbeat_activity(
        schedule_event_id: i64,
        started: DateTime<Utc>,
        heartbeat_timeout: Duration,
    ) -> ActivityInfo {
        let mut activity = activity_info(schedule_event_id);
        activity.started_event_id = Some(schedule_event_id + 1);
        activity.started_time = Some(started);
        activity.heartbeat_timeout = Some(heartbeat_timeout);
        activity.created_timers.heartbeat = true;
        activity
    }

    #[test]
    fn user_timer_pending_while_timer_entry_survives() {
        let mut state = state();
        state.pending_timers.insert("timer".to_string(), timer_info(7));
        let task = task(TimerTaskKind::UserTimer, TimeoutKind::StartToClose, 7);
        assert_eq!(
            evaluate(&task, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 8 }
        );
    }

    #[test]
    fn user_timer_complete_once_fired() {
        let state = state();
        let task = task(TimerTaskKind::UserTimer, TimeoutKind::StartToClose, 7);
        assert_eq!(evaluate(&task, &state).outcome, PredicateOutcome::Complete);
    }

    #[test]
    fn user_timer_complete_on_version_divergence() {
        let mut state = state();
        let mut info = timer_info(7);
        info.version = VERSION + 10;
        state.pending_timers.insert("timer".to_string(), info);
        let task = task(TimerTaskKind::UserTimer, TimeoutKind::StartToClose, 7);
        assert_eq!(evaluate(&task, &state).outcome, PredicateOutcome::Complete);
    }

    #[test]
    fn user_timers_are_checked_independently() {
        let mut state = state();
        state.pending_timers.insert("slow".to_string(), timer_info(9));
        // The fast timer (event 7) already fired and is gone from the map.
        let fired = task(TimerTaskKind::UserTimer, TimeoutKind::StartToClose, 7);
        let open = task(TimerTaskKind::UserTimer, TimeoutKind::StartToClose, 9);
        assert_eq!(evaluate(&fired, &state).outcome, PredicateOutcome::Complete);
        assert_eq!(
            evaluate(&open, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 10 }
        );
    }

    #[test]
    fn activity_timeout_pending_while_scheduled() {
        let mut state = state();
        state.pending_activities.insert(5, activity_info(5));
        let task = task(
            TimerTaskKind::ActivityTimeout,
            TimeoutKind::ScheduleToClose,
            5,
        );
        assert_eq!(
            evaluate(&task, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 6 }
        );
    }

    #[test]
    fn activity_timeout_complete_once_closed() {
        let state = state();
        let task = task(
            TimerTaskKind::ActivityTimeout,
            TimeoutKind::ScheduleToClose,
            5,
        );
        let verdict = evaluate(&task, &state);
        assert_eq!(verdict.outcome, PredicateOutcome::Complete);
        assert_eq!(verdict.refresh, None);
    }

    #[test]
    fn heartbeat_extended_past_task_is_a_noop_ack() {
        let started = Utc::now();
        let mut state = state();
        state
            .pending_activities
            .insert(5, started_heartbeat_activity(5, started, Duration::from_secs(10)));

        let mut heartbeat_task =
            task(TimerTaskKind::ActivityTimeout, TimeoutKind::Heartbeat, 5);
        // Visible deadline is started + 10s; a task cut at started is stale.
        heartbeat_task.visibility_timestamp = started;

        let verdict = evaluate(&heartbeat_task, &state);
        assert_eq!(verdict.outcome, PredicateOutcome::Complete);
        // The heartbeat timer bookkeeping is intact, so nothing to rebuild.
        assert_eq!(verdict.refresh, None);
    }

    #[test]
    fn heartbeat_superseded_by_newer_heartbeat_rebuilds_the_timer() {
        let started = Utc::now();
        let heartbeat = started + chrono::Duration::seconds(30);
        let mut state = state();
        let mut activity = started_heartbeat_activity(5, started, Duration::from_secs(20));
        activity.last_heartbeat_time = Some(heartbeat);
        state.pending_activities.insert(5, activity);

        let mut heartbeat_task =
            task(TimerTaskKind::ActivityTimeout, TimeoutKind::Heartbeat, 5);
        heartbeat_task.visibility_timestamp = heartbeat - chrono::Duration::seconds(5);

        let verdict = evaluate(&heartbeat_task, &state);
        assert_eq!(verdict.outcome, PredicateOutcome::Complete);
        let refresh = verdict.refresh.expect("refresh");
        assert_eq!(refresh.timer.timeout_kind, TimeoutKind::Heartbeat);
        assert_eq!(
            refresh.timer.visibility_timestamp,
            heartbeat + chrono::Duration::seconds(20)
        );
        assert!(refresh.activity.created_timers.heartbeat);
    }

    #[test]
    fn heartbeat_at_or_past_deadline_is_pending() {
        let started = Utc::now();
        let mut state = state();
        state
            .pending_activities
            .insert(5, started_heartbeat_activity(5, started, Duration::from_secs(10)));

        let mut heartbeat_task =
            task(TimerTaskKind::ActivityTimeout, TimeoutKind::Heartbeat, 5);
        heartbeat_task.visibility_timestamp = started + chrono::Duration::seconds(10);

        assert_eq!(
            evaluate(&heartbeat_task, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 6 }
        );
    }

    #[test]
    fn decision_schedule_to_start_is_always_complete() {
        let mut state = state();
        state.decision = Some(DecisionInfo {
            schedule_event_id: 5,
            started_event_id: None,
            version: VERSION,
            attempt: 0,
            scheduled_time: Utc::now(),
        });
        let task = task(
            TimerTaskKind::DecisionTimeout,
            TimeoutKind::ScheduleToStart,
            5,
        );
        assert_eq!(evaluate(&task, &state).outcome, PredicateOutcome::Complete);
    }

    #[test]
    fn decision_start_to_close_pending_while_started() {
        let mut state = state();
        state.decision = Some(DecisionInfo {
            schedule_event_id: 5,
            started_event_id: Some(6),
            version: VERSION,
            attempt: 0,
            scheduled_time: Utc::now(),
        });
        let task = task(
            TimerTaskKind::DecisionTimeout,
            TimeoutKind::StartToClose,
            5,
        );
        assert_eq!(
            evaluate(&task, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 7 }
        );
    }

    #[test]
    fn decision_complete_when_gone_or_mismatched() {
        let decision = DecisionInfo {
            schedule_event_id: 5,
            started_event_id: Some(6),
            version: VERSION,
            attempt: 2,
            scheduled_time: Utc::now(),
        };
        let base = task(
            TimerTaskKind::DecisionTimeout,
            TimeoutKind::StartToClose,
            5,
        );

        // Completed: the decision info is cleared.
        assert_eq!(evaluate(&base, &state()).outcome, PredicateOutcome::Complete);

        // Different decision round took its place.
        let mut other_schedule = state();
        let mut moved = decision.clone();
        moved.schedule_event_id = 9;
        other_schedule.decision = Some(moved);
        assert_eq!(
            evaluate(&base, &other_schedule).outcome,
            PredicateOutcome::Complete
        );

        // Same schedule id, newer attempt.
        let mut newer_attempt = state();
        newer_attempt.decision = Some(decision);
        assert_eq!(
            evaluate(&base, &newer_attempt).outcome,
            PredicateOutcome::Complete
        );
    }

    #[test]
    fn backoff_pending_until_first_decision_scheduled() {
        let mut fresh = state();
        fresh.next_event_id = 2;
        let task = task(
            TimerTaskKind::WorkflowBackoffTimer,
            TimeoutKind::StartToClose,
            0,
        );
        assert_eq!(
            evaluate(&task, &fresh).outcome,
            PredicateOutcome::Pending { next_event_id: 2 }
        );

        fresh.next_event_id = 3;
        assert_eq!(evaluate(&task, &fresh).outcome, PredicateOutcome::Complete);
    }

    #[test]
    fn workflow_timeout_pending_only_while_running() {
        let mut state = state();
        let task = task(TimerTaskKind::WorkflowTimeout, TimeoutKind::StartToClose, 0);
        assert_eq!(
            evaluate(&task, &state).outcome,
            PredicateOutcome::Pending { next_event_id: 10 }
        );

        state.status = WorkflowStatus::Completed;
        assert_eq!(evaluate(&task, &state).outcome, PredicateOutcome::Complete);
    }

    #[test]
    fn workflow_timers_complete_on_start_version_divergence() {
        let mut state = state();
        state.start_version = VERSION + 10;
        let timeout = task(TimerTaskKind::WorkflowTimeout, TimeoutKind::StartToClose, 0);
        let backoff = task(
            TimerTaskKind::WorkflowBackoffTimer,
            TimeoutKind::StartToClose,
            0,
        );
        assert_eq!(evaluate(&timeout, &state).outcome, PredicateOutcome::Complete);
        assert_eq!(evaluate(&backoff, &state).outcome, PredicateOutcome::Complete);
    }
}
