//! Standby timer-task executor.
//!
//! The shard's timer queue hands due tasks to [`StandbyTimerExecutor::execute`]
//! and acts on the outcome: `Ok` acks the task, [`ExecuteError::Retry`]
//! re-enqueues it with backoff, [`ExecuteError::Discarded`] drops it, and
//! everything else propagates to the shard's error handling. The executor
//! never writes a visible history event; its only write is the idempotent
//! activity-timer refresh, gated by optimistic concurrency.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::backends::{ExecutionStateStore, StateStoreError, TimerRefreshRequest};
use crate::clock::ShardClock;
use crate::cluster::ClusterMetadata;
use crate::config::{EventEncoding, StandbyConfig};
use crate::metrics::StandbyMetrics;
use crate::mutable_state::MutableStateSnapshot;
use crate::namespace::NamespaceRegistry;
use crate::predicates::{self, PredicateOutcome};
use crate::replication::{HistoryResender, ResendError};
use crate::tasks::{TimerTaskInfo, END_EVENT_ID};
use crate::timer_sequence::ActivityTimerRefresh;

/// Terminal signal for one `execute` call.
#[derive(Debug, thiserror::Error)]
pub enum ExecuteError {
    /// The replica has not caught up; the queue must re-enqueue the task.
    #[error("standby replica not caught up; task must be retried")]
    Retry,
    /// The task outlived the discard window and was dropped.
    #[error("standby task discarded past the discard deadline")]
    Discarded,
    #[error(transparent)]
    Store(#[from] StateStoreError),
    #[error("history resend failed: {0}")]
    Resend(ResendError),
}

/// How far a pending task's visibility lags the remote cluster's clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LagBucket {
    /// Young enough that ordinary replication should deliver the events.
    Wait,
    /// Old enough to pull the missing history range explicitly.
    Resend,
    /// Past the discard deadline.
    Expired,
}

/// Pure bucket decision of the reconciliation gate.
pub fn classify_lag(
    age: chrono::Duration,
    resend_delay: chrono::Duration,
    discard_delay: chrono::Duration,
) -> LagBucket {
    if age < resend_delay {
        LagBucket::Wait
    } else if age < discard_delay {
        LagBucket::Resend
    } else {
        LagBucket::Expired
    }
}

/// Reconciles due timer tasks against the local replica for one remote
/// cluster. Shared across the shard's timer-queue workers via `Arc`; all
/// state beyond configuration lives in the injected collaborators.
pub struct StandbyTimerExecutor {
    cluster_name: String,
    clusters: Arc<ClusterMetadata>,
    namespaces: Arc<dyn NamespaceRegistry>,
    store: Arc<dyn ExecutionStateStore>,
    resender: Arc<dyn HistoryResender>,
    clock: Arc<ShardClock>,
    metrics: Arc<StandbyMetrics>,
    resend_delay: chrono::Duration,
    discard_delay: chrono::Duration,
    event_encoding: EventEncoding,
}

impl StandbyTimerExecutor {
    /// Build an executor for the remote cluster named `cluster_name`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        cluster_name: impl Into<String>,
        config: &StandbyConfig,
        clusters: Arc<ClusterMetadata>,
        namespaces: Arc<dyn NamespaceRegistry>,
        store: Arc<dyn ExecutionStateStore>,
        resender: Arc<dyn HistoryResender>,
        clock: Arc<ShardClock>,
        metrics: Arc<StandbyMetrics>,
    ) -> anyhow::Result<Self> {
        config.validate()?;
        let resend_delay = chrono::Duration::from_std(config.resend_delay)
            .map_err(|err| anyhow::anyhow!("resend delay out of range: {err}"))?;
        let discard_delay = chrono::Duration::from_std(config.discard_delay)
            .map_err(|err| anyhow::anyhow!("discard delay out of range: {err}"))?;
        Ok(Self {
            cluster_name: cluster_name.into(),
            clusters,
            namespaces,
            store,
            resender,
            clock,
            metrics,
            resend_delay,
            discard_delay,
            event_encoding: config.event_encoding,
        })
    }

    /// The remote cluster this executor reconciles tasks for.
    pub fn cluster_name(&self) -> &str {
        &self.cluster_name
    }

    pub fn metrics(&self) -> &StandbyMetrics {
        &self.metrics
    }

    /// Reconcile one due timer task against the local replica.
    pub async fn execute(
        &self,
        task: &TimerTaskInfo,
        should_process: bool,
    ) -> Result<(), ExecuteError> {
        if !should_process {
            self.metrics.record_skipped();
            return Ok(());
        }

        // A task only applies while its failover version still maps to the
        // cluster this executor shadows; anything else was produced around a
        // failover and is acked unseen. Same for a namespace removed while
        // its tasks were still queued.
        let Some(namespace) = self.namespaces.by_id(task.namespace_id) else {
            debug!(
                task_id = task.task_id,
                namespace_id = %task.namespace_id,
                "acking timer task for unknown namespace"
            );
            self.metrics.record_acked();
            return Ok(());
        };
        // Standby reconciliation only applies while the namespace is active
        // elsewhere. The cached owner and the owner derived from the cached
        // failover version normally agree; either one naming this cluster
        // means the active executor owns the namespace's timers, and a
        // half-refreshed cache must not push them through the standby path.
        let current_cluster = self.clusters.current_cluster();
        let derived_owner = self.clusters.cluster_for_version(namespace.failover_version);
        if namespace.active_cluster == current_cluster || derived_owner == Some(current_cluster) {
            debug!(
                task_id = task.task_id,
                namespace = %namespace.name,
                "acking timer task for namespace active in this cluster"
            );
            self.metrics.record_acked();
            return Ok(());
        }
        let owner = self.clusters.cluster_for_version(task.version);
        if owner != Some(self.cluster_name.as_str()) {
            debug!(
                task_id = task.task_id,
                version = task.version,
                owner = owner.unwrap_or("<unknown>"),
                "acking timer task owned by another cluster"
            );
            self.metrics.record_acked();
            return Ok(());
        }

        if !task.is_standby_actionable() {
            self.metrics.record_acked();
            return Ok(());
        }

        let state = self
            .store
            .load(task.namespace_id, &task.workflow_id, task.run_id)
            .await?;
        let Some(state) = state else {
            self.metrics.record_acked();
            return Ok(());
        };
        if !state.is_running() {
            // A close event supersedes every standby timer, including the
            // workflow timeout the close may itself have come from.
            self.metrics.record_acked();
            return Ok(());
        }

        let verdict = predicates::evaluate(task, &state);
        match verdict.outcome {
            PredicateOutcome::Complete => {
                if let Some(refresh) = verdict.refresh {
                    self.apply_timer_refresh(task, &state, refresh).await?;
                }
                self.metrics.record_acked();
                Ok(())
            }
            PredicateOutcome::Pending { next_event_id } => {
                self.reconcile(task, next_event_id).await
            }
        }
    }

    /// Persist a rebuilt activity timer under the loaded snapshot's version.
    async fn apply_timer_refresh(
        &self,
        task: &TimerTaskInfo,
        state: &MutableStateSnapshot,
        refresh: ActivityTimerRefresh,
    ) -> Result<(), ExecuteError> {
        debug!(
            task_id = task.task_id,
            workflow_id = %task.workflow_id,
            schedule_event_id = refresh.timer.schedule_event_id,
            timeout_kind = ?refresh.timer.timeout_kind,
            "refreshing activity timer bookkeeping"
        );
        self.store
            .refresh_activity_timer(TimerRefreshRequest {
                namespace_id: task.namespace_id,
                workflow_id: task.workflow_id.clone(),
                run_id: task.run_id,
                condition_next_event_id: state.next_event_id,
                activity: refresh.activity,
                timer: refresh.timer,
                encoding: self.event_encoding,
            })
            .await?;
        self.metrics.record_timer_refresh();
        Ok(())
    }

    /// Decide between waiting, fetching, and discarding a pending task.
    async fn reconcile(
        &self,
        task: &TimerTaskInfo,
        next_event_id: i64,
    ) -> Result<(), ExecuteError> {
        let now = self.clock.now_for(&self.cluster_name);
        let age = now.signed_duration_since(task.visibility_timestamp);
        match classify_lag(age, self.resend_delay, self.discard_delay) {
            LagBucket::Wait => {
                self.metrics.record_retried();
                Err(ExecuteError::Retry)
            }
            LagBucket::Resend => self.resend_and_retry(task, next_event_id, now).await,
            LagBucket::Expired => {
                warn!(
                    task_id = task.task_id,
                    workflow_id = %task.workflow_id,
                    run_id = %task.run_id,
                    kind = ?task.kind,
                    age_secs = age.num_seconds(),
                    "discarding standby timer task past the discard deadline"
                );
                self.metrics.record_discarded();
                Err(ExecuteError::Discarded)
            }
        }
    }

    async fn resend_and_retry(
        &self,
        task: &TimerTaskInfo,
        next_event_id: i64,
        now: DateTime<Utc>,
    ) -> Result<(), ExecuteError> {
        debug!(
            task_id = task.task_id,
            workflow_id = %task.workflow_id,
            run_id = %task.run_id,
            begin_event_id = next_event_id,
            remote_now = %now,
            "fetching missing history for lagging standby task"
        );
        self.metrics.record_resend_attempt();
        match self
            .resender
            .resend(
                task.namespace_id,
                &task.workflow_id,
                task.run_id,
                next_event_id,
                END_EVENT_ID,
            )
            .await
        {
            Ok(()) => {
                self.metrics.record_retried();
                Err(ExecuteError::Retry)
            }
            Err(ResendError::NotAvailable) => {
                debug!(
                    task_id = task.task_id,
                    workflow_id = %task.workflow_id,
                    "history range not yet available on source cluster"
                );
                self.metrics.record_retried();
                Err(ExecuteError::Retry)
            }
            Err(err) => Err(ExecuteError::Resend(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minutes(n: i64) -> chrono::Duration {
        chrono::Duration::minutes(n)
    }

    #[test]
    fn lag_under_resend_delay_waits() {
        assert_eq!(
            classify_lag(minutes(0), minutes(5), minutes(15)),
            LagBucket::Wait
        );
        assert_eq!(
            classify_lag(minutes(-3), minutes(5), minutes(15)),
            LagBucket::Wait
        );
    }

    #[test]
    fn lag_at_resend_delay_fetches() {
        assert_eq!(
            classify_lag(minutes(5), minutes(5), minutes(15)),
            LagBucket::Resend
        );
        assert_eq!(
            classify_lag(minutes(14), minutes(5), minutes(15)),
            LagBucket::Resend
        );
    }

    #[test]
    fn lag_at_discard_delay_expires() {
        assert_eq!(
            classify_lag(minutes(15), minutes(5), minutes(15)),
            LagBucket::Expired
        );
        assert_eq!(
            classify_lag(minutes(120), minutes(5), minutes(15)),
            LagBucket::Expired
        );
    }
}
