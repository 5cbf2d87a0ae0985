//! In-memory execution state store for tests and local runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use uuid::Uuid;

use super::base::{ExecutionStateStore, StateStoreError, StateStoreResult, TimerRefreshRequest};
use crate::config::EventEncoding;
use crate::mutable_state::MutableStateSnapshot;
use crate::timer_sequence::ActivityTimerStub;

type ExecutionKey = (Uuid, String, Uuid);

/// A refresh mutation as the store persisted it: the encoded activity blob
/// plus the timer task it enqueued.
#[derive(Debug, Clone, PartialEq)]
pub struct EncodedMutation {
    pub run_id: Uuid,
    pub encoding: EventEncoding,
    pub activity_blob: Vec<u8>,
    pub timer: ActivityTimerStub,
}

/// Store backed by a process-local map of snapshots.
#[derive(Clone, Default)]
pub struct MemoryExecutionStore {
    executions: Arc<Mutex<HashMap<ExecutionKey, MutableStateSnapshot>>>,
    mutations: Arc<Mutex<Vec<EncodedMutation>>>,
    loads: Arc<AtomicU64>,
}

impl MemoryExecutionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace the snapshot for one execution.
    pub fn put(&self, snapshot: MutableStateSnapshot) {
        let key = (
            snapshot.namespace_id,
            snapshot.workflow_id.clone(),
            snapshot.run_id,
        );
        let mut executions = self.executions.lock().expect("executions poisoned");
        executions.insert(key, snapshot);
    }

    pub fn remove(&self, namespace_id: Uuid, workflow_id: &str, run_id: Uuid) {
        let mut executions = self.executions.lock().expect("executions poisoned");
        executions.remove(&(namespace_id, workflow_id.to_string(), run_id));
    }

    /// Refresh mutations applied so far, oldest first.
    pub fn mutations(&self) -> Vec<EncodedMutation> {
        self.mutations.lock().expect("mutations poisoned").clone()
    }

    /// Number of `load` calls served, including misses.
    pub fn load_count(&self) -> u64 {
        self.loads.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl ExecutionStateStore for MemoryExecutionStore {
    async fn load(
        &self,
        namespace_id: Uuid,
        workflow_id: &str,
        run_id: Uuid,
    ) -> StateStoreResult<Option<MutableStateSnapshot>> {
        self.loads.fetch_add(1, Ordering::Relaxed);
        let executions = self.executions.lock().expect("executions poisoned");
        Ok(executions
            .get(&(namespace_id, workflow_id.to_string(), run_id))
            .cloned())
    }

    async fn refresh_activity_timer(&self, request: TimerRefreshRequest) -> StateStoreResult<()> {
        // The in-memory store persists JSON regardless of the requested wire
        // encoding; the encoding is recorded for inspection.
        let activity_blob = serde_json::to_vec(&request.activity)?;

        let key = (
            request.namespace_id,
            request.workflow_id.clone(),
            request.run_id,
        );
        let mut executions = self.executions.lock().expect("executions poisoned");
        let snapshot = executions.get_mut(&key).ok_or_else(|| {
            StateStoreError::Message(format!(
                "execution {}/{} not found for timer refresh",
                request.workflow_id, request.run_id
            ))
        })?;
        if snapshot.next_event_id != request.condition_next_event_id {
            return Err(StateStoreError::ConditionFailed {
                expected: request.condition_next_event_id,
            });
        }
        snapshot
            .pending_activities
            .insert(request.activity.schedule_event_id, request.activity.clone());

        let mut mutations = self.mutations.lock().expect("mutations poisoned");
        mutations.push(EncodedMutation {
            run_id: request.run_id,
            encoding: request.encoding,
            activity_blob,
            timer: request.timer,
        });
        Ok(())
    }
}
