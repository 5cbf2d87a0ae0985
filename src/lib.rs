//! Belay - standby-side timer reconciliation for a multi-cluster workflow
//! history service.
//!
//! In a replicated workflow-history deployment both the active and the
//! standby cluster generate timer tasks from their own copies of mutable
//! state, but only the active side may act on one. The standby side instead
//! verifies: when a timer comes due, has the active side's firing already
//! replicated here? The key components are:
//!
//! ## Executor
//!
//! - [`StandbyTimerExecutor`]: dispatches a due [`TimerTaskInfo`] through the
//!   per-kind predicates and the reconciliation gate
//! - [`ExecuteError`]: the queue-facing outcome contract (ack / retry /
//!   discard / propagate)
//!
//! ## Collaborators
//!
//! - [`ExecutionStateStore`]: replica snapshot loads plus the single
//!   conditional write path (activity-timer refresh)
//! - [`HistoryResender`]: on-demand pull of missing history ranges
//! - [`ShardClock`]: per-remote-cluster virtual time
//! - [`NamespaceRegistry`] and [`ClusterMetadata`]: task ownership checks

pub mod backends;
pub mod clock;
pub mod cluster;
pub mod config;
pub mod executor;
pub mod metrics;
pub mod mutable_state;
pub mod namespace;
pub mod predicates;
pub mod replication;
pub mod tasks;
pub mod timer_sequence;

// Configuration
pub use config::{EventEncoding, StandbyConfig, DEFAULT_DISCARD_DELAY, DEFAULT_RESEND_DELAY};

// Executor
pub use executor::{classify_lag, ExecuteError, LagBucket, StandbyTimerExecutor};

// Task and state model
pub use mutable_state::{
    ActivityInfo, CreatedActivityTimers, DecisionInfo, MutableStateSnapshot, TimerInfo,
    WorkflowStatus,
};
pub use tasks::{TimeoutKind, TimerTaskInfo, TimerTaskKind, END_EVENT_ID, FIRST_EVENT_ID};

// Collaborator interfaces
pub use backends::{
    ExecutionStateStore, MemoryExecutionStore, StateStoreError, TimerRefreshRequest,
};
pub use clock::ShardClock;
pub use cluster::ClusterMetadata;
pub use namespace::{NamespaceEntry, NamespaceRegistry, StaticNamespaceRegistry};
pub use replication::{HistoryResender, ResendError};

// Predicates and bookkeeping
pub use metrics::{StandbyMetrics, StandbyMetricsSnapshot};
pub use predicates::{PredicateOutcome, TaskVerdict};
pub use timer_sequence::{ActivityTimerRefresh, ActivityTimerStub};
