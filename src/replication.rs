//! History re-replication interface.
//!
//! When a standby task has been pending past the resend window, the
//! executor asks the re-replicator to pull the missing event range from the
//! active cluster. The fetch is fire-and-forget from the executor's view:
//! success and "not yet available" both come back as a retry; only hard
//! failures propagate.

use async_trait::async_trait;
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum ResendError {
    /// The active cluster does not have the requested events yet. Expected
    /// during failover windows; the task simply retries.
    #[error("requested history range not yet available on the source cluster")]
    NotAvailable,
    #[error("{0}")]
    Message(String),
}

/// On-demand puller of replicated history.
#[async_trait]
pub trait HistoryResender: Send + Sync {
    /// Fetch and apply events `[begin_event_id, end_event_id)` for the
    /// execution. `END_EVENT_ID` encodes "to the end of history". The
    /// operation is idempotent; re-fetching applied events is a no-op.
    async fn resend(
        &self,
        namespace_id: Uuid,
        workflow_id: &str,
        run_id: Uuid,
        begin_event_id: i64,
        end_event_id: i64,
    ) -> Result<(), ResendError>;
}
