//! In-memory counters for standby task outcomes.
//!
//! Discards are the signal that matters operationally: a growing discard
//! count means replication has been behind for longer than the discard
//! window and timer effects are being dropped on this replica.

use std::sync::atomic::{AtomicU64, Ordering};

/// Shared counter handle for one standby executor.
#[derive(Debug, Default)]
pub struct StandbyMetrics {
    acked: AtomicU64,
    retried: AtomicU64,
    discarded: AtomicU64,
    resend_attempts: AtomicU64,
    timer_refreshes: AtomicU64,
    skipped: AtomicU64,
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StandbyMetricsSnapshot {
    pub acked: u64,
    pub retried: u64,
    pub discarded: u64,
    pub resend_attempts: u64,
    pub timer_refreshes: u64,
    pub skipped: u64,
}

impl StandbyMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_acked(&self) {
        self.acked.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_retried(&self) {
        self.retried.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_discarded(&self) {
        self.discarded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_resend_attempt(&self) {
        self.resend_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_timer_refresh(&self) {
        self.timer_refreshes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_skipped(&self) {
        self.skipped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StandbyMetricsSnapshot {
        StandbyMetricsSnapshot {
            acked: self.acked.load(Ordering::Relaxed),
            retried: self.retried.load(Ordering::Relaxed),
            discarded: self.discarded.load(Ordering::Relaxed),
            resend_attempts: self.resend_attempts.load(Ordering::Relaxed),
            timer_refreshes: self.timer_refreshes.load(Ordering::Relaxed),
            skipped: self.skipped.load(Ordering::Relaxed),
        }
    }
}
