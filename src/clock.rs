//! Per-remote-cluster shard clock.
//!
//! The shard tracks one virtual clock per remote cluster, advanced by that
//! cluster's replication progress. The standby executor measures task age
//! against this clock, never against wall time, so tests (and replayed
//! shards) control time explicitly.

use std::collections::HashMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};

/// Virtual per-cluster clock, monotonic per cluster.
#[derive(Debug, Default)]
pub struct ShardClock {
    times: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl ShardClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current time as observed from `cluster`. A cluster never advanced
    /// reports the epoch, which keeps every task inside the resend window
    /// until real replication progress arrives.
    pub fn now_for(&self, cluster: &str) -> DateTime<Utc> {
        let times = self.times.lock().expect("shard clock poisoned");
        times
            .get(cluster)
            .copied()
            .unwrap_or(DateTime::<Utc>::MIN_UTC)
    }

    /// Advance `cluster`'s clock to `time`. Regressions are ignored; the
    /// clock only moves forward.
    pub fn advance_to(&self, cluster: &str, time: DateTime<Utc>) {
        let mut times = self.times.lock().expect("shard clock poisoned");
        let entry = times.entry(cluster.to_string()).or_insert(time);
        if time > *entry {
            *entry = time;
        }
    }
}
