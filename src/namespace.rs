//! Namespace registry interface.
//!
//! The shard owns a namespace cache refreshed from the metadata store; the
//! executor only needs point lookups by id. A static in-memory registry
//! covers tests and single-tenant deployments.

use std::collections::HashMap;
use std::sync::RwLock;

use uuid::Uuid;

/// One replicated namespace as seen by this shard.
#[derive(Debug, Clone, PartialEq)]
pub struct NamespaceEntry {
    pub id: Uuid,
    pub name: String,
    /// Current failover version of the namespace.
    pub failover_version: i64,
    /// Cluster currently authoritative for the namespace.
    pub active_cluster: String,
}

/// Point lookup into the shard's namespace cache.
pub trait NamespaceRegistry: Send + Sync {
    /// Entry for `namespace_id`, or `None` if the namespace is unknown
    /// (possibly deleted concurrently with replication).
    fn by_id(&self, namespace_id: Uuid) -> Option<NamespaceEntry>;
}

/// Registry backed by a fixed in-memory map.
#[derive(Debug, Default)]
pub struct StaticNamespaceRegistry {
    entries: RwLock<HashMap<Uuid, NamespaceEntry>>,
}

impl StaticNamespaceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entry: NamespaceEntry) {
        let mut entries = self.entries.write().expect("namespace registry poisoned");
        entries.insert(entry.id, entry);
    }

    pub fn remove(&self, namespace_id: Uuid) {
        let mut entries = self.entries.write().expect("namespace registry poisoned");
        entries.remove(&namespace_id);
    }
}

impl NamespaceRegistry for StaticNamespaceRegistry {
    fn by_id(&self, namespace_id: Uuid) -> Option<NamespaceEntry> {
        let entries = self.entries.read().expect("namespace registry poisoned");
        entries.get(&namespace_id).cloned()
    }
}
