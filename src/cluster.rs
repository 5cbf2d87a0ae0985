//! Cluster topology: mapping failover versions to owning clusters.
//!
//! Every cluster in the replication group is assigned a distinct initial
//! failover version below the shared increment. A failover bumps the
//! namespace's version to the next value congruent to the new owner's
//! initial version, so `version % increment` always identifies the cluster
//! that wrote a given piece of state.

use std::collections::BTreeMap;

use anyhow::{bail, Result};

/// Static description of the replication group this shard participates in.
#[derive(Debug, Clone)]
pub struct ClusterMetadata {
    current_cluster: String,
    failover_version_increment: i64,
    /// Initial failover version per cluster name.
    initial_versions: BTreeMap<String, i64>,
}

impl ClusterMetadata {
    pub fn new(
        current_cluster: impl Into<String>,
        failover_version_increment: i64,
        initial_versions: BTreeMap<String, i64>,
    ) -> Result<Self> {
        let current_cluster = current_cluster.into();
        if failover_version_increment <= 0 {
            bail!("failover version increment must be positive");
        }
        if !initial_versions.contains_key(&current_cluster) {
            bail!("current cluster {current_cluster} missing from cluster topology");
        }
        for (cluster, initial) in &initial_versions {
            if *initial < 0 || *initial >= failover_version_increment {
                bail!(
                    "initial failover version {initial} for cluster {cluster} \
                     outside [0, {failover_version_increment})"
                );
            }
        }
        Ok(Self {
            current_cluster,
            failover_version_increment,
            initial_versions,
        })
    }

    /// Name of the cluster this process runs in.
    pub fn current_cluster(&self) -> &str {
        &self.current_cluster
    }

    /// The cluster that owns `version`, if the version maps into the
    /// configured topology.
    pub fn cluster_for_version(&self, version: i64) -> Option<&str> {
        if version < 0 {
            return None;
        }
        let remainder = version % self.failover_version_increment;
        self.initial_versions
            .iter()
            .find(|(_, initial)| **initial == remainder)
            .map(|(cluster, _)| cluster.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn two_cluster_topology() -> ClusterMetadata {
        ClusterMetadata::new(
            "alpha",
            10,
            BTreeMap::from([("alpha".to_string(), 1), ("bravo".to_string(), 2)]),
        )
        .expect("topology")
    }

    #[test]
    fn versions_map_to_their_initial_cluster() {
        let metadata = two_cluster_topology();
        assert_eq!(metadata.cluster_for_version(1), Some("alpha"));
        assert_eq!(metadata.cluster_for_version(11), Some("alpha"));
        assert_eq!(metadata.cluster_for_version(2), Some("bravo"));
        assert_eq!(metadata.cluster_for_version(102), Some("bravo"));
    }

    #[test]
    fn unknown_or_negative_versions_map_to_none() {
        let metadata = two_cluster_topology();
        assert_eq!(metadata.cluster_for_version(3), None);
        assert_eq!(metadata.cluster_for_version(-1), None);
    }

    #[test]
    fn construction_rejects_bad_topologies() {
        assert!(ClusterMetadata::new("alpha", 0, BTreeMap::new()).is_err());
        assert!(ClusterMetadata::new(
            "alpha",
            10,
            BTreeMap::from([("bravo".to_string(), 2)])
        )
        .is_err());
        assert!(ClusterMetadata::new(
            "alpha",
            10,
            BTreeMap::from([("alpha".to_string(), 10)])
        )
        .is_err());
    }
}
