//! Partition discovery for an index.
//!
//! The translator needs one routing key per physical partition of an index so
//! that an in-flight marker can be written to every partition. Which partition
//! a routing key lands on is decided by [`partition_for`], which both the
//! topology and the backend must agree on.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::error::TopologyError;

/// The partition a document with routing key `routing` is stored in.
pub fn partition_for(routing: &str, partitions: u32) -> u32 {
    crc32c::crc32c(routing.as_bytes()) % partitions.max(1)
}

/// One routing key per partition: entry `p` is the smallest decimal string
/// that [`partition_for`] maps to partition `p`.
pub fn routing_keys(partitions: u32) -> Vec<String> {
    let mut keys: Vec<Option<String>> = vec![None; partitions as usize];
    let mut missing = keys.len();
    let mut candidate: u64 = 0;
    while missing > 0 {
        let key = candidate.to_string();
        let slot = &mut keys[partition_for(&key, partitions) as usize];
        if slot.is_none() {
            *slot = Some(key);
            missing -= 1;
        }
        candidate += 1;
    }
    keys.into_iter().flatten().collect()
}

/// Cluster topology, as far as bulk writes are concerned.
pub trait Topology: Send + Sync {
    /// The number of physical partitions of `index`.
    fn num_partitions(&self, index: &str) -> Result<u32, TopologyError>;

    /// One routing key per partition of `index`, in partition order.
    fn routing_table(&self, index: &str) -> Result<Vec<String>, TopologyError> {
        match self.num_partitions(index)? {
            0 => Err(TopologyError::NoPartitions(index.to_owned())),
            n => Ok(routing_keys(n)),
        }
    }
}

impl<T: Topology + ?Sized> Topology for Arc<T> {
    fn num_partitions(&self, index: &str) -> Result<u32, TopologyError> {
        (**self).num_partitions(index)
    }

    fn routing_table(&self, index: &str) -> Result<Vec<String>, TopologyError> {
        (**self).routing_table(index)
    }
}

/// Every index has the same, fixed number of partitions.
#[derive(Debug, Clone, Copy)]
pub struct StaticTopology {
    pub partitions: u32,
}

impl Topology for StaticTopology {
    fn num_partitions(&self, _index: &str) -> Result<u32, TopologyError> {
        Ok(self.partitions)
    }
}

/// Caches the routing tables computed by an inner [`Topology`].
///
/// Partition counts of an index never change after creation, so a table
/// computed once stays valid.
pub struct CachedTopology<T> {
    inner: T,
    tables: RwLock<HashMap<String, Vec<String>>>,
}

impl<T: Topology> CachedTopology<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            tables: RwLock::default(),
        }
    }
}

impl<T: Topology> Topology for CachedTopology<T> {
    fn num_partitions(&self, index: &str) -> Result<u32, TopologyError> {
        self.inner.num_partitions(index)
    }

    fn routing_table(&self, index: &str) -> Result<Vec<String>, TopologyError> {
        if let Some(table) = self.tables.read().get(index) {
            return Ok(table.clone());
        }
        let table = self.inner.routing_table(index)?;
        self.tables.write().insert(index.to_owned(), table.clone());
        Ok(table)
    }
}
