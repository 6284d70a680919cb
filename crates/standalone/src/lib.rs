pub mod routes;
pub mod startup;
pub mod subcommands;
pub mod util;

use std::sync::Arc;

use trackwrite_client_api::NodeDelegate;
use trackwrite_core::topology::CachedTopology;
use trackwrite_core::{MemoryIndex, WriteCoordinator};

/// A node keeping every track of every index in memory.
pub struct StandaloneEnv {
    index: Arc<MemoryIndex>,
    coordinator: WriteCoordinator,
}

impl StandaloneEnv {
    /// Indices are created on first write with `partitions` partitions.
    ///
    /// Partition counts never change afterwards, so routing tables are
    /// computed once per index.
    pub fn init(partitions: u32) -> Arc<Self> {
        let index = Arc::new(MemoryIndex::new(partitions));
        let topology = Arc::new(CachedTopology::new(index.clone()));
        let coordinator = WriteCoordinator::new(index.clone(), topology);
        log::info!("in-memory index ready, {partitions} partitions per index");
        Arc::new(Self { index, coordinator })
    }

    pub fn index(&self) -> &MemoryIndex {
        &self.index
    }
}

impl NodeDelegate for StandaloneEnv {
    fn coordinator(&self) -> &WriteCoordinator {
        &self.coordinator
    }
}
