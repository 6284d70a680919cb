//! An in-memory document index.
//!
//! Stores every track of every index in partitioned hash maps, and applies
//! bulk requests under a single lock. Versions of deleted documents are kept as
//! tombstones, so forced-version writes are checked against them too.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::RwLock;
use trackwrite_primitives::{OpKind, Track};

use crate::backend::{
    BulkItem, BulkRequest, BulkResponse, BulkWriter, Failure, RefreshPolicy, Source, WriteOp, WriteResult,
};
use crate::error::{BackendError, TopologyError};
use crate::topology::{partition_for, Topology};

/// A live document as returned by [`MemoryIndex::get`].
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub version: u64,
    pub source: Source,
}

#[derive(Debug, Clone)]
struct Stored {
    version: u64,
    /// `None` once deleted.
    source: Option<Source>,
}

type Partition = HashMap<(Track, String), Stored>;

#[derive(Debug)]
struct IndexState {
    partitions: Vec<Partition>,
    refreshes: u64,
}

impl IndexState {
    fn new(partitions: u32) -> Self {
        Self {
            partitions: (0..partitions.max(1)).map(|_| Partition::new()).collect(),
            refreshes: 0,
        }
    }

    fn partition_of(&self, routing: &str) -> usize {
        partition_for(routing, self.partitions.len() as u32) as usize
    }

    fn apply(&mut self, op: &WriteOp) -> BulkItem {
        let partition = self.partition_of(op.effective_routing());
        let key = (op.track, op.id.clone());
        let stored = self.partitions[partition].get(&key);
        let live = stored.is_some_and(|doc| doc.source.is_some());

        if op.kind == OpKind::Create && live {
            let current = stored.map_or(0, |doc| doc.version);
            return BulkItem::failed(
                op,
                Failure::version_conflict(format!(
                    "[{}]: version conflict, document already exists (current version [{current}])",
                    op.id
                )),
            );
        }

        let version = match op.version.resolve(stored.map(|doc| doc.version)) {
            Ok(version) => version,
            Err(conflict) => {
                return BulkItem::failed(op, Failure::version_conflict(format!("[{}]: {conflict}", op.id)));
            }
        };

        match op.kind {
            OpKind::Index | OpKind::Create => {
                let source = op.source.clone().unwrap_or_default();
                self.partitions[partition].insert(
                    key,
                    Stored {
                        version,
                        source: Some(source),
                    },
                );
                let result = if live { WriteResult::Updated } else { WriteResult::Created };
                BulkItem::succeeded(op, version, result)
            }
            OpKind::Delete if live => {
                self.partitions[partition].insert(key, Stored { version, source: None });
                BulkItem::succeeded(op, version, WriteResult::Deleted)
            }
            OpKind::Delete => BulkItem::succeeded(op, version, WriteResult::NotFound),
        }
    }
}

/// A [`BulkWriter`] and [`Topology`] keeping all documents in memory.
///
/// Indices are created on first use with the default partition count, unless
/// created explicitly with [`MemoryIndex::create_index`].
#[derive(Debug)]
pub struct MemoryIndex {
    default_partitions: u32,
    indices: RwLock<HashMap<String, IndexState>>,
}

impl MemoryIndex {
    pub fn new(default_partitions: u32) -> Self {
        Self {
            default_partitions: default_partitions.max(1),
            indices: RwLock::default(),
        }
    }

    /// Create `index` with the given number of partitions.
    ///
    /// Does nothing if the index already exists.
    pub fn create_index(&self, index: &str, partitions: u32) {
        self.indices
            .write()
            .entry(index.to_owned())
            .or_insert_with(|| IndexState::new(partitions));
    }

    /// The live document `id` of `track`, routed by its id.
    pub fn get(&self, index: &str, track: Track, id: &str) -> Option<Document> {
        self.get_routed(index, track, id, id)
    }

    /// The live document `id` of `track`, in the partition `routing` maps to.
    pub fn get_routed(&self, index: &str, track: Track, id: &str, routing: &str) -> Option<Document> {
        let indices = self.indices.read();
        let state = indices.get(index)?;
        let stored = state.partitions[state.partition_of(routing)].get(&(track, id.to_owned()))?;
        stored.source.as_ref().map(|source| Document {
            version: stored.version,
            source: source.clone(),
        })
    }

    /// The partitions holding a live document `id` of `track`.
    pub fn partitions_holding(&self, index: &str, track: Track, id: &str) -> Vec<u32> {
        let indices = self.indices.read();
        let Some(state) = indices.get(index) else {
            return Vec::new();
        };
        let key = (track, id.to_owned());
        state
            .partitions
            .iter()
            .enumerate()
            .filter(|(_, partition)| partition.get(&key).is_some_and(|doc| doc.source.is_some()))
            .map(|(p, _)| p as u32)
            .collect()
    }

    /// Number of live documents in `track`.
    pub fn count(&self, index: &str, track: Track) -> usize {
        self.indices.read().get(index).map_or(0, |state| {
            state
                .partitions
                .iter()
                .flat_map(|partition| partition.iter())
                .filter(|((t, _), doc)| *t == track && doc.source.is_some())
                .count()
        })
    }

    /// How many requests asked for an immediate refresh of `index`.
    pub fn refreshes(&self, index: &str) -> u64 {
        self.indices.read().get(index).map_or(0, |state| state.refreshes)
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new(1)
    }
}

#[async_trait]
impl BulkWriter for MemoryIndex {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse, BackendError> {
        let start = Instant::now();
        let mut indices = self.indices.write();
        let mut items = Vec::with_capacity(request.ops.len());
        for op in &request.ops {
            let state = indices
                .entry(op.index.clone())
                .or_insert_with(|| IndexState::new(self.default_partitions));
            items.push(state.apply(op));
        }
        if request.options.refresh == RefreshPolicy::Immediate {
            let mut touched: Vec<&str> = request.ops.iter().map(|op| op.index.as_str()).collect();
            touched.sort_unstable();
            touched.dedup();
            for index in touched {
                if let Some(state) = indices.get_mut(index) {
                    state.refreshes += 1;
                }
            }
        }
        drop(indices);

        let response = BulkResponse::new(items, start.elapsed());
        log::trace!(
            "applied {} ops in {:?}, failures: {}",
            response.items.len(),
            response.took,
            response.has_failures()
        );
        Ok(response)
    }
}

impl Topology for MemoryIndex {
    fn num_partitions(&self, index: &str) -> Result<u32, TopologyError> {
        Ok(self
            .indices
            .read()
            .get(index)
            .map_or(self.default_partitions, |state| state.partitions.len() as u32))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::WriteOptions;
    use crate::version::VersionRequest;
    use serde_json::json;

    fn body(value: serde_json::Value) -> Source {
        value.as_object().cloned().unwrap()
    }

    async fn write(index: &MemoryIndex, ops: Vec<WriteOp>) -> BulkResponse {
        index
            .bulk(BulkRequest {
                ops,
                options: WriteOptions::default(),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn forced_versions_reject_older_writes() {
        let index = MemoryIndex::new(2);
        let newer = WriteOp::index("idx", Track::Data, "1-1", body(json!({"v": "new"})))
            .with_version(VersionRequest::Forced(20));
        let older = WriteOp::index("idx", Track::Data, "1-1", body(json!({"v": "old"})))
            .with_version(VersionRequest::Forced(10));

        let response = write(&index, vec![newer.clone(), older, newer]).await;
        assert_eq!(response.items[0].outcome, Ok(WriteResult::Created));
        assert_eq!(response.items[0].version, Some(20));
        let failure = response.items[1].failure().unwrap();
        assert!(failure.is_version_conflict());
        assert_eq!(failure.status, http::StatusCode::CONFLICT);
        // Equal versions are rejected as well.
        assert!(response.items[2].is_failed());

        let doc = index.get("idx", Track::Data, "1-1").unwrap();
        assert_eq!(doc.version, 20);
        assert_eq!(doc.source["v"], json!("new"));
    }

    #[tokio::test]
    async fn tombstones_keep_their_version() {
        let index = MemoryIndex::new(1);
        write(
            &index,
            vec![WriteOp::index("idx", Track::Data, "1-1", Source::new()).with_version(VersionRequest::Forced(5))],
        )
        .await;
        let response = write(&index, vec![WriteOp::delete("idx", Track::Data, "1-1")]).await;
        assert_eq!(response.items[0].outcome, Ok(WriteResult::Deleted));
        assert_eq!(response.items[0].version, Some(6));
        assert_eq!(index.get("idx", Track::Data, "1-1"), None);

        let replay = WriteOp::index("idx", Track::Data, "1-1", Source::new()).with_version(VersionRequest::Forced(5));
        assert!(write(&index, vec![replay]).await.has_failures());
    }

    #[tokio::test]
    async fn deleting_a_missing_document_is_not_a_failure() {
        let index = MemoryIndex::new(1);
        let response = write(&index, vec![WriteOp::delete("idx", Track::Xmax, "9-9")]).await;
        assert!(!response.has_failures());
        assert_eq!(response.items[0].outcome, Ok(WriteResult::NotFound));
    }

    #[tokio::test]
    async fn create_conflicts_with_a_live_document() {
        let index = MemoryIndex::new(1);
        let create = WriteOp::create("idx", Track::Data, "1-1", Source::new());
        let response = write(&index, vec![create.clone(), create]).await;
        assert_eq!(response.items[0].outcome, Ok(WriteResult::Created));
        assert!(response.items[1].failure().unwrap().is_version_conflict());
    }

    #[tokio::test]
    async fn routing_selects_the_partition() {
        let index = MemoryIndex::new(4);
        let keys = index.routing_table("idx").unwrap();
        let ops = keys
            .iter()
            .map(|routing| WriteOp::index("idx", Track::Aborted, "42", Source::new()).with_routing(routing.clone()))
            .collect();
        assert!(!write(&index, ops).await.has_failures());
        assert_eq!(index.partitions_holding("idx", Track::Aborted, "42"), vec![0, 1, 2, 3]);
        assert_eq!(index.count("idx", Track::Aborted), 4);
        assert_eq!(index.count("idx", Track::Data), 0);
    }

    #[tokio::test]
    async fn explicit_partition_counts_win() {
        let index = MemoryIndex::new(4);
        index.create_index("small", 2);
        assert_eq!(index.num_partitions("small"), Ok(2));
        assert_eq!(index.num_partitions("other"), Ok(4));
    }
}
