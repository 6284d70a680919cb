//! Mirroring of transactional row writes into a document index.
//!
//! A bulk write from the row store is translated into writes against three
//! tracks of an index (data, xmax and aborted), which are then issued in an
//! order that keeps every data document's visibility markers ahead of it.

pub mod backend;
pub mod classify;
pub mod coordinator;
pub mod error;
pub mod memory;
pub mod sequencer;
pub mod topology;
pub mod translate;
pub mod tuple;
pub mod version;

#[cfg(any(test, feature = "test"))]
pub mod testing;

pub use backend::{
    BulkItem, BulkRequest, BulkResponse, BulkWriter, Failure, FailureKind, RefreshPolicy, Source, WriteOp,
    WriteOptions, WriteResult, DEFAULT_TIMEOUT,
};
pub use classify::{BulkReport, ReportItem};
pub use coordinator::{BulkWrite, WriteCoordinator};
pub use memory::MemoryIndex;
pub use sequencer::{Phase, PhaseSequencer, SequenceOutcome};
pub use topology::{StaticTopology, Topology};
pub use translate::{BatchKind, TranslatedBatch, Translator, TxMeta};
pub use version::VersionRequest;

pub use trackwrite_primitives::{CommandId, OpKind, RowLocation, Track, TxId};
