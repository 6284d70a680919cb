//! Translation of an inbound batch into writes against the three tracks.

use serde_json::{json, Value};
use trackwrite_primitives::{CommandId, OpKind, RowLocation, Track, TxId, INDEX_BUILD_SEQUENCE};

use crate::backend::{Source, WriteOp};
use crate::error::TranslateError;
use crate::topology::Topology;
use crate::tuple::{encode_tuple, TupleMarker};
use crate::version::VersionRequest;

/// Transaction that created the row version.
pub const XMIN_FIELD: &str = "_xmin";
/// Command within [`XMIN_FIELD`] that created the row version.
pub const CMIN_FIELD: &str = "_cmin";
/// Row location of the version an update supersedes.
pub const PREV_LOCATION_FIELD: &str = "_prev_ctid";
/// Statement-local sequence number; negative during an index build.
pub const SEQUENCE_FIELD: &str = "_zdb_seq";

pub const XMAX_FIELD: &str = "_xmax";
pub const CMAX_FIELD: &str = "_cmax";
pub const REPLACEMENT_FIELD: &str = "_replacement_ctid";
pub const ENCODED_TUPLE_FIELD: &str = "_zdb_encoded_tuple";
pub const REASON_FIELD: &str = "_zdb_reason";
pub const ABORTED_XID_FIELD: &str = "_zdb_xid";

/// Reason recorded on xmax documents written for an update.
pub const UPDATE_REASON: &str = "U";

/// The transaction metadata carried by every inserted row version.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TxMeta {
    pub xmin: TxId,
    pub cmin: CommandId,
    /// The id and location of the superseded version, for updates.
    pub prev: Option<(String, RowLocation)>,
    pub sequence: i64,
}

impl TxMeta {
    /// Extract the metadata of the document `id` from its body.
    pub fn from_source(id: &str, source: &Source) -> Result<Self, TranslateError> {
        let field = |name: &'static str| {
            source.get(name).ok_or_else(|| TranslateError::MissingField {
                id: id.to_owned(),
                field: name,
            })
        };
        let invalid = |name: &'static str, value: &Value| TranslateError::InvalidField {
            id: id.to_owned(),
            field: name,
            value: value.clone(),
        };

        let xmin = field(XMIN_FIELD)?;
        let xmin = xmin.as_u64().ok_or_else(|| invalid(XMIN_FIELD, xmin))?;

        let cmin = field(CMIN_FIELD)?;
        let cmin = cmin
            .as_u64()
            .and_then(|v| u32::try_from(v).ok())
            .ok_or_else(|| invalid(CMIN_FIELD, cmin))?;

        let sequence = field(SEQUENCE_FIELD)?;
        let sequence = sequence.as_i64().ok_or_else(|| invalid(SEQUENCE_FIELD, sequence))?;

        let prev = match source.get(PREV_LOCATION_FIELD) {
            None | Some(Value::Null) => None,
            Some(Value::String(prev)) => {
                let location = prev.parse::<RowLocation>().map_err(|source| TranslateError::InvalidRowLocation {
                    id: id.to_owned(),
                    source,
                })?;
                Some((prev.clone(), location))
            }
            Some(other) => return Err(invalid(PREV_LOCATION_FIELD, other)),
        };

        Ok(Self {
            xmin: TxId(xmin),
            cmin: CommandId(cmin),
            prev,
            sequence,
        })
    }

    /// Whether the row store is building the index rather than mirroring a
    /// live statement. Nobody can read a half-built index concurrently.
    pub fn is_index_build(&self) -> bool {
        self.sequence <= INDEX_BUILD_SEQUENCE
    }
}

/// Whether a batch inserts or deletes documents.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BatchKind {
    Insert,
    Delete,
}

/// The writes derived from one inbound batch, per track.
#[derive(Debug, Clone, PartialEq)]
pub struct TranslatedBatch {
    pub kind: BatchKind,
    /// The inbound operations, with routing and versions assigned.
    pub data: Vec<WriteOp>,
    pub xmax: Vec<WriteOp>,
    pub aborted: Vec<WriteOp>,
}

impl TranslatedBatch {
    pub fn is_empty(&self) -> bool {
        self.data.is_empty() && self.xmax.is_empty() && self.aborted.is_empty()
    }
}

/// Translates the batches of one index.
pub struct Translator<'a> {
    index: &'a str,
    topology: &'a dyn Topology,
}

impl<'a> Translator<'a> {
    pub fn new(index: &'a str, topology: &'a dyn Topology) -> Self {
        Self { index, topology }
    }

    /// Translate `ops`, the `request_no`-th request of a statement.
    ///
    /// The batch is a delete batch iff its first operation is a delete, and
    /// must not mix inserts with deletes. An empty batch translates to nothing.
    pub fn translate(&self, ops: Vec<WriteOp>, request_no: i64) -> Result<TranslatedBatch, TranslateError> {
        let kind = match ops.first() {
            Some(op) if op.kind.is_delete() => BatchKind::Delete,
            _ => BatchKind::Insert,
        };
        let mut batch = TranslatedBatch {
            kind,
            data: Vec::with_capacity(ops.len()),
            xmax: Vec::new(),
            aborted: Vec::new(),
        };

        for (position, op) in ops.into_iter().enumerate() {
            if op.id.is_empty() {
                return Err(TranslateError::MissingId { position });
            }
            let op = match (kind, op.kind) {
                (BatchKind::Delete, OpKind::Delete) => self.translate_delete(op, &mut batch),
                (BatchKind::Insert, OpKind::Index | OpKind::Create) => {
                    self.translate_insert(position, request_no, op, &mut batch)?
                }
                (BatchKind::Delete, found) => {
                    return Err(TranslateError::MixedBatch {
                        position,
                        expected: "delete",
                        found: found.as_str(),
                    })
                }
                (BatchKind::Insert, found) => {
                    return Err(TranslateError::MixedBatch {
                        position,
                        expected: "insert",
                        found: found.as_str(),
                    })
                }
            };
            batch.data.push(op);
        }

        log::debug!(
            "translated {:?} batch for `{}`: {} data, {} xmax, {} aborted",
            batch.kind,
            self.index,
            batch.data.len(),
            batch.xmax.len(),
            batch.aborted.len(),
        );
        Ok(batch)
    }

    fn translate_delete(&self, mut op: WriteOp, batch: &mut TranslatedBatch) -> WriteOp {
        batch
            .xmax
            .push(WriteOp::delete(self.index, Track::Xmax, op.id.clone()).with_routing(op.id.clone()));
        // Data and xmax documents of a row version must share a partition.
        op.routing = Some(op.id.clone());
        op
    }

    fn translate_insert(
        &self,
        position: usize,
        request_no: i64,
        mut op: WriteOp,
        batch: &mut TranslatedBatch,
    ) -> Result<WriteOp, TranslateError> {
        let meta = match &op.source {
            Some(source) => TxMeta::from_source(&op.id, source)?,
            None => TxMeta::from_source(&op.id, &Source::new())?,
        };
        let version = VersionRequest::for_transaction(meta.xmin);

        if let Some((prev_id, prev)) = &meta.prev {
            let marker = encode_tuple(meta.xmin, meta.cmin, *prev);
            batch.xmax.push(
                WriteOp::index(self.index, Track::Xmax, prev_id.clone(), xmax_source(&meta, &op.id, &marker))
                    .with_routing(prev_id.clone())
                    .with_version(version),
            );
        }

        if !meta.is_index_build() {
            // Clear a marker an aborted transaction may have left for this id.
            batch
                .xmax
                .push(WriteOp::delete(self.index, Track::Xmax, op.id.clone()).with_routing(op.id.clone()));

            if request_no == 0 && position == 0 {
                for routing in self.topology.routing_table(self.index)? {
                    batch.aborted.push(
                        WriteOp::index(self.index, Track::Aborted, meta.xmin.to_string(), aborted_source(meta.xmin))
                            .with_routing(routing),
                    );
                }
            }
        }

        op.kind = OpKind::Index;
        op.version = version;
        op.routing = Some(op.id.clone());
        Ok(op)
    }
}

fn xmax_source(meta: &TxMeta, replacement: &str, marker: &TupleMarker) -> Source {
    let mut source = Source::new();
    source.insert(XMAX_FIELD.into(), json!(meta.xmin.get()));
    source.insert(CMAX_FIELD.into(), json!(meta.cmin.get()));
    source.insert(REPLACEMENT_FIELD.into(), json!(replacement));
    source.insert(ENCODED_TUPLE_FIELD.into(), json!(marker.to_base64()));
    source.insert(REASON_FIELD.into(), json!(UPDATE_REASON));
    source
}

fn aborted_source(xid: TxId) -> Source {
    let mut source = Source::new();
    source.insert(ABORTED_XID_FIELD.into(), json!(xid.get()));
    source
}
