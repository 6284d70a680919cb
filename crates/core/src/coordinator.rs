use std::sync::Arc;

use tracing::Instrument as _;

use crate::backend::{BulkWriter, WriteOp, WriteOptions};
use crate::classify::BulkReport;
use crate::error::TranslateError;
use crate::sequencer::{PhaseSequencer, SequenceOutcome};
use crate::topology::Topology;
use crate::translate::Translator;

/// One inbound bulk write request.
#[derive(Debug, Clone)]
pub struct BulkWrite {
    /// The index the auxiliary tracks are written to.
    pub index: String,
    pub ops: Vec<WriteOp>,
    pub options: WriteOptions,
    /// Position of this request among the requests of one statement, or
    /// negative if unknown.
    pub request_no: i64,
}

/// Translates, sequences and classifies bulk writes against one backend.
#[derive(Clone)]
pub struct WriteCoordinator {
    writer: Arc<dyn BulkWriter>,
    topology: Arc<dyn Topology>,
}

impl WriteCoordinator {
    pub fn new(writer: Arc<dyn BulkWriter>, topology: Arc<dyn Topology>) -> Self {
        Self { writer, topology }
    }

    pub fn writer(&self) -> &Arc<dyn BulkWriter> {
        &self.writer
    }

    pub fn topology(&self) -> &Arc<dyn Topology> {
        &self.topology
    }

    /// Execute `write` and report the outcome.
    ///
    /// Translation errors abort the request before anything is written.
    pub async fn bulk(&self, write: BulkWrite) -> Result<BulkReport, TranslateError> {
        Ok(BulkReport::classify(&self.execute(write).await?))
    }

    /// Execute `write`, returning the raw per-phase outcome.
    pub async fn execute(&self, write: BulkWrite) -> Result<SequenceOutcome, TranslateError> {
        let BulkWrite {
            index,
            ops,
            options,
            request_no,
        } = write;
        let span = tracing::info_span!("bulk", %index, ops = ops.len(), request_no);
        let batch = span.in_scope(|| Translator::new(&index, &*self.topology).translate(ops, request_no))?;
        if batch.is_empty() {
            return Ok(SequenceOutcome::default());
        }
        let outcome = PhaseSequencer::new(&*self.writer, options)
            .run(batch)
            .instrument(span)
            .await;
        Ok(outcome)
    }
}
