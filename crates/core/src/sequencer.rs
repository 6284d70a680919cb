//! Ordered execution of the track writes of one batch.
//!
//! Readers decide visibility from the xmax and aborted tracks, so those must
//! never lag behind the data track:
//!
//! - inserts write the aborted track, then xmax, then data;
//! - deletes remove data first, then the xmax markers.
//!
//! Each phase is awaited in full before the next is issued, and a phase with
//! any failed item ends the sequence, even if the failure is not counted as an
//! error in the report. Nothing already written is rolled back.

use std::time::{Duration, Instant};

use trackwrite_primitives::Track;
use tracing::Instrument as _;

use crate::backend::{BulkItem, BulkRequest, BulkResponse, BulkWriter, Failure, WriteOp, WriteOptions};
use crate::translate::{BatchKind, TranslatedBatch};

/// One physical write of a batch, named after the track it writes.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Phase {
    Aborted,
    Xmax,
    Data,
}

impl Phase {
    pub const INSERT_ORDER: [Phase; 3] = [Phase::Aborted, Phase::Xmax, Phase::Data];
    pub const DELETE_ORDER: [Phase; 2] = [Phase::Data, Phase::Xmax];

    pub const fn track(self) -> Track {
        match self {
            Phase::Aborted => Track::Aborted,
            Phase::Xmax => Track::Xmax,
            Phase::Data => Track::Data,
        }
    }

    pub const fn order(kind: BatchKind) -> &'static [Phase] {
        match kind {
            BatchKind::Insert => &Self::INSERT_ORDER,
            BatchKind::Delete => &Self::DELETE_ORDER,
        }
    }
}

/// The response of one executed phase.
#[derive(Debug, Clone, PartialEq)]
pub struct PhaseResult {
    pub phase: Phase,
    pub response: BulkResponse,
}

/// What happened to a batch: the phases that were executed, in order.
///
/// Empty phases are skipped and do not appear. Phases after
/// [`SequenceOutcome::halted_at`] were never issued.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SequenceOutcome {
    pub phases: Vec<PhaseResult>,
    pub halted_at: Option<Phase>,
}

impl SequenceOutcome {
    /// All item outcomes, in execution order.
    pub fn items(&self) -> impl Iterator<Item = &BulkItem> + '_ {
        self.phases.iter().flat_map(|p| p.response.items.iter())
    }

    /// Time spent in the backend, summed over phases.
    pub fn took(&self) -> Duration {
        self.phases.iter().map(|p| p.response.took).sum()
    }

    pub fn executed(&self, phase: Phase) -> bool {
        self.phases.iter().any(|p| p.phase == phase)
    }
}

/// Runs the phases of translated batches against a [`BulkWriter`].
pub struct PhaseSequencer<'a, W: ?Sized> {
    writer: &'a W,
    options: WriteOptions,
}

impl<'a, W: BulkWriter + ?Sized> PhaseSequencer<'a, W> {
    pub fn new(writer: &'a W, options: WriteOptions) -> Self {
        Self { writer, options }
    }

    pub async fn run(&self, batch: TranslatedBatch) -> SequenceOutcome {
        let TranslatedBatch {
            kind,
            mut data,
            mut xmax,
            mut aborted,
        } = batch;
        let mut outcome = SequenceOutcome::default();

        for &phase in Phase::order(kind) {
            let ops = std::mem::take(match phase {
                Phase::Aborted => &mut aborted,
                Phase::Xmax => &mut xmax,
                Phase::Data => &mut data,
            });
            if ops.is_empty() {
                continue;
            }

            let response = self.execute(phase, ops).await;
            let failures = response.items.iter().filter(|item| item.is_failed()).count();
            outcome.phases.push(PhaseResult { phase, response });
            if failures > 0 {
                log::warn!("{kind:?} batch halted: {failures} failures in the {phase:?} phase");
                outcome.halted_at = Some(phase);
                break;
            }
        }
        outcome
    }

    async fn execute(&self, phase: Phase, ops: Vec<WriteOp>) -> BulkResponse {
        let span = tracing::debug_span!("bulk_phase", ?phase, ops = ops.len());
        let request = BulkRequest {
            ops: ops.clone(),
            options: self.options,
        };
        let start = Instant::now();
        let timeout = self.options.timeout;

        match tokio::time::timeout(timeout, self.writer.bulk(request))
            .instrument(span)
            .await
        {
            Ok(Ok(response)) => response,
            Ok(Err(err)) => {
                log::error!("{phase:?} phase: {err}");
                BulkResponse::all_failed(&ops, Failure::from(&err), start.elapsed())
            }
            Err(_) => {
                log::error!("{phase:?} phase timed out after {timeout:?}");
                BulkResponse::all_failed(&ops, Failure::timeout(timeout), start.elapsed())
            }
        }
    }
}
