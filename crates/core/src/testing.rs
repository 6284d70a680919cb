//! Test doubles, available with the `test` feature.

use std::collections::HashMap;
use std::time::Instant;

use async_trait::async_trait;
use parking_lot::Mutex;
use trackwrite_primitives::Track;

use crate::backend::{BulkRequest, BulkResponse, BulkWriter, Failure};
use crate::error::BackendError;

/// A misbehavior injected into every request writing a given track.
#[derive(Debug, Clone)]
pub enum Fault {
    /// Every op of the request fails with this failure. Nothing is written.
    FailAll(Failure),
    /// The backend rejects the whole request.
    Error(BackendError),
    /// The backend never answers.
    Hang,
}

/// A [`BulkWriter`] that records every request before passing it on to
/// `inner`, and can be told to misbehave for specific tracks.
pub struct RecordingWriter<W> {
    inner: W,
    requests: Mutex<Vec<BulkRequest>>,
    faults: Mutex<HashMap<Track, Fault>>,
}

impl<W> RecordingWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            inner,
            requests: Mutex::default(),
            faults: Mutex::default(),
        }
    }

    pub fn inner(&self) -> &W {
        &self.inner
    }

    /// Inject `fault` into requests writing `track`.
    pub fn inject(&self, track: Track, fault: Fault) {
        self.faults.lock().insert(track, fault);
    }

    /// All requests received so far.
    pub fn requests(&self) -> Vec<BulkRequest> {
        self.requests.lock().clone()
    }

    /// The track written by each request, in arrival order.
    pub fn tracks(&self) -> Vec<Track> {
        self.requests
            .lock()
            .iter()
            .filter_map(|request| request.ops.first().map(|op| op.track))
            .collect()
    }

    /// Number of requests writing `track`.
    pub fn calls(&self, track: Track) -> usize {
        self.tracks().into_iter().filter(|t| *t == track).count()
    }
}

#[async_trait]
impl<W: BulkWriter> BulkWriter for RecordingWriter<W> {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse, BackendError> {
        let start = Instant::now();
        self.requests.lock().push(request.clone());
        let track = request.ops.first().map(|op| op.track);
        let fault = track.and_then(|track| self.faults.lock().get(&track).cloned());
        match fault {
            None => self.inner.bulk(request).await,
            Some(Fault::FailAll(failure)) => Ok(BulkResponse::all_failed(&request.ops, failure, start.elapsed())),
            Some(Fault::Error(err)) => Err(err),
            Some(Fault::Hang) => std::future::pending().await,
        }
    }
}
