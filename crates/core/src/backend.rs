//! The batch write primitive of the document index.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use http::StatusCode;
use trackwrite_primitives::{OpKind, Track};

use crate::error::BackendError;
use crate::version::{VersionConflict, VersionRequest};

/// The JSON body of an indexed document.
pub type Source = serde_json::Map<String, serde_json::Value>;

/// Phases time out after this long unless the caller asks otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(60);

/// A single write against one track of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct WriteOp {
    pub kind: OpKind,
    pub index: String,
    pub track: Track,
    pub id: String,
    /// Routing key selecting the partition. Defaults to the id.
    pub routing: Option<String>,
    pub version: VersionRequest,
    /// The document body. `None` for deletes.
    pub source: Option<Source>,
}

impl WriteOp {
    pub fn index(index: impl Into<String>, track: Track, id: impl Into<String>, source: Source) -> Self {
        Self::new(OpKind::Index, index, track, id, Some(source))
    }

    pub fn create(index: impl Into<String>, track: Track, id: impl Into<String>, source: Source) -> Self {
        Self::new(OpKind::Create, index, track, id, Some(source))
    }

    pub fn delete(index: impl Into<String>, track: Track, id: impl Into<String>) -> Self {
        Self::new(OpKind::Delete, index, track, id, None)
    }

    fn new(kind: OpKind, index: impl Into<String>, track: Track, id: impl Into<String>, source: Option<Source>) -> Self {
        Self {
            kind,
            index: index.into(),
            track,
            id: id.into(),
            routing: None,
            version: VersionRequest::Internal,
            source,
        }
    }

    pub fn with_routing(mut self, routing: impl Into<String>) -> Self {
        self.routing = Some(routing.into());
        self
    }

    pub fn with_version(mut self, version: VersionRequest) -> Self {
        self.version = version;
        self
    }

    /// The key the backend routes this write by.
    pub fn effective_routing(&self) -> &str {
        self.routing.as_deref().unwrap_or(&self.id)
    }
}

/// Whether written documents become visible to searches before the request
/// returns.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum RefreshPolicy {
    #[default]
    None,
    Immediate,
}

impl From<bool> for RefreshPolicy {
    fn from(refresh: bool) -> Self {
        if refresh {
            Self::Immediate
        } else {
            Self::None
        }
    }
}

/// Per-request settings, applied to every phase of a bulk write.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct WriteOptions {
    pub refresh: RefreshPolicy,
    pub timeout: Duration,
}

impl Default for WriteOptions {
    fn default() -> Self {
        Self {
            refresh: RefreshPolicy::None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// One atomic batch of writes submitted to the backend.
#[derive(Debug, Clone)]
pub struct BulkRequest {
    pub ops: Vec<WriteOp>,
    pub options: WriteOptions,
}

/// What a successful write did.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum WriteResult {
    Created,
    Updated,
    Deleted,
    NotFound,
}

/// Classes of per-operation failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FailureKind {
    /// The stored document is at least as new as the write, or a create
    /// found an existing document.
    VersionConflict,
    Timeout,
    Unavailable,
    Other,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Failure {
    pub status: StatusCode,
    pub kind: FailureKind,
    pub message: String,
}

impl Failure {
    pub fn new(status: StatusCode, kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            status,
            kind,
            message: message.into(),
        }
    }

    pub fn version_conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, FailureKind::VersionConflict, message)
    }

    pub fn timeout(timeout: Duration) -> Self {
        Self::new(
            StatusCode::GATEWAY_TIMEOUT,
            FailureKind::Timeout,
            format!("bulk request timed out after {timeout:?}"),
        )
    }

    pub fn is_version_conflict(&self) -> bool {
        self.kind == FailureKind::VersionConflict
    }
}

impl From<&VersionConflict> for Failure {
    fn from(conflict: &VersionConflict) -> Self {
        Self::version_conflict(conflict.to_string())
    }
}

impl From<&BackendError> for Failure {
    fn from(err: &BackendError) -> Self {
        match err {
            BackendError::Unavailable(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE, FailureKind::Unavailable, err.to_string())
            }
            BackendError::Rejected(_) => Self::new(StatusCode::BAD_REQUEST, FailureKind::Other, err.to_string()),
        }
    }
}

/// The outcome of one [`WriteOp`].
#[derive(Debug, Clone, PartialEq)]
pub struct BulkItem {
    pub kind: OpKind,
    pub index: String,
    pub track: Track,
    pub id: String,
    /// The version the document has after the write.
    pub version: Option<u64>,
    pub outcome: Result<WriteResult, Failure>,
}

impl BulkItem {
    pub fn succeeded(op: &WriteOp, version: u64, result: WriteResult) -> Self {
        Self::for_op(op, Some(version), Ok(result))
    }

    pub fn failed(op: &WriteOp, failure: Failure) -> Self {
        Self::for_op(op, None, Err(failure))
    }

    fn for_op(op: &WriteOp, version: Option<u64>, outcome: Result<WriteResult, Failure>) -> Self {
        Self {
            kind: op.kind,
            index: op.index.clone(),
            track: op.track,
            id: op.id.clone(),
            version,
            outcome,
        }
    }

    pub fn failure(&self) -> Option<&Failure> {
        self.outcome.as_ref().err()
    }

    pub fn is_failed(&self) -> bool {
        self.outcome.is_err()
    }
}

/// The per-operation outcomes of one [`BulkRequest`], in request order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BulkResponse {
    pub items: Vec<BulkItem>,
    pub took: Duration,
}

impl BulkResponse {
    pub fn new(items: Vec<BulkItem>, took: Duration) -> Self {
        Self { items, took }
    }

    /// A response for every op in `ops` failing the same way.
    pub fn all_failed(ops: &[WriteOp], failure: Failure, took: Duration) -> Self {
        let items = ops.iter().map(|op| BulkItem::failed(op, failure.clone())).collect();
        Self { items, took }
    }

    pub fn has_failures(&self) -> bool {
        self.items.iter().any(BulkItem::is_failed)
    }
}

/// A document index accepting atomic batches of writes.
///
/// Implementations must honor [`VersionRequest::Forced`]: a forced write is
/// applied iff no version, or an older one, is stored for the same id.
#[async_trait]
pub trait BulkWriter: Send + Sync {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse, BackendError>;
}

#[async_trait]
impl<T: BulkWriter + ?Sized> BulkWriter for Arc<T> {
    async fn bulk(&self, request: BulkRequest) -> Result<BulkResponse, BackendError> {
        (**self).bulk(request).await
    }
}
