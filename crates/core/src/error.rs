use thiserror::Error;
use trackwrite_primitives::RowLocationParseError;

/// Error returned when decoding a tuple marker.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TupleDecodeError {
    #[error("tuple marker ends inside field `{field}`")]
    Truncated { field: &'static str },
    #[error("tuple marker field `{field}` overflows its width")]
    Overflow { field: &'static str },
    #[error("tuple marker has {0} trailing bytes")]
    TrailingBytes(usize),
    #[error("tuple marker is not valid base64")]
    Base64(#[from] base64::DecodeError),
}

/// Error translating an inbound batch into track writes.
///
/// Any of these aborts the translation of the whole batch: nothing is written.
#[derive(Debug, Error)]
pub enum TranslateError {
    #[error("operation {position} has no document id")]
    MissingId { position: usize },
    #[error("document `{id}` is missing required field `{field}`")]
    MissingField { id: String, field: &'static str },
    #[error("document `{id}` has an invalid value for `{field}`: {value}")]
    InvalidField {
        id: String,
        field: &'static str,
        value: serde_json::Value,
    },
    #[error("document `{id}` supersedes an invalid row location: {source}")]
    InvalidRowLocation {
        id: String,
        #[source]
        source: RowLocationParseError,
    },
    #[error("operation {position} ({found}) does not belong in a batch of {expected}s")]
    MixedBatch {
        position: usize,
        expected: &'static str,
        found: &'static str,
    },
    #[error(transparent)]
    Topology(#[from] TopologyError),
}

/// Error looking up the partitions of an index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TopologyError {
    #[error("index `{0}` does not exist")]
    NoSuchIndex(String),
    #[error("index `{0}` has no partitions")]
    NoPartitions(String),
}

/// The backend could not process a bulk request at all.
///
/// This is distinct from individual operations failing, which is reported
/// per item in a [`crate::BulkResponse`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),
    #[error("backend rejected the request: {0}")]
    Rejected(String),
}
