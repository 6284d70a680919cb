//! Optimistic concurrency for writes to the index.
//!
//! Every document a transaction writes under a row-location id is versioned by
//! the transaction id. Transaction ids increase monotonically, so the
//! last-committing transaction wins no matter in which order the writes reach
//! the backend, and a replayed older write is rejected.

use thiserror::Error;
use trackwrite_primitives::TxId;

/// The version a write asks for.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum VersionRequest {
    /// Let the backend bump its own counter.
    #[default]
    Internal,
    /// Use the given version, which must be newer than the stored one.
    Forced(u64),
}

/// A write was rejected because the stored document is at least as new.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("version conflict, current version [{current}] is higher or equal to the one provided [{provided}]")]
pub struct VersionConflict {
    pub current: u64,
    pub provided: u64,
}

impl VersionRequest {
    /// The version every write of transaction `xid` is forced to.
    pub const fn for_transaction(xid: TxId) -> Self {
        Self::Forced(xid.get())
    }

    /// Resolve the version a write ends up with, given the version `stored`
    /// for the same id (live or deleted), if any.
    pub fn resolve(self, stored: Option<u64>) -> Result<u64, VersionConflict> {
        match (self, stored) {
            (Self::Internal, stored) => Ok(stored.map_or(1, |v| v + 1)),
            (Self::Forced(provided), Some(current)) if current >= provided => {
                Err(VersionConflict { current, provided })
            }
            (Self::Forced(provided), _) => Ok(provided),
        }
    }
}
