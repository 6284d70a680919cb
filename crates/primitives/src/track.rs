use core::fmt;

/// One of the three document groups a mirrored index is made of.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum Track {
    /// The row versions themselves.
    Data,
    /// Markers for row versions superseded by a later transaction.
    Xmax,
    /// Markers for transactions that are still in flight.
    Aborted,
}

impl Track {
    pub const fn as_str(self) -> &'static str {
        match self {
            Track::Data => "data",
            Track::Xmax => "xmax",
            Track::Aborted => "aborted",
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The kind of a single write in a bulk request.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "lowercase"))]
pub enum OpKind {
    /// Insert, or overwrite an existing document.
    Index,
    /// Insert only if no document with the same id exists.
    Create,
    Delete,
}

impl OpKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            OpKind::Index => "index",
            OpKind::Create => "create",
            OpKind::Delete => "delete",
        }
    }

    pub const fn is_delete(self) -> bool {
        matches!(self, OpKind::Delete)
    }
}

impl fmt::Display for OpKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
