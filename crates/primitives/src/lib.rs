mod ids;
mod location;
mod track;

pub use ids::{CommandId, TxId};
pub use location::{RowLocation, RowLocationParseError};
pub use track::{OpKind, Track};

/// Value of `_zdb_seq` sent by the row store while it builds an index from
/// scratch, as opposed to mirroring a live statement.
pub const INDEX_BUILD_SEQUENCE: i64 = -1;
