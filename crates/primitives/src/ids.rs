//! Provides row store identifiers such as `TxId`.
use core::fmt;

/// A transaction id of the row store.
///
/// Transaction ids increase monotonically, which is what makes them usable as
/// the version of every document a transaction writes.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct TxId(pub u64);

/// A command id, disambiguating writes made by the same transaction.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[repr(transparent)]
pub struct CommandId(pub u32);

macro_rules! row_store_id {
    ($name:ident, $int:ty) => {
        impl $name {
            pub const fn get(self) -> $int {
                self.0
            }
        }

        impl From<$int> for $name {
            fn from(value: $int) -> Self {
                Self(value)
            }
        }
        impl From<$name> for $int {
            fn from(value: $name) -> Self {
                value.0
            }
        }
        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}
row_store_id!(TxId, u64);
row_store_id!(CommandId, u32);
