use core::fmt;
use core::num::ParseIntError;
use core::str::FromStr;

use thiserror::Error;

/// The physical location of a row version: a block number and the offset of
/// the tuple within that block.
///
/// Rendered as `"<block>-<offset>"`, which is also the document id the row
/// version has in the index.
#[derive(Debug, Copy, Clone, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub struct RowLocation {
    pub block: u32,
    pub offset: u32,
}

impl RowLocation {
    pub const fn new(block: u32, offset: u32) -> Self {
        Self { block, offset }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RowLocationParseError {
    #[error("row location `{0}` is not of the form `<block>-<offset>`")]
    Malformed(String),
    #[error("row location `{input}` has an invalid number")]
    Number {
        input: String,
        #[source]
        source: ParseIntError,
    },
}

impl FromStr for RowLocation {
    type Err = RowLocationParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (block, offset) = s
            .split_once('-')
            .ok_or_else(|| RowLocationParseError::Malformed(s.to_owned()))?;
        let number = |part: &str| {
            part.parse::<u32>().map_err(|source| RowLocationParseError::Number {
                input: s.to_owned(),
                source,
            })
        };
        Ok(Self {
            block: number(block)?,
            offset: number(offset)?,
        })
    }
}

impl fmt::Display for RowLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.block, self.offset)
    }
}
