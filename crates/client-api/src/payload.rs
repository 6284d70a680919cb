//! Parsing of newline-delimited bulk payloads.
//!
//! Each operation is an action line naming the operation, optionally followed
//! by a source line:
//!
//! ```text
//! {"index": {"_id": "0-1"}}
//! {"_xmin": 100, "_cmin": 0, "_zdb_seq": 0, "title": "hello"}
//! {"delete": {"_id": "0-2", "routing": "0-2"}}
//! ```
//!
//! `index` and `create` actions carry a source line, `delete` actions don't.
//! Blank lines are ignored.

use serde::Deserialize;
use thiserror::Error;
use trackwrite_core::{Source, Track, WriteOp};

#[derive(Debug, Error)]
pub enum PayloadError {
    #[error("line {line}: invalid action: {source}")]
    InvalidAction {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: expected a source line after the action")]
    MissingSource { line: usize },
    #[error("line {line}: invalid source: {source}")]
    InvalidSource {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Deserialize)]
struct ActionMeta {
    #[serde(rename = "_id", default)]
    id: String,
    #[serde(rename = "_index")]
    index: Option<String>,
    routing: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "lowercase")]
enum Action {
    Index(ActionMeta),
    Create(ActionMeta),
    Delete(ActionMeta),
}

/// Parse `body` into data track operations.
///
/// Actions without an `_index` target `default_index`.
pub fn parse_bulk(default_index: &str, body: &str) -> Result<Vec<WriteOp>, PayloadError> {
    let mut lines = body
        .lines()
        .enumerate()
        .map(|(n, line)| (n + 1, line.trim()))
        .filter(|(_, line)| !line.is_empty());

    let mut ops = Vec::new();
    while let Some((line, action)) = lines.next() {
        let action: Action =
            serde_json::from_str(action).map_err(|source| PayloadError::InvalidAction { line, source })?;

        let mut source = || match lines.next() {
            Some((line, source)) => {
                serde_json::from_str::<Source>(source).map_err(|source| PayloadError::InvalidSource { line, source })
            }
            None => Err(PayloadError::MissingSource { line }),
        };
        let (op, meta) = match action {
            Action::Index(meta) => (WriteOp::index(String::new(), Track::Data, String::new(), source()?), meta),
            Action::Create(meta) => (WriteOp::create(String::new(), Track::Data, String::new(), source()?), meta),
            Action::Delete(meta) => (WriteOp::delete(String::new(), Track::Data, String::new()), meta),
        };
        ops.push(WriteOp {
            index: meta.index.unwrap_or_else(|| default_index.to_owned()),
            id: meta.id,
            routing: meta.routing,
            ..op
        });
    }
    Ok(ops)
}
