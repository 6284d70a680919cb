//! Turning phase outcomes into the report returned to the row store.

use http::StatusCode;
use serde::ser::SerializeMap as _;
use serde::{Serialize, Serializer};
use trackwrite_primitives::{OpKind, Track};

use crate::backend::{BulkItem, WriteResult};
use crate::sequencer::SequenceOutcome;

/// Whether `item` is a failure that is expected under concurrency.
///
/// Concurrent writers may race to delete the same xmax marker. The loser sees
/// a version conflict, which is harmless.
pub fn is_suppressed(item: &BulkItem) -> bool {
    item.failure().is_some_and(|failure| failure.is_version_conflict())
        && item.track == Track::Xmax
        && item.kind == OpKind::Delete
}

/// The body of one entry of [`BulkReport::items`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemReport {
    #[serde(rename = "_index")]
    pub index: String,
    #[serde(rename = "_type")]
    pub track: Track,
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(rename = "_version", skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    pub status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub found: Option<bool>,
}

/// One entry of [`BulkReport::items`], serialized as `{ "<kind>": { .. } }`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReportItem {
    pub kind: OpKind,
    pub report: ItemReport,
}

impl From<&BulkItem> for ReportItem {
    fn from(item: &BulkItem) -> Self {
        let (status, error, found) = match &item.outcome {
            Err(failure) => (failure.status, Some(failure.message.clone()), None),
            Ok(WriteResult::Created) => (StatusCode::CREATED, None, None),
            Ok(WriteResult::Updated) => (StatusCode::OK, None, None),
            Ok(WriteResult::Deleted) => (StatusCode::OK, None, Some(true)),
            Ok(WriteResult::NotFound) => (StatusCode::NOT_FOUND, None, Some(false)),
        };
        Self {
            kind: item.kind,
            report: ItemReport {
                index: item.index.clone(),
                track: item.track,
                id: item.id.clone(),
                version: item.version,
                status: status.as_u16(),
                error,
                found,
            },
        }
    }
}

impl Serialize for ReportItem {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(1))?;
        map.serialize_entry(self.kind.as_str(), &self.report)?;
        map.end()
    }
}

/// The outcome of a bulk write as reported to the caller.
///
/// `errors` is the only authoritative success signal. `items` lists every
/// failed operation, including the suppressed ones, and is absent if nothing
/// failed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkReport {
    /// Backend time in milliseconds.
    pub took: u64,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub errors: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<ReportItem>>,
    #[serde(skip)]
    pub error_count: usize,
}

impl BulkReport {
    /// The report for a request without operations.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn classify(outcome: &SequenceOutcome) -> Self {
        let mut error_count = 0;
        let mut suppressed = 0;
        let mut items = Vec::new();
        for item in outcome.items().filter(|item| item.is_failed()) {
            if is_suppressed(item) {
                suppressed += 1;
            } else {
                error_count += 1;
            }
            items.push(ReportItem::from(item));
        }
        if suppressed > 0 {
            log::debug!("ignored {suppressed} lost races deleting xmax markers");
        }

        Self {
            took: u64::try_from(outcome.took().as_millis()).unwrap_or(u64::MAX),
            errors: error_count > 0,
            items: (!items.is_empty()).then_some(items),
            error_count,
        }
    }
}
