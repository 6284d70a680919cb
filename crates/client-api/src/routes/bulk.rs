use std::time::Duration;

use axum::extract::{Path, Query, State};
use axum::response::IntoResponse;
use serde::Deserialize;
use trackwrite_core::error::TranslateError;
use trackwrite_core::{BulkWrite, WriteOptions, DEFAULT_TIMEOUT};

use crate::payload::parse_bulk;
use crate::util::serde::humantime_duration;
use crate::util::ByteStringBody;
use crate::{bad_request, log_and_500, NodeDelegate};

#[derive(Deserialize)]
pub struct BulkParams {
    index: String,
}

#[derive(Deserialize)]
pub struct BulkQueryParams {
    #[serde(default)]
    refresh: bool,
    #[serde(with = "humantime_duration", default = "default_timeout")]
    timeout: Duration,
    /// Position of the request within its statement. Unknown by default.
    #[serde(default = "default_request_no")]
    request_no: i64,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

fn default_request_no() -> i64 {
    -1
}

pub async fn bulk<S: NodeDelegate>(
    State(ctx): State<S>,
    Path(BulkParams { index }): Path<BulkParams>,
    Query(BulkQueryParams {
        refresh,
        timeout,
        request_no,
    }): Query<BulkQueryParams>,
    ByteStringBody(body): ByteStringBody,
) -> axum::response::Result<impl IntoResponse> {
    let ops = parse_bulk(&index, &body).map_err(bad_request)?;
    let write = BulkWrite {
        index,
        ops,
        options: WriteOptions {
            refresh: refresh.into(),
            timeout,
        },
        request_no,
    };

    let report = ctx.coordinator().bulk(write).await.map_err(|e| match e {
        TranslateError::Topology(e) => log_and_500(e),
        e => bad_request(e),
    })?;
    if report.errors {
        log::warn!("bulk write finished with {} errors", report.error_count);
    }
    Ok(axum::Json(report))
}

pub fn router<S>() -> axum::Router<S>
where
    S: NodeDelegate + Clone + 'static,
{
    use axum::routing::post;
    axum::Router::new().route("/:index/_bulk", post(bulk::<S>))
}
