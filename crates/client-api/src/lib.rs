use std::sync::Arc;

use axum::response::ErrorResponse;
use http::StatusCode;
use trackwrite_core::WriteCoordinator;

pub mod payload;
pub mod routes;
pub mod util;

/// Defines the state / environment of a trackwrite node from the PoV of the
/// client API.
///
/// Types returned here should be considered internal state and **never** be
/// surfaced to the API.
pub trait NodeDelegate: Send + Sync {
    /// The coordinator all bulk writes of this node go through.
    fn coordinator(&self) -> &WriteCoordinator;
}

impl<T: NodeDelegate + ?Sized> NodeDelegate for Arc<T> {
    fn coordinator(&self) -> &WriteCoordinator {
        (**self).coordinator()
    }
}

pub fn log_and_500(e: impl std::fmt::Display) -> ErrorResponse {
    log::error!("internal error: {e:#}");
    (StatusCode::INTERNAL_SERVER_ERROR, format!("{e:#}")).into()
}

/// A 400 response with body `{"error": "<e>"}`.
pub fn bad_request(e: impl std::fmt::Display) -> ErrorResponse {
    let body = serde_json::json!({ "error": e.to_string() });
    (StatusCode::BAD_REQUEST, axum::Json(body)).into()
}
