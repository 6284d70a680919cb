use axum::response::IntoResponse;

use crate::NodeDelegate;

static VERSION: &str = env!("CARGO_PKG_VERSION");
static PACKAGE_NAME: &str = env!("CARGO_PKG_NAME");

pub async fn health() -> impl IntoResponse {
    axum::Json(serde_json::json!({
        "package_name": PACKAGE_NAME,
        "version": VERSION,
    }))
}

pub fn router<S>() -> axum::Router<S>
where
    S: NodeDelegate + Clone + 'static,
{
    use axum::routing::get;
    axum::Router::new().route("/", get(health))
}
