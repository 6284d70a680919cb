use http::header::{ACCEPT, CONTENT_TYPE};
use tower_http::cors::{Any, CorsLayer};

use trackwrite_client_api::routes::{bulk, health};
use trackwrite_client_api::NodeDelegate;

#[allow(clippy::let_and_return)]
pub fn router<S>() -> axum::Router<S>
where
    S: NodeDelegate + Clone + 'static,
{
    let router = axum::Router::new()
        .nest("/health", health::router())
        .merge(bulk::router());

    let cors = CorsLayer::new()
        .allow_headers([CONTENT_TYPE, ACCEPT])
        .allow_methods(Any)
        .allow_origin(Any);

    router.layer(cors)
}
