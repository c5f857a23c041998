use axum::{
    http::{header, HeaderName, Method},
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use super::handlers::{
    health_check, post_pageview, AppState, DOCUMENT_REFERRER_HEADER, PAGE_URL_HEADER,
};
use super::static_files::serve_static;

pub fn create_router(state: Arc<AppState>) -> Router {
    // The tracker runs on third party sites.
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::ACCESS_CONTROL_MAX_AGE,
            HeaderName::from_static(PAGE_URL_HEADER),
            HeaderName::from_static(DOCUMENT_REFERRER_HEADER),
        ])
        .max_age(Duration::from_secs(3600));

    let events_routes = Router::new()
        .route("/pageviews", post(post_pageview))
        .layer(cors)
        .with_state(state);

    Router::new()
        .route("/api/v1/healthcheck", get(health_check))
        .nest("/api/v1/events", events_routes)
        .route("/static/{file}", get(serve_static))
        .layer(TraceLayer::new_for_http())
}
