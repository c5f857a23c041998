use axum::{
    extract::State,
    http::{header, HeaderMap, StatusCode},
    Json,
};
use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, error, warn};
use url::Url;

use crate::event::{PageviewEvent, ReferrerIdentifier};
use crate::eventstore::EventStore;
use crate::sourceregistry::SourceRegistry;
use crate::uaparser::UserAgentClassifier;

/// Page the pageview was captured on, set by the tracker script
pub const PAGE_URL_HEADER: &str = "x-prisme-referrer";
/// `document.referrer` of the tracked page
pub const DOCUMENT_REFERRER_HEADER: &str = "x-prisme-document-referrer";

pub struct AppState {
    pub event_store: Arc<dyn EventStore>,
    pub source_registry: Arc<dyn SourceRegistry>,
    pub ua_classifier: Arc<dyn UserAgentClassifier>,
}

#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

type ApiError = (StatusCode, Json<ErrorResponse>);

fn api_error(status: StatusCode, error: impl Into<String>) -> ApiError {
    (
        status,
        Json(ErrorResponse {
            error: error.into(),
        }),
    )
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// Ingest a single pageview
pub async fn post_pageview(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
) -> Result<StatusCode, ApiError> {
    let raw_url = header_str(&headers, PAGE_URL_HEADER)
        .or_else(|| header_str(&headers, header::REFERER.as_str()))
        .filter(|raw| !raw.is_empty())
        .ok_or_else(|| api_error(StatusCode::BAD_REQUEST, "missing page URL"))?;

    let page_url = Url::parse(raw_url).map_err(|e| {
        warn!(url = raw_url, error = %e, "Rejected pageview with invalid page URL");
        api_error(StatusCode::BAD_REQUEST, format!("invalid page URL: {}", e))
    })?;

    let document_referrer =
        ReferrerIdentifier::parse(header_str(&headers, DOCUMENT_REFERRER_HEADER).unwrap_or(""))
            .map_err(|e| {
                warn!(error = %e, "Rejected pageview with invalid document referrer");
                api_error(
                    StatusCode::BAD_REQUEST,
                    format!("invalid document referrer: {}", e),
                )
            })?;

    let user_agent = header_str(&headers, header::USER_AGENT.as_str()).unwrap_or("");
    let client = state.ua_classifier.parse_user_agent(user_agent);

    let event = PageviewEvent::new(&page_url, client).map_err(|e| {
        warn!(url = %page_url, error = %e, "Rejected pageview with invalid domain");
        api_error(StatusCode::BAD_REQUEST, e.to_string())
    })?;

    match state
        .source_registry
        .is_source_registered(event.domain())
        .await
    {
        Ok(true) => {}
        Ok(false) => {
            warn!(domain = %event.domain(), "Rejected pageview from unregistered source");
            return Err(api_error(
                StatusCode::BAD_REQUEST,
                format!("source {} is not registered", event.domain()),
            ));
        }
        Err(e) => {
            error!(domain = %event.domain(), error = %e, "Source registry lookup failed");
            return Err(api_error(
                StatusCode::INTERNAL_SERVER_ERROR,
                "failed to check source registration",
            ));
        }
    }

    debug!(
        domain = %event.domain(),
        path = event.path(),
        referrer = %document_referrer,
        "Pageview accepted"
    );

    state.event_store.store_pageview(event).await.map_err(|e| {
        error!(error = %e, "Failed to enqueue pageview");
        api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
    })?;

    Ok(StatusCode::OK)
}

/// Health check endpoint
pub async fn health_check() -> StatusCode {
    StatusCode::OK
}
