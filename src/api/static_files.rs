use axum::{
    body::Body,
    extract::Path,
    http::{header, StatusCode},
    response::{IntoResponse, Response},
};
use mime_guess::from_path;
use rust_embed::RustEmbed;

#[derive(RustEmbed)]
#[folder = "tracker"]
pub struct TrackerAssets;

/// Name the tracker is served under besides its own file name
const TRACKER_ALIAS: &str = "p.js";
const TRACKER_FILE: &str = "prisme.js";

/// Serve the embedded tracker script
pub async fn serve_static(Path(file): Path<String>) -> Response {
    let file = if file == TRACKER_ALIAS {
        TRACKER_FILE
    } else {
        file.as_str()
    };

    match TrackerAssets::get(file) {
        Some(content) => {
            let mime = from_path(file).first_or_octet_stream();
            (
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, mime.to_string()),
                    (header::CACHE_CONTROL, "public, max-age=3600".to_string()),
                ],
                Body::from(content.data),
            )
                .into_response()
        }
        None => (StatusCode::NOT_FOUND, "404 Not Found").into_response(),
    }
}
