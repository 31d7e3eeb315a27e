//! Cache lifecycle endpoints and the intercepting asset handler

use crate::state::AppState;
use axum::{
    body::Body,
    extract::State,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bookshelf_core::cache::{CacheStatus, ControlMessage};
use bookshelf_core::fetch::{AssetRequest, Destination};

/// Current lifecycle state, generation and stored generations
pub async fn cache_status(
    State(state): State<AppState>,
) -> Result<Json<CacheStatus>, (StatusCode, String)> {
    state
        .cache
        .status()
        .await
        .map(Json)
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// Control channel; accepts `skipWaiting` as plain text or a JSON string
pub async fn post_message(
    State(state): State<AppState>,
    body: String,
) -> Result<Json<CacheStatus>, (StatusCode, String)> {
    let message = ControlMessage::parse(&body).ok_or_else(|| {
        (
            StatusCode::BAD_REQUEST,
            format!("Unknown message: {}", body.trim()),
        )
    })?;

    state
        .cache
        .handle_message(message)
        .await
        .map_err(|e| (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))?;

    cache_status(State(state)).await
}

/// Destination of a browser request: `Sec-Fetch-Dest`, else `Accept` for pages
pub fn request_destination(headers: &HeaderMap) -> Destination {
    if let Some(dest) = headers
        .get("sec-fetch-dest")
        .and_then(|v| v.to_str().ok())
    {
        return Destination::from_fetch_dest(dest);
    }

    let wants_html = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|accept| accept.contains("text/html"));
    if wants_html {
        Destination::Document
    } else {
        Destination::Empty
    }
}

/// Answer any other GET from the cache, falling back to the origin
pub async fn serve_asset(
    State(state): State<AppState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    if method != Method::GET {
        return StatusCode::METHOD_NOT_ALLOWED.into_response();
    }

    let url = uri
        .path_and_query()
        .map(|pq| pq.as_str().to_string())
        .unwrap_or_else(|| uri.path().to_string());
    let request = AssetRequest::new(url, request_destination(&headers));

    match state.cache.handle_fetch(&request).await {
        Ok(asset) => {
            let status = StatusCode::from_u16(asset.status).unwrap_or(StatusCode::BAD_GATEWAY);
            let mut builder = Response::builder().status(status);
            if let Some(content_type) = &asset.content_type {
                builder = builder.header(header::CONTENT_TYPE, content_type);
            }
            builder
                .body(Body::from(asset.body))
                .unwrap_or_else(|_| StatusCode::INTERNAL_SERVER_ERROR.into_response())
        }
        Err(e) => {
            tracing::warn!(url = %request.url, "fetch failed: {}", e);
            (StatusCode::BAD_GATEWAY, format!("Upstream fetch failed: {}", e)).into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_destination_prefers_fetch_dest() {
        let mut headers = HeaderMap::new();
        headers.insert("sec-fetch-dest", HeaderValue::from_static("script"));
        headers.insert(header::ACCEPT, HeaderValue::from_static("text/html"));
        assert_eq!(request_destination(&headers), Destination::Script);
    }

    #[test]
    fn test_destination_from_accept() {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCEPT,
            HeaderValue::from_static("text/html,application/xhtml+xml"),
        );
        assert_eq!(request_destination(&headers), Destination::Document);
        assert_eq!(request_destination(&HeaderMap::new()), Destination::Empty);
    }
}
