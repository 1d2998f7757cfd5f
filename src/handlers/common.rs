use axum::{
    http::{header, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{config::AppConfig, ApiResponse};

/// 200 with the standard envelope
pub fn success_response<T: Serialize>(data: T) -> Response {
    (StatusCode::OK, Json(ApiResponse::success(data))).into_response()
}

/// 201 with the standard envelope
pub fn created_response<T: Serialize>(data: T) -> Response {
    (StatusCode::CREATED, Json(ApiResponse::success(data))).into_response()
}

/// Body of the status endpoints: `{"status": "processing"}`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StatusUpdateRequest {
    pub status: String,
}

/// Where redirects and gateway return URLs point: the caller's `Origin`
/// header, or the configured storefront when the browser sent none.
pub fn resolve_origin(headers: &HeaderMap, config: &AppConfig) -> String {
    headers
        .get(header::ORIGIN)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|origin| !origin.is_empty() && *origin != "null")
        .unwrap_or(&config.storefront_origin)
        .trim_end_matches('/')
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn config() -> AppConfig {
        AppConfig::new(
            "sqlite::memory:".into(),
            "127.0.0.1".into(),
            3000,
            "development".into(),
        )
    }

    #[test]
    fn origin_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(header::ORIGIN, HeaderValue::from_static("https://shop.test/"));
        assert_eq!(resolve_origin(&headers, &config()), "https://shop.test");
    }

    #[test]
    fn origin_falls_back_to_storefront() {
        let mut headers = HeaderMap::new();
        assert_eq!(resolve_origin(&headers, &config()), "http://localhost:5173");

        headers.insert(header::ORIGIN, HeaderValue::from_static("null"));
        assert_eq!(resolve_origin(&headers, &config()), "http://localhost:5173");
    }
}
