//! HTTP API over the tag index.
//!
//! Every request must declare `Content-Type: application/json`, reads included.

mod body;
mod links;
mod tags;

use std::sync::Arc;

use axum::extract::Request;
use axum::http::header::CONTENT_TYPE;
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::Router;

use crate::error::ApiError;
use crate::main_lib::AppState;

fn is_json(request: &Request) -> bool {
    request
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.split(';').next())
        .map(|mime| mime.trim().eq_ignore_ascii_case("application/json"))
        .unwrap_or(false)
}

async fn require_json(request: Request, next: Next) -> Response {
    if !is_json(&request) {
        return ApiError::UnsupportedMediaType.into_response();
    }
    next.run(request).await
}

async fn not_found() -> ApiError {
    ApiError::NotFound
}

async fn method_not_allowed() -> ApiError {
    ApiError::MethodNotAllowed
}

pub fn app_router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(tags::router())
        .merge(links::router())
        .fallback(not_found)
        .method_not_allowed_fallback(method_not_allowed)
        .layer(middleware::from_fn(require_json))
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, StatusCode};
    use http_body_util::BodyExt;
    use linktag_core::TagIndex;
    use linktag_storage_memory::MemoryStore;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    fn app_with_store(per_page: u64) -> (Router, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let state = Arc::new(AppState {
            tag_index: Arc::new(TagIndex::new(store.clone())),
            listing_per_page: per_page,
        });
        (app_router(state), store)
    }

    fn app() -> Router {
        app_with_store(10).0
    }

    async fn send_with(
        app: &Router,
        method: Method,
        uri: &str,
        content_type: Option<&str>,
        body: Option<Value>,
    ) -> (StatusCode, Value) {
        let mut request = axum::http::Request::builder().method(method).uri(uri);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        let response = app
            .clone()
            .oneshot(request.body(body).unwrap())
            .await
            .unwrap();

        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let value = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, value)
    }

    async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        send_with(app, method, uri, Some("application/json"), body).await
    }

    #[tokio::test]
    async fn link_tags_lifecycle() {
        let app = app();

        let (status, _) = send(&app, Method::POST, "/link/42", Some(json!({"tags": ["rust", "async"]}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        let (status, body) = send(&app, Method::GET, "/link/42", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(["async", "rust"]));

        let (status, _) = send(&app, Method::PUT, "/link/42", Some(json!({"tags": ["web"]}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, Method::GET, "/link/42", None).await.1, json!(["web"]));

        let (status, _) = send(&app, Method::DELETE, "/link/42", Some(json!({"tags": ["web"]}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);
        assert_eq!(send(&app, Method::GET, "/link/42", None).await.1, json!([]));
    }

    #[tokio::test]
    async fn tag_listing_is_paginated() {
        let app = app();
        let links: Vec<String> = (1..=25).map(|i| format!("link-{:02}", i)).collect();

        let (status, _) = send(&app, Method::POST, "/tag/rust", Some(json!({ "links": links }))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        let (status, body) = send(&app, Method::GET, "/tag/rust?page=2", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["links"].as_array().unwrap().len(), 10);
        assert_eq!(
            body["pagination"],
            json!({"next": 3, "previous": 1, "count": 25, "last": 3})
        );

        let (_, body) = send(&app, Method::GET, "/tag/rust?page=9", None).await;
        assert_eq!(body["links"].as_array().unwrap().len(), 5);
        assert_eq!(
            body["pagination"],
            json!({"next": null, "previous": 2, "count": 25, "last": 3})
        );

        let (_, body) = send(&app, Method::GET, "/tag/rust", None).await;
        assert_eq!(body["pagination"]["previous"], Value::Null);
        assert_eq!(body["pagination"]["next"], json!(2));
    }

    #[tokio::test]
    async fn unknown_tag_lists_nothing() {
        let (status, body) = send(&app(), Method::GET, "/tag/none", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(
            body,
            json!({
                "links": [],
                "pagination": {"next": null, "previous": null, "count": 0, "last": 0}
            })
        );
    }

    #[tokio::test]
    async fn invalid_page_is_a_bad_request() {
        let (status, body) = send(&app(), Method::GET, "/tag/rust?page=two", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Invalid page number");
    }

    #[tokio::test]
    async fn removing_links_clears_both_sides() {
        let app = app();
        send(&app, Method::POST, "/link/1", Some(json!({"tags": ["rust", "web"]}))).await;

        let (status, _) = send(&app, Method::DELETE, "/tag/rust", Some(json!({"links": ["1"]}))).await;
        assert_eq!(status, StatusCode::NO_CONTENT);

        assert_eq!(send(&app, Method::GET, "/link/1", None).await.1, json!(["web"]));
        let (_, body) = send(&app, Method::GET, "/tag/rust", None).await;
        assert_eq!(body["pagination"]["count"], json!(0));
    }

    #[tokio::test]
    async fn percent_encoded_names_are_decoded() {
        let app = app();
        send(&app, Method::POST, "/tag/rust%20lang", Some(json!({"links": ["1"]}))).await;
        assert_eq!(send(&app, Method::GET, "/link/1", None).await.1, json!(["rust lang"]));
    }

    #[tokio::test]
    async fn requests_must_declare_json() {
        let app = app();

        let (status, body) = send_with(&app, Method::GET, "/link/1", None, None).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"], "Unsupported media type");

        let (status, _) = send_with(&app, Method::GET, "/link/1", Some("text/plain"), None).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);

        let (status, _) = send_with(
            &app,
            Method::GET,
            "/link/1",
            Some("application/json; charset=utf-8"),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn invalid_bodies_are_bad_requests() {
        let app = app();

        let (status, body) = send(&app, Method::POST, "/link/1", Some(json!({"tags": []}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "'tags' must contain at least one item");

        let (status, body) = send(&app, Method::POST, "/tag/rust", Some(json!({"tags": ["1"]}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("missing field `links`"));

        let (status, body) = send(&app, Method::PUT, "/link/1", None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().starts_with("Invalid request body"));
    }

    #[tokio::test]
    async fn unknown_routes_and_methods() {
        let app = app();

        let (status, body) = send(&app, Method::GET, "/links", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"], "Not Found");

        let (status, _) = send(&app, Method::GET, "/tag/a/b", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(&app, Method::PUT, "/tag/rust", Some(json!({"links": ["1"]}))).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body, json!({"error": "Method Not Allowed"}));

        let (status, body) = send(&app, Method::PATCH, "/link/1", None).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(body["error"], "Method Not Allowed");
    }

    #[tokio::test]
    async fn store_outage_is_an_internal_error() {
        let (app, store) = app_with_store(10);
        store.set_unavailable(true);

        let (status, body) = send(&app, Method::GET, "/link/1", None).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(body["error"].as_str().unwrap().contains("Store"));
    }
}
