//! `/tag/{tag}`: links carrying a tag.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};
use serde::Serialize;
use tracing::debug;

use super::body::{names, LinksBody};
use crate::error::{ApiError, ApiResult};
use crate::main_lib::AppState;

#[derive(Debug, Serialize)]
pub struct Pagination {
    pub next: Option<u64>,
    pub previous: Option<u64>,
    pub count: u64,
    pub last: u64,
}

#[derive(Debug, Serialize)]
pub struct LinkListing {
    pub links: Vec<String>,
    pub pagination: Pagination,
}

fn requested_page(query: &HashMap<String, String>) -> ApiResult<i64> {
    match query.get("page") {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ApiError::bad_request("Invalid page number")),
        None => Ok(1),
    }
}

async fn list_links(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    Query(query): Query<HashMap<String, String>>,
) -> ApiResult<Json<LinkListing>> {
    let page = requested_page(&query)?;
    let result = state
        .tag_index
        .list_links_page(&tag, page, state.listing_per_page)
        .await?;
    debug!(tag = %tag, page = result.window.page, count = result.count, "Listed links");

    Ok(Json(LinkListing {
        links: result.links,
        pagination: Pagination {
            next: result.window.next,
            previous: result.window.previous,
            count: result.count,
            last: result.window.last,
        },
    }))
}

async fn add_links(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let links = names::<LinksBody>(&body)?;
    state.tag_index.add_links(&tag, &links).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_links(
    State(state): State<Arc<AppState>>,
    Path(tag): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let links = names::<LinksBody>(&body)?;
    state.tag_index.remove_links(&tag, &links).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/tag/{tag}",
        get(list_links).post(add_links).delete(remove_links),
    )
}
