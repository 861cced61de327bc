//! `/link/{link}`: tags of a link.

use std::collections::BTreeSet;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::{Json, Router};

use super::body::{names, TagsBody};
use crate::error::ApiResult;
use crate::main_lib::AppState;

async fn list_tags(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
) -> ApiResult<Json<BTreeSet<String>>> {
    Ok(Json(state.tag_index.list_tags(&link_id).await?))
}

async fn add_tags(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let tags = names::<TagsBody>(&body)?;
    state.tag_index.add_tags(&link_id, &tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn replace_tags(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let tags = names::<TagsBody>(&body)?;
    state.tag_index.replace_tags(&link_id, &tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

async fn remove_tags(
    State(state): State<Arc<AppState>>,
    Path(link_id): Path<String>,
    body: Bytes,
) -> ApiResult<StatusCode> {
    let tags = names::<TagsBody>(&body)?;
    state.tag_index.remove_tags(&link_id, &tags).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route(
        "/link/{link}",
        get(list_tags)
            .post(add_tags)
            .put(replace_tags)
            .delete(remove_tags),
    )
}
