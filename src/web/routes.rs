use std::collections::HashSet;

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Json;
use axum::Router;
use serde::{Deserialize, Serialize};

use super::AppState;
use crate::community::{
    get_parent_posts, load_thread, rollup_threads, FeedError, ParentPostsRequest, SortOrder,
    Thread, ThreadLoadError,
};
use crate::constants::MAX_POSTS_PER_REQUEST;

/// Create the router with all routes.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tags/:tag/posts", get(api_parent_posts))
        .route("/api/tags/:tag/threads", get(api_threads))
        .route("/api/thread", get(api_thread))
        .route("/healthz", get(health))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

fn error_response(status: StatusCode, message: impl Into<String>) -> Response {
    (
        status,
        Json(ErrorBody {
            error: message.into(),
        }),
    )
        .into_response()
}

fn feed_error_response(err: &FeedError) -> Response {
    match err {
        FeedError::EmptyTag => error_response(StatusCode::BAD_REQUEST, err.to_string()),
        FeedError::Fetch(e) => {
            tracing::error!("Upstream search failed: {e}");
            error_response(StatusCode::BAD_GATEWAY, "Upstream search failed")
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ParentPostsParams {
    cursor: Option<String>,
    limit: Option<usize>,
    #[serde(default)]
    sort: SortOrder,
    /// Comma-separated author ids.
    members: Option<String>,
    scope: Option<String>,
}

async fn api_parent_posts(
    State(state): State<AppState>,
    Path(tag): Path<String>,
    Query(params): Query<ParentPostsParams>,
) -> Response {
    let max_posts = params
        .limit
        .unwrap_or(state.config.default_max_posts)
        .clamp(1, MAX_POSTS_PER_REQUEST);

    let mut request = ParentPostsRequest::new(tag)
        .cursor(params.cursor.filter(|c| !c.is_empty()))
        .max_posts(max_posts)
        .sort(params.sort)
        .page_size(state.config.search_page_size)
        .max_pages(state.config.max_search_pages);

    if let Some(members) = params.members {
        let members: HashSet<String> = members
            .split(',')
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .map(ToString::to_string)
            .collect();
        let include_all = params.scope.as_deref() == Some("all");
        request = request.members(members, include_all);
    }

    match get_parent_posts(state.source.as_ref(), &request).await {
        Ok(result) => Json(result).into_response(),
        Err(e) => feed_error_response(&e),
    }
}

#[derive(Debug, Serialize)]
struct ThreadsResponse {
    tag: String,
    /// Whether the threads come from a background poller rather than a one-off fetch.
    watched: bool,
    threads: Vec<Thread>,
}

async fn api_threads(State(state): State<AppState>, Path(tag): Path<String>) -> Response {
    if let Some(threads) = state.feeds.threads(&tag).await {
        return Json(ThreadsResponse {
            tag,
            watched: true,
            threads,
        })
        .into_response();
    }

    let clean = crate::community::tag::normalize_tag(&tag);
    if clean.is_empty() {
        return feed_error_response(&FeedError::EmptyTag);
    }

    let page = match state
        .source
        .search_posts(&format!("#{clean}"), state.config.search_page_size, None)
        .await
    {
        Ok(page) => page,
        Err(e) => return feed_error_response(&FeedError::Fetch(e)),
    };

    Json(ThreadsResponse {
        threads: rollup_threads(&page.posts, &[], clean).threads,
        tag,
        watched: false,
    })
    .into_response()
}

#[derive(Debug, Deserialize)]
pub struct ThreadParams {
    uri: Option<String>,
}

async fn api_thread(State(state): State<AppState>, Query(params): Query<ThreadParams>) -> Response {
    let Some(uri) = params.uri.filter(|u| !u.is_empty()) else {
        return error_response(StatusCode::BAD_REQUEST, "Missing required parameter: uri");
    };

    match load_thread(state.source.as_ref(), &uri, &state.presentation_options()).await {
        Ok(presentation) => Json(presentation).into_response(),
        Err(ThreadLoadError::InvalidUri(e)) => error_response(StatusCode::BAD_REQUEST, e.to_string()),
        Err(e) if e.is_not_found() => error_response(StatusCode::NOT_FOUND, "Thread not found"),
        Err(e) => {
            tracing::error!(uri = %uri, "Failed to load thread: {e}");
            error_response(StatusCode::BAD_GATEWAY, "Failed to load thread")
        }
    }
}

async fn health() -> &'static str {
    "OK"
}
