use std::sync::Arc;

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;

use crate::client::ClientError;
use crate::db::{BookmarkStore, StoreError};
use crate::feed::{FeedCoordinator, FeedSnapshot, LoadOutcome};
use crate::models::{Article, Source};

pub struct AppState {
    pub feed: Arc<FeedCoordinator>,
    pub bookmarks: Arc<BookmarkStore>,
}

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/feed", get(feed))
        .route("/feed/search", post(search))
        .route("/feed/more", post(more))
        .route("/feed/refresh", post(refresh))
        .route("/sources", get(sources))
        .route("/sources/refresh", post(refresh_sources))
        .route(
            "/bookmarks",
            get(list_bookmarks)
                .post(add_bookmark)
                .delete(remove_bookmark),
        )
        .route("/bookmarks/toggle", post(toggle_bookmark))
        .route("/bookmarks/status", get(bookmark_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
pub struct FeedView {
    #[serde(flatten)]
    pub feed: FeedSnapshot,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outcome: Option<LoadOutcome>,
}

/// A source plus whether the current selection filters on it.
#[derive(Debug, Serialize)]
pub struct SourceView {
    #[serde(flatten)]
    pub source: Source,
    pub selected: bool,
}

#[derive(Debug, Serialize)]
pub struct ToggleView {
    pub url: String,
    pub bookmarked: bool,
}

#[derive(Debug, Serialize)]
pub struct BookmarkStatus {
    pub url: String,
    pub bookmarked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchRequest {
    #[serde(default)]
    pub query: Option<String>,
    /// Falls back to the current selection when absent
    #[serde(default)]
    pub sources: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
pub struct UrlQuery {
    pub url: String,
}

// Custom error type
pub enum AppError {
    Upstream(ClientError),
    Store(StoreError),
    NotFound(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, e.to_string()),
            AppError::Store(StoreError::MissingUrl) => {
                (StatusCode::BAD_REQUEST, StoreError::MissingUrl.to_string())
            }
            AppError::Store(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()),
            AppError::NotFound(what) => (StatusCode::NOT_FOUND, format!("{} not found", what)),
        };
        (status, format!("Error: {}", message)).into_response()
    }
}

impl From<ClientError> for AppError {
    fn from(err: ClientError) -> Self {
        AppError::Upstream(err)
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        AppError::Store(err)
    }
}

async fn feed_view(feed: &FeedCoordinator, outcome: Option<LoadOutcome>) -> FeedView {
    FeedView {
        feed: feed.snapshot().await,
        outcome,
    }
}

async fn source_views(feed: &FeedCoordinator) -> Vec<SourceView> {
    let selected: Vec<Source> = feed
        .selection()
        .await
        .sources
        .into_iter()
        .map(Source::with_id)
        .collect();

    feed.sources()
        .await
        .into_iter()
        .map(|source| SourceView {
            selected: selected.iter().any(|s| s.same_id(&source)),
            source,
        })
        .collect()
}

// Route handlers
pub async fn feed(State(state): State<Arc<AppState>>) -> Json<FeedView> {
    Json(feed_view(&state.feed, None).await)
}

pub async fn search(
    State(state): State<Arc<AppState>>,
    Json(request): Json<SearchRequest>,
) -> Result<Json<FeedView>, AppError> {
    let sources = match request.sources {
        Some(sources) => sources,
        None => state.feed.selection().await.sources,
    };
    let outcome = state
        .feed
        .load_articles(request.query.as_deref(), &sources)
        .await?;
    Ok(Json(feed_view(&state.feed, Some(outcome)).await))
}

pub async fn more(State(state): State<Arc<AppState>>) -> Result<Json<FeedView>, AppError> {
    let outcome = state.feed.load_more().await?;
    Ok(Json(feed_view(&state.feed, Some(outcome)).await))
}

pub async fn refresh(State(state): State<Arc<AppState>>) -> Result<Json<FeedView>, AppError> {
    let outcome = state.feed.reload().await?;
    Ok(Json(feed_view(&state.feed, Some(outcome)).await))
}

pub async fn sources(State(state): State<Arc<AppState>>) -> Json<Vec<SourceView>> {
    Json(source_views(&state.feed).await)
}

pub async fn refresh_sources(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<SourceView>>, AppError> {
    state.feed.load_sources().await?;
    Ok(Json(source_views(&state.feed).await))
}

pub async fn list_bookmarks(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<Article>>, AppError> {
    let bookmarks = state.bookmarks.list().await?;
    Ok(Json(bookmarks.into_iter().map(Article::from).collect()))
}

pub async fn add_bookmark(
    State(state): State<Arc<AppState>>,
    Json(article): Json<Article>,
) -> Result<impl IntoResponse, AppError> {
    state.bookmarks.add(&article).await?;
    Ok((StatusCode::CREATED, Json(article)))
}

pub async fn remove_bookmark(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<StatusCode, AppError> {
    if state.bookmarks.remove(&query.url).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound(format!("Bookmark {}", query.url)))
    }
}

pub async fn toggle_bookmark(
    State(state): State<Arc<AppState>>,
    Json(article): Json<Article>,
) -> Result<Json<ToggleView>, AppError> {
    let bookmarked = state.bookmarks.toggle(&article).await?;
    Ok(Json(ToggleView {
        url: article.url.unwrap_or_default(),
        bookmarked,
    }))
}

pub async fn bookmark_status(
    State(state): State<Arc<AppState>>,
    Query(query): Query<UrlQuery>,
) -> Result<Json<BookmarkStatus>, AppError> {
    let bookmark = state.bookmarks.get(&query.url).await?;
    Ok(Json(BookmarkStatus {
        bookmarked: bookmark.is_some(),
        saved_at: bookmark.map(|b| b.created_at),
        url: query.url,
    }))
}

pub async fn health() -> &'static str {
    "OK"
}
