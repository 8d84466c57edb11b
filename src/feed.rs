//! Article feed coordinator.
//!
//! Owns the current search and filter, pages through the article search
//! endpoint and keeps the list of available sources. Every article request
//! takes a new generation number; a newer request cancels the older one and
//! any result that still arrives for an old generation is thrown away.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tokio::sync::{watch, RwLock};
use tracing::{debug, info, warn};

use crate::client::{ArticleQuery, ClientError, NewsClient};
use crate::config::FailedPagePolicy;
use crate::models::{Article, ArticlesResponse, Source};

/// Generations start at 1, so 0 marks "nothing in flight".
const NO_REQUEST: u64 = 0;

/// Query and source ids of the most recent successful fresh search.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeedSelection {
    pub query: Option<String>,
    pub sources: Vec<String>,
}

impl FeedSelection {
    pub fn new(query: Option<&str>, sources: &[String]) -> Self {
        Self {
            query: query.map(str::to_string),
            sources: sources.to_vec(),
        }
    }
}

/// What an article request did to the accumulated list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "outcome", content = "count")]
pub enum LoadOutcome {
    /// Fresh search; the list now holds this many articles
    Replaced(usize),
    /// Next page appended this many articles
    Appended(usize),
    /// The page came back empty; paging stops until the next fresh search
    EndReached,
    /// Nothing requested: a request is in flight or results are exhausted
    Skipped,
    /// A newer request took over before this one finished
    Superseded,
}

/// Result of [`FeedCoordinator::load_initial_data`].
#[derive(Debug)]
pub struct InitialLoad {
    pub articles: Result<LoadOutcome, ClientError>,
    pub sources: Result<usize, ClientError>,
}

/// Feed state read under a single lock.
#[derive(Debug, Clone, Serialize)]
pub struct FeedSnapshot {
    pub articles: Vec<Article>,
    pub selection: FeedSelection,
    pub page: u32,
    pub can_load_more: bool,
}

#[derive(Debug)]
struct FeedState {
    page: u32,
    end_reached: bool,
    articles: Vec<Article>,
    sources: Vec<Source>,
    selection: FeedSelection,
}

impl Default for FeedState {
    fn default() -> Self {
        Self {
            page: 1,
            end_reached: false,
            articles: Vec::new(),
            sources: Vec::new(),
            selection: FeedSelection::default(),
        }
    }
}

/// Holds the in-flight marker for one request.
///
/// Dropping it clears the marker unless a newer request has taken it over,
/// so an abandoned request (timeout, disconnected caller) never blocks paging.
struct InFlight<'a> {
    slot: &'a AtomicU64,
    generation: u64,
}

impl InFlight<'_> {
    fn release(&self) {
        let _ = self.slot.compare_exchange(
            self.generation,
            NO_REQUEST,
            Ordering::SeqCst,
            Ordering::SeqCst,
        );
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.release();
    }
}

pub struct FeedCoordinator {
    client: NewsClient,
    policy: FailedPagePolicy,
    state: RwLock<FeedState>,
    generation: watch::Sender<u64>,
    /// Generation of the request currently in flight, or `NO_REQUEST`
    in_flight: AtomicU64,
}

impl FeedCoordinator {
    pub fn new(client: NewsClient, policy: FailedPagePolicy) -> Self {
        let (generation, _) = watch::channel(NO_REQUEST);
        Self {
            client,
            policy,
            state: RwLock::new(FeedState::default()),
            generation,
            in_flight: AtomicU64::new(NO_REQUEST),
        }
    }

    /// Fresh article search and source list fetch, run concurrently.
    ///
    /// Resolves once both have finished, whatever their outcome.
    pub async fn load_initial_data(&self, sources: &[String]) -> InitialLoad {
        let (articles, sources) =
            tokio::join!(self.load_articles(None, sources), self.load_sources());

        info!(
            articles_ok = articles.is_ok(),
            sources_ok = sources.is_ok(),
            "Initial load finished"
        );
        InitialLoad { articles, sources }
    }

    /// Start a fresh search from page 1, superseding any request in flight.
    ///
    /// Page, end-of-results and selection are committed together with the
    /// new list, so a failed search leaves the previous feed intact and
    /// pageable.
    pub async fn load_articles(
        &self,
        query: Option<&str>,
        sources: &[String],
    ) -> Result<LoadOutcome, ClientError> {
        let (guard, request) = {
            let _state = self.state.write().await;
            let guard = self.mark_in_flight(self.next_generation());
            (guard, ArticleQuery::new(query, sources, 1))
        };

        self.run(guard, request).await
    }

    /// Request the next page and append it.
    ///
    /// Returns [`LoadOutcome::Skipped`] without touching the network when a
    /// request is in flight or the last page came back empty.
    pub async fn load_more_articles(
        &self,
        query: Option<&str>,
        sources: &[String],
    ) -> Result<LoadOutcome, ClientError> {
        let (guard, request) = {
            let state = self.state.write().await;
            if !self.can_load_more_in(&state) {
                debug!(page = state.page, "Load more skipped");
                return Ok(LoadOutcome::Skipped);
            }
            let guard = self.mark_in_flight(self.next_generation());
            (guard, ArticleQuery::new(query, sources, state.page + 1))
        };

        self.run(guard, request).await
    }

    /// Repeat the last successful fresh search.
    pub async fn reload(&self) -> Result<LoadOutcome, ClientError> {
        let selection = self.selection().await;
        self.load_articles(selection.query.as_deref(), &selection.sources)
            .await
    }

    /// Next page of the last successful fresh search.
    pub async fn load_more(&self) -> Result<LoadOutcome, ClientError> {
        let selection = self.selection().await;
        self.load_more_articles(selection.query.as_deref(), &selection.sources)
            .await
    }

    /// Replace the source list with the server's current one.
    pub async fn load_sources(&self) -> Result<usize, ClientError> {
        match self.client.sources().await {
            Ok(response) => {
                let sources = response.sources.unwrap_or_default();
                let count = sources.len();
                self.state.write().await.sources = sources;
                info!("Loaded {} sources", count);
                Ok(count)
            }
            Err(e) => {
                warn!("Failed to load sources: {}", e);
                Err(e)
            }
        }
    }

    pub async fn can_load_more(&self) -> bool {
        let state = self.state.read().await;
        self.can_load_more_in(&state)
    }

    pub async fn articles(&self) -> Vec<Article> {
        self.state.read().await.articles.clone()
    }

    pub async fn sources(&self) -> Vec<Source> {
        self.state.read().await.sources.clone()
    }

    pub async fn selection(&self) -> FeedSelection {
        self.state.read().await.selection.clone()
    }

    /// Last page successfully loaded.
    pub async fn page(&self) -> u32 {
        self.state.read().await.page
    }

    pub async fn snapshot(&self) -> FeedSnapshot {
        let state = self.state.read().await;
        FeedSnapshot {
            articles: state.articles.clone(),
            selection: state.selection.clone(),
            page: state.page,
            can_load_more: self.can_load_more_in(&state),
        }
    }

    fn can_load_more_in(&self, state: &FeedState) -> bool {
        self.in_flight.load(Ordering::SeqCst) == NO_REQUEST && !state.end_reached
    }

    fn next_generation(&self) -> u64 {
        self.generation.send_modify(|g| *g += 1);
        *self.generation.borrow()
    }

    fn is_current(&self, generation: u64) -> bool {
        *self.generation.borrow() == generation
    }

    fn mark_in_flight(&self, generation: u64) -> InFlight<'_> {
        self.in_flight.store(generation, Ordering::SeqCst);
        InFlight {
            slot: &self.in_flight,
            generation,
        }
    }

    async fn run(
        &self,
        guard: InFlight<'_>,
        request: ArticleQuery,
    ) -> Result<LoadOutcome, ClientError> {
        let generation = guard.generation;
        let superseded = wait_superseded(self.generation.subscribe(), generation);

        let result = tokio::select! {
            result = self.client.search_articles(&request) => result,
            _ = superseded => {
                debug!(generation, page = request.page, "Article request cancelled");
                return Ok(LoadOutcome::Superseded);
            }
        };

        self.apply(&guard, &request, result).await
    }

    async fn apply(
        &self,
        guard: &InFlight<'_>,
        request: &ArticleQuery,
        result: Result<ArticlesResponse, ClientError>,
    ) -> Result<LoadOutcome, ClientError> {
        let page = request.page;
        let mut state = self.state.write().await;
        if !self.is_current(guard.generation) {
            debug!(generation = guard.generation, page, "Discarding stale article response");
            return Ok(LoadOutcome::Superseded);
        }
        guard.release();

        let response = match result {
            Ok(response) => response,
            Err(e) => {
                warn!(page, "Failed to load articles: {}", e);
                if page > 1 && self.policy == FailedPagePolicy::StopPaging {
                    state.end_reached = true;
                }
                return Err(e);
            }
        };

        let new_articles = response.articles.unwrap_or_default();
        let count = new_articles.len();
        state.page = page;
        if page > 1 {
            state.articles.extend(new_articles);
        } else {
            state.articles = new_articles;
            state.end_reached = false;
            state.selection = FeedSelection::new(request.query.as_deref(), &request.sources);
        }

        if count == 0 {
            state.end_reached = true;
            info!(page, "Reached the end of results");
            return Ok(LoadOutcome::EndReached);
        }

        debug!(page, count, total = state.articles.len(), "Articles loaded");
        Ok(if page > 1 {
            LoadOutcome::Appended(count)
        } else {
            LoadOutcome::Replaced(count)
        })
    }
}

/// Resolves once the generation moves past `generation`.
async fn wait_superseded(mut rx: watch::Receiver<u64>, generation: u64) {
    let _ = rx.wait_for(|current| *current != generation).await;
}
