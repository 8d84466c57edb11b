use std::time::Duration;

use reqwest::Client;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

use crate::config::Config;
use crate::models::{ApiErrorBody, ArticlesResponse, SourcesResponse};

/// Errors from a single NewsAPI request.
#[derive(Debug, Error)]
pub enum ClientError {
    /// Transport failure (DNS, connection, TLS, timeout)
    #[error("Request failed: {0}")]
    Network(#[from] reqwest::Error),
    /// Response body did not match the expected shape
    #[error("Failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),
    /// NewsAPI answered with `"status": "error"`
    #[error("NewsAPI error {code}: {message}")]
    Upstream { code: String, message: String },
    /// Non-success status without a readable error body
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
}

/// One page of an article search.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArticleQuery {
    pub query: Option<String>,
    pub sources: Vec<String>,
    pub page: u32,
}

impl ArticleQuery {
    pub fn new(query: Option<&str>, sources: &[String], page: u32) -> Self {
        Self {
            query: query.map(str::to_string),
            sources: sources.to_vec(),
            page,
        }
    }
}

pub struct NewsClient {
    client: Client,
    base_url: String,
    api_key: String,
    page_size: u32,
    max_sources: usize,
}

impl NewsClient {
    pub fn new(config: &Config) -> Result<Self, ClientError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout))
            .user_agent("Headlines/1.0 (News Reader)")
            .build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            page_size: config.page_size,
            max_sources: config.max_sources,
        })
    }

    /// Query parameters for an article search.
    ///
    /// Blank queries are left out entirely rather than sent as an empty
    /// filter. Only the first `max_sources` source ids are sent.
    pub fn search_params(&self, query: &ArticleQuery) -> Vec<(&'static str, String)> {
        let sources = query
            .sources
            .iter()
            .take(self.max_sources)
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(",");

        let mut params = vec![("sources", sources)];
        if let Some(q) = query.query.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
            params.push(("q", q.to_string()));
        }
        params.push(("pageSize", self.page_size.to_string()));
        params.push(("page", query.page.to_string()));
        params.push(("sortBy", "publishedAt".to_string()));
        params.push(("apiKey", self.api_key.clone()));
        params
    }

    pub async fn search_articles(
        &self,
        query: &ArticleQuery,
    ) -> Result<ArticlesResponse, ClientError> {
        debug!(
            page = query.page,
            sources = query.sources.len().min(self.max_sources),
            has_query = query.query.as_deref().is_some_and(|q| !q.trim().is_empty()),
            "Searching articles"
        );
        let url = format!("{}/everything", self.base_url);
        self.get_json(&url, &self.search_params(query)).await
    }

    pub async fn sources(&self) -> Result<SourcesResponse, ClientError> {
        debug!("Fetching source list");
        let url = format!("{}/top-headlines/sources", self.base_url);
        self.get_json(&url, &[("apiKey", self.api_key.clone())])
            .await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, ClientError> {
        let response = self.client.get(url).query(params).send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;
        debug!(status = status.as_u16(), bytes = bytes.len(), "Received response");

        // NewsAPI reports failures in the body, usually with a 4xx status
        if let Ok(body) = serde_json::from_slice::<ApiErrorBody>(&bytes) {
            if body.is_error() {
                return Err(ClientError::Upstream {
                    code: body.code.unwrap_or_default(),
                    message: body.message.unwrap_or_default(),
                });
            }
        }

        if !status.is_success() {
            return Err(ClientError::HttpStatus(status.as_u16()));
        }

        Ok(serde_json::from_slice(&bytes)?)
    }
}
