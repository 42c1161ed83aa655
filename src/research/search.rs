//! Content retrieval provider.
//!
//! A [`SearchProvider`] turns a query string into a [`SearchOutcome`]:
//! an ordered list of [`SearchHit`]s with page content, plus URL-level
//! accounting for the metrics collector. The default implementation
//! talks to an Exa-compatible HTTP search API: one POST returns both
//! result metadata and page text, of which only the top `urls_to_crawl`
//! entries are kept. Content is whitespace-normalized and word-capped
//! before it enters the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::ResearchError;
use crate::research::config::ResearchConfig;

/// Default Exa API endpoint.
const DEFAULT_SEARCH_URL: &str = "https://api.exa.ai/search";

/// Maximum words of content kept per hit.
const MAX_CONTENT_WORDS: usize = 3000;

/// One retrieval result with its page content.
#[derive(Debug, Clone, Serialize)]
pub struct SearchHit {
    /// Page title, empty when the provider returned none.
    pub title: String,
    /// Page URL.
    pub url: String,
    /// Host portion of the URL.
    pub domain: String,
    /// Normalized, word-capped page text.
    pub content: String,
}

/// Result of one retrieval call.
///
/// `found` counts every URL the API returned, `crawled` those whose
/// content was attempted, `failed` those that yielded no usable text.
/// `hits.len()` is the success count.
#[derive(Debug, Clone, Default)]
pub struct SearchOutcome {
    /// URLs returned by the search API.
    pub found: u64,
    /// URLs whose content was fetched.
    pub crawled: u64,
    /// Crawled URLs that yielded no usable text.
    pub failed: u64,
    /// Usable results in ranking order.
    pub hits: Vec<SearchHit>,
}

/// Trait for retrieval backends.
///
/// May return an outcome with zero hits without error; a `Result::Err`
/// means the call itself failed and is a candidate for backoff retry.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &'static str;

    /// Searches for the query, returning hits with content in ranking
    /// order.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::SearchRequest`] on transport or API
    /// failures.
    async fn search(&self, query: &str) -> Result<SearchOutcome, ResearchError>;
}

#[derive(Debug, Serialize)]
struct ExaRequest<'a> {
    query: &'a str,
    num_results: usize,
    contents: ExaContentsSpec,
}

#[derive(Debug, Serialize)]
struct ExaContentsSpec {
    text: bool,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    #[serde(default)]
    title: Option<String>,
    url: String,
    #[serde(default)]
    text: Option<String>,
}

/// Exa-compatible HTTP search provider.
pub struct ExaSearch {
    client: reqwest::Client,
    api_key: String,
    endpoint: String,
    urls_per_query: usize,
    urls_to_crawl: usize,
}

impl ExaSearch {
    /// Creates a provider from run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError::SearchRequest`] if the HTTP client
    /// cannot be constructed.
    pub fn new(config: &ResearchConfig) -> Result<Self, ResearchError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| ResearchError::SearchRequest {
                message: format!("failed to build HTTP client: {e}"),
                status: None,
            })?;

        Ok(Self {
            client,
            api_key: config.search_api_key.clone(),
            endpoint: config
                .search_base_url
                .clone()
                .unwrap_or_else(|| DEFAULT_SEARCH_URL.to_string()),
            urls_per_query: config.urls_per_query,
            urls_to_crawl: config.urls_to_crawl,
        })
    }

    fn decode(&self, response: ExaResponse) -> SearchOutcome {
        let found = response.results.len() as u64;
        let mut outcome = SearchOutcome {
            found,
            ..SearchOutcome::default()
        };

        for result in response.results.into_iter().take(self.urls_to_crawl) {
            outcome.crawled += 1;
            let text = result.text.unwrap_or_default();
            if text.trim().is_empty() {
                outcome.failed += 1;
                continue;
            }
            outcome.hits.push(SearchHit {
                title: result.title.unwrap_or_default(),
                domain: extract_domain(&result.url),
                content: truncate_words(&text, MAX_CONTENT_WORDS),
                url: result.url,
            });
        }

        outcome
    }
}

impl std::fmt::Debug for ExaSearch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExaSearch")
            .field("endpoint", &self.endpoint)
            .field("urls_per_query", &self.urls_per_query)
            .field("urls_to_crawl", &self.urls_to_crawl)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl SearchProvider for ExaSearch {
    fn name(&self) -> &'static str {
        "exa"
    }

    async fn search(&self, query: &str) -> Result<SearchOutcome, ResearchError> {
        let body = ExaRequest {
            query,
            num_results: self.urls_per_query,
            contents: ExaContentsSpec { text: true },
        };

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| ResearchError::SearchRequest {
                message: e.to_string(),
                status: e.status().map(|s| s.as_u16()),
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(ResearchError::SearchRequest {
                message: format!("search API returned {status}: {message}"),
                status: Some(status.as_u16()),
            });
        }

        let decoded: ExaResponse =
            response
                .json()
                .await
                .map_err(|e| ResearchError::SearchRequest {
                    message: format!("failed to decode search response: {e}"),
                    status: None,
                })?;

        Ok(self.decode(decoded))
    }
}

/// Normalizes whitespace and caps the text at `max_words` words.
#[must_use]
pub fn truncate_words(text: &str, max_words: usize) -> String {
    text.split_whitespace()
        .take(max_words)
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extracts the host portion of a URL, without scheme or path.
#[must_use]
pub fn extract_domain(url: &str) -> String {
    let stripped = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .unwrap_or(url);
    stripped
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .to_string()
}
