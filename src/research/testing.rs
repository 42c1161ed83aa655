//! Shared mock providers for unit tests.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse, TokenUsage};
use super::provider::LlmProvider;
use super::search::{SearchHit, SearchOutcome, SearchProvider};
use crate::error::ResearchError;

/// Builds a plain text [`ChatResponse`] with nominal usage.
pub(crate) fn text_response(content: &str) -> ChatResponse {
    ChatResponse {
        content: content.to_string(),
        usage: TokenUsage {
            prompt_tokens: 100,
            completion_tokens: 50,
            total_tokens: 150,
        },
        finish_reason: Some("stop".to_string()),
    }
}

type ChatFn = dyn Fn(&ChatRequest, usize) -> Result<ChatResponse, ResearchError> + Send + Sync;

/// Scripted LLM provider: routes each request through a closure that
/// also receives the 0-based call index.
pub(crate) struct FnProvider {
    calls: AtomicUsize,
    respond: Box<ChatFn>,
}

impl FnProvider {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&ChatRequest, usize) -> Result<ChatResponse, ResearchError> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmProvider for FnProvider {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse, ResearchError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(request, index)
    }
}

type SearchFn = dyn Fn(&str, usize) -> Result<SearchOutcome, ResearchError> + Send + Sync;

/// Scripted search provider.
pub(crate) struct FnSearch {
    calls: AtomicUsize,
    respond: Box<SearchFn>,
}

impl FnSearch {
    pub(crate) fn new<F>(respond: F) -> Self
    where
        F: Fn(&str, usize) -> Result<SearchOutcome, ResearchError> + Send + Sync + 'static,
    {
        Self {
            calls: AtomicUsize::new(0),
            respond: Box::new(respond),
        }
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SearchProvider for FnSearch {
    fn name(&self) -> &'static str {
        "mock-search"
    }

    async fn search(&self, query: &str) -> Result<SearchOutcome, ResearchError> {
        let index = self.calls.fetch_add(1, Ordering::SeqCst);
        (self.respond)(query, index)
    }
}

/// Builds a single-hit outcome for a query.
pub(crate) fn outcome_for(query: &str) -> SearchOutcome {
    SearchOutcome {
        found: 1,
        crawled: 1,
        failed: 0,
        hits: vec![SearchHit {
            title: format!("Result for {query}"),
            url: format!("https://results.example/{}", query.replace(' ', "-")),
            domain: "results.example".to_string(),
            content: format!("Content about {query}."),
        }],
    }
}

/// Returns the system prompt of a request, empty if absent.
pub(crate) fn system_prompt_of(request: &ChatRequest) -> &str {
    request
        .messages
        .first()
        .map_or("", |m| m.content.as_str())
}
