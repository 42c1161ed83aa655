//! Error types for the research pipeline.
//!
//! A single [`ResearchError`] enum covers every failure in the system.
//! The retry layer classifies errors into two retryable classes:
//! transient transport failures (retried with exponential backoff) and
//! malformed model output (retried with a corrective re-prompt under a
//! separate, smaller budget). Everything else is terminal for the call.

use thiserror::Error;

/// Errors produced by the research pipeline.
#[derive(Debug, Error)]
pub enum ResearchError {
    /// No API key was provided for the LLM provider.
    #[error("API key missing: set OPENAI_API_KEY or configure api_key")]
    ApiKeyMissing,

    /// No API key was provided for the search provider.
    #[error("search API key missing: set EXA_API_KEY or configure search_api_key")]
    SearchKeyMissing,

    /// The configured provider name is not supported.
    #[error("unsupported provider: {name}")]
    UnsupportedProvider {
        /// The unrecognized provider name.
        name: String,
    },

    /// An LLM API request failed.
    #[error("API request failed: {message}")]
    ApiRequest {
        /// Description of the failure.
        message: String,
        /// HTTP status code, if one was received.
        status: Option<u16>,
    },

    /// A retrieval (search) request failed.
    #[error("search request failed: {message}")]
    SearchRequest {
        /// Description of the failure.
        message: String,
        /// HTTP status code, if one was received.
        status: Option<u16>,
    },

    /// An external call exceeded its timeout.
    #[error("request timed out after {seconds}s")]
    Timeout {
        /// The timeout that was exceeded, in seconds.
        seconds: u64,
    },

    /// Structured output from the model failed schema validation.
    #[error("failed to parse model response: {message}")]
    ResponseParse {
        /// What went wrong during decoding.
        message: String,
        /// The raw response content, for diagnostics and re-prompting.
        content: String,
    },

    /// An operation failed after exhausting its retry budget.
    #[error("{operation} failed after {attempts} attempts")]
    RetriesExhausted {
        /// Name of the operation that was retried.
        operation: String,
        /// Number of attempts made before giving up.
        attempts: u32,
        /// The last error observed.
        #[source]
        source: Box<ResearchError>,
    },

    /// Invalid run configuration.
    #[error("invalid configuration: {message}")]
    InvalidConfig {
        /// Which constraint was violated.
        message: String,
    },

    /// A pipeline-level failure not attributable to one external call.
    #[error("orchestration error: {message}")]
    Orchestration {
        /// Description of the failure.
        message: String,
    },

    /// Every sub-agent failed; the run produced no usable findings.
    #[error("research failed for all {} objectives", errors.len())]
    TotalFailure {
        /// One error description per objective, in objective order.
        errors: Vec<String>,
    },
}

impl ResearchError {
    /// Returns `true` if the error is a transient transport failure
    /// worth retrying with backoff.
    ///
    /// HTTP 408/429 and all 5xx responses count as transient, as do
    /// failures with no status at all (connection resets, DNS).
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } => true,
            Self::ApiRequest { status, .. } | Self::SearchRequest { status, .. } => match status {
                None => true,
                Some(code) => *code == 408 || *code == 429 || *code >= 500,
            },
            _ => false,
        }
    }

    /// Returns `true` if the error is malformed model output, retryable
    /// via the corrective re-prompt budget.
    #[must_use]
    pub const fn is_malformed_output(&self) -> bool {
        matches!(self, Self::ResponseParse { .. })
    }
}
