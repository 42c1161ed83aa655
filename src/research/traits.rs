//! Agent trait definition and structured-output decoding.
//!
//! All agents (coordinator, sub-agent, synthesizer) implement this
//! trait, which provides a uniform interface over the provider layer.

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use super::message::{ChatRequest, ChatResponse, TokenUsage, system_message, user_message};
use super::provider::LlmProvider;
use crate::error::ResearchError;

/// Response from an agent execution.
#[derive(Debug, Clone)]
pub struct AgentResponse {
    /// The agent's text output.
    pub content: String,
    /// Token usage for this call.
    pub usage: TokenUsage,
    /// Why the model stopped generating (e.g. `"stop"`, `"length"`).
    pub finish_reason: Option<String>,
}

/// Trait implemented by all agents in the system.
///
/// Agents encapsulate a specific role (goal definition, round
/// reasoning, synthesis) with a fixed system prompt and model
/// configuration.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Agent name for logging and metrics operation keys.
    fn name(&self) -> &'static str;

    /// Model identifier to use for this agent.
    fn model(&self) -> &str;

    /// System prompt that defines the agent's role and behavior.
    fn system_prompt(&self) -> &str;

    /// Whether to request JSON-formatted output.
    fn json_mode(&self) -> bool {
        false
    }

    /// Sampling temperature (0.0 = deterministic, higher = more creative).
    fn temperature(&self) -> f32 {
        0.0
    }

    /// Maximum tokens for the response.
    fn max_tokens(&self) -> u32 {
        2048
    }

    /// Executes the agent with the given user message.
    ///
    /// Builds a [`ChatRequest`] from the agent's configuration and
    /// delegates to the provider.
    ///
    /// # Errors
    ///
    /// Returns [`ResearchError`] on API failures.
    async fn execute(
        &self,
        provider: &dyn LlmProvider,
        user_msg: &str,
    ) -> Result<AgentResponse, ResearchError> {
        let request = ChatRequest {
            model: self.model().to_string(),
            messages: vec![system_message(self.system_prompt()), user_message(user_msg)],
            temperature: Some(self.temperature()),
            max_tokens: Some(self.max_tokens()),
            json_mode: self.json_mode(),
        };

        let response: ChatResponse = provider.chat(&request).await?;
        debug!(
            agent = self.name(),
            tokens = response.usage.total_tokens,
            finish_reason = response.finish_reason.as_deref().unwrap_or("none"),
            "agent call complete"
        );

        Ok(AgentResponse {
            content: response.content,
            usage: response.usage,
            finish_reason: response.finish_reason,
        })
    }
}

/// Strips markdown code fences from a model response.
///
/// Models occasionally wrap JSON in ```` ```json ```` fences even when
/// asked not to; decoding tolerates it.
#[must_use]
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    if trimmed.starts_with("```") {
        trimmed
            .trim_start_matches("```json")
            .trim_start_matches("```")
            .trim_end_matches("```")
            .trim()
    } else {
        trimmed
    }
}

/// Decodes a structured model response into `T`.
///
/// # Errors
///
/// Returns [`ResearchError::ResponseParse`] carrying the raw content,
/// which feeds the corrective re-prompt retry class.
pub fn decode_structured<T: DeserializeOwned>(content: &str) -> Result<T, ResearchError> {
    let json_str = strip_code_fences(content);
    serde_json::from_str(json_str).map_err(|e| {
        let preview_len = json_str.len().min(200);
        let mut cut = preview_len;
        while !json_str.is_char_boundary(cut) {
            cut -= 1;
        }
        ResearchError::ResponseParse {
            message: format!(
                "invalid JSON: {e}. Response length: {} bytes, preview: {:?}",
                json_str.len(),
                &json_str[..cut]
            ),
            content: content.to_string(),
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Deserialize)]
    struct Sample {
        value: u32,
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("{\"a\":1}"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{\"a\":1}\n```"), "{\"a\":1}");
    }

    #[test]
    fn test_decode_structured_valid() {
        let sample: Sample =
            decode_structured("{\"value\": 7}").unwrap_or_else(|_| unreachable!());
        assert_eq!(sample.value, 7);
    }

    #[test]
    fn test_decode_structured_fenced() {
        let sample: Sample = decode_structured("```json\n{\"value\": 9}\n```")
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(sample.value, 9);
    }

    #[test]
    fn test_decode_structured_invalid_is_parse_error() {
        let result: Result<Sample, _> = decode_structured("not json at all");
        match result {
            Err(ResearchError::ResponseParse { content, .. }) => {
                assert_eq!(content, "not json at all");
            }
            _ => unreachable!("expected ResponseParse"),
        }
    }
}
