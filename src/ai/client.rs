//! OpenAI-compatible chat completions client
//!
//! Thin transport wrapper shared by the extraction and summary services.
//! The request timeout is the pipeline's only bound on the one
//! network-dependent step, so it is applied at the client level and kept
//! configurable through the environment.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

/// Default chat completions endpoint
const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
/// Default request timeout in seconds
const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// AI transport error types
#[derive(Debug, Error)]
pub enum AiError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("completion response contained no choices")]
    EmptyResponse,
}

/// Chat completions client
#[derive(Clone)]
pub struct ChatClient {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Deserialize)]
struct ChatChoiceMessage {
    content: Option<String>,
}

impl ChatClient {
    /// Create a new chat client
    pub fn new(
        api_key: String,
        model: String,
        base_url: String,
        timeout: Duration,
    ) -> Result<Self, AiError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            api_key,
            model,
            base_url,
        })
    }

    /// Build a client from the environment; None when no API key is set.
    ///
    /// Reads OPENAI_API_KEY, OPENAI_MODEL, OPENAI_BASE_URL and
    /// OPENAI_TIMEOUT_SECS.
    pub fn from_env() -> Option<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").ok()?;
        let model =
            std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".to_string());
        let base_url =
            std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let timeout = std::env::var("OPENAI_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_TIMEOUT_SECS);

        Self::new(api_key, model, base_url, Duration::from_secs(timeout)).ok()
    }

    /// Send a system + user message pair and return the first choice's text
    pub async fn chat(
        &self,
        system: &str,
        user: &str,
        temperature: f64,
    ) -> Result<String, AiError> {
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature,
        };

        let response: ChatResponse = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        let content = response
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or(AiError::EmptyResponse)?;

        debug!(chars = content.len(), "chat completion received");
        Ok(content)
    }
}

/// Strip a markdown code fence around a model response, if present.
/// Models occasionally wrap JSON output in ```json fences despite the
/// prompt asking for bare JSON.
pub fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();

    if let Some(start) = trimmed.find("```json") {
        if let Some(end) = trimmed.rfind("```") {
            if end > start + 7 {
                return trimmed[start + 7..end].trim();
            }
        }
    } else if let Some(start) = trimmed.find("```") {
        if let Some(end) = trimmed.rfind("```") {
            if end > start + 3 {
                return trimmed[start + 3..end].trim();
            }
        }
    }

    trimmed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fence() {
        let wrapped = "```json\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn test_strip_bare_fence() {
        let wrapped = "```\n{\"a\": 1}\n```";
        assert_eq!(strip_code_fences(wrapped), "{\"a\": 1}");
    }

    #[test]
    fn test_unfenced_passes_through() {
        assert_eq!(strip_code_fences("  {\"a\": 1} "), "{\"a\": 1}");
    }
}
