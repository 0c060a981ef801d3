//! # Language Model Module
//!
//! Capability traits the pipeline and the bot depend on, plus an
//! OpenAI-compatible chat-completions client implementing all of them.
//!
//! - [`AdClassifier`]: is this message a rental ad?
//! - [`AdExtractor`]: pull the structured ad fields out of the text
//! - [`ChatCompletion`]: free-form assistant replies

use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::ad_model::{AdRecord, EXTRACTION_KEYS};
use crate::circuit_breaker::CircuitBreaker;
use crate::config::LlmConfig;
use crate::errors::{ExtractionError, LlmError};

/// Decides whether a message is an apartment rental ad
#[async_trait]
pub trait AdClassifier: Send + Sync {
    async fn is_rental_ad(&self, text: &str) -> Result<bool, LlmError>;
}

/// Extracts the structured fields of a rental ad
#[async_trait]
pub trait AdExtractor: Send + Sync {
    async fn extract_ad(&self, text: &str) -> Result<AdRecord, ExtractionError>;
}

/// Answers a conversation with the next assistant message
#[async_trait]
pub trait ChatCompletion: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError>;
}

/// One message of a chat conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: "assistant".to_string(),
            content: content.into(),
        }
    }
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Prompt asking for a one-word yes/no classification
pub fn classification_prompt(text: &str) -> String {
    format!(
        "Is this message an advertisement for renting an apartment? Answer 'Yes' or 'No'.\n\nMessage: {text}"
    )
}

/// Prompt asking for the ad fields as a JSON object
pub fn extraction_prompt(text: &str) -> String {
    let keys = EXTRACTION_KEYS
        .iter()
        .map(|k| format!("'{k}'"))
        .collect::<Vec<_>>()
        .join(", ");
    format!(
        "Extract information from the advertisement and present it in JSON format with keys: {keys}.\n\nAdvertisement: {text}\n\nJSON:"
    )
}

/// Interpret a classification answer: the first word is "yes" or "да"
pub fn parse_yes_no(answer: &str) -> bool {
    let first_word: String = answer
        .trim()
        .chars()
        .take_while(|c| c.is_alphabetic())
        .collect::<String>()
        .to_lowercase();
    matches!(first_word.as_str(), "yes" | "да")
}

/// Client for an OpenAI-compatible chat-completions endpoint
pub struct OpenAiClient {
    client: reqwest::Client,
    config: LlmConfig,
    circuit_breaker: CircuitBreaker,
}

impl std::fmt::Debug for OpenAiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiClient")
            .field("config", &self.config)
            .field("circuit_breaker", &self.circuit_breaker)
            .finish()
    }
}

impl OpenAiClient {
    /// Build a client from its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built (TLS backend failure).
    pub fn new(config: LlmConfig) -> Result<Self, LlmError> {
        let client = reqwest::Client::builder()
            .timeout(config.recovery.operation_timeout())
            .build()?;
        let circuit_breaker = CircuitBreaker::new(&config.recovery);
        Ok(Self {
            client,
            config,
            circuit_breaker,
        })
    }

    pub fn circuit_breaker(&self) -> &CircuitBreaker {
        &self.circuit_breaker
    }

    pub fn model(&self) -> &str {
        &self.config.model
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    async fn chat(
        &self,
        messages: &[ChatMessage],
        max_tokens: Option<u32>,
        json_output: bool,
    ) -> Result<String, LlmError> {
        if self.circuit_breaker.is_open() {
            warn!("Circuit breaker is open, skipping language model call");
            return Err(LlmError::CircuitOpen);
        }

        let request = ChatRequest {
            model: &self.config.model,
            messages,
            max_tokens,
            temperature: Some(0.0),
            response_format: json_output.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        match self.send(&request).await {
            Ok(content) => {
                self.circuit_breaker.record_success();
                Ok(content)
            }
            // Rate limits say nothing about the API being broken
            Err(e) if e.is_rate_limit() => Err(e),
            Err(e) => {
                self.circuit_breaker.record_failure();
                Err(e)
            }
        }
    }

    async fn send(&self, request: &ChatRequest<'_>) -> Result<String, LlmError> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get(reqwest::header::RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u64>().ok());
            return Err(LlmError::RateLimited(retry_after));
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Could not read error body".to_string());
            return Err(LlmError::Api {
                status: status.as_u16(),
                body,
            });
        }

        let chat_response: ChatResponse = response
            .json()
            .await
            .map_err(|e| LlmError::InvalidResponse(e.to_string()))?;
        let content = chat_response
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| LlmError::InvalidResponse("no choices returned".to_string()))?;

        debug!(model = %self.config.model, chars = content.len(), "Language model answered");
        Ok(content)
    }
}

#[async_trait]
impl AdClassifier for OpenAiClient {
    async fn is_rental_ad(&self, text: &str) -> Result<bool, LlmError> {
        let messages = [ChatMessage::user(classification_prompt(text))];
        let answer = self.chat(&messages, Some(3), false).await?;
        Ok(parse_yes_no(&answer))
    }
}

#[async_trait]
impl AdExtractor for OpenAiClient {
    async fn extract_ad(&self, text: &str) -> Result<AdRecord, ExtractionError> {
        let messages = [ChatMessage::user(extraction_prompt(text))];
        let answer = self.chat(&messages, Some(500), true).await?;
        AdRecord::from_extraction_json(&answer)
    }
}

#[async_trait]
impl ChatCompletion for OpenAiClient {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String, LlmError> {
        self.chat(messages, None, false).await
    }
}
