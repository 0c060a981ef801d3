//! # Error Types Module
//!
//! Structured error types for the external capabilities the scraper relies
//! on: the language-model API and the upstream message source. Store and
//! configuration plumbing uses `anyhow` with context instead.

/// Errors from language-model calls
#[derive(Debug, Clone, PartialEq)]
pub enum LlmError {
    /// The API answered 429; the optional value is its `Retry-After` in seconds
    RateLimited(Option<u64>),
    /// Non-success HTTP status other than a rate limit
    Api { status: u16, body: String },
    /// Transport failure (connection, TLS, body read)
    Http(String),
    /// The response body did not have the expected shape
    InvalidResponse(String),
    /// The call did not finish in time
    Timeout(String),
    /// Too many recent failures, call not attempted
    CircuitOpen,
}

impl LlmError {
    /// Transient rate limiting, worth a back-off and retry
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, LlmError::RateLimited(_))
    }
}

impl std::fmt::Display for LlmError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LlmError::RateLimited(Some(secs)) => {
                write!(f, "Rate limited: retry after {secs}s")
            }
            LlmError::RateLimited(None) => write!(f, "Rate limited"),
            LlmError::Api { status, body } => write!(f, "API error {status}: {body}"),
            LlmError::Http(msg) => write!(f, "HTTP error: {msg}"),
            LlmError::InvalidResponse(msg) => write!(f, "Invalid response: {msg}"),
            LlmError::Timeout(msg) => write!(f, "Timeout error: {msg}"),
            LlmError::CircuitOpen => write!(f, "Circuit breaker open: calls suspended"),
        }
    }
}

impl std::error::Error for LlmError {}

impl From<reqwest::Error> for LlmError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            LlmError::Timeout(err.to_string())
        } else {
            LlmError::Http(err.to_string())
        }
    }
}

/// Errors from turning an ad text into an [`AdRecord`](crate::ad_model::AdRecord)
#[derive(Debug, Clone, PartialEq)]
pub enum ExtractionError {
    /// The model call itself failed
    Llm(LlmError),
    /// The model answered, but not with a usable JSON object
    Malformed(String),
}

impl std::fmt::Display for ExtractionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionError::Llm(err) => write!(f, "Extraction call failed: {err}"),
            ExtractionError::Malformed(msg) => write!(f, "Malformed extraction output: {msg}"),
        }
    }
}

impl std::error::Error for ExtractionError {}

impl From<LlmError> for ExtractionError {
    fn from(err: LlmError) -> Self {
        ExtractionError::Llm(err)
    }
}

/// Errors from the upstream message source
#[derive(Debug, Clone, PartialEq)]
pub enum SourceError {
    /// No channel is known under this username
    UsernameNotFound(String),
    /// The channel exists but cannot be read
    ChannelPrivate(String),
    /// Any other failure reading the channel
    Unavailable(String),
}

impl std::fmt::Display for SourceError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SourceError::UsernameNotFound(channel) => {
                write!(f, "No channel has {channel} as username")
            }
            SourceError::ChannelPrivate(channel) => {
                write!(f, "Channel {channel} is private or not accessible")
            }
            SourceError::Unavailable(msg) => write!(f, "Message source unavailable: {msg}"),
        }
    }
}

impl std::error::Error for SourceError {}
