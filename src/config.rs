//! # Configuration Module
//!
//! Configuration structures for the scraper and the assistant bot, including
//! recovery settings for language-model calls. Values come from the
//! environment (after `.env` is loaded) and fall back to the defaults below.

use anyhow::{anyhow, Context, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::ad_store::DEFAULT_STORE_PATH;
use crate::similarity::DEFAULT_SIMILARITY_THRESHOLD;

// Constants for configuration defaults
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";
pub const DEFAULT_SCRAPE_LIMIT: usize = 100;
pub const DEFAULT_EXPORT_DIR: &str = "channel_exports";
pub const DEFAULT_HISTORY_PATH: &str = "DataStore/history.json";
pub const DEFAULT_MESSAGE_LIMIT: usize = 20;
pub const DEFAULT_SESSION_PATH: &str = "DataStore/scraper.session";
pub const CLASSIFICATION_CACHE_CAPACITY: usize = 10_000;

/// Recovery configuration for language-model calls
#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    /// Retries allowed after a rate-limit answer
    pub max_rate_limit_retries: u32,
    /// Fixed pause before retrying a rate-limited call, in milliseconds
    pub rate_limit_backoff_ms: u64,
    /// Timeout for a single external call in seconds
    pub operation_timeout_secs: u64,
    /// Circuit breaker failure threshold
    pub circuit_breaker_threshold: u32,
    /// Circuit breaker reset timeout in seconds
    pub circuit_breaker_reset_secs: u64,
}

impl Default for RecoveryConfig {
    fn default() -> Self {
        Self {
            max_rate_limit_retries: 1,
            rate_limit_backoff_ms: 60_000, // 1 minute
            operation_timeout_secs: 30,
            circuit_breaker_threshold: 5,
            circuit_breaker_reset_secs: 60,
        }
    }
}

impl RecoveryConfig {
    pub fn rate_limit_backoff(&self) -> Duration {
        Duration::from_millis(self.rate_limit_backoff_ms)
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn from_env() -> Result<Self> {
        let defaults = Self::default();
        Ok(Self {
            max_rate_limit_retries: env_or(
                "RATE_LIMIT_RETRIES",
                defaults.max_rate_limit_retries,
            )?,
            rate_limit_backoff_ms: backoff_ms_from_secs(env_or(
                "RATE_LIMIT_BACKOFF_SECS",
                defaults.rate_limit_backoff_ms / 1000,
            )?)?,
            operation_timeout_secs: env_or("LLM_TIMEOUT_SECS", defaults.operation_timeout_secs)?,
            circuit_breaker_threshold: env_or(
                "CIRCUIT_BREAKER_THRESHOLD",
                defaults.circuit_breaker_threshold,
            )?,
            circuit_breaker_reset_secs: env_or(
                "CIRCUIT_BREAKER_RESET_SECS",
                defaults.circuit_breaker_reset_secs,
            )?,
        })
    }
}

/// Convert the configured back-off in seconds to milliseconds
pub fn backoff_ms_from_secs(secs: u64) -> Result<u64> {
    secs.checked_mul(1000)
        .ok_or_else(|| anyhow!("RATE_LIMIT_BACKOFF_SECS is too large: {secs}"))
}

/// Connection settings for the OpenAI-compatible chat API
#[derive(Clone)]
pub struct LlmConfig {
    pub api_key: String,
    pub base_url: String,
    pub model: String,
    pub recovery: RecoveryConfig,
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("api_key", &"***")
            .field("base_url", &self.base_url)
            .field("model", &self.model)
            .field("recovery", &self.recovery)
            .finish()
    }
}

impl LlmConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            recovery: RecoveryConfig::default(),
        }
    }

    pub fn from_env() -> Result<Self> {
        Ok(Self {
            api_key: required("OPENAI_API_KEY")?,
            base_url: env::var("OPENAI_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_OPENAI_BASE_URL.to_string()),
            model: env::var("OPENAI_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string()),
            recovery: RecoveryConfig::from_env()?,
        })
    }
}

/// User-account login used to read channel history over MTProto
#[derive(Clone)]
pub struct TelegramConfig {
    pub api_id: i32,
    pub api_hash: String,
    /// Phone number of the account, needed only for the first login
    pub phone: Option<String>,
    /// Two-step verification password, if the account has one
    pub password: Option<String>,
    pub session_path: PathBuf,
}

impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("api_id", &self.api_id)
            .field("api_hash", &"***")
            .field("phone", &self.phone)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("session_path", &self.session_path)
            .finish()
    }
}

impl TelegramConfig {
    /// `None` when `API_ID` is unset, in which case channel exports are read instead
    pub fn from_env() -> Result<Option<Self>> {
        let api_id = match env::var("API_ID") {
            Ok(raw) if !raw.trim().is_empty() => raw
                .trim()
                .parse()
                .with_context(|| format!("API_ID is not a valid application id: {raw}"))?,
            _ => return Ok(None),
        };

        Ok(Some(Self {
            api_id,
            api_hash: required("API_HASH")?,
            phone: optional("TELEGRAM_PHONE"),
            password: optional("TELEGRAM_PASSWORD"),
            session_path: PathBuf::from(
                env::var("TELEGRAM_SESSION_PATH")
                    .unwrap_or_else(|_| DEFAULT_SESSION_PATH.to_string()),
            ),
        }))
    }
}

/// Settings for the channel scraper
#[derive(Debug, Clone)]
pub struct ScraperConfig {
    /// Channel usernames to scrape
    pub channels: Vec<String>,
    /// Live MTProto access; the export reader is used when absent
    pub telegram: Option<TelegramConfig>,
    /// Directory holding Telegram Desktop JSON exports, one per channel
    pub export_dir: PathBuf,
    pub store_path: PathBuf,
    /// Messages read per channel
    pub scrape_limit: usize,
    pub similarity_threshold: f64,
    pub llm: LlmConfig,
}

impl ScraperConfig {
    pub fn from_env() -> Result<Self> {
        let channels = channels_from_env();
        if channels.is_empty() {
            return Err(anyhow!(
                "No channels configured: set CHANNEL_USERNAMES or CHANNEL_USERNAME_1..3"
            ));
        }

        let similarity_threshold = env_or("SIMILARITY_THRESHOLD", DEFAULT_SIMILARITY_THRESHOLD)?;
        if !(0.0..=1.0).contains(&similarity_threshold) {
            return Err(anyhow!(
                "SIMILARITY_THRESHOLD must be between 0 and 1, got {similarity_threshold}"
            ));
        }

        Ok(Self {
            channels,
            telegram: TelegramConfig::from_env()?,
            export_dir: PathBuf::from(
                env::var("CHANNEL_EXPORT_DIR").unwrap_or_else(|_| DEFAULT_EXPORT_DIR.to_string()),
            ),
            store_path: PathBuf::from(
                env::var("AD_STORE_PATH").unwrap_or_else(|_| DEFAULT_STORE_PATH.to_string()),
            ),
            scrape_limit: env_or("SCRAPE_LIMIT", DEFAULT_SCRAPE_LIMIT)?,
            similarity_threshold,
            llm: LlmConfig::from_env()?,
        })
    }
}

/// Settings for the assistant bot
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram user allowed to see the admin panel button
    pub admin_id: Option<u64>,
    pub history_path: PathBuf,
    /// Messages kept per user, questions and answers together
    pub message_limit: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            admin_id: None,
            history_path: PathBuf::from(DEFAULT_HISTORY_PATH),
            message_limit: DEFAULT_MESSAGE_LIMIT,
        }
    }
}

impl BotConfig {
    pub fn from_env() -> Result<Self> {
        let admin_id = match env::var("ADMIN_ID") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                raw.trim()
                    .parse()
                    .with_context(|| format!("ADMIN_ID is not a valid user id: {raw}"))?,
            ),
            _ => None,
        };

        Ok(Self {
            admin_id,
            history_path: PathBuf::from(
                env::var("HISTORY_PATH").unwrap_or_else(|_| DEFAULT_HISTORY_PATH.to_string()),
            ),
            message_limit: env_or("MESSAGE_LIMIT", DEFAULT_MESSAGE_LIMIT)?,
        })
    }
}

/// Read a required variable
pub fn required(key: &str) -> Result<String> {
    match env::var(key) {
        Ok(value) if !value.trim().is_empty() => Ok(value),
        _ => Err(anyhow!("{key} must be set")),
    }
}

/// Read an optional variable, treating blank as unset
pub fn optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Read and parse an optional variable, using `default` when unset
pub fn env_or<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse()
            .map_err(|e| anyhow!("Invalid value for {key} ({raw}): {e}")),
        _ => Ok(default),
    }
}

/// Channel list from `CHANNEL_USERNAMES`, or the numbered variables
pub fn channels_from_env() -> Vec<String> {
    let raw = match env::var("CHANNEL_USERNAMES") {
        Ok(list) => list,
        Err(_) => (1..=3)
            .filter_map(|i| env::var(format!("CHANNEL_USERNAME_{i}")).ok())
            .collect::<Vec<_>>()
            .join(","),
    };
    parse_channel_list(&raw)
}

/// Split a comma-separated channel list, dropping blanks, `@` and `t.me/` prefixes
pub fn parse_channel_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(|c| {
            c.trim()
                .trim_start_matches("https://")
                .trim_start_matches("t.me/")
                .trim_start_matches('@')
                .to_string()
        })
        .filter(|c| !c.is_empty())
        .collect()
}
