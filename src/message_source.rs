//! # Message Source Module
//!
//! Upstream supply of channel messages. The Bot API cannot read channel
//! history: the scraper either reads it live over MTProto
//! ([`crate::telegram_source`]) or, without a user account, from the JSON
//! exports Telegram Desktop produces ("Export chat history" → JSON), one file
//! per channel.

use async_trait::async_trait;
use serde::Deserialize;
use std::io::ErrorKind;
use std::path::PathBuf;
use tracing::debug;

use crate::errors::SourceError;

/// A channel message as seen by the pipeline
#[derive(Debug, Clone, PartialEq)]
pub struct ScrapedMessage {
    pub id: i64,
    /// Bot-API style chat id (`-100…` for channels)
    pub chat_id: i64,
    /// `None` for service messages and media without a caption
    pub text: Option<String>,
}

/// Ordered, limited access to channel backlogs
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Fail when the channel cannot be read at all
    async fn check_access(&self, channel: &str) -> Result<(), SourceError>;

    /// Up to `limit` of the most recent messages, oldest first
    async fn fetch_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMessage>, SourceError>;
}

#[derive(Deserialize)]
struct ExportFile {
    #[serde(rename = "type", default)]
    chat_type: String,
    id: i64,
    #[serde(default)]
    messages: Vec<ExportMessage>,
}

#[derive(Deserialize)]
struct ExportMessage {
    id: i64,
    #[serde(rename = "type", default)]
    message_type: String,
    #[serde(default)]
    text: ExportText,
}

/// Exported text is either a plain string or a list of plain and styled fragments
#[derive(Deserialize)]
#[serde(untagged)]
enum ExportText {
    Plain(String),
    Fragments(Vec<TextFragment>),
}

impl Default for ExportText {
    fn default() -> Self {
        ExportText::Plain(String::new())
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TextFragment {
    Plain(String),
    Styled { text: String },
}

impl ExportText {
    fn into_string(self) -> String {
        match self {
            ExportText::Plain(s) => s,
            ExportText::Fragments(parts) => parts
                .into_iter()
                .map(|part| match part {
                    TextFragment::Plain(s) => s,
                    TextFragment::Styled { text } => text,
                })
                .collect(),
        }
    }
}

/// Convert an export chat id into the Bot-API form used in store records
pub fn bot_api_chat_id(chat_type: &str, id: i64) -> i64 {
    match chat_type {
        "public_channel" | "private_channel" | "public_supergroup" | "private_supergroup" => {
            -(1_000_000_000_000 + id)
        }
        _ => id,
    }
}

fn is_valid_username(channel: &str) -> bool {
    !channel.is_empty()
        && channel
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_')
}

/// Reads `<dir>/<channel>.json` Telegram Desktop exports
#[derive(Debug, Clone)]
pub struct TelegramExportSource {
    root: PathBuf,
}

impl TelegramExportSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn export_path(&self, channel: &str) -> Result<PathBuf, SourceError> {
        if !is_valid_username(channel) {
            return Err(SourceError::UsernameNotFound(channel.to_string()));
        }
        Ok(self.root.join(format!("{channel}.json")))
    }

    async fn read_export(&self, channel: &str) -> Result<String, SourceError> {
        let path = self.export_path(channel)?;
        tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| match e.kind() {
                ErrorKind::NotFound => SourceError::UsernameNotFound(channel.to_string()),
                ErrorKind::PermissionDenied => SourceError::ChannelPrivate(channel.to_string()),
                _ => SourceError::Unavailable(format!("{}: {e}", path.display())),
            })
    }
}

#[async_trait]
impl MessageSource for TelegramExportSource {
    async fn check_access(&self, channel: &str) -> Result<(), SourceError> {
        let path = self.export_path(channel)?;
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => Ok(()),
            Ok(_) => Err(SourceError::Unavailable(format!(
                "{} is not a file",
                path.display()
            ))),
            Err(e) if e.kind() == ErrorKind::PermissionDenied => {
                Err(SourceError::ChannelPrivate(channel.to_string()))
            }
            Err(_) => Err(SourceError::UsernameNotFound(channel.to_string())),
        }
    }

    async fn fetch_messages(
        &self,
        channel: &str,
        limit: usize,
    ) -> Result<Vec<ScrapedMessage>, SourceError> {
        let content = self.read_export(channel).await?;
        let export: ExportFile = serde_json::from_str(&content)
            .map_err(|e| SourceError::Unavailable(format!("{channel}: invalid export: {e}")))?;

        let chat_id = bot_api_chat_id(&export.chat_type, export.id);
        let skip = export.messages.len().saturating_sub(limit);
        let messages: Vec<ScrapedMessage> = export
            .messages
            .into_iter()
            .skip(skip)
            .map(|m| {
                let text = if m.message_type == "service" {
                    None
                } else {
                    Some(m.text.into_string()).filter(|t| !t.trim().is_empty())
                };
                ScrapedMessage {
                    id: m.id,
                    chat_id,
                    text,
                }
            })
            .collect();

        debug!(channel, count = messages.len(), "Fetched channel backlog");
        Ok(messages)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const EXPORT: &str = r#"{
        "name": "Аренда Москва",
        "type": "public_channel",
        "id": 1234567890,
        "messages": [
            {"id": 1, "type": "service", "action": "create_channel", "text": ""},
            {"id": 2, "type": "message", "text": "Сдаю однушку у метро Сокол"},
            {"id": 3, "type": "message", "text": ["Сдаю ", {"type": "bold", "text": "2к"}, " квартиру"]},
            {"id": 4, "type": "message", "photo": "photos/1.jpg", "text": ""}
        ]
    }"#;

    fn source_with_export() -> (TempDir, TelegramExportSource) {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("arenda_msk.json"), EXPORT).unwrap();
        let source = TelegramExportSource::new(dir.path());
        (dir, source)
    }

    #[tokio::test]
    async fn test_fetch_messages_in_order() {
        let (_dir, source) = source_with_export();
        let messages = source.fetch_messages("arenda_msk", 100).await.unwrap();

        assert_eq!(messages.len(), 4);
        assert_eq!(messages[0].text, None);
        assert_eq!(messages[1].text.as_deref(), Some("Сдаю однушку у метро Сокол"));
        assert_eq!(messages[2].text.as_deref(), Some("Сдаю 2к квартиру"));
        assert_eq!(messages[3].text, None);
        assert!(messages.iter().all(|m| m.chat_id == -1001234567890));
    }

    #[tokio::test]
    async fn test_limit_keeps_most_recent() {
        let (_dir, source) = source_with_export();
        let messages = source.fetch_messages("arenda_msk", 2).await.unwrap();
        let ids: Vec<i64> = messages.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[tokio::test]
    async fn test_unknown_channel() {
        let (_dir, source) = source_with_export();
        assert_eq!(
            source.fetch_messages("nobody", 10).await,
            Err(SourceError::UsernameNotFound("nobody".to_string()))
        );
        assert!(source.check_access("arenda_msk").await.is_ok());
        assert!(source.check_access("nobody").await.is_err());
    }

    #[tokio::test]
    async fn test_path_like_names_are_rejected() {
        let (_dir, source) = source_with_export();
        assert!(matches!(
            source.fetch_messages("../arenda_msk", 10).await,
            Err(SourceError::UsernameNotFound(_))
        ));
    }

    #[test]
    fn test_bot_api_chat_id() {
        assert_eq!(bot_api_chat_id("private_channel", 42), -1000000000042);
        assert_eq!(bot_api_chat_id("personal_chat", 42), 42);
    }
}
