//! # Chat History Module
//!
//! Per-user conversation memory for the assistant bot, persisted as one JSON
//! object keyed by Telegram user id.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use tempfile::NamedTempFile;

use crate::llm::ChatMessage;

/// Stored conversations, oldest message first
#[derive(Debug)]
pub struct ChatHistory {
    path: PathBuf,
    conversations: HashMap<u64, Vec<ChatMessage>>,
}

impl ChatHistory {
    /// Load the history file; a missing file gives an empty history.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let conversations = if path.exists() {
            let content = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read chat history {}", path.display()))?;
            serde_json::from_str(&content)
                .with_context(|| format!("Chat history {} is corrupt", path.display()))?
        } else {
            HashMap::new()
        };

        Ok(Self {
            path,
            conversations,
        })
    }

    /// Stored conversation of `user_id` followed by the new question
    pub fn conversation_with(&self, user_id: u64, text: &str) -> Vec<ChatMessage> {
        let mut messages = self
            .conversations
            .get(&user_id)
            .cloned()
            .unwrap_or_default();
        messages.push(ChatMessage::user(text));
        messages
    }

    /// Append a question and its answer, keeping only the last `limit` messages
    pub fn record_exchange(&mut self, user_id: u64, question: &str, answer: &str, limit: usize) {
        let messages = self.conversations.entry(user_id).or_default();
        messages.push(ChatMessage::user(question));
        messages.push(ChatMessage::assistant(answer));

        if messages.len() > limit {
            let excess = messages.len() - limit;
            messages.drain(..excess);
        }
    }

    pub fn len_for(&self, user_id: u64) -> usize {
        self.conversations.get(&user_id).map_or(0, Vec::len)
    }

    /// Rewrite the history file through a temp file and rename
    pub fn save(&self) -> Result<()> {
        let dir = match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create directory {}", dir.display()))?;

        let json = serde_json::to_string_pretty(&self.conversations)
            .context("Failed to serialize chat history")?;
        let mut tmp = NamedTempFile::new_in(&dir).context("Failed to create temp file")?;
        tmp.write_all(json.as_bytes())
            .context("Failed to write chat history")?;
        tmp.persist(&self.path)
            .with_context(|| format!("Failed to replace {}", self.path.display()))?;
        Ok(())
    }
}
