//! Assistant module: free-form questions answered by the language model

use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::chat_history::ChatHistory;
use crate::config::BotConfig;
use crate::errors::LlmError;
use crate::llm::ChatCompletion;

/// State shared by every handler invocation
pub struct AssistantState {
    llm: Arc<dyn ChatCompletion>,
    history: Mutex<ChatHistory>,
    config: BotConfig,
}

impl AssistantState {
    pub fn new(llm: Arc<dyn ChatCompletion>, history: ChatHistory, config: BotConfig) -> Self {
        Self {
            llm,
            history: Mutex::new(history),
            config,
        }
    }

    pub fn config(&self) -> &BotConfig {
        &self.config
    }

    /// Messages currently remembered for `user_id`
    pub async fn history_len(&self, user_id: u64) -> usize {
        self.history.lock().await.len_for(user_id)
    }

    /// Answer `question` in the context of the user's earlier exchanges.
    ///
    /// On success the exchange is remembered and persisted; on failure the
    /// history is left untouched.
    pub async fn answer(&self, user_id: u64, question: &str) -> Result<String, LlmError> {
        // The lock is not held during the model call so users do not wait on each other
        let conversation = self.history.lock().await.conversation_with(user_id, question);
        debug!(user_id, messages = conversation.len(), "Sending conversation to language model");

        let answer = self.llm.complete(&conversation).await?;

        let mut history = self.history.lock().await;
        history.record_exchange(user_id, question, &answer, self.config.message_limit);
        if let Err(e) = history.save() {
            warn!(user_id, error = %e, "Failed to persist chat history");
        }

        Ok(answer)
    }
}
