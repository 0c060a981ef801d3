use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::info;

use rental_scout::bot::{self, AssistantState};
use rental_scout::chat_history::ChatHistory;
use rental_scout::config::{self, BotConfig, LlmConfig};
use rental_scout::llm::OpenAiClient;
use rental_scout::localization::init_localization;
use rental_scout::logging::init_tracing;

#[tokio::main]
async fn main() -> Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();
    init_tracing()?;

    info!("Starting rental assistant bot");

    let bot_token = config::required("TELEGRAM_BOT_TOKEN")?;
    let bot_config = BotConfig::from_env()?;
    let llm = OpenAiClient::new(LlmConfig::from_env()?)?;
    init_localization()?;

    let history = ChatHistory::load(&bot_config.history_path)?;
    info!(
        history_path = %bot_config.history_path.display(),
        model = %llm.model(),
        "Chat history loaded"
    );

    let state = Arc::new(AssistantState::new(Arc::new(llm), history, bot_config));
    let bot = Bot::new(bot_token);

    info!("Bot initialized, starting dispatcher");

    let handler = dptree::entry()
        .branch(Update::filter_message().endpoint(bot::message_handler))
        .branch(Update::filter_callback_query().endpoint(bot::callback_handler));

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}
