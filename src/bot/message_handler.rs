//! Message Handler module for processing incoming Telegram messages

use anyhow::Result;
use std::sync::Arc;
use teloxide::prelude::*;
use tracing::{debug, error, info};

use crate::localization::{get_localization_manager, t_lang};

use super::assistant::AssistantState;
use super::ui_builder::{filters_keyboard, main_keyboard};

async fn handle_start(
    bot: &Bot,
    msg: &Message,
    state: &AssistantState,
    user_id: u64,
    language_code: Option<&str>,
) -> Result<()> {
    info!(user_id, "User started the bot");

    bot.send_message(msg.chat.id, t_lang("welcome-message", language_code))
        .reply_markup(main_keyboard(user_id, state.config().admin_id, language_code))
        .await?;
    send_filters(bot, msg, language_code).await
}

async fn send_filters(bot: &Bot, msg: &Message, language_code: Option<&str>) -> Result<()> {
    bot.send_message(msg.chat.id, t_lang("filters-title", language_code))
        .reply_markup(filters_keyboard(language_code))
        .await?;
    Ok(())
}

async fn handle_question(
    bot: &Bot,
    msg: &Message,
    state: &AssistantState,
    user_id: u64,
    text: &str,
    language_code: Option<&str>,
) -> Result<()> {
    match state.answer(user_id, text).await {
        Ok(answer) => {
            info!(user_id, answer_length = answer.len(), "Assistant answered");
            bot.send_message(msg.chat.id, answer).await?;
        }
        Err(e) => {
            error!(user_id, error = %e, "Assistant failed to answer");
            bot.send_message(msg.chat.id, t_lang("assistant-error", language_code))
                .await?;
        }
    }
    Ok(())
}

pub async fn message_handler(bot: Bot, msg: Message, state: Arc<AssistantState>) -> Result<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = %msg.chat.id, "Ignoring non-text message");
        return Ok(());
    };
    let Some(user) = msg.from.as_ref() else {
        return Ok(());
    };

    let user_id = user.id.0;
    let language_code = user.language_code.as_deref();
    debug!(user_id, message_length = text.len(), "Received text message from user");

    if text == "/start" || text.starts_with("/start ") {
        handle_start(&bot, &msg, &state, user_id, language_code).await
    } else if get_localization_manager().matches_any("set-filters-button", text) {
        send_filters(&bot, &msg, language_code).await
    } else {
        handle_question(&bot, &msg, &state, user_id, text, language_code).await
    }
}
