//! Callback Handler module for processing inline keyboard callback queries

use anyhow::Result;
use teloxide::prelude::*;
use tracing::{debug, warn};

use crate::localization::t_lang;

use super::ui_builder::{price_keyboard, CUSTOM_FILTER_CALLBACK, PRICE_CALLBACK};

/// Handle callback queries from the filters keyboard
pub async fn callback_handler(bot: Bot, q: CallbackQuery) -> Result<()> {
    debug!(user_id = %q.from.id, data = ?q.data, "Received callback query from user");

    // Every query is answered, unknown ones included
    bot.answer_callback_query(q.id.clone()).await?;

    let Some(msg) = &q.message else {
        return Ok(());
    };
    let chat_id = msg.chat().id;
    let language_code = q.from.language_code.as_deref();

    match q.data.as_deref() {
        Some(PRICE_CALLBACK) => {
            bot.send_message(chat_id, t_lang("price-prompt", language_code))
                .reply_markup(price_keyboard(language_code))
                .await?;
        }
        Some(CUSTOM_FILTER_CALLBACK) => {
            bot.send_message(chat_id, t_lang("custom-filter-prompt", language_code))
                .await?;
        }
        other => warn!(user_id = %q.from.id, data = ?other, "Unknown callback data"),
    }

    Ok(())
}
