//! UI Builder module for creating keyboards

use teloxide::types::{InlineKeyboardButton, InlineKeyboardMarkup, KeyboardButton, KeyboardMarkup};

use crate::localization::t_lang;

/// Callback data of the "price" filter button
pub const PRICE_CALLBACK: &str = "Price";
/// Callback data of the "add your own filter" button
pub const CUSTOM_FILTER_CALLBACK: &str = "UniPm";

/// Main reply keyboard; the admin also gets the admin panel button
pub fn main_keyboard(
    user_id: u64,
    admin_id: Option<u64>,
    language_code: Option<&str>,
) -> KeyboardMarkup {
    let mut rows = vec![vec![KeyboardButton::new(t_lang(
        "set-filters-button",
        language_code,
    ))]];

    if admin_id == Some(user_id) {
        rows.push(vec![KeyboardButton::new(t_lang(
            "admin-panel-button",
            language_code,
        ))]);
    }

    KeyboardMarkup::new(rows)
        .resize_keyboard()
        .one_time_keyboard()
        .input_field_placeholder(t_lang("menu-placeholder", language_code))
}

/// Inline keyboard listing the available filters
pub fn filters_keyboard(language_code: Option<&str>) -> InlineKeyboardMarkup {
    InlineKeyboardMarkup::new(vec![
        vec![InlineKeyboardButton::callback(
            t_lang("price-button", language_code),
            PRICE_CALLBACK,
        )],
        vec![InlineKeyboardButton::callback(
            t_lang("custom-filter-button", language_code),
            CUSTOM_FILTER_CALLBACK,
        )],
    ])
}

/// Reply keyboard shown while waiting for a price range
pub fn price_keyboard(language_code: Option<&str>) -> KeyboardMarkup {
    KeyboardMarkup::new(vec![vec![KeyboardButton::new(t_lang(
        "price-no-limit",
        language_code,
    ))]])
    .resize_keyboard()
    .one_time_keyboard()
    .input_field_placeholder(t_lang("price-placeholder", language_code))
}
