//! Bot module for handling Telegram interactions
//!
//! This module is split into several submodules:
//! - `message_handler`: Handles `/start`, the filters button and assistant questions
//! - `callback_handler`: Handles inline keyboard callback queries
//! - `ui_builder`: Creates keyboards
//! - `assistant`: Shared state and the question → answer flow

pub mod assistant;
pub mod callback_handler;
pub mod message_handler;
pub mod ui_builder;

// Re-export main handler functions for use in main.rs
pub use assistant::AssistantState;
pub use callback_handler::callback_handler;
pub use message_handler::message_handler;
