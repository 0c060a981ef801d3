//! # Rental Scout
//!
//! Collects apartment rental ads from Telegram channels, turns each ad into a
//! fixed-length feature vector and keeps only ads that are not near-duplicates
//! of ads already stored. A companion Telegram bot answers rental questions
//! with a language model.
//!
//! Scraper flow: [`message_source`] or [`telegram_source`] → [`pipeline`] (classify, extract via
//! [`llm`]) → [`vectorizer`] (using [`encoders`]) → [`similarity`] →
//! [`ad_store`].

pub mod ad_model;
pub mod ad_store;
pub mod bot;
pub mod chat_history;
pub mod circuit_breaker;
pub mod classification_cache;
pub mod config;
pub mod encoders;
pub mod errors;
pub mod llm;
pub mod localization;
pub mod logging;
pub mod message_source;
pub mod pipeline;
pub mod similarity;
pub mod telegram_source;
pub mod vectorizer;
