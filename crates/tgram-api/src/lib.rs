//! # tgram-api
//!
//! HTTP transport for the Telegram Bot API and typed wrappers for the methods
//! update ingestion relies on.
//! Docs: <https://core.telegram.org/bots/api>

mod client;
pub mod methods;

pub use client::HttpBotApi;
