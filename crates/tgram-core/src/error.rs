use std::time::Duration;

use thiserror::Error;

use crate::types::ResponseParameters;

/// Top-level error type for tgram.
#[derive(Debug, Error)]
pub enum TgramError {
    /// Transport failure: connection, timeout, or an undecodable response.
    #[error("http error: {0}")]
    Http(String),

    /// The Bot API answered with `ok: false`.
    #[error("api error {code}: {description}")]
    Api {
        code: i64,
        description: String,
        parameters: Option<ResponseParameters>,
    },

    /// Configuration error.
    #[error("config error: {0}")]
    Config(String),

    /// Webhook listener or registration failure.
    #[error("webhook error: {0}")]
    Webhook(String),

    /// I/O error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl TgramError {
    /// Flood-control delay requested by the server, if this is a 429-style API error.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Api {
                parameters: Some(params),
                ..
            } => params
                .retry_after
                .filter(|secs| *secs > 0)
                .map(|secs| Duration::from_secs(secs as u64)),
            _ => None,
        }
    }

    /// The supergroup id a group was migrated to, if the server reported one.
    pub fn migrate_to_chat_id(&self) -> Option<i64> {
        match self {
            Self::Api {
                parameters: Some(params),
                ..
            } => params.migrate_to_chat_id,
            _ => None,
        }
    }
}
