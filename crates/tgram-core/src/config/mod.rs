mod defaults;


use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use tracing::info;

use crate::error::TgramError;
use defaults::*;

/// Environment variable consulted when `api.bot_token` is empty.
pub const BOT_TOKEN_ENV: &str = "TELEGRAM_BOT_TOKEN";

/// Upper bound for `webhook.buffer`.
pub const MAX_BUFFER: usize = 100_000;

/// Top-level tgram configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub tgram: GeneralConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
}

/// Process-level settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Directory for daily-rolling log files. Empty = console only.
    #[serde(default)]
    pub log_dir: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

/// Bot API endpoint settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Per-request timeout. Must outlast the long-poll timeout.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            base_url: default_base_url(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl fmt::Debug for ApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiConfig")
            .field("bot_token", &"<redacted>")
            .field("base_url", &self.base_url)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

/// Retry delay strategy after a failed `getUpdates`.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// Same delay after every failure.
    #[default]
    Fixed,
    /// Delay doubles per consecutive failure, capped at `max_retry_delay_secs`.
    Exponential,
}

/// Long-polling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingConfig {
    /// Initial cursor: the first update id to request.
    #[serde(default)]
    pub offset: i64,
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// Long-poll timeout in seconds. 0 = short polling.
    #[serde(default = "default_poll_timeout")]
    pub timeout: u32,
    /// Update kinds to receive. Empty = server default.
    #[serde(default)]
    pub allowed_updates: Vec<String>,
    #[serde(default)]
    pub backoff: BackoffKind,
    #[serde(default = "default_retry_delay")]
    pub retry_delay_secs: u64,
    #[serde(default = "default_max_retry_delay")]
    pub max_retry_delay_secs: u64,
    /// Consecutive failures tolerated before giving up. 0 = retry forever.
    #[serde(default)]
    pub max_retries: u32,
    /// Remove an active webhook before polling starts.
    #[serde(default)]
    pub clear_webhook: bool,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: default_limit(),
            timeout: default_poll_timeout(),
            allowed_updates: Vec::new(),
            backoff: BackoffKind::default(),
            retry_delay_secs: default_retry_delay(),
            max_retry_delay_secs: default_max_retry_delay(),
            max_retries: 0,
            clear_webhook: false,
        }
    }
}

/// Webhook listener settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookConfig {
    /// Public URL registered with `setWebhook`.
    #[serde(default)]
    pub url: String,
    /// Requests whose path does not start with this prefix are dropped.
    #[serde(default = "default_listen_path")]
    pub listen_path: String,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// PEM certificate. TLS is used when both `tls_cert` and `tls_key` are set.
    #[serde(default)]
    pub tls_cert: String,
    #[serde(default)]
    pub tls_key: String,
    /// Upload `tls_cert` to Telegram (self-signed certificates).
    #[serde(default)]
    pub upload_certificate: bool,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default)]
    pub allowed_updates: Vec<String>,
    #[serde(default)]
    pub drop_pending_updates: bool,
    /// Delivery channel capacity, 1..=`MAX_BUFFER`.
    #[serde(default = "default_buffer")]
    pub buffer: usize,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            listen_path: default_listen_path(),
            bind: default_bind(),
            tls_cert: String::new(),
            tls_key: String::new(),
            upload_certificate: false,
            max_connections: default_max_connections(),
            allowed_updates: Vec::new(),
            drop_pending_updates: false,
            buffer: default_buffer(),
        }
    }
}

impl WebhookConfig {
    /// Whether the listener serves HTTPS.
    pub fn uses_tls(&self) -> bool {
        !self.tls_cert.is_empty() && !self.tls_key.is_empty()
    }
}

impl Config {
    /// Check ranges and cross-field constraints.
    pub fn validate(&self) -> Result<(), TgramError> {
        let polling = &self.polling;
        if !(1..=100).contains(&polling.limit) {
            return Err(TgramError::Config(format!(
                "polling.limit must be between 1 and 100, got {}",
                polling.limit
            )));
        }
        if self.api.request_timeout_secs <= u64::from(polling.timeout) {
            return Err(TgramError::Config(format!(
                "api.request_timeout_secs ({}) must exceed polling.timeout ({})",
                self.api.request_timeout_secs, polling.timeout
            )));
        }
        if polling.backoff == BackoffKind::Exponential
            && polling.max_retry_delay_secs < polling.retry_delay_secs
        {
            return Err(TgramError::Config(
                "polling.max_retry_delay_secs must not be below retry_delay_secs".into(),
            ));
        }

        let webhook = &self.webhook;
        if !(1..=100).contains(&webhook.max_connections) {
            return Err(TgramError::Config(format!(
                "webhook.max_connections must be between 1 and 100, got {}",
                webhook.max_connections
            )));
        }
        if !webhook.listen_path.starts_with('/') {
            return Err(TgramError::Config(format!(
                "webhook.listen_path must start with '/', got '{}'",
                webhook.listen_path
            )));
        }
        if webhook.tls_cert.is_empty() != webhook.tls_key.is_empty() {
            return Err(TgramError::Config(
                "webhook.tls_cert and webhook.tls_key must be set together".into(),
            ));
        }
        if webhook.upload_certificate && webhook.tls_cert.is_empty() {
            return Err(TgramError::Config(
                "webhook.upload_certificate requires webhook.tls_cert".into(),
            ));
        }
        if !(1..=MAX_BUFFER).contains(&webhook.buffer) {
            return Err(TgramError::Config(format!(
                "webhook.buffer must be between 1 and {MAX_BUFFER}, got {}",
                webhook.buffer
            )));
        }

        Ok(())
    }
}

/// Fill an empty bot token from the given environment value.
fn fill_bot_token(config: &mut Config, env_token: Option<String>) {
    if config.api.bot_token.is_empty() {
        if let Some(token) = env_token.filter(|t| !t.is_empty()) {
            config.api.bot_token = token;
        }
    }
}

/// Load configuration from a TOML file.
///
/// Falls back to defaults if the file does not exist. An empty `bot_token`
/// is taken from `TELEGRAM_BOT_TOKEN`.
pub fn load(path: &str) -> Result<Config, TgramError> {
    let path = Path::new(path);
    let mut config = if path.exists() {
        let content = std::fs::read_to_string(path).map_err(|e| {
            TgramError::Config(format!("failed to read {}: {}", path.display(), e))
        })?;
        toml::from_str(&content)
            .map_err(|e| TgramError::Config(format!("failed to parse config: {}", e)))?
    } else {
        info!(
            "Config file not found at {}, using defaults",
            path.display()
        );
        Config::default()
    };

    fill_bot_token(&mut config, std::env::var(BOT_TOKEN_ENV).ok());
    Ok(config)
}
