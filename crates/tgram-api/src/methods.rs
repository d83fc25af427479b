//! Typed wrappers for the update-related Bot API methods.

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;
use tgram_core::{
    error::TgramError,
    traits::BotApi,
    types::{Update, User, WebhookInfo},
};

/// Server-side default and maximum for `getUpdates.limit`.
pub const DEFAULT_LIMIT: u32 = 100;

/// Parameters for `getUpdates`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GetUpdatesParams {
    /// First update id to return. Omitted when 0.
    #[serde(skip_serializing_if = "is_zero")]
    pub offset: i64,
    /// 1..=100. Omitted when it equals the server default.
    #[serde(skip_serializing_if = "is_default_limit")]
    pub limit: u32,
    /// Long-poll seconds. 0 = return immediately.
    pub timeout: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
}

impl Default for GetUpdatesParams {
    fn default() -> Self {
        Self {
            offset: 0,
            limit: DEFAULT_LIMIT,
            timeout: 60,
            allowed_updates: Vec::new(),
        }
    }
}

fn is_zero(v: &i64) -> bool {
    *v == 0
}

fn is_default_limit(v: &u32) -> bool {
    *v == DEFAULT_LIMIT
}

/// Parameters for `setWebhook`. The certificate travels separately as a file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SetWebhookParams {
    pub url: String,
    pub max_connections: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub allowed_updates: Vec<String>,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub drop_pending_updates: bool,
}

async fn call_typed<T: DeserializeOwned>(
    api: &dyn BotApi,
    method: &str,
    params: Value,
) -> Result<T, TgramError> {
    let value = api.call(method, params).await?;
    Ok(serde_json::from_value(value)?)
}

/// `getMe`: the bot's own user. A cheap way to validate the token.
pub async fn get_me(api: &dyn BotApi) -> Result<User, TgramError> {
    call_typed(api, "getMe", json!({})).await
}

/// `getUpdates`: fetch pending updates starting at `params.offset`.
pub async fn get_updates(
    api: &dyn BotApi,
    params: &GetUpdatesParams,
) -> Result<Vec<Update>, TgramError> {
    call_typed(api, "getUpdates", serde_json::to_value(params)?).await
}

/// `setWebhook`: register the push URL, optionally uploading a self-signed
/// certificate.
pub async fn set_webhook(
    api: &dyn BotApi,
    params: &SetWebhookParams,
    certificate: Option<&Path>,
) -> Result<bool, TgramError> {
    let body = serde_json::to_value(params)?;
    let value = match certificate {
        Some(path) => api.upload("setWebhook", body, "certificate", path).await?,
        None => api.call("setWebhook", body).await?,
    };
    Ok(serde_json::from_value(value)?)
}

/// `deleteWebhook`: switch the bot back to `getUpdates`.
pub async fn delete_webhook(
    api: &dyn BotApi,
    drop_pending_updates: bool,
) -> Result<bool, TgramError> {
    call_typed(
        api,
        "deleteWebhook",
        json!({ "drop_pending_updates": drop_pending_updates }),
    )
    .await
}

/// `getWebhookInfo`: current webhook status.
pub async fn get_webhook_info(api: &dyn BotApi) -> Result<WebhookInfo, TgramError> {
    call_typed(api, "getWebhookInfo", json!({})).await
}
