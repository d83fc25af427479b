//! reqwest-backed `BotApi` implementation.

use async_trait::async_trait;
use serde_json::Value;
use std::path::Path;
use std::time::Duration;
use tgram_core::{config::ApiConfig, error::TgramError, traits::BotApi, types::Envelope};
use tracing::debug;

/// Bot API client over HTTPS.
///
/// Owns its `reqwest::Client` and the token-bearing base URL; nothing is
/// process-global.
pub struct HttpBotApi {
    client: reqwest::Client,
    base_url: String,
}

impl HttpBotApi {
    /// Create a client from config.
    pub fn new(config: &ApiConfig) -> Result<Self, TgramError> {
        if config.bot_token.is_empty() {
            return Err(TgramError::Config("api.bot_token is empty".into()));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| TgramError::Http(format!("failed to build http client: {e}")))?;

        Ok(Self {
            client,
            base_url: method_base(&config.base_url, &config.bot_token),
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{method}", self.base_url)
    }
}

/// `{base_url}/bot{token}`, tolerating a trailing slash on the base.
fn method_base(base_url: &str, token: &str) -> String {
    format!("{}/bot{token}", base_url.trim_end_matches('/'))
}

/// Render a JSON parameter object as multipart text fields.
/// Strings are sent verbatim, everything else JSON-encoded; nulls are skipped.
fn form_fields(params: &Value) -> Vec<(String, String)> {
    let Some(map) = params.as_object() else {
        return Vec::new();
    };
    map.iter()
        .filter(|(_, v)| !v.is_null())
        .map(|(k, v)| {
            let text = match v {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (k.clone(), text)
        })
        .collect()
}

/// Decode the response envelope. Telegram answers errors with a non-2xx status
/// and a JSON envelope, so the body is decoded regardless of status.
async fn decode(method: &str, resp: reqwest::Response) -> Result<Value, TgramError> {
    let status = resp.status();
    let body = resp
        .text()
        .await
        .map_err(|e| TgramError::Http(format!("telegram {method} read failed: {}", e.without_url())))?;

    let envelope: Envelope<Value> = serde_json::from_str(&body).map_err(|e| {
        TgramError::Http(format!(
            "telegram {method} returned undecodable body ({status}): {e}"
        ))
    })?;

    envelope.into_result()
}

#[async_trait]
impl BotApi for HttpBotApi {
    async fn call(&self, method: &str, params: Value) -> Result<Value, TgramError> {
        debug!("telegram: POST {method}");

        let resp = self
            .client
            .post(self.method_url(method))
            .json(&params)
            .send()
            .await
            .map_err(|e| TgramError::Http(format!("telegram {method} failed: {}", e.without_url())))?;

        decode(method, resp).await
    }

    async fn upload(
        &self,
        method: &str,
        params: Value,
        file_field: &str,
        file_path: &Path,
    ) -> Result<Value, TgramError> {
        let bytes = tokio::fs::read(file_path).await?;
        let file_name = file_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file_field.to_string());

        debug!(
            "telegram: POST {method} (multipart, {} bytes as {file_field})",
            bytes.len()
        );

        let part = reqwest::multipart::Part::bytes(bytes)
            .file_name(file_name)
            .mime_str("application/octet-stream")
            .map_err(|e| TgramError::Http(format!("mime error: {e}")))?;

        let mut form = reqwest::multipart::Form::new();
        for (name, value) in form_fields(&params) {
            form = form.text(name, value);
        }
        form = form.part(file_field.to_string(), part);

        let resp = self
            .client
            .post(self.method_url(method))
            .multipart(form)
            .send()
            .await
            .map_err(|e| TgramError::Http(format!("telegram {method} failed: {}", e.without_url())))?;

        decode(method, resp).await
    }
}
