//! Push ingestion: register a webhook and serve the updates Telegram posts to it.
//!
//! Docs: <https://core.telegram.org/bots/api#setwebhook>


use crate::stream::{self, UpdateStream};
use axum::{
    body::Bytes,
    extract::{DefaultBodyLimit, State},
    http::{StatusCode, Uri},
    Router,
};
use axum_server::tls_rustls::RustlsConfig;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tgram_api::methods::{self, SetWebhookParams};
use tgram_core::{
    config::{WebhookConfig, MAX_BUFFER},
    error::TgramError,
    traits::BotApi,
    types::Update,
};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Largest accepted request body.
const MAX_BODY_BYTES: usize = 1024 * 1024;

/// How long in-flight TLS connections get to finish after shutdown.
const TLS_DRAIN: Duration = Duration::from_secs(5);

/// Shared state for the webhook handler.
#[derive(Clone)]
struct ReceiverState {
    listen_path: Arc<str>,
    tx: mpsc::Sender<Update>,
}

/// A listener ready to serve, bound before the webhook is registered.
enum Bound {
    Plain(tokio::net::TcpListener),
    Tls(std::net::TcpListener, RustlsConfig),
}

/// Registers the webhook and runs the HTTP(S) listener that feeds an [`UpdateStream`].
pub struct WebhookReceiver {
    api: Arc<dyn BotApi>,
    config: WebhookConfig,
}

impl WebhookReceiver {
    pub fn new(api: Arc<dyn BotApi>, config: WebhookConfig) -> Self {
        Self { api, config }
    }

    /// Router that decodes every request under `listen_path` and forwards it on `tx`.
    ///
    /// A request is under `listen_path` when its path equals it or continues
    /// it with a `/` segment. Any method is accepted. Mount it as-is to embed the receiver in an
    /// existing axum server.
    pub fn router(listen_path: &str, tx: mpsc::Sender<Update>) -> Router {
        let state = ReceiverState {
            listen_path: Arc::from(listen_path),
            tx,
        };
        Router::new()
            .fallback(receive)
            .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
            .with_state(state)
    }

    /// Bind the listener, register the webhook, and spawn the server.
    ///
    /// Every failure here is fatal: nothing is running when this returns `Err`.
    pub async fn start(self) -> Result<UpdateStream, TgramError> {
        self.start_bound().await.map(|(stream, _)| stream)
    }

    /// Like [`start`](Self::start), also returning the address actually bound
    /// (useful with port 0).
    pub async fn start_bound(self) -> Result<(UpdateStream, SocketAddr), TgramError> {
        let config = self.config;
        if config.url.is_empty() {
            return Err(TgramError::Webhook("webhook.url is not set".into()));
        }
        if !(1..=MAX_BUFFER).contains(&config.buffer) {
            return Err(TgramError::Webhook(format!(
                "webhook.buffer must be between 1 and {MAX_BUFFER}, got {}",
                config.buffer
            )));
        }
        let addr: SocketAddr = config.bind.parse().map_err(|e| {
            TgramError::Webhook(format!("invalid bind address '{}': {e}", config.bind))
        })?;

        let tls = if config.uses_tls() {
            let tls = RustlsConfig::from_pem_file(&config.tls_cert, &config.tls_key)
                .await
                .map_err(|e| TgramError::Webhook(format!("failed to load TLS material: {e}")))?;
            Some(tls)
        } else {
            None
        };

        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|e| TgramError::Webhook(format!("failed to bind {addr}: {e}")))?;
        let local = listener.local_addr()?;
        let bound = match tls {
            Some(tls) => Bound::Tls(listener.into_std()?, tls),
            None => Bound::Plain(listener),
        };
        let (tx, signal, stream) = stream::channel(config.buffer);

        let params = SetWebhookParams {
            url: config.url.clone(),
            max_connections: config.max_connections,
            allowed_updates: config.allowed_updates.clone(),
            drop_pending_updates: config.drop_pending_updates,
        };
        let certificate = config
            .upload_certificate
            .then(|| Path::new(config.tls_cert.as_str()));
        methods::set_webhook(self.api.as_ref(), &params, certificate)
            .await
            .map_err(|e| TgramError::Webhook(format!("setWebhook failed: {e}")))?;

        let app = Self::router(&config.listen_path, tx);

        match bound {
            Bound::Tls(listener, tls) => {
                let handle = axum_server::Handle::new();
                tokio::spawn(drain_on_shutdown(handle.clone(), signal));
                info!("Telegram webhook listening on https://{local}");
                tokio::spawn(async move {
                    let server = axum_server::from_tcp_rustls(listener, tls).handle(handle);
                    if let Err(e) = server.serve(app.into_make_service()).await {
                        error!("webhook server error: {e}");
                    }
                    info!("Telegram webhook stopped");
                });
            }
            Bound::Plain(listener) => {
                info!("Telegram webhook listening on http://{local}");
                tokio::spawn(async move {
                    if let Err(e) = axum::serve(listener, app)
                        .with_graceful_shutdown(stopped(signal))
                        .await
                    {
                        error!("webhook server error: {e}");
                    }
                    info!("Telegram webhook stopped");
                });
            }
        }

        Ok((stream, local))
    }
}

/// Resolves once shutdown is requested or every stream handle is gone.
async fn stopped(mut signal: watch::Receiver<bool>) {
    let _ = signal.wait_for(|stop| *stop).await;
}

async fn drain_on_shutdown(handle: axum_server::Handle, signal: watch::Receiver<bool>) {
    stopped(signal).await;
    handle.graceful_shutdown(Some(TLS_DRAIN));
}

fn under_listen_path(path: &str, listen_path: &str) -> bool {
    match path.strip_prefix(listen_path) {
        Some(rest) => rest.is_empty() || rest.starts_with('/') || listen_path.ends_with('/'),
        None => false,
    }
}

async fn receive(State(state): State<ReceiverState>, uri: Uri, body: Bytes) -> StatusCode {
    if !under_listen_path(uri.path(), &state.listen_path) {
        debug!("webhook request outside listen path: {}", uri.path());
        return StatusCode::NOT_FOUND;
    }

    let update: Update = match serde_json::from_slice(&body) {
        Ok(update) => update,
        Err(e) => {
            warn!("dropping undecodable webhook body ({} bytes): {e}", body.len());
            return StatusCode::BAD_REQUEST;
        }
    };

    debug!("telegram update {} ({})", update.update_id, update.kind.name());

    match state.tx.send(update).await {
        Ok(()) => StatusCode::OK,
        Err(_) => {
            warn!("update stream closed, rejecting webhook delivery");
            StatusCode::SERVICE_UNAVAILABLE
        }
    }
}
