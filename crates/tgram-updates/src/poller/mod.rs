//! Long-polling ingestion via `getUpdates`.
//!
//! Docs: <https://core.telegram.org/bots/api#getupdates>

#[cfg(test)]
mod tests;

use crate::backoff::Backoff;
use crate::stream::{self, UpdateStream};
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use tgram_api::methods::{self, GetUpdatesParams};
use tgram_core::{config::PollingConfig, traits::BotApi, types::Update};
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn};

/// Poller settings.
#[derive(Debug, Clone, Default)]
pub struct PollerConfig {
    /// Fetch parameters. `offset` is the starting cursor; `limit` also sizes
    /// the delivery channel.
    pub params: GetUpdatesParams,
    pub backoff: Backoff,
    /// Consecutive failures tolerated before the stream ends. `None` = forever.
    pub max_retries: Option<u32>,
    /// Call `deleteWebhook` once before the first fetch.
    pub clear_webhook: bool,
}

impl From<&PollingConfig> for PollerConfig {
    fn from(config: &PollingConfig) -> Self {
        Self {
            params: GetUpdatesParams {
                offset: config.offset,
                limit: config.limit,
                timeout: config.timeout,
                allowed_updates: config.allowed_updates.clone(),
            },
            backoff: Backoff::from_config(config),
            max_retries: (config.max_retries > 0).then_some(config.max_retries),
            clear_webhook: config.clear_webhook,
        }
    }
}

/// Read-only view of the poller's offset: the smallest update id not yet delivered.
#[derive(Debug, Clone)]
pub struct Cursor(Arc<AtomicI64>);

impl Cursor {
    pub fn get(&self) -> i64 {
        self.0.load(Ordering::Acquire)
    }

    fn set(&self, offset: i64) {
        self.0.store(offset, Ordering::Release);
    }
}

/// Pulls updates with `getUpdates` and forwards them in id order.
pub struct Poller {
    api: Arc<dyn BotApi>,
    config: PollerConfig,
    cursor: Cursor,
}

/// Outcome of forwarding one batch.
enum Delivery {
    Done,
    ReceiverGone,
    Shutdown,
}

impl Poller {
    /// `config.params.limit` is clamped to the server's 1..=100 range.
    pub fn new(api: Arc<dyn BotApi>, mut config: PollerConfig) -> Self {
        let limit = config.params.limit.clamp(1, methods::DEFAULT_LIMIT);
        if limit != config.params.limit {
            warn!(
                "getUpdates limit {} out of range, using {limit}",
                config.params.limit
            );
            config.params.limit = limit;
        }

        let cursor = Cursor(Arc::new(AtomicI64::new(config.params.offset)));
        Self {
            api,
            config,
            cursor,
        }
    }

    pub fn cursor(&self) -> Cursor {
        self.cursor.clone()
    }

    /// Spawn the polling loop and return the stream immediately.
    ///
    /// Must be called from within a tokio runtime.
    pub fn start(self) -> UpdateStream {
        let (tx, signal, stream) = stream::channel(self.config.params.limit as usize);

        info!(
            "Telegram long polling starting (offset {}, timeout {}s)",
            self.config.params.offset, self.config.params.timeout
        );

        tokio::spawn(self.run(tx, signal));
        stream
    }

    async fn run(self, tx: mpsc::Sender<Update>, mut signal: watch::Receiver<bool>) {
        if self.config.clear_webhook {
            match methods::delete_webhook(self.api.as_ref(), false).await {
                Ok(_) => info!("removed webhook before polling"),
                Err(e) => warn!("deleteWebhook failed, polling anyway: {e}"),
            }
        }

        let mut params = self.config.params.clone();
        let mut failures: u32 = 0;

        loop {
            if *signal.borrow() {
                break;
            }

            // A closed signal means every stream handle is gone.
            let fetched = tokio::select! {
                res = methods::get_updates(self.api.as_ref(), &params) => res,
                _ = signal.changed() => break,
            };

            match fetched {
                Ok(updates) => {
                    failures = 0;
                    match self.deliver(&tx, &mut params, updates, &mut signal).await {
                        Delivery::Done => {}
                        Delivery::ReceiverGone => {
                            info!("update stream dropped, stopping poll");
                            break;
                        }
                        Delivery::Shutdown => break,
                    }
                }
                Err(e) => {
                    failures = failures.saturating_add(1);
                    if self.config.max_retries.is_some_and(|max| failures > max) {
                        error!("telegram poll failed {failures} times in a row, giving up: {e}");
                        break;
                    }

                    let delay = e
                        .retry_after()
                        .unwrap_or_else(|| self.config.backoff.delay(failures));
                    error!(
                        "telegram poll error (attempt {failures}, retry in {:.1}s): {e}",
                        delay.as_secs_f64()
                    );

                    tokio::select! {
                        _ = tokio::time::sleep(delay) => {}
                        _ = signal.changed() => break,
                    }
                }
            }
        }

        info!("Telegram polling stopped at offset {}", params.offset);
    }

    /// Forward a batch in ascending id order, advancing the offset past each
    /// delivered update. Ids below the offset were already delivered.
    async fn deliver(
        &self,
        tx: &mpsc::Sender<Update>,
        params: &mut GetUpdatesParams,
        mut updates: Vec<Update>,
        signal: &mut watch::Receiver<bool>,
    ) -> Delivery {
        updates.sort_by_key(|u| u.update_id);

        for update in updates {
            if update.update_id < params.offset {
                debug!(
                    "skipping stale update {} (offset {})",
                    update.update_id, params.offset
                );
                continue;
            }

            let next = update.update_id + 1;
            debug!("telegram update {} ({})", update.update_id, update.kind.name());

            tokio::select! {
                sent = tx.send(update) => {
                    if sent.is_err() {
                        return Delivery::ReceiverGone;
                    }
                }
                _ = signal.changed() => return Delivery::Shutdown,
            }

            params.offset = next;
            self.cursor.set(next);
        }

        Delivery::Done
    }
}
