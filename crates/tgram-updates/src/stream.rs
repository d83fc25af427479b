//! The consumer-side handle shared by both ingestion modes.

use std::sync::Arc;
use tgram_core::types::Update;
use tokio::sync::{mpsc, watch};

/// Stops an ingestion session. Cloneable, so it can live on another task.
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
}

impl Shutdown {
    fn new() -> (Self, watch::Receiver<bool>) {
        let (tx, rx) = watch::channel(false);
        (Self { tx: Arc::new(tx) }, rx)
    }

    /// Ask the producer to stop. Idempotent.
    pub fn trigger(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

/// Read side of the delivery channel.
///
/// Intended for a single consumer: concurrent readers through a shared
/// handle would split the stream between them.
#[derive(Debug)]
pub struct UpdateStream {
    rx: mpsc::Receiver<Update>,
    shutdown: Shutdown,
}

impl UpdateStream {
    /// Next update, or `None` once the producer has stopped and the buffer is empty.
    pub async fn recv(&mut self) -> Option<Update> {
        self.rx.recv().await
    }

    /// Next buffered update without waiting.
    pub fn try_recv(&mut self) -> Option<Update> {
        self.rx.try_recv().ok()
    }

    /// Discard everything currently buffered. Returns how many updates were dropped.
    pub fn clear(&mut self) -> usize {
        let mut dropped = 0;
        while self.rx.try_recv().is_ok() {
            dropped += 1;
        }
        dropped
    }

    /// Stop the producer. Buffered updates stay readable.
    pub fn shutdown(&self) {
        self.shutdown.trigger();
    }

    /// A handle that stops the producer from elsewhere.
    pub fn stopper(&self) -> Shutdown {
        self.shutdown.clone()
    }
}

/// Create a delivery channel with `capacity` slots.
///
/// Returns the producer's sender and shutdown signal alongside the consumer
/// handle. The channel closes when every sender is dropped.
pub(crate) fn channel(
    capacity: usize,
) -> (mpsc::Sender<Update>, watch::Receiver<bool>, UpdateStream) {
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let (shutdown, signal) = Shutdown::new();
    (tx, signal, UpdateStream { rx, shutdown })
}
