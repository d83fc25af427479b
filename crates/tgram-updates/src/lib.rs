//! # tgram-updates
//!
//! Update ingestion. Pick one mode per bot:
//!
//! - [`Poller`] calls `getUpdates` in a loop, advancing the offset cursor.
//! - [`WebhookReceiver`] registers a webhook and serves the pushed updates.
//!
//! Both hand back an [`UpdateStream`]. Updates arrive on it until the producer
//! is shut down, after which `recv()` drains what is buffered and then
//! returns `None`.

pub mod backoff;
pub mod poller;
pub mod stream;
pub mod webhook;

pub use backoff::Backoff;
pub use poller::{Cursor, Poller, PollerConfig};
pub use stream::{Shutdown, UpdateStream};
pub use webhook::WebhookReceiver;
