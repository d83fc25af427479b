//! Bot API objects carried by updates.
//!
//! Only the fields ingestion needs are modelled; `Message` keeps everything
//! else in `extra` so nothing is lost when an update is re-serialized.
//! Docs: <https://core.telegram.org/bots/api#available-types>

mod envelope;
mod message;
mod payments;
mod poll;
mod query;
mod update;
mod user;


pub use envelope::*;
pub use message::*;
pub use payments::*;
pub use poll::*;
pub use query::*;
pub use update::*;
pub use user::*;
