use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{Chat, User};

/// A message, edited message, or channel post.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub message_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<User>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_chat: Option<Chat>,
    /// Unix timestamp.
    pub date: i64,
    pub chat: Chat,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reply_to_message: Option<Box<Message>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub edit_date: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entities: Option<Vec<MessageEntity>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub caption: Option<String>,
    /// Media, service fields and anything else not modelled above.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A special entity in a text message: hashtag, command, URL, ...
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageEntity {
    #[serde(rename = "type")]
    pub kind: String,
    /// Offset in UTF-16 code units.
    pub offset: i64,
    pub length: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl MessageEntity {
    pub fn is_command(&self) -> bool {
        self.kind == "bot_command"
    }
}

/// A point on the map.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub longitude: f64,
    pub latitude: f64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Message {
    /// Send time as a UTC timestamp.
    pub fn time(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp(self.date, 0)
    }

    /// The leading `bot_command` entity, if the text starts with a command.
    fn command_entity(&self) -> Option<&MessageEntity> {
        self.entities
            .as_ref()?
            .first()
            .filter(|e| e.offset == 0 && e.is_command())
    }

    /// Whether the message text starts with a bot command.
    pub fn is_command(&self) -> bool {
        self.command_entity().is_some()
    }

    /// Command without the leading `/`, including any `@botname` suffix.
    pub fn command_with_at(&self) -> Option<&str> {
        let entity = self.command_entity()?;
        let end = usize::try_from(entity.length).ok()?;
        self.text.as_deref()?.get(1..end)
    }

    /// Command without the leading `/` and without the `@botname` suffix.
    pub fn command(&self) -> Option<&str> {
        self.command_with_at()
            .map(|cmd| cmd.split_once('@').map_or(cmd, |(name, _)| name))
    }

    /// Text after the command, with leading whitespace removed.
    pub fn command_arguments(&self) -> Option<&str> {
        let entity = self.command_entity()?;
        let end = usize::try_from(entity.length).ok()?;
        let text = self.text.as_deref()?;
        Some(text.get(end..).unwrap_or("").trim_start())
    }
}
