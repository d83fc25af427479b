use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::{
    CallbackQuery, Chat, ChosenInlineResult, InlineQuery, Message, Poll, PollAnswer,
    PreCheckoutQuery, ShippingQuery, User,
};

/// One incoming update.
///
/// On the wire this is a flat object with `update_id` and at most one payload
/// field; here the payload is the `kind` enum.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "RawUpdate", into = "RawUpdate")]
pub struct Update {
    pub update_id: i64,
    pub kind: UpdateKind,
}

/// The payload of an update.
#[derive(Debug, Clone, PartialEq)]
pub enum UpdateKind {
    Message(Message),
    EditedMessage(Message),
    ChannelPost(Message),
    EditedChannelPost(Message),
    InlineQuery(InlineQuery),
    ChosenInlineResult(ChosenInlineResult),
    CallbackQuery(CallbackQuery),
    ShippingQuery(ShippingQuery),
    PreCheckoutQuery(PreCheckoutQuery),
    Poll(Poll),
    PollAnswer(PollAnswer),
    /// A payload this library does not model (a newer update type), kept
    /// verbatim as its wire field(s). Empty for an update with no payload.
    Unknown(Map<String, Value>),
}

impl UpdateKind {
    /// Wire field name, as used in `allowed_updates`.
    pub fn name(&self) -> &str {
        match self {
            Self::Message(_) => "message",
            Self::EditedMessage(_) => "edited_message",
            Self::ChannelPost(_) => "channel_post",
            Self::EditedChannelPost(_) => "edited_channel_post",
            Self::InlineQuery(_) => "inline_query",
            Self::ChosenInlineResult(_) => "chosen_inline_result",
            Self::CallbackQuery(_) => "callback_query",
            Self::ShippingQuery(_) => "shipping_query",
            Self::PreCheckoutQuery(_) => "pre_checkout_query",
            Self::Poll(_) => "poll",
            Self::PollAnswer(_) => "poll_answer",
            Self::Unknown(fields) => fields.keys().next().map_or("unknown", String::as_str),
        }
    }
}

impl Update {
    /// The message for any of the four message-bearing kinds.
    pub fn message(&self) -> Option<&Message> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => Some(m),
            _ => None,
        }
    }

    /// The user that caused this update, if any.
    pub fn sent_from(&self) -> Option<&User> {
        match &self.kind {
            UpdateKind::Message(m)
            | UpdateKind::EditedMessage(m)
            | UpdateKind::ChannelPost(m)
            | UpdateKind::EditedChannelPost(m) => m.from.as_ref(),
            UpdateKind::InlineQuery(q) => Some(&q.from),
            UpdateKind::ChosenInlineResult(r) => Some(&r.from),
            UpdateKind::CallbackQuery(q) => Some(&q.from),
            UpdateKind::ShippingQuery(q) => Some(&q.from),
            UpdateKind::PreCheckoutQuery(q) => Some(&q.from),
            UpdateKind::PollAnswer(a) => Some(&a.user),
            UpdateKind::Poll(_) | UpdateKind::Unknown(_) => None,
        }
    }

    /// The chat this update belongs to, if any.
    pub fn from_chat(&self) -> Option<&Chat> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => q.message.as_ref().map(|m| &m.chat),
            _ => self.message().map(|m| &m.chat),
        }
    }

    /// Callback data of a button press.
    pub fn callback_data(&self) -> Option<&str> {
        match &self.kind {
            UpdateKind::CallbackQuery(q) => q.data.as_deref(),
            _ => None,
        }
    }
}

/// Wire shape of an update.
#[derive(Default, Serialize, Deserialize)]
struct RawUpdate {
    update_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edited_message: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    channel_post: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    edited_channel_post: Option<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    inline_query: Option<InlineQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    chosen_inline_result: Option<ChosenInlineResult>,
    #[serde(skip_serializing_if = "Option::is_none")]
    callback_query: Option<CallbackQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    shipping_query: Option<ShippingQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pre_checkout_query: Option<PreCheckoutQuery>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll: Option<Poll>,
    #[serde(skip_serializing_if = "Option::is_none")]
    poll_answer: Option<PollAnswer>,
    #[serde(flatten)]
    rest: Map<String, Value>,
}

// First populated field wins, in wire order.
impl From<RawUpdate> for Update {
    fn from(raw: RawUpdate) -> Self {
        let kind = if let Some(m) = raw.message {
            UpdateKind::Message(m)
        } else if let Some(m) = raw.edited_message {
            UpdateKind::EditedMessage(m)
        } else if let Some(m) = raw.channel_post {
            UpdateKind::ChannelPost(m)
        } else if let Some(m) = raw.edited_channel_post {
            UpdateKind::EditedChannelPost(m)
        } else if let Some(q) = raw.inline_query {
            UpdateKind::InlineQuery(q)
        } else if let Some(r) = raw.chosen_inline_result {
            UpdateKind::ChosenInlineResult(r)
        } else if let Some(q) = raw.callback_query {
            UpdateKind::CallbackQuery(q)
        } else if let Some(q) = raw.shipping_query {
            UpdateKind::ShippingQuery(q)
        } else if let Some(q) = raw.pre_checkout_query {
            UpdateKind::PreCheckoutQuery(q)
        } else if let Some(p) = raw.poll {
            UpdateKind::Poll(p)
        } else if let Some(a) = raw.poll_answer {
            UpdateKind::PollAnswer(a)
        } else {
            UpdateKind::Unknown(raw.rest)
        };

        Self {
            update_id: raw.update_id,
            kind,
        }
    }
}

impl From<Update> for RawUpdate {
    fn from(update: Update) -> Self {
        let mut raw = RawUpdate {
            update_id: update.update_id,
            ..Default::default()
        };
        match update.kind {
            UpdateKind::Message(m) => raw.message = Some(m),
            UpdateKind::EditedMessage(m) => raw.edited_message = Some(m),
            UpdateKind::ChannelPost(m) => raw.channel_post = Some(m),
            UpdateKind::EditedChannelPost(m) => raw.edited_channel_post = Some(m),
            UpdateKind::InlineQuery(q) => raw.inline_query = Some(q),
            UpdateKind::ChosenInlineResult(r) => raw.chosen_inline_result = Some(r),
            UpdateKind::CallbackQuery(q) => raw.callback_query = Some(q),
            UpdateKind::ShippingQuery(q) => raw.shipping_query = Some(q),
            UpdateKind::PreCheckoutQuery(q) => raw.pre_checkout_query = Some(q),
            UpdateKind::Poll(p) => raw.poll = Some(p),
            UpdateKind::PollAnswer(a) => raw.poll_answer = Some(a),
            UpdateKind::Unknown(fields) => raw.rest = fields,
        }
        raw
    }
}
