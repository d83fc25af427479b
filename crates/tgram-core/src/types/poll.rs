use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::User;

/// One answer option in a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollOption {
    pub text: String,
    pub voter_count: i64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Current state of a poll.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poll {
    pub id: String,
    pub question: String,
    pub options: Vec<PollOption>,
    pub total_voter_count: i64,
    pub is_closed: bool,
    pub is_anonymous: bool,
    /// "regular" or "quiz".
    #[serde(rename = "type")]
    pub kind: String,
    pub allows_multiple_answers: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub correct_option_id: Option<i64>,
    /// Explanation, close date and other quiz fields.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A user's answer in a non-anonymous poll. Empty `option_ids` = vote retracted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PollAnswer {
    pub poll_id: String,
    pub user: User,
    pub option_ids: Vec<i64>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}
