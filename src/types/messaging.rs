use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParticipantRole {
    Buyer,
    Seller,
}

/// The other party of a conversation, as reported by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct Participant {
    pub user_id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub role: Option<ParticipantRole>,
}

/// One entry of `GET /messaging/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationSummary {
    pub conversation_id: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub last_message_text: Option<String>,
    #[serde(default, deserialize_with = "super::deserialize_timestamp")]
    pub last_message_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// `GET /messaging/conversations/{id}` — summary plus product details.
#[derive(Debug, Clone, Deserialize)]
pub struct ConversationDetail {
    pub conversation_id: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub product_name: Option<String>,
    #[serde(default)]
    pub product_price: Option<f64>,
    #[serde(default)]
    pub subject: Option<String>,
    #[serde(default)]
    pub participants: Vec<Participant>,
}

/// One entry of `GET /messaging/conversations/{id}/messages`.
#[derive(Debug, Clone, Deserialize)]
pub struct Message {
    pub message_id: i64,
    pub conversation_id: i64,
    pub sender_id: i64,
    #[serde(default)]
    pub sender_username: String,
    pub message_text: String,
    #[serde(default, deserialize_with = "super::deserialize_timestamp")]
    pub sent_at: Option<NaiveDateTime>,
}

/// Body of `POST /messaging/conversations`.
#[derive(Debug, Clone, Serialize)]
pub struct CreateConversationRequest {
    pub product_id: i64,
    pub recipient_id: i64,
    pub subject: String,
    pub initial_message: String,
}

/// Response of `POST /messaging/conversations`.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateConversationResponse {
    pub conversation_id: i64,
}

/// Response of `GET /messaging/unread-count`. The backend reports failures
/// as `{count: 0, error: ...}` with a 200, so both fields are modeled.
#[derive(Debug, Clone, Deserialize)]
pub struct UnreadCountResponse {
    #[serde(default)]
    pub count: u32,
    #[serde(default)]
    pub error: Option<String>,
}
