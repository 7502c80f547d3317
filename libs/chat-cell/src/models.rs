use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use notification_cell::ChatPush;
use shared_models::error::{ApiError, AppError};

// ==============================================================================
// MESSAGES
// ==============================================================================

/// One chat message as the backend stores it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    #[serde(alias = "_id", default)]
    pub id: Option<String>,
    #[serde(alias = "from")]
    pub sender_id: String,
    #[serde(alias = "to")]
    pub receiver_id: String,
    #[serde(default)]
    pub message: String,
    #[serde(alias = "timestamp", default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl ChatMessage {
    pub fn is_between(&self, a: &str, b: &str) -> bool {
        (self.sender_id == a && self.receiver_id == b) || (self.sender_id == b && self.receiver_id == a)
    }
}

impl TryFrom<&ChatPush> for ChatMessage {
    type Error = ChatError;

    fn try_from(push: &ChatPush) -> Result<Self, Self::Error> {
        match (&push.from, &push.to) {
            (Some(from), Some(to)) => Ok(ChatMessage {
                id: push.id.clone(),
                sender_id: from.clone(),
                receiver_id: to.clone(),
                message: push.message.clone().unwrap_or_default(),
                created_at: push.created_at,
            }),
            _ => Err(ChatError::IncompletePush),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SendMessageRequest {
    pub to: String,
    pub message: String,
}

impl SendMessageRequest {
    pub fn validate(&self) -> Result<(), ChatError> {
        if self.to.trim().is_empty() {
            return Err(ChatError::NoRecipient);
        }
        if self.message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    Pending,
    Sent,
    Failed,
}

/// A message in a thread, tagged with a local id so optimistic entries can
/// be confirmed or failed later.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatEntry {
    pub local_id: Uuid,
    pub status: DeliveryStatus,
    #[serde(flatten)]
    pub message: ChatMessage,
}

// ==============================================================================
// CONVERSATIONS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LastMessage {
    #[serde(default)]
    pub message: String,
    pub timestamp: Option<DateTime<Utc>>,
}

/// Conversation partner as listed in the chat sidebar.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    #[serde(alias = "_id")]
    pub user_id: String,
    #[serde(default)]
    pub name: String,
    pub specialty: Option<String>,
    pub profile_pic: Option<String>,
    pub last_message: Option<LastMessage>,
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("A recipient is required")]
    NoRecipient,

    #[error("Chat push is missing its sender or recipient")]
    IncompletePush,

    #[error("No pending message with local id {0}")]
    UnknownLocalId(Uuid),

    #[error("Conversations are only available to patients and doctors")]
    NoConversations,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::EmptyMessage | ChatError::NoRecipient => AppError::ValidationError(err.to_string()),
            ChatError::IncompletePush | ChatError::UnknownLocalId(_) => AppError::BadRequest(err.to_string()),
            ChatError::NoConversations => AppError::Forbidden(err.to_string()),
            ChatError::Api(api) => api.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn message_accepts_both_wire_shapes() {
        let stored: ChatMessage = serde_json::from_value(json!({
            "_id": "m1",
            "senderId": "p1",
            "receiverId": "d1",
            "message": "Hello",
            "createdAt": "2024-06-03T09:00:00Z"
        }))
        .unwrap();
        let relayed: ChatMessage = serde_json::from_value(json!({
            "from": "d1",
            "to": "p1",
            "message": "Hi",
            "timestamp": "2024-06-03T09:01:00Z"
        }))
        .unwrap();

        assert_eq!(stored.id.as_deref(), Some("m1"));
        assert!(stored.is_between("d1", "p1"));
        assert_eq!(relayed.sender_id, "d1");
        assert!(relayed.created_at > stored.created_at);
    }

    #[test]
    fn blank_messages_are_rejected() {
        let request = SendMessageRequest {
            to: "d1".into(),
            message: "   ".into(),
        };
        assert!(matches!(request.validate(), Err(ChatError::EmptyMessage)));

        let request = SendMessageRequest {
            to: "".into(),
            message: "hi".into(),
        };
        assert!(matches!(request.validate(), Err(ChatError::NoRecipient)));
    }

    #[test]
    fn push_without_recipient_is_incomplete() {
        let push = ChatPush {
            from: Some("p1".into()),
            message: Some("hi".into()),
            ..Default::default()
        };
        assert!(matches!(ChatMessage::try_from(&push), Err(ChatError::IncompletePush)));
    }
}
