use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::PushError;

// ==============================================================================
// PUSH EVENTS
// ==============================================================================

/// Server-initiated event, as relayed by the backend's realtime channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "kebab-case")]
pub enum PushEvent {
    NewChatMessage(ChatPush),
    NewAppointment(AppointmentPush),
    AppointmentUpdated(AppointmentPush),
}

impl PushEvent {
    pub const EVENT_NAMES: [&'static str; 3] = ["new-chat-message", "new-appointment", "appointment-updated"];

    pub fn name(&self) -> &'static str {
        match self {
            PushEvent::NewChatMessage(_) => "new-chat-message",
            PushEvent::NewAppointment(_) => "new-appointment",
            PushEvent::AppointmentUpdated(_) => "appointment-updated",
        }
    }

    /// Parse an ingested payload, telling unknown event names apart from bad data.
    pub fn from_value(value: Value) -> Result<Self, PushError> {
        if let Some(name) = value.get("event").and_then(Value::as_str) {
            if !Self::EVENT_NAMES.contains(&name) {
                return Err(PushError::UnknownEvent(name.to_string()));
            }
        }
        Ok(serde_json::from_value(value)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatPush {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub from: Option<String>,
    pub to: Option<String>,
    pub message: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AppointmentPush {
    #[serde(alias = "_id")]
    pub id: Option<String>,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub date: Option<NaiveDate>,
    pub time: Option<String>,
    pub status: Option<String>,
}

/// What a view has to re-fetch after a push event. Targets with no user
/// apply to every user.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "target", rename_all = "snake_case")]
pub enum Refresh {
    Appointments {
        user_id: Option<String>,
    },
    Slots {
        doctor_id: String,
        date: Option<NaiveDate>,
    },
    Conversation {
        user_id: Option<String>,
        peer_id: Option<String>,
    },
    Notifications {
        user_id: Option<String>,
    },
}

impl Refresh {
    /// Whether a view owned by `user_id` has to act on this refresh.
    pub fn concerns(&self, user_id: &str) -> bool {
        let target = match self {
            Refresh::Appointments { user_id } => user_id,
            Refresh::Conversation { user_id, .. } => user_id,
            Refresh::Notifications { user_id } => user_id,
            Refresh::Slots { .. } => return true,
        };
        target.as_deref().map_or(true, |id| id == user_id)
    }

    /// Refreshes that cover everything, used after missed events.
    pub fn resync() -> Vec<Refresh> {
        vec![
            Refresh::Appointments { user_id: None },
            Refresh::Conversation {
                user_id: None,
                peer_id: None,
            },
            Refresh::Notifications { user_id: None },
        ]
    }
}

// ==============================================================================
// NOTIFICATION MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Notification {
    #[serde(alias = "_id")]
    pub id: String,
    pub user_id: Option<String>,
    #[serde(default)]
    pub message: String,
    #[serde(rename = "type")]
    pub kind: Option<String>,
    #[serde(default)]
    pub read: bool,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationFeed {
    pub notifications: Vec<Notification>,
    pub unread_count: usize,
}

impl NotificationFeed {
    pub fn new(notifications: Vec<Notification>) -> Self {
        let unread_count = notifications.iter().filter(|n| !n.read).count();
        Self {
            notifications,
            unread_count,
        }
    }
}

/// Outbound SMS as logged by the backend (admin console).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SmsLog {
    #[serde(alias = "_id")]
    pub id: String,
    pub to: Option<String>,
    #[serde(default)]
    pub message: String,
    pub status: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}
