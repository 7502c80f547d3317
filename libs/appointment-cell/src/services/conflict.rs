use serde::Serialize;
use tracing::debug;

use shared_models::ApiError;

/// How a failed booking submission is presented to the user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConflictCategory {
    SlotTaken,
    OutOfHours,
    DayClosed,
    ValidationError,
    NetworkError,
    AuthenticationRequired,
    ServerError,
    Failed,
}

/// What the booking session does next.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Re-derive availability, then prompt for another time.
    Rederive,
    /// Re-fetch doctor metadata, then re-derive.
    RefreshDoctor,
    /// Keep the selection; the same request may be sent again.
    Retry,
    /// Hand over to the login flow.
    Reauthenticate,
    /// Pick a different time.
    Reselect,
    None,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConflictFeedback {
    pub category: ConflictCategory,
    pub recovery: Recovery,
    pub message: String,
    #[serde(skip)]
    pub status: Option<u16>,
}

impl ConflictFeedback {
    fn new(category: ConflictCategory, recovery: Recovery, message: impl Into<String>, status: Option<u16>) -> Self {
        Self {
            category,
            recovery,
            message: message.into(),
            status,
        }
    }

    /// Only an authentication failure ends the booking session.
    pub fn is_fatal(&self) -> bool {
        self.category == ConflictCategory::AuthenticationRequired
    }

    pub fn status_code(&self) -> u16 {
        match self.category {
            ConflictCategory::SlotTaken | ConflictCategory::OutOfHours | ConflictCategory::DayClosed => 409,
            ConflictCategory::ValidationError => 400,
            ConflictCategory::NetworkError => 503,
            ConflictCategory::AuthenticationRequired => 401,
            ConflictCategory::ServerError => 502,
            ConflictCategory::Failed => self.status.filter(|s| (400..500).contains(s)).unwrap_or(400),
        }
    }
}

pub struct ConflictFeedbackHandler;

impl ConflictFeedbackHandler {
    pub fn classify(error: &ApiError) -> ConflictFeedback {
        let feedback = match error {
            ApiError::Network(_) => ConflictFeedback::new(
                ConflictCategory::NetworkError,
                Recovery::Retry,
                "Could not reach the server. Your selection is kept; please try again.",
                None,
            ),
            ApiError::Parse(_) => ConflictFeedback::new(
                ConflictCategory::ServerError,
                Recovery::None,
                "Server error. Please try again later.",
                None,
            ),
            ApiError::Validation(message) => ConflictFeedback::new(
                ConflictCategory::ValidationError,
                Recovery::Reselect,
                message.clone(),
                None,
            ),
            ApiError::Http { status, message, .. } => Self::classify_http(*status, message),
        };

        debug!("Classified booking failure as {:?}", feedback.category);
        feedback
    }

    fn classify_http(status: u16, message: &str) -> ConflictFeedback {
        match status {
            401 => {
                return ConflictFeedback::new(
                    ConflictCategory::AuthenticationRequired,
                    Recovery::Reauthenticate,
                    "Your session has expired. Please sign in again.",
                    Some(status),
                )
            }
            500..=599 => {
                return ConflictFeedback::new(
                    ConflictCategory::ServerError,
                    Recovery::Retry,
                    "Server error. Please try again later.",
                    Some(status),
                )
            }
            _ => {}
        }

        // Keywords only describe client-side rejections and declined envelopes.
        if let Some(category) = Self::category_from_message(message) {
            let recovery = match category {
                ConflictCategory::SlotTaken => Recovery::Rederive,
                _ => Recovery::RefreshDoctor,
            };
            return ConflictFeedback::new(category, recovery, Self::message_for(category, message), Some(status));
        }

        match status {
            409 => ConflictFeedback::new(
                ConflictCategory::SlotTaken,
                Recovery::Rederive,
                Self::message_for(ConflictCategory::SlotTaken, message),
                Some(status),
            ),
            404 => ConflictFeedback::new(ConflictCategory::Failed, Recovery::RefreshDoctor, message, Some(status)),
            400 | 422 => ConflictFeedback::new(ConflictCategory::ValidationError, Recovery::Reselect, message, Some(status)),
            _ => ConflictFeedback::new(ConflictCategory::Failed, Recovery::None, message, Some(status)),
        }
    }

    fn category_from_message(message: &str) -> Option<ConflictCategory> {
        let message = message.to_lowercase();

        if message.contains("working hours") || message.contains("outside") {
            Some(ConflictCategory::OutOfHours)
        } else if message.contains("working day") || message.contains("not available on") {
            Some(ConflictCategory::DayClosed)
        } else if message.contains("already booked") || message.contains("taken") || message.contains("not available") {
            Some(ConflictCategory::SlotTaken)
        } else {
            None
        }
    }

    fn message_for(category: ConflictCategory, backend_message: &str) -> String {
        match category {
            ConflictCategory::SlotTaken => {
                "This time slot has just been booked. Please choose another time.".to_string()
            }
            ConflictCategory::OutOfHours => {
                "The doctor's working hours have changed. Please choose a new time.".to_string()
            }
            ConflictCategory::DayClosed => "The doctor is not available on this day.".to_string(),
            _ => backend_message.to_string(),
        }
    }
}
