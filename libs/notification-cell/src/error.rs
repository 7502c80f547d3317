use thiserror::Error;

use shared_models::error::AppError;

#[derive(Error, Debug)]
pub enum PushError {
    #[error("Unknown push event: {0}")]
    UnknownEvent(String),

    #[error("Malformed push payload: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<PushError> for AppError {
    fn from(err: PushError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
