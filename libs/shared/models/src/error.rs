use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use thiserror::Error;

/// Failure of a call to the remote API, as seen by the client.
#[derive(Error, Debug, Clone)]
pub enum ApiError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("HTTP {status}: {message}")]
    Http {
        status: u16,
        message: String,
        body: Value,
    },

    #[error("Invalid response from server: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl ApiError {
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        ApiError::Http {
            status,
            message: message.into(),
            body: Value::Null,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Transport failures can be retried without changing the request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, ApiError::Network(_))
    }

    pub fn is_auth_failure(&self) -> bool {
        self.status() == Some(401)
    }

    pub fn user_message(&self) -> String {
        match self {
            ApiError::Network(_) => "Could not reach the server. Please try again.".to_string(),
            ApiError::Http { message, .. } => message.clone(),
            ApiError::Parse(_) => "Server error. Please try again later.".to_string(),
            ApiError::Validation(msg) => msg.clone(),
        }
    }
}

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not Found: {0}")]
    NotFound(String),

    #[error("Bad Request: {0}")]
    BadRequest(String),

    #[error("Internal Server Error: {0}")]
    Internal(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Upstream error: {0}")]
    Upstream(String),
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        let message = err.user_message();
        match err {
            ApiError::Network(_) | ApiError::Parse(_) => AppError::Upstream(message),
            ApiError::Validation(_) => AppError::ValidationError(message),
            ApiError::Http { status, .. } => match status {
                401 => AppError::Auth(message),
                403 => AppError::Forbidden(message),
                404 => AppError::NotFound(message),
                409 => AppError::Conflict(message),
                400..=499 => AppError::BadRequest(message),
                _ => AppError::Upstream(message),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Auth(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::ValidationError(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Upstream(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        tracing::error!("Error: {}: {}", status, message);

        let body = Json(json!({
            "success": false,
            "message": message
        }));

        (status, body).into_response()
    }
}
