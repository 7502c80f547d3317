use std::sync::OnceLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use shared_models::auth::{Role, User};
use shared_models::error::{ApiError, AppError};

pub const MIN_PASSWORD_LEN: usize = 6;

fn email_pattern() -> Option<&'static Regex> {
    static PATTERN: OnceLock<Option<Regex>> = OnceLock::new();
    PATTERN
        .get_or_init(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").ok())
        .as_ref()
}

pub fn validate_email(email: &str) -> Result<(), AuthError> {
    let email = email.trim();
    let valid = match email_pattern() {
        Some(pattern) => pattern.is_match(email),
        None => email.contains('@'),
    };
    if valid {
        Ok(())
    } else {
        Err(AuthError::ValidationError("Please enter a valid email address".to_string()))
    }
}

fn validate_password(password: &str) -> Result<(), AuthError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AuthError::ValidationError(format!(
            "Password must be at least {} characters",
            MIN_PASSWORD_LEN
        )));
    }
    Ok(())
}

// ==============================================================================
// REQUESTS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    pub email: String,
    pub password: String,
}

impl LoginCredentials {
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)?;
        if self.password.is_empty() {
            return Err(AuthError::ValidationError("Password is required".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub email: String,
    pub password: String,
    pub role: Role,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.name.trim().is_empty() {
            return Err(AuthError::ValidationError("Name is required".to_string()));
        }
        validate_email(&self.email)?;
        validate_password(&self.password)?;
        if self.role == Role::Admin {
            return Err(AuthError::ValidationError(
                "Accounts can only be registered as patient or doctor".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForgotPasswordRequest {
    pub email: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub token: String,
    pub password: String,
}

impl ResetPasswordRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        validate_email(&self.email)?;
        if self.token.trim().is_empty() {
            return Err(AuthError::ValidationError("Reset token is required".to_string()));
        }
        validate_password(&self.password)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangePasswordRequest {
    pub old_password: String,
    pub new_password: String,
}

impl ChangePasswordRequest {
    pub fn validate(&self) -> Result<(), AuthError> {
        if self.old_password.is_empty() {
            return Err(AuthError::ValidationError("Current password is required".to_string()));
        }
        validate_password(&self.new_password)?;
        if self.old_password == self.new_password {
            return Err(AuthError::ValidationError(
                "New password must differ from the current one".to_string(),
            ));
        }
        Ok(())
    }
}

// ==============================================================================
// RESPONSES
// ==============================================================================

/// A signed-in session as handed out by login endpoints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthSession {
    pub token: String,
    #[serde(default)]
    pub role: Option<Role>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub user: Option<User>,
}

impl AuthSession {
    /// Reads a login response, which carries the token either at the top
    /// level or inside `data`.
    pub fn from_response(value: &Value) -> Result<Self, AuthError> {
        let candidate = if value.get("token").is_some() {
            value
        } else {
            value.get("data").filter(|d| d.get("token").is_some()).ok_or(AuthError::MissingToken)?
        };

        let mut session: AuthSession =
            serde_json::from_value(candidate.clone()).map_err(|e| ApiError::Parse(e.to_string()))?;
        if session.token.trim().is_empty() {
            return Err(AuthError::MissingToken);
        }
        if session.role.is_none() {
            session.role = session.user.as_ref().map(|u| u.role);
        }
        Ok(session)
    }
}

/// Message of an acknowledgement, wherever the backend put it.
pub fn response_message(value: &Value) -> Option<String> {
    value
        .get("message")
        .or_else(|| value.get("data").and_then(|d| d.get("message")))
        .and_then(Value::as_str)
        .map(str::to_string)
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("{0}")]
    ValidationError(String),

    #[error("Login response did not include a token")]
    MissingToken,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::ValidationError(msg) => AppError::ValidationError(msg),
            AuthError::MissingToken => AppError::Upstream(err.to_string()),
            AuthError::Api(api) => api.into(),
        }
    }
}
