use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use auth_cell::{validate_email, AuthError, MIN_PASSWORD_LEN};
use doctor_cell::models::Doctor;
use shared_models::error::{ApiError, AppError};

/// Whether the console has been bootstrapped with an admin account.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatus {
    pub admin_exists: bool,
}

impl AdminStatus {
    /// The flag sits at the top level or inside `data`.
    pub fn from_response(value: &Value) -> Result<Self, ApiError> {
        let flag = value
            .get("adminExists")
            .or_else(|| value.get("data").and_then(|d| d.get("adminExists")))
            .and_then(Value::as_bool)
            .ok_or_else(|| ApiError::Parse("Admin check response had no adminExists flag".to_string()))?;
        Ok(Self { admin_exists: flag })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminSetup {
    pub email: String,
    pub password: String,
    #[serde(default)]
    pub confirm_password: Option<String>,
}

impl AdminSetup {
    pub fn validate(&self) -> Result<(), AdminError> {
        validate_email(&self.email)?;
        if self.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(AdminError::ValidationError(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self
            .confirm_password
            .as_deref()
            .is_some_and(|confirm| confirm != self.password)
        {
            return Err(AdminError::ValidationError("Passwords do not match".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApprovalFilter {
    Pending,
    Approved,
    #[default]
    All,
}

impl ApprovalFilter {
    pub fn matches(&self, doctor: &Doctor) -> bool {
        let approved = doctor.is_approved.unwrap_or(false);
        match self {
            ApprovalFilter::Pending => !approved,
            ApprovalFilter::Approved => approved,
            ApprovalFilter::All => true,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DoctorListQuery {
    #[serde(default)]
    pub status: ApprovalFilter,
}

#[derive(Error, Debug)]
pub enum AdminError {
    #[error("{0}")]
    ValidationError(String),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<AdminError> for AppError {
    fn from(err: AdminError) -> Self {
        match err {
            AdminError::ValidationError(msg) => AppError::ValidationError(msg),
            AdminError::Auth(auth) => auth.into(),
            AdminError::Api(api) => api.into(),
        }
    }
}
