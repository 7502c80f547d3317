use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use shared_models::auth::Role;
use shared_models::error::{ApiError, AppError};

// ==============================================================================
// PROFILE
// ==============================================================================

/// The signed-in user's profile as returned by `/users/me`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: Option<String>,
    pub username: Option<String>,
    pub email: Option<String>,
    pub role: Role,
    pub phone: Option<String>,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub specialty: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
}

impl ProfileUpdate {
    pub fn validate(&self) -> Result<(), PatientError> {
        let fields = [
            &self.name,
            &self.email,
            &self.phone,
            &self.specialty,
            &self.location,
            &self.bio,
        ];
        if fields.iter().all(|f| f.is_none()) {
            return Err(PatientError::ValidationError("Nothing to update".to_string()));
        }
        if self.name.as_deref().is_some_and(|n| n.trim().is_empty()) {
            return Err(PatientError::ValidationError("Name cannot be empty".to_string()));
        }
        if self.email.as_deref().is_some_and(|e| !e.contains('@')) {
            return Err(PatientError::ValidationError("Email address is not valid".to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UsernameUpdate {
    pub username: String,
}

impl UsernameUpdate {
    pub fn validate(&self) -> Result<(), PatientError> {
        let username = self.username.trim();
        if username.is_empty() {
            return Err(PatientError::ValidationError("Username cannot be empty".to_string()));
        }
        if username.chars().any(char::is_whitespace) {
            return Err(PatientError::ValidationError("Username cannot contain spaces".to_string()));
        }
        Ok(())
    }
}

/// Result of an avatar upload; the backend answers with the stored file name.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarUpload {
    pub profile_pic: Option<String>,
}

// ==============================================================================
// REVIEWS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    #[serde(alias = "_id")]
    pub id: String,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub rating: u8,
    #[serde(default)]
    pub text: String,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReview {
    pub doctor_id: String,
    pub rating: u8,
    pub text: String,
}

impl NewReview {
    pub fn validate(&self) -> Result<(), PatientError> {
        if self.doctor_id.trim().is_empty() {
            return Err(PatientError::ValidationError("A doctor is required".to_string()));
        }
        if !(1..=5).contains(&self.rating) {
            return Err(PatientError::ValidationError(
                "Rating must be between 1 and 5".to_string(),
            ));
        }
        if self.text.trim().is_empty() {
            return Err(PatientError::ValidationError("Review text cannot be empty".to_string()));
        }
        Ok(())
    }
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Medicine {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub dosage: String,
    #[serde(default)]
    pub notes: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PrescriptionContent {
    #[serde(default)]
    pub medicines: Vec<Medicine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Prescription {
    #[serde(alias = "_id")]
    pub id: String,
    pub doctor_id: Option<String>,
    pub patient_id: Option<String>,
    #[serde(default)]
    pub content: PrescriptionContent,
    pub pdf_link: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewPrescription {
    pub patient_id: String,
    pub content: PrescriptionContent,
}

impl NewPrescription {
    /// Drops blank medicine rows, then checks something is left to prescribe.
    pub fn sanitized(mut self) -> Result<Self, PatientError> {
        if self.patient_id.trim().is_empty() {
            return Err(PatientError::ValidationError("A patient is required".to_string()));
        }

        self.content.medicines.retain(|m| !m.name.trim().is_empty());
        if self.content.medicines.is_empty() {
            return Err(PatientError::ValidationError(
                "Add at least one medicine with a name".to_string(),
            ));
        }
        Ok(self)
    }
}

// ==============================================================================
// ERRORS
// ==============================================================================

#[derive(Error, Debug)]
pub enum PatientError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<PatientError> for AppError {
    fn from(err: PatientError) -> Self {
        match err {
            PatientError::ValidationError(msg) => AppError::ValidationError(msg),
            PatientError::Api(api) => api.into(),
        }
    }
}
