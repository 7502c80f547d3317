use std::fmt;

use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use doctor_cell::services::SlotOccupant;
use doctor_cell::time::{self, is_quarter_hour, parse_hhmm};
use shared_models::error::{ApiError, AppError};

// ==============================================================================
// CORE APPOINTMENT MODELS
// ==============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Appointment {
    #[serde(alias = "_id")]
    pub id: String,
    pub doctor_id: String,
    pub patient_id: String,
    #[serde(with = "time::ymd")]
    pub date: NaiveDate,
    #[serde(with = "time::hhmm")]
    pub time: NaiveTime,
    pub status: AppointmentStatus,
}

impl SlotOccupant for Appointment {
    fn doctor_id(&self) -> &str {
        &self.doctor_id
    }

    fn date(&self) -> NaiveDate {
        self.date
    }

    fn time(&self) -> Option<NaiveTime> {
        Some(self.time)
    }

    fn is_active(&self) -> bool {
        self.status != AppointmentStatus::Cancelled
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum AppointmentStatus {
    Pending,
    Confirmed,
    Cancelled,
    Completed,
}

impl AppointmentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, AppointmentStatus::Cancelled | AppointmentStatus::Completed)
    }
}

impl fmt::Display for AppointmentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppointmentStatus::Pending => write!(f, "pending"),
            AppointmentStatus::Confirmed => write!(f, "confirmed"),
            AppointmentStatus::Cancelled => write!(f, "cancelled"),
            AppointmentStatus::Completed => write!(f, "completed"),
        }
    }
}

// ==============================================================================
// REQUEST MODELS
// ==============================================================================

/// Body of `POST /appointments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BookAppointmentRequest {
    pub doctor_id: String,
    #[serde(with = "time::ymd")]
    pub date: NaiveDate,
    #[serde(with = "time::hhmm")]
    pub time: NaiveTime,
}

/// Booking request as the portal receives it; the time stays raw until validated.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PortalBookingRequest {
    pub doctor_id: String,
    pub date: NaiveDate,
    pub time: String,
}

impl PortalBookingRequest {
    /// The requested time, if it is a quarter-hour "HH:MM".
    pub fn parsed_time(&self) -> Result<NaiveTime, BookingError> {
        let time = parse_hhmm(&self.time)
            .ok_or_else(|| BookingError::ValidationError(format!("Invalid time format: {}", self.time)))?;
        if !is_quarter_hour(time) {
            return Err(BookingError::ValidationError(format!(
                "Appointments start on the quarter hour, got {}",
                self.time
            )));
        }
        Ok(time)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: AppointmentStatus,
}

/// Doctor's working-hours update, `PATCH /appointments/working-hours`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingHoursUpdate {
    pub working_hours_start: String,
    pub working_hours_end: String,
    pub working_days: Vec<u8>,
}

impl WorkingHoursUpdate {
    pub fn validate(&self) -> Result<(), AppointmentError> {
        let start = parse_hhmm(&self.working_hours_start).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid start time: {}", self.working_hours_start))
        })?;
        let end = parse_hhmm(&self.working_hours_end).ok_or_else(|| {
            AppointmentError::ValidationError(format!("Invalid end time: {}", self.working_hours_end))
        })?;

        if start >= end {
            return Err(AppointmentError::ValidationError(
                "Working hours must end after they start".to_string(),
            ));
        }
        if self.working_days.is_empty() {
            return Err(AppointmentError::ValidationError(
                "Select at least one working day".to_string(),
            ));
        }
        if let Some(day) = self.working_days.iter().find(|d| **d > 6) {
            return Err(AppointmentError::ValidationError(format!(
                "Working day {} is out of range (0 = Sunday .. 6 = Saturday)",
                day
            )));
        }
        Ok(())
    }
}

// ==============================================================================
// BOOKING SELECTION
// ==============================================================================

/// What the user has picked so far in a booking session.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingSelection {
    pub doctor_id: Option<String>,
    pub date: Option<NaiveDate>,
    #[serde(serialize_with = "serialize_optional_time")]
    pub time: Option<NaiveTime>,
}

impl BookingSelection {
    pub fn is_complete(&self) -> bool {
        self.doctor_id.is_some() && self.date.is_some() && self.time.is_some()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn to_request(&self) -> Option<BookAppointmentRequest> {
        Some(BookAppointmentRequest {
            doctor_id: self.doctor_id.clone()?,
            date: self.date?,
            time: self.time?,
        })
    }
}

fn serialize_optional_time<S: serde::Serializer>(time: &Option<NaiveTime>, serializer: S) -> Result<S::Ok, S::Error> {
    match time {
        Some(t) => serializer.serialize_some(&time::format_hhmm(*t)),
        None => serializer.serialize_none(),
    }
}

// ==============================================================================
// ERROR MODELS
// ==============================================================================

#[derive(Debug, Clone, Error)]
pub enum AppointmentError {
    #[error("Appointment not found")]
    NotFound,

    #[error("Invalid status transition from {from} to {to}")]
    InvalidStatusTransition {
        from: AppointmentStatus,
        to: AppointmentStatus,
    },

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<AppointmentError> for AppError {
    fn from(err: AppointmentError) -> Self {
        match err {
            AppointmentError::NotFound => AppError::NotFound(err.to_string()),
            AppointmentError::InvalidStatusTransition { .. } => AppError::Conflict(err.to_string()),
            AppointmentError::ValidationError(msg) => AppError::ValidationError(msg),
            AppointmentError::Api(api) => AppError::from(api),
        }
    }
}

/// Reasons a booking session refuses a transition.
#[derive(Debug, Clone, Error)]
pub enum BookingError {
    #[error("A booking is already being submitted")]
    SubmissionInFlight,

    #[error("Choose a doctor first")]
    NoDoctorSelected,

    #[error("Choose a date first")]
    NoDateSelected,

    #[error("Availability for this date has not been loaded")]
    AvailabilityNotLoaded,

    #[error("Choose a doctor, date and time before booking")]
    IncompleteSelection,

    #[error("Availability is out of date; reload the slots")]
    StaleAvailability,

    #[error("{0}")]
    ValidationError(String),

    #[error("The {} slot is not available", .0.format("%H:%M"))]
    SlotUnavailable(NaiveTime),

    #[error("No submission is in progress")]
    NotSubmitting,

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::SubmissionInFlight | BookingError::StaleAvailability | BookingError::SlotUnavailable(_) => {
                AppError::Conflict(err.to_string())
            }
            BookingError::ValidationError(msg) => AppError::ValidationError(msg),
            BookingError::Api(api) => AppError::from(api),
            BookingError::NoDoctorSelected
            | BookingError::NoDateSelected
            | BookingError::AvailabilityNotLoaded
            | BookingError::IncompleteSelection
            | BookingError::NotSubmitting => AppError::BadRequest(err.to_string()),
        }
    }
}
