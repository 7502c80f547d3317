use chrono::{NaiveDate, NaiveTime};
use serde::{Deserialize, Serialize};

// ==============================================================================
// DOCTOR DIRECTORY MODELS
// ==============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Doctor {
    #[serde(alias = "_id")]
    pub id: String,
    pub name: String,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub bio: Option<String>,
    pub profile_pic: Option<String>,
    pub working_hours_start: Option<String>,
    pub working_hours_end: Option<String>,
    pub working_days: Option<Vec<u8>>,
    pub is_approved: Option<bool>,
}

impl Doctor {
    pub fn schedule(&self) -> WorkingSchedule {
        WorkingSchedule {
            doctor_id: self.id.clone(),
            hours_start: self.working_hours_start.clone(),
            hours_end: self.working_hours_end.clone(),
            working_days: self.working_days.clone(),
        }
    }
}

/// Raw working-hours configuration, exactly as the backend reports it.
///
/// Hours stay as "HH:MM" strings so the deriver can tell missing data from
/// malformed data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WorkingSchedule {
    pub doctor_id: String,
    pub hours_start: Option<String>,
    pub hours_end: Option<String>,
    pub working_days: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DoctorSearchFilters {
    pub q: Option<String>,
    pub specialty: Option<String>,
    pub location: Option<String>,
    pub available_date: Option<NaiveDate>,
    pub page: Option<u32>,
    pub limit: Option<u32>,
}

impl DoctorSearchFilters {
    /// Query string with empty values left out, including the leading `?`.
    pub fn to_query_string(&self) -> String {
        let mut params: Vec<(&str, String)> = Vec::new();

        let mut push_text = |key: &'static str, value: &Option<String>| {
            if let Some(v) = value.as_deref().map(str::trim).filter(|v| !v.is_empty()) {
                params.push((key, v.to_string()));
            }
        };
        push_text("q", &self.q);
        push_text("specialty", &self.specialty);
        push_text("location", &self.location);

        if let Some(date) = self.available_date {
            params.push(("availableDate", date.format("%Y-%m-%d").to_string()));
        }
        if let Some(page) = self.page {
            params.push(("page", page.to_string()));
        }
        if let Some(limit) = self.limit {
            params.push(("limit", limit.to_string()));
        }

        if params.is_empty() {
            return String::new();
        }

        let joined = params
            .iter()
            .map(|(k, v)| format!("{}={}", k, urlencoding::encode(v)))
            .collect::<Vec<_>>()
            .join("&");
        format!("?{}", joined)
    }
}

/// `GET /doctors` answers either with a bare list or with a paged object.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum DoctorListing {
    Paged {
        doctors: Vec<Doctor>,
        total: Option<u64>,
        page: Option<u32>,
    },
    Plain(Vec<Doctor>),
}

impl DoctorListing {
    pub fn into_doctors(self) -> Vec<Doctor> {
        match self {
            DoctorListing::Paged { doctors, .. } => doctors,
            DoctorListing::Plain(doctors) => doctors,
        }
    }
}

// ==============================================================================
// SLOT MODELS
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Slot {
    #[serde(with = "crate::time::hhmm")]
    pub time: NaiveTime,
    pub available: bool,
}

impl Slot {
    pub fn new(time: NaiveTime, available: bool) -> Self {
        Self { time, available }
    }
}

/// Result of deriving the bookable slots of one doctor on one date.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Derivation {
    Open { slots: Vec<Slot> },
    /// The date's weekday is not one of the doctor's working days.
    DayClosed,
    /// Working hours are unparseable or not an increasing range.
    InvalidHours { start: String, end: String },
    /// The doctor has no working-hours data at all.
    NoSchedule,
}

impl Derivation {
    pub fn slots(&self) -> &[Slot] {
        match self {
            Derivation::Open { slots } => slots,
            _ => &[],
        }
    }

    pub fn is_open(&self) -> bool {
        matches!(self, Derivation::Open { .. })
    }

    pub fn is_available(&self, time: NaiveTime) -> bool {
        self.slots().iter().any(|s| s.time == time && s.available)
    }

    pub fn user_message(&self) -> Option<String> {
        match self {
            Derivation::Open { slots } if slots.iter().all(|s| !s.available) => {
                Some("All slots are booked for this day. Please choose another date.".to_string())
            }
            Derivation::Open { .. } => None,
            Derivation::DayClosed => Some("The doctor is not available on this day.".to_string()),
            Derivation::InvalidHours { .. } => Some(
                "This doctor's working hours are misconfigured. Please choose another doctor.".to_string(),
            ),
            Derivation::NoSchedule => Some(
                "This doctor has not published working hours. Please choose another doctor or date.".to_string(),
            ),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: String,
    pub end: String,
}

/// Payload of `GET /appointments/available-slots/:doctorId?date=`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableSlotsResponse {
    #[serde(default)]
    pub slots: Vec<Slot>,
    pub working_hours: Option<WorkingHours>,
    pub working_days: Option<Vec<u8>>,
}

impl AvailableSlotsResponse {
    /// Working schedule as reported alongside the slots, if the backend sent it.
    pub fn schedule(&self, doctor_id: &str) -> Option<WorkingSchedule> {
        let hours = self.working_hours.as_ref()?;
        Some(WorkingSchedule {
            doctor_id: doctor_id.to_string(),
            hours_start: Some(hours.start.clone()),
            hours_end: Some(hours.end.clone()),
            working_days: self.working_days.clone(),
        })
    }
}
