use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{NaiveDate, NaiveTime};
use serde::Serialize;
use tracing::{debug, info, warn};

use doctor_cell::models::{Derivation, Doctor};
use doctor_cell::services::{AvailabilityDeriver, AvailabilityService, DoctorService};
use doctor_cell::time::is_quarter_hour;
use notification_cell::{Refresh, RefreshSink};
use shared_config::PortalConfig;
use shared_models::ApiError;

use crate::models::{Appointment, BookAppointmentRequest, BookingError, BookingSelection};
use crate::services::appointment::AppointmentService;
use crate::services::conflict::{ConflictFeedback, ConflictFeedbackHandler, Recovery};

// ==============================================================================
// BOOKING SESSION STATE
// ==============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingState {
    Empty,
    DoctorChosen,
    DateChosen,
    TimeChosen,
    Submitting,
    Confirmed,
    Rejected,
}

#[derive(Debug, Clone)]
struct AvailabilitySnapshot {
    doctor_id: String,
    date: NaiveDate,
    derivation: Derivation,
    derived_at: Instant,
    expired: bool,
}

#[derive(Debug, Clone)]
pub enum SubmitOutcome {
    Confirmed(Appointment),
    Rejected(ConflictFeedback),
}

/// One user's way through doctor, date and time selection to a submitted booking.
///
/// The `Submitting` state doubles as the guard against duplicate submissions.
#[derive(Debug)]
pub struct BookingSession {
    state: BookingState,
    selection: BookingSelection,
    doctor: Option<Doctor>,
    availability: Option<AvailabilitySnapshot>,
    staleness: Duration,
    feedback: Option<ConflictFeedback>,
    confirmed: Option<Appointment>,
}

impl BookingSession {
    pub fn new(staleness: Duration) -> Self {
        Self {
            state: BookingState::Empty,
            selection: BookingSelection::default(),
            doctor: None,
            availability: None,
            staleness,
            feedback: None,
            confirmed: None,
        }
    }

    pub fn state(&self) -> BookingState {
        self.state
    }

    pub fn selection(&self) -> &BookingSelection {
        &self.selection
    }

    pub fn doctor(&self) -> Option<&Doctor> {
        self.doctor.as_ref()
    }

    /// The last derivation for the selected doctor and date.
    pub fn derivation(&self) -> Option<&Derivation> {
        self.availability.as_ref().map(|a| &a.derivation)
    }

    pub fn feedback(&self) -> Option<&ConflictFeedback> {
        self.feedback.as_ref()
    }

    pub fn confirmed(&self) -> Option<&Appointment> {
        self.confirmed.as_ref()
    }

    fn ensure_idle(&self) -> Result<(), BookingError> {
        if self.state == BookingState::Submitting {
            return Err(BookingError::SubmissionInFlight);
        }
        Ok(())
    }

    /// Choosing a doctor drops everything picked for the previous one.
    pub fn select_doctor(&mut self, doctor_id: &str) -> Result<(), BookingError> {
        self.ensure_idle()?;

        self.selection = BookingSelection {
            doctor_id: Some(doctor_id.to_string()),
            ..BookingSelection::default()
        };
        self.doctor = None;
        self.availability = None;
        self.feedback = None;
        self.confirmed = None;
        self.state = BookingState::DoctorChosen;

        debug!("Booking session: doctor {} chosen", doctor_id);
        Ok(())
    }

    /// Store freshly fetched doctor metadata; ignored if another doctor is selected by now.
    pub fn apply_doctor(&mut self, doctor: Doctor) -> bool {
        if self.selection.doctor_id.as_deref() != Some(doctor.id.as_str()) {
            debug!("Ignoring metadata for doctor {}, no longer selected", doctor.id);
            return false;
        }
        self.doctor = Some(doctor);
        true
    }

    pub fn select_date(&mut self, date: NaiveDate) -> Result<(), BookingError> {
        self.ensure_idle()?;
        if self.selection.doctor_id.is_none() {
            return Err(BookingError::NoDoctorSelected);
        }

        self.selection.date = Some(date);
        self.selection.time = None;
        self.availability = None;
        self.feedback = None;
        self.confirmed = None;
        self.state = BookingState::DateChosen;

        debug!("Booking session: date {} chosen", date);
        Ok(())
    }

    /// Store a derivation; ignored when it is for a different doctor or date
    /// than the current selection, or while a submission is in flight.
    pub fn apply_derivation(&mut self, doctor_id: &str, date: NaiveDate, derivation: Derivation, now: Instant) -> bool {
        if self.state == BookingState::Submitting
            || self.selection.doctor_id.as_deref() != Some(doctor_id)
            || self.selection.date != Some(date)
        {
            debug!("Ignoring derivation for doctor {} on {}", doctor_id, date);
            return false;
        }

        self.availability = Some(AvailabilitySnapshot {
            doctor_id: doctor_id.to_string(),
            date,
            derivation,
            derived_at: now,
            expired: false,
        });
        true
    }

    pub fn select_time(&mut self, time: NaiveTime) -> Result<(), BookingError> {
        self.ensure_idle()?;
        if self.selection.doctor_id.is_none() {
            return Err(BookingError::NoDoctorSelected);
        }
        if self.selection.date.is_none() {
            return Err(BookingError::NoDateSelected);
        }
        let derivation = self.derivation().ok_or(BookingError::AvailabilityNotLoaded)?;

        if !is_quarter_hour(time) {
            return Err(BookingError::ValidationError(format!(
                "Appointments start on the quarter hour, got {}",
                time.format("%H:%M:%S")
            )));
        }
        if !derivation.is_available(time) {
            return Err(BookingError::SlotUnavailable(time));
        }

        self.selection.time = Some(time);
        self.feedback = None;
        self.state = BookingState::TimeChosen;
        Ok(())
    }

    pub fn is_stale(&self, now: Instant) -> bool {
        match &self.availability {
            Some(snapshot) => snapshot.expired || now.saturating_duration_since(snapshot.derived_at) > self.staleness,
            None => true,
        }
    }

    /// Check the selection against the last derivation and enter `Submitting`.
    pub fn begin_submit(&mut self, now: Instant) -> Result<BookAppointmentRequest, BookingError> {
        self.ensure_idle()?;

        let request = self.selection.to_request().ok_or(BookingError::IncompleteSelection)?;
        if self.availability.is_none() {
            return Err(BookingError::AvailabilityNotLoaded);
        }
        if self.is_stale(now) {
            return Err(BookingError::StaleAvailability);
        }
        if !is_quarter_hour(request.time) {
            return Err(BookingError::ValidationError("Appointments start on the quarter hour".to_string()));
        }
        if !self.derivation().is_some_and(|d| d.is_available(request.time)) {
            self.selection.time = None;
            self.state = BookingState::DateChosen;
            return Err(BookingError::SlotUnavailable(request.time));
        }

        self.state = BookingState::Submitting;
        self.feedback = None;
        Ok(request)
    }

    pub fn complete_submit(&mut self, result: Result<Appointment, ApiError>) -> Result<SubmitOutcome, BookingError> {
        if self.state != BookingState::Submitting {
            return Err(BookingError::NotSubmitting);
        }

        match result {
            Ok(appointment) => {
                info!("Booking confirmed: appointment {}", appointment.id);
                self.selection.clear();
                self.doctor = None;
                self.availability = None;
                self.feedback = None;
                self.confirmed = Some(appointment.clone());
                self.state = BookingState::Confirmed;
                Ok(SubmitOutcome::Confirmed(appointment))
            }
            Err(error) => {
                let feedback = ConflictFeedbackHandler::classify(&error);
                warn!("Booking rejected ({:?}): {}", feedback.category, error);
                self.apply_recovery(&feedback);
                self.feedback = Some(feedback.clone());
                self.state = BookingState::Rejected;
                Ok(SubmitOutcome::Rejected(feedback))
            }
        }
    }

    /// Leave `Submitting` without an outcome, e.g. when the request was dropped.
    pub fn abandon_submit(&mut self) {
        if self.state == BookingState::Submitting {
            self.state = BookingState::TimeChosen;
        }
    }

    fn apply_recovery(&mut self, feedback: &ConflictFeedback) {
        match feedback.recovery {
            Recovery::Rederive => {
                self.selection.time = None;
                if let Some(snapshot) = self.availability.as_mut() {
                    snapshot.expired = true;
                }
            }
            Recovery::RefreshDoctor => {
                self.selection.time = None;
                self.doctor = None;
                self.availability = None;
            }
            Recovery::Reselect => self.selection.time = None,
            Recovery::Reauthenticate => {
                self.selection.clear();
                self.doctor = None;
                self.availability = None;
            }
            Recovery::Retry | Recovery::None => {}
        }
    }

    /// Mark the derivation stale if it shows `doctor_id` on `date` (any date when `None`).
    pub fn expire_if_showing(&mut self, doctor_id: &str, date: Option<NaiveDate>) -> bool {
        match self.availability.as_mut() {
            Some(snapshot) if snapshot.doctor_id == doctor_id && date.map_or(true, |d| d == snapshot.date) => {
                snapshot.expired = true;
                true
            }
            _ => false,
        }
    }
}

// ==============================================================================
// BOOKING FLOW
// ==============================================================================

/// Where a booking flow gets doctors and availability and sends bookings.
#[async_trait]
pub trait BookingBackend: Send + Sync {
    async fn fetch_doctor(&self, doctor_id: &str) -> Result<Doctor, ApiError>;

    async fn derive(&self, doctor: &Doctor, date: NaiveDate) -> Result<Derivation, ApiError>;

    async fn submit(&self, request: &BookAppointmentRequest) -> Result<Appointment, ApiError>;
}

/// Backend calls on behalf of one signed-in user.
pub struct RemoteBookingBackend {
    doctors: DoctorService,
    availability: AvailabilityService,
    appointments: AppointmentService,
    auth_token: String,
}

impl RemoteBookingBackend {
    pub fn new(config: &PortalConfig, auth_token: &str) -> Self {
        Self {
            doctors: DoctorService::new(config),
            availability: AvailabilityService::new(config),
            appointments: AppointmentService::new(config),
            auth_token: auth_token.to_string(),
        }
    }
}

#[async_trait]
impl BookingBackend for RemoteBookingBackend {
    async fn fetch_doctor(&self, doctor_id: &str) -> Result<Doctor, ApiError> {
        self.doctors.get_doctor(doctor_id).await
    }

    async fn derive(&self, doctor: &Doctor, date: NaiveDate) -> Result<Derivation, ApiError> {
        let response = self.availability.get_available_slots(&doctor.id, date).await?;

        // Fresh doctor metadata wins; the listing's schedule fills in when the profile has none.
        let schedule = match (&doctor.working_hours_start, &doctor.working_hours_end) {
            (Some(_), Some(_)) => doctor.schedule(),
            _ => response.schedule(&doctor.id).unwrap_or_else(|| doctor.schedule()),
        };
        let occupied = AvailabilityDeriver::from_backend_slots(&doctor.id, date, &response);

        Ok(AvailabilityDeriver::derive(&schedule, date, &occupied))
    }

    async fn submit(&self, request: &BookAppointmentRequest) -> Result<Appointment, ApiError> {
        self.appointments.book(request, &self.auth_token).await
    }
}

pub type SharedSession = Arc<Mutex<BookingSession>>;

fn lock_session(session: &Mutex<BookingSession>) -> MutexGuard<'_, BookingSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Drives a booking session against a backend. The session lock is never
/// held across a backend call.
pub struct BookingFlow<B> {
    backend: B,
    session: SharedSession,
}

impl<B: BookingBackend> BookingFlow<B> {
    pub fn new(backend: B, session: SharedSession) -> Self {
        Self { backend, session }
    }

    pub fn session(&self) -> &SharedSession {
        &self.session
    }

    fn lock(&self) -> MutexGuard<'_, BookingSession> {
        lock_session(&self.session)
    }

    pub async fn choose_doctor(&self, doctor_id: &str) -> Result<(), BookingError> {
        self.lock().select_doctor(doctor_id)?;

        let doctor = self.backend.fetch_doctor(doctor_id).await?;
        self.lock().apply_doctor(doctor);
        Ok(())
    }

    pub async fn choose_date(&self, date: NaiveDate) -> Result<Derivation, BookingError> {
        self.lock().select_date(date)?;
        self.refresh_availability().await
    }

    pub fn choose_time(&self, time: NaiveTime) -> Result<(), BookingError> {
        self.lock().select_time(time)
    }

    /// Re-derive the selected day, re-fetching doctor metadata if it was dropped.
    pub async fn refresh_availability(&self) -> Result<Derivation, BookingError> {
        let (doctor_id, date, doctor) = {
            let session = self.lock();
            let selection = session.selection();
            (
                selection.doctor_id.clone().ok_or(BookingError::NoDoctorSelected)?,
                selection.date.ok_or(BookingError::NoDateSelected)?,
                session.doctor().cloned(),
            )
        };

        let doctor = match doctor {
            Some(doctor) => doctor,
            None => {
                let doctor = self.backend.fetch_doctor(&doctor_id).await?;
                self.lock().apply_doctor(doctor.clone());
                doctor
            }
        };

        let derivation = self.backend.derive(&doctor, date).await?;
        self.lock()
            .apply_derivation(&doctor_id, date, derivation.clone(), Instant::now());
        Ok(derivation)
    }

    /// Submit the current selection, re-deriving first if availability is stale.
    pub async fn submit(&self) -> Result<SubmitOutcome, BookingError> {
        let stale = {
            let session = self.lock();
            if session.state() == BookingState::Submitting {
                debug!("Suppressed duplicate booking submission");
                return Err(BookingError::SubmissionInFlight);
            }
            session.is_stale(Instant::now())
        };
        if stale {
            debug!("Availability is stale, re-deriving before submission");
            self.refresh_availability().await?;
        }

        let request = self.lock().begin_submit(Instant::now())?;

        let guard = SubmitGuard {
            session: &self.session,
            armed: true,
        };
        let result = self.backend.submit(&request).await;
        guard.disarm();

        let outcome = self.lock().complete_submit(result)?;
        if let SubmitOutcome::Rejected(feedback) = &outcome {
            self.recover(feedback).await;
        }
        Ok(outcome)
    }

    async fn recover(&self, feedback: &ConflictFeedback) {
        if matches!(feedback.recovery, Recovery::Rederive | Recovery::RefreshDoctor) {
            if let Err(e) = self.refresh_availability().await {
                warn!("Could not refresh availability after rejected booking: {}", e);
            }
        }
    }

    /// Doctor, date and time in one go, then submit.
    pub async fn book(&self, doctor_id: &str, date: NaiveDate, time: NaiveTime) -> Result<SubmitOutcome, BookingError> {
        self.choose_doctor(doctor_id).await?;
        self.choose_date(date).await?;
        self.choose_time(time)?;
        self.submit().await
    }
}

/// Puts the session back to `TimeChosen` if a submission future is dropped mid-flight.
struct SubmitGuard<'a> {
    session: &'a Mutex<BookingSession>,
    armed: bool,
}

impl SubmitGuard<'_> {
    fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SubmitGuard<'_> {
    fn drop(&mut self) {
        if self.armed {
            warn!("Booking submission abandoned before completion");
            lock_session(self.session).abandon_submit();
        }
    }
}

// ==============================================================================
// SESSION REGISTRY
// ==============================================================================

struct RegisteredSession {
    session: SharedSession,
    touched: Instant,
}

/// Booking sessions of the portal's users, one per user.
///
/// A session leaves the registry when its booking is confirmed or the user
/// has to sign in again. It also goes once it has sat idle for `idle_timeout`
/// with no request holding it.
pub struct BookingSessions {
    sessions: Mutex<HashMap<String, RegisteredSession>>,
    staleness: Duration,
    idle_timeout: Duration,
}

impl BookingSessions {
    pub fn new(staleness: Duration, idle_timeout: Duration) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            staleness,
            idle_timeout,
        }
    }

    fn registry(&self) -> MutexGuard<'_, HashMap<String, RegisteredSession>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn session_for(&self, user_id: &str) -> SharedSession {
        self.session_at(user_id, Instant::now())
    }

    pub(crate) fn session_at(&self, user_id: &str, now: Instant) -> SharedSession {
        let mut sessions = self.registry();
        Self::evict_idle(&mut sessions, now, self.idle_timeout);

        let entry = sessions.entry(user_id.to_string()).or_insert_with(|| RegisteredSession {
            session: Arc::new(Mutex::new(BookingSession::new(self.staleness))),
            touched: now,
        });
        entry.touched = now;
        Arc::clone(&entry.session)
    }

    fn evict_idle(sessions: &mut HashMap<String, RegisteredSession>, now: Instant, idle_timeout: Duration) {
        let before = sessions.len();
        // A session still referenced outside the registry belongs to a request in flight.
        sessions.retain(|_, entry| {
            Arc::strong_count(&entry.session) > 1 || now.saturating_duration_since(entry.touched) < idle_timeout
        });
        let evicted = before - sessions.len();
        if evicted > 0 {
            debug!("Evicted {} idle booking sessions", evicted);
        }
    }

    /// Drop the user's session if it is still the one the caller worked on.
    pub fn release(&self, user_id: &str, session: &SharedSession) {
        let mut sessions = self.registry();
        if sessions
            .get(user_id)
            .is_some_and(|entry| Arc::ptr_eq(&entry.session, session))
        {
            sessions.remove(user_id);
        }
    }

    pub fn len(&self) -> usize {
        self.registry().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RefreshSink for BookingSessions {
    fn apply(&self, refresh: &Refresh) {
        let Refresh::Slots { doctor_id, date } = refresh else {
            return;
        };

        let sessions: Vec<SharedSession> = self
            .registry()
            .values()
            .map(|entry| Arc::clone(&entry.session))
            .collect();

        let expired = sessions
            .iter()
            .filter(|session| lock_session(session).expire_if_showing(doctor_id, *date))
            .count();
        if expired > 0 {
            debug!("Expired {} booking derivations for doctor {}", expired, doctor_id);
        }
    }
}
