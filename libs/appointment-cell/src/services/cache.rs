use std::collections::HashMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use tracing::debug;

use notification_cell::{Refresh, RefreshSink};
use shared_models::ApiError;

use crate::models::Appointment;
use crate::services::appointment::AppointmentService;

/// Position of a user's entry in the invalidation history, taken before a
/// load starts and compared again before its result is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Generation {
    epoch: u64,
    stamp: u64,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, Vec<Appointment>>,
    /// Last invalidation of each user within the current epoch.
    stamps: HashMap<String, u64>,
    epoch: u64,
    clock: u64,
}

impl CacheState {
    fn generation(&self, user_id: &str) -> Generation {
        Generation {
            epoch: self.epoch,
            stamp: self.stamps.get(user_id).copied().unwrap_or(0),
        }
    }

    fn stamp(&mut self, user_id: &str) {
        self.clock += 1;
        self.stamps.insert(user_id.to_string(), self.clock);
    }

    /// Outdates every load in flight, so per-user stamps can start over.
    fn next_epoch(&mut self) {
        self.epoch += 1;
        self.stamps.clear();
    }
}

/// Read-through cache of each user's appointment list.
///
/// Entries live until a status change or a push refresh invalidates them.
/// A load that was already in flight when its user was invalidated is
/// returned to its caller but never stored.
#[derive(Default)]
pub struct AppointmentCache {
    state: RwLock<CacheState>,
}

impl AppointmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(|e| e.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, user_id: &str) -> Option<Vec<Appointment>> {
        self.read().entries.get(user_id).cloned()
    }

    pub fn put(&self, user_id: &str, appointments: Vec<Appointment>) {
        self.write().entries.insert(user_id.to_string(), appointments);
    }

    fn put_if_current(&self, user_id: &str, loaded_at: Generation, appointments: Vec<Appointment>) -> bool {
        let mut state = self.write();
        if state.generation(user_id) != loaded_at {
            return false;
        }
        state.entries.insert(user_id.to_string(), appointments);
        true
    }

    pub async fn get_or_load(
        &self,
        user_id: &str,
        auth_token: &str,
        service: &AppointmentService,
    ) -> Result<Vec<Appointment>, ApiError> {
        let loaded_at = {
            let state = self.read();
            if let Some(appointments) = state.entries.get(user_id) {
                debug!("Appointment cache hit for user {}", user_id);
                return Ok(appointments.clone());
            }
            state.generation(user_id)
        };

        let appointments = service.my_appointments(auth_token).await?;
        if !self.put_if_current(user_id, loaded_at, appointments.clone()) {
            debug!("Appointments for user {} were invalidated mid-load, not caching", user_id);
        }
        Ok(appointments)
    }

    pub fn invalidate(&self, user_id: &str) {
        let mut state = self.write();
        state.stamp(user_id);
        if state.entries.remove(user_id).is_some() {
            debug!("Invalidated cached appointments for user {}", user_id);
        }
    }

    pub fn invalidate_all(&self) {
        let mut state = self.write();
        state.next_epoch();
        state.entries.clear();
    }

    /// Drop every entry holding this appointment, whoever owns it.
    pub fn invalidate_appointment(&self, appointment_id: &str) {
        let mut state = self.write();
        // Loads in flight may hold the appointment for users with no entry yet.
        state.next_epoch();
        state
            .entries
            .retain(|_, appointments| !appointments.iter().any(|a| a.id == appointment_id));
    }
}

impl RefreshSink for AppointmentCache {
    fn apply(&self, refresh: &Refresh) {
        match refresh {
            Refresh::Appointments { user_id: Some(user_id) } => self.invalidate(user_id),
            Refresh::Appointments { user_id: None } => self.invalidate_all(),
            _ => {}
        }
    }
}
