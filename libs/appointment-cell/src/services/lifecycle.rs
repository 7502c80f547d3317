use tracing::{debug, info, warn};

use crate::models::{AppointmentError, AppointmentStatus};

pub struct AppointmentLifecycleService;

impl AppointmentLifecycleService {
    pub fn new() -> Self {
        Self
    }

    /// Validate that a status transition is allowed
    pub fn validate_status_transition(
        &self,
        current_status: AppointmentStatus,
        new_status: AppointmentStatus,
    ) -> Result<(), AppointmentError> {
        debug!("Validating status transition from {} to {}", current_status, new_status);

        if !self.get_valid_transitions(current_status).contains(&new_status) {
            warn!("Invalid status transition attempted: {} -> {}", current_status, new_status);
            return Err(AppointmentError::InvalidStatusTransition {
                from: current_status,
                to: new_status,
            });
        }

        info!("Status transition validated: {} -> {}", current_status, new_status);
        Ok(())
    }

    /// Get all valid next statuses for a given current status
    pub fn get_valid_transitions(&self, current_status: AppointmentStatus) -> Vec<AppointmentStatus> {
        match current_status {
            AppointmentStatus::Pending => vec![AppointmentStatus::Confirmed, AppointmentStatus::Cancelled],
            AppointmentStatus::Confirmed => vec![AppointmentStatus::Completed, AppointmentStatus::Cancelled],
            // Terminal states - no transitions allowed
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }

    /// Actions a doctor's console offers for an appointment in this status.
    pub fn get_recommended_actions(&self, current_status: AppointmentStatus) -> Vec<String> {
        match current_status {
            AppointmentStatus::Pending => vec!["Confirm".to_string(), "Decline".to_string()],
            AppointmentStatus::Confirmed => vec!["Mark completed".to_string(), "Cancel".to_string()],
            AppointmentStatus::Completed | AppointmentStatus::Cancelled => vec![],
        }
    }
}

impl Default for AppointmentLifecycleService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn pending_can_be_confirmed_or_cancelled() {
        let lifecycle = AppointmentLifecycleService::new();

        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Confirmed)
            .is_ok());
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Cancelled)
            .is_ok());
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Pending, AppointmentStatus::Completed),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }

    #[test]
    fn confirmed_can_complete() {
        let lifecycle = AppointmentLifecycleService::new();
        assert!(lifecycle
            .validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Completed)
            .is_ok());
        assert_matches!(
            lifecycle.validate_status_transition(AppointmentStatus::Confirmed, AppointmentStatus::Pending),
            Err(AppointmentError::InvalidStatusTransition { .. })
        );
    }

    #[test]
    fn terminal_states_are_final() {
        let lifecycle = AppointmentLifecycleService::new();

        for status in [AppointmentStatus::Completed, AppointmentStatus::Cancelled] {
            assert!(status.is_terminal());
            assert!(lifecycle.get_valid_transitions(status).is_empty());
            assert!(lifecycle.get_recommended_actions(status).is_empty());
        }
    }
}
