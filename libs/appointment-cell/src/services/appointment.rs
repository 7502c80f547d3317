use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::ApiError;

use crate::models::{Appointment, AppointmentError, AppointmentStatus, BookAppointmentRequest, WorkingHoursUpdate};
use crate::services::lifecycle::AppointmentLifecycleService;

/// Thin wrapper over the backend's appointment endpoints.
#[derive(Clone)]
pub struct AppointmentService {
    client: ApiClient,
}

impl AppointmentService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn book(&self, request: &BookAppointmentRequest, auth_token: &str) -> Result<Appointment, ApiError> {
        info!(
            "Booking doctor {} on {} at {}",
            request.doctor_id,
            request.date,
            request.time.format("%H:%M")
        );

        let body = serde_json::to_value(request).map_err(|e| ApiError::Validation(e.to_string()))?;
        self.client
            .request_data(Method::POST, "/appointments", body.into(), Some(auth_token))
            .await
    }

    /// Appointments of the signed-in user, doctor or patient.
    pub async fn my_appointments(&self, auth_token: &str) -> Result<Vec<Appointment>, ApiError> {
        self.client.get_data("/appointments/my", Some(auth_token)).await
    }

    pub async fn doctor_appointments(&self, doctor_id: &str, auth_token: &str) -> Result<Vec<Appointment>, ApiError> {
        let path = format!("/appointments/doctor/{}", urlencoding::encode(doctor_id));
        self.client.get_data(&path, Some(auth_token)).await
    }

    pub async fn update_status(
        &self,
        appointment_id: &str,
        status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, ApiError> {
        debug!("Setting appointment {} to {}", appointment_id, status);

        let path = format!("/appointments/{}/status", urlencoding::encode(appointment_id));
        self.client
            .request_data(Method::PATCH, &path, json!({ "status": status }).into(), Some(auth_token))
            .await
    }

    /// Status change checked against the lifecycle before anything is sent.
    pub async fn transition(
        &self,
        appointment_id: &str,
        new_status: AppointmentStatus,
        auth_token: &str,
    ) -> Result<Appointment, AppointmentError> {
        let current = self
            .my_appointments(auth_token)
            .await?
            .into_iter()
            .find(|a| a.id == appointment_id)
            .ok_or(AppointmentError::NotFound)?;

        AppointmentLifecycleService::new().validate_status_transition(current.status, new_status)?;

        Ok(self.update_status(appointment_id, new_status, auth_token).await?)
    }

    pub async fn update_working_hours(
        &self,
        update: &WorkingHoursUpdate,
        auth_token: &str,
    ) -> Result<Option<String>, AppointmentError> {
        update.validate()?;

        let body = serde_json::to_value(update).map_err(|e| AppointmentError::ValidationError(e.to_string()))?;
        Ok(self
            .client
            .request_ack(Method::PATCH, "/appointments/working-hours", body.into(), Some(auth_token))
            .await?)
    }
}
