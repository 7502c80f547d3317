use reqwest::Method;

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::ApiError;

use crate::models::{NewPrescription, PatientError, Prescription};

pub struct PrescriptionService {
    client: ApiClient,
}

impl PrescriptionService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    /// Prescriptions visible to the caller (written by or for them).
    pub async fn list(&self, auth_token: &str) -> Result<Vec<Prescription>, ApiError> {
        self.client.get_data("/prescriptions", Some(auth_token)).await
    }

    pub async fn create(&self, prescription: NewPrescription, auth_token: &str) -> Result<Prescription, PatientError> {
        let prescription = prescription.sanitized()?;

        let body = serde_json::to_value(&prescription).map_err(|e| PatientError::ValidationError(e.to_string()))?;
        let created = self
            .client
            .request_data(Method::POST, "/prescriptions", body.into(), Some(auth_token))
            .await?;
        Ok(created)
    }
}
