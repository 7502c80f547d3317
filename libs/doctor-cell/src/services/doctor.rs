use reqwest::Method;
use tracing::debug;

use shared_config::PortalConfig;
use shared_gateway::{ApiClient, RequestBody};
use shared_models::ApiError;

use crate::models::{Doctor, DoctorListing, DoctorSearchFilters};

pub struct DoctorService {
    client: ApiClient,
}

impl DoctorService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    /// Search the doctor directory; empty filters list everyone.
    pub async fn search_doctors(&self, filters: &DoctorSearchFilters) -> Result<Vec<Doctor>, ApiError> {
        let path = format!("/doctors{}", filters.to_query_string());
        debug!("Searching doctors: {}", path);

        let listing: DoctorListing = self.client.get_data(&path, None).await?;
        Ok(listing.into_doctors())
    }

    pub async fn get_doctor(&self, doctor_id: &str) -> Result<Doctor, ApiError> {
        let path = format!("/doctors/{}", urlencoding::encode(doctor_id));
        self.client.get_data(&path, None).await
    }

    pub async fn get_specialties(&self) -> Result<Vec<String>, ApiError> {
        self.client.get_data("/doctors/specialties", None).await
    }

    /// Doctors as listed for signed-in users (`/users/doctors`).
    pub async fn list_doctors_for_users(&self, auth_token: &str) -> Result<Vec<Doctor>, ApiError> {
        let listing: DoctorListing = self.client.get_data("/users/doctors", Some(auth_token)).await?;
        Ok(listing.into_doctors())
    }

    /// Admin-only removal of a doctor profile.
    pub async fn delete_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<(), ApiError> {
        let path = format!("/doctors/{}", urlencoding::encode(doctor_id));
        self.client
            .request_ack(Method::DELETE, &path, RequestBody::Empty, Some(auth_token))
            .await?;
        Ok(())
    }
}
