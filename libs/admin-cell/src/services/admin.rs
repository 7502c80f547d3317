use reqwest::Method;
use serde_json::json;
use tracing::info;

use auth_cell::{AuthService, AuthSession, LoginCredentials};
use doctor_cell::{Doctor, DoctorService};
use notification_cell::{NotificationService, SmsLog};
use patient_cell::ReviewService;
use shared_config::PortalConfig;
use shared_gateway::{ApiClient, RequestBody};
use shared_models::ApiError;

use crate::models::{AdminError, AdminSetup, AdminStatus, ApprovalFilter};

/// Admin console operations. Doctor, review and SMS calls go through the
/// owning cell's service.
pub struct AdminService {
    client: ApiClient,
    auth: AuthService,
    doctors: DoctorService,
    reviews: ReviewService,
    notifications: NotificationService,
}

impl AdminService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
            auth: AuthService::new(config),
            doctors: DoctorService::new(config),
            reviews: ReviewService::new(config),
            notifications: NotificationService::new(config),
        }
    }

    // ==========================================================================
    // BOOTSTRAP
    // ==========================================================================

    pub async fn check(&self) -> Result<AdminStatus, ApiError> {
        let value = self
            .client
            .request_value(Method::GET, "/admin/check", RequestBody::Empty, None)
            .await?;
        AdminStatus::from_response(&value)
    }

    pub async fn create(&self, setup: &AdminSetup) -> Result<(), AdminError> {
        setup.validate()?;

        let body = json!({
            "email": setup.email.trim(),
            "password": setup.password
        });
        self.client
            .request_value(Method::POST, "/admin/create", body.into(), None)
            .await?;
        info!("Admin account created for {}", setup.email.trim());
        Ok(())
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthSession, AdminError> {
        Ok(self.auth.admin_login(credentials).await?)
    }

    // ==========================================================================
    // MODERATION
    // ==========================================================================

    pub async fn doctors(&self, filter: ApprovalFilter, auth_token: &str) -> Result<Vec<Doctor>, ApiError> {
        let doctors = self.doctors.list_doctors_for_users(auth_token).await?;
        Ok(doctors.into_iter().filter(|d| filter.matches(d)).collect())
    }

    pub async fn approve_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Option<String>, ApiError> {
        let path = format!("/users/{}/approve", urlencoding::encode(doctor_id));
        let message = self
            .client
            .request_ack(Method::POST, &path, RequestBody::Empty, Some(auth_token))
            .await?;
        info!("Doctor {} approved", doctor_id);
        Ok(message)
    }

    pub async fn delete_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<(), ApiError> {
        self.doctors.delete_doctor(doctor_id, auth_token).await?;
        info!("Doctor {} deleted", doctor_id);
        Ok(())
    }

    pub async fn delete_review(&self, review_id: &str, auth_token: &str) -> Result<(), ApiError> {
        self.reviews.delete_review(review_id, auth_token).await
    }

    pub async fn sms_logs(&self, auth_token: &str) -> Result<Vec<SmsLog>, ApiError> {
        self.notifications.sms_logs(auth_token).await
    }
}
