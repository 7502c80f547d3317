use reqwest::Method;
use tracing::debug;

use shared_config::PortalConfig;
use shared_gateway::{ApiClient, RequestBody};
use shared_models::ApiError;

use crate::models::{NewReview, PatientError, Review};

pub struct ReviewService {
    client: ApiClient,
}

impl ReviewService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn reviews_for_doctor(&self, doctor_id: &str, auth_token: &str) -> Result<Vec<Review>, ApiError> {
        let path = format!("/reviews/{}", urlencoding::encode(doctor_id));
        debug!("Fetching reviews: {}", path);
        self.client.get_data(&path, Some(auth_token)).await
    }

    pub async fn submit_review(&self, review: &NewReview, auth_token: &str) -> Result<Review, PatientError> {
        review.validate()?;

        let body = serde_json::json!({
            "doctorId": review.doctor_id,
            "rating": review.rating,
            "text": review.text.trim()
        });
        let created = self
            .client
            .request_data(Method::POST, "/reviews", body.into(), Some(auth_token))
            .await?;
        Ok(created)
    }

    /// Removes a review; the backend decides whether the caller may.
    pub async fn delete_review(&self, review_id: &str, auth_token: &str) -> Result<(), ApiError> {
        let path = format!("/reviews/{}", urlencoding::encode(review_id));
        self.client
            .request_ack(Method::DELETE, &path, RequestBody::Empty, Some(auth_token))
            .await?;
        Ok(())
    }
}
