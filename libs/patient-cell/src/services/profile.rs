use reqwest::{multipart, Method};
use serde_json::json;
use tracing::{debug, info};

use shared_config::PortalConfig;
use shared_gateway::{ApiClient, RequestBody};
use shared_models::ApiError;

use crate::models::{AvatarUpload, PatientError, Profile, ProfileUpdate, UsernameUpdate};

pub const MAX_AVATAR_BYTES: usize = 5 * 1024 * 1024;

pub struct ProfileService {
    client: ApiClient,
}

impl ProfileService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn get_profile(&self, auth_token: &str) -> Result<Profile, ApiError> {
        self.client.get_data("/users/me", Some(auth_token)).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate, auth_token: &str) -> Result<Profile, PatientError> {
        update.validate()?;

        let body = serde_json::to_value(update).map_err(|e| PatientError::ValidationError(e.to_string()))?;
        let profile = self
            .client
            .request_data(Method::PATCH, "/users/me", body.into(), Some(auth_token))
            .await?;
        Ok(profile)
    }

    pub async fn update_username(&self, update: &UsernameUpdate, auth_token: &str) -> Result<Option<String>, PatientError> {
        update.validate()?;

        let body = json!({ "username": update.username.trim() });
        let message = self
            .client
            .request_ack(Method::PUT, "/users/username", body.into(), Some(auth_token))
            .await?;
        Ok(message)
    }

    /// Uploads a profile picture as the `avatar` field of a multipart form.
    pub async fn upload_avatar(
        &self,
        file_name: &str,
        content_type: &str,
        bytes: Vec<u8>,
        auth_token: &str,
    ) -> Result<AvatarUpload, PatientError> {
        if bytes.is_empty() {
            return Err(PatientError::ValidationError("The image is empty".to_string()));
        }
        if bytes.len() > MAX_AVATAR_BYTES {
            return Err(PatientError::ValidationError("The image is larger than 5 MB".to_string()));
        }
        if !content_type.starts_with("image/") {
            return Err(PatientError::ValidationError(format!(
                "Expected an image, got {}",
                content_type
            )));
        }

        debug!("Uploading avatar {} ({} bytes)", file_name, bytes.len());
        let part = multipart::Part::bytes(bytes)
            .file_name(file_name.to_string())
            .mime_str(content_type)
            .map_err(|e| PatientError::ValidationError(e.to_string()))?;
        let form = multipart::Form::new().part("avatar", part);

        let upload: AvatarUpload = self
            .client
            .request_data(Method::POST, "/users/me/avatar", RequestBody::Form(form), Some(auth_token))
            .await?;
        info!("Avatar updated: {:?}", upload.profile_pic);
        Ok(upload)
    }
}
