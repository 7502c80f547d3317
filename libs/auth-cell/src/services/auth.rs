use reqwest::Method;
use serde_json::json;
use tracing::{debug, info};

use shared_config::PortalConfig;
use shared_gateway::{ApiClient, RequestBody};
use shared_models::auth::{TokenVerification, User};
use shared_models::ApiError;

use crate::models::{
    response_message, AuthError, AuthSession, ChangePasswordRequest, LoginCredentials, RegisterRequest,
    ResetPasswordRequest,
};

/// Outcome of a registration; some backends sign the new user in at once.
#[derive(Debug, Clone)]
pub struct Registration {
    pub message: Option<String>,
    pub session: Option<AuthSession>,
}

pub struct AuthService {
    client: ApiClient,
}

impl AuthService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn login(&self, credentials: &LoginCredentials) -> Result<AuthSession, AuthError> {
        credentials.validate()?;
        self.sign_in("/auth/login", credentials).await
    }

    /// Admin console login, same response shape as the user login.
    pub async fn admin_login(&self, credentials: &LoginCredentials) -> Result<AuthSession, AuthError> {
        credentials.validate()?;
        self.sign_in("/admin/login", credentials).await
    }

    async fn sign_in(&self, path: &str, credentials: &LoginCredentials) -> Result<AuthSession, AuthError> {
        debug!("Signing in {} via {}", credentials.email, path);

        let body = json!({
            "email": credentials.email.trim(),
            "password": credentials.password
        });
        let value = self
            .client
            .request_value(Method::POST, path, body.into(), None)
            .await?;

        let session = AuthSession::from_response(&value)?;
        info!("Signed in {} as {:?}", credentials.email.trim(), session.role);
        Ok(session)
    }

    pub async fn register(&self, request: &RegisterRequest) -> Result<Registration, AuthError> {
        request.validate()?;

        let body = json!({
            "name": request.name.trim(),
            "username": request.username,
            "email": request.email.trim(),
            "password": request.password,
            "role": request.role
        });
        let value = self
            .client
            .request_value(Method::POST, "/auth/register", body.into(), None)
            .await?;

        info!("Registered {} as {}", request.email.trim(), request.role);
        Ok(Registration {
            message: response_message(&value),
            session: AuthSession::from_response(&value).ok(),
        })
    }

    /// The user behind a token, straight from the backend.
    pub async fn verify(&self, token: &str) -> Result<User, ApiError> {
        let verification: TokenVerification = self.client.get_data("/auth/verify-token", Some(token)).await?;
        Ok(verification.user)
    }

    pub async fn forgot_password(&self, email: &str) -> Result<Option<String>, AuthError> {
        crate::models::validate_email(email)?;
        self.acknowledge("/auth/forgot-password", json!({ "email": email.trim() }).into(), None)
            .await
    }

    pub async fn reset_password(&self, request: &ResetPasswordRequest) -> Result<Option<String>, AuthError> {
        request.validate()?;
        let body = json!({
            "email": request.email.trim(),
            "token": request.token.trim(),
            "password": request.password
        });
        self.acknowledge("/auth/reset-password", body.into(), None).await
    }

    pub async fn change_password(
        &self,
        request: &ChangePasswordRequest,
        auth_token: &str,
    ) -> Result<Option<String>, AuthError> {
        request.validate()?;
        let body = serde_json::to_value(request).map_err(|e| AuthError::ValidationError(e.to_string()))?;
        self.acknowledge("/auth/change-password", body.into(), Some(auth_token))
            .await
    }

    async fn acknowledge(
        &self,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<Option<String>, AuthError> {
        let value = self.client.request_value(Method::POST, path, body, auth_token).await?;
        Ok(response_message(&value))
    }
}
