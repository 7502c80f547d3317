use std::sync::Arc;

use axum::{extract::State, http::StatusCode, Extension, Json};
use axum_extra::TypedHeader;
use headers::{authorization::Bearer, Authorization};
use serde_json::{json, Value};
use tracing::debug;

use shared_config::PortalConfig;
use shared_models::{auth::SessionContext, error::AppError};

use crate::models::{
    ChangePasswordRequest, ForgotPasswordRequest, LoginCredentials, RegisterRequest, ResetPasswordRequest,
};
use crate::services::AuthService;

#[axum::debug_handler]
pub async fn login(
    State(config): State<Arc<PortalConfig>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<Value>, AppError> {
    let session = AuthService::new(&config).login(&credentials).await?;

    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "role": session.role,
        "name": session.name,
        "user": session.user
    })))
}

#[axum::debug_handler]
pub async fn register(
    State(config): State<Arc<PortalConfig>>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let registration = AuthService::new(&config).register(&request).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": registration.message.unwrap_or_else(|| "Registration successful".to_string()),
            "token": registration.session.as_ref().map(|s| s.token.clone()),
            "role": request.role
        })),
    ))
}

/// Reports who the presented bearer token belongs to.
#[axum::debug_handler]
pub async fn verify(
    State(config): State<Arc<PortalConfig>>,
    authorization: Option<TypedHeader<Authorization<Bearer>>>,
) -> Result<Json<Value>, AppError> {
    let TypedHeader(Authorization(bearer)) =
        authorization.ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;
    debug!("Verifying session token");

    let user = AuthService::new(&config).verify(bearer.token()).await?;

    Ok(Json(json!({
        "success": true,
        "valid": true,
        "user": user
    })))
}

#[axum::debug_handler]
pub async fn forgot_password(
    State(config): State<Arc<PortalConfig>>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let message = AuthService::new(&config).forgot_password(&request.email).await?;

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "If the account exists, a reset link has been sent".to_string())
    })))
}

#[axum::debug_handler]
pub async fn reset_password(
    State(config): State<Arc<PortalConfig>>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let message = AuthService::new(&config).reset_password(&request).await?;

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "Password has been reset".to_string())
    })))
}

#[axum::debug_handler]
pub async fn change_password(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<Value>, AppError> {
    let message = AuthService::new(&config)
        .change_password(&request, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "Password changed".to_string())
    })))
}
