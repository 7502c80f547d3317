use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};

use auth_cell::LoginCredentials;
use shared_config::PortalConfig;
use shared_models::{auth::SessionContext, error::AppError};

use crate::models::{AdminSetup, DoctorListQuery};
use crate::services::AdminService;

// ==============================================================================
// BOOTSTRAP (public)
// ==============================================================================

#[axum::debug_handler]
pub async fn check_admin(State(config): State<Arc<PortalConfig>>) -> Result<Json<Value>, AppError> {
    let status = AdminService::new(&config).check().await?;

    Ok(Json(json!({
        "success": true,
        "adminExists": status.admin_exists
    })))
}

#[axum::debug_handler]
pub async fn setup_admin(
    State(config): State<Arc<PortalConfig>>,
    Json(setup): Json<AdminSetup>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    AdminService::new(&config).create(&setup).await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "message": "Admin account created"
        })),
    ))
}

#[axum::debug_handler]
pub async fn login_admin(
    State(config): State<Arc<PortalConfig>>,
    Json(credentials): Json<LoginCredentials>,
) -> Result<Json<Value>, AppError> {
    let session = AdminService::new(&config).login(&credentials).await?;

    Ok(Json(json!({
        "success": true,
        "token": session.token,
        "role": session.role
    })))
}

// ==============================================================================
// CONSOLE (admin only)
// ==============================================================================

#[axum::debug_handler]
pub async fn list_doctors(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<DoctorListQuery>,
) -> Result<Json<Value>, AppError> {
    let doctors = AdminService::new(&config)
        .doctors(query.status, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn approve_doctor(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let message = AdminService::new(&config)
        .approve_doctor(&doctor_id, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "Doctor approved".to_string())
    })))
}

#[axum::debug_handler]
pub async fn delete_doctor(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    AdminService::new(&config)
        .delete_doctor(&doctor_id, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Doctor deleted"
    })))
}

#[axum::debug_handler]
pub async fn delete_review(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Path(review_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    AdminService::new(&config)
        .delete_review(&review_id, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Review deleted"
    })))
}

/// Outgoing SMS messages.
#[axum::debug_handler]
pub async fn list_messages(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let logs = AdminService::new(&config).sms_logs(session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": logs
    })))
}
