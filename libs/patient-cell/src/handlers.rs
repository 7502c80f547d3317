use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Query, State},
    http::{header::CONTENT_TYPE, HeaderMap, StatusCode},
    Extension, Json,
};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use shared_config::PortalConfig;
use shared_models::{
    auth::{Role, SessionContext},
    error::AppError,
};
use shared_utils::extractor::require_role;

use crate::models::{NewPrescription, NewReview, ProfileUpdate, UsernameUpdate};
use crate::services::{PrescriptionService, ProfileService, ReviewService};

// ==============================================================================
// PROFILE
// ==============================================================================

#[axum::debug_handler]
pub async fn get_profile(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let profile = ProfileService::new(&config).get_profile(session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": profile
    })))
}

#[axum::debug_handler]
pub async fn update_profile(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<Value>, AppError> {
    let profile = ProfileService::new(&config)
        .update_profile(&update, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": profile,
        "message": "Profile updated"
    })))
}

#[axum::debug_handler]
pub async fn update_username(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Json(update): Json<UsernameUpdate>,
) -> Result<Json<Value>, AppError> {
    let message = ProfileService::new(&config)
        .update_username(&update, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "Username updated".to_string())
    })))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AvatarQuery {
    pub file_name: Option<String>,
}

/// Takes the raw image as the request body and forwards it as a multipart upload.
#[axum::debug_handler]
pub async fn upload_avatar(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Query(query): Query<AvatarQuery>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, AppError> {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("application/octet-stream");
    let file_name = query.file_name.unwrap_or_else(|| "avatar".to_string());

    let upload = ProfileService::new(&config)
        .upload_avatar(&file_name, content_type, body.to_vec(), session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": upload
    })))
}

// ==============================================================================
// REVIEWS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_reviews(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let reviews = ReviewService::new(&config)
        .reviews_for_doctor(&doctor_id, session.token())
        .await?;

    let average = if reviews.is_empty() {
        None
    } else {
        Some(reviews.iter().map(|r| f64::from(r.rating)).sum::<f64>() / reviews.len() as f64)
    };

    Ok(Json(json!({
        "success": true,
        "data": reviews,
        "averageRating": average
    })))
}

#[axum::debug_handler]
pub async fn submit_review(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Json(review): Json<NewReview>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&session, &[Role::Patient])?;

    let created = ReviewService::new(&config)
        .submit_review(&review, session.token())
        .await?;
    info!("Patient {} reviewed doctor {}", session.user_id(), review.doctor_id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": created
        })),
    ))
}

#[axum::debug_handler]
pub async fn delete_review(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Path(review_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    ReviewService::new(&config)
        .delete_review(&review_id, session.token())
        .await?;

    Ok(Json(json!({
        "success": true,
        "message": "Review deleted"
    })))
}

// ==============================================================================
// PRESCRIPTIONS
// ==============================================================================

#[axum::debug_handler]
pub async fn list_prescriptions(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let prescriptions = PrescriptionService::new(&config).list(session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": prescriptions
    })))
}

#[axum::debug_handler]
pub async fn create_prescription(
    State(config): State<Arc<PortalConfig>>,
    Extension(session): Extension<SessionContext>,
    Json(prescription): Json<NewPrescription>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&session, &[Role::Doctor])?;

    let created = PrescriptionService::new(&config)
        .create(prescription, session.token())
        .await?;
    info!("Doctor {} wrote prescription {}", session.user_id(), created.id);

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "success": true,
            "data": created
        })),
    ))
}
