use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    Json,
};
use chrono::NaiveDate;
use serde::Deserialize;
use serde_json::{json, Value};

use shared_config::PortalConfig;
use shared_models::error::AppError;

use crate::models::DoctorSearchFilters;
use crate::services::{availability::AvailabilityService, doctor::DoctorService};

#[derive(Debug, Deserialize)]
pub struct SlotQuery {
    pub date: NaiveDate,
}

#[axum::debug_handler]
pub async fn search_doctors(
    State(state): State<Arc<PortalConfig>>,
    Query(filters): Query<DoctorSearchFilters>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctors = doctor_service.search_doctors(&filters).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctors,
        "total": doctors.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor(
    State(state): State<Arc<PortalConfig>>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let doctor = doctor_service.get_doctor(&doctor_id).await?;

    Ok(Json(json!({
        "success": true,
        "data": doctor
    })))
}

#[axum::debug_handler]
pub async fn list_specialties(
    State(state): State<Arc<PortalConfig>>,
) -> Result<Json<Value>, AppError> {
    let doctor_service = DoctorService::new(&state);

    let specialties = doctor_service.get_specialties().await?;

    Ok(Json(json!({
        "success": true,
        "data": specialties
    })))
}

/// Slots for one doctor and date, derived locally from the backend's schedule.
#[axum::debug_handler]
pub async fn get_doctor_slots(
    State(state): State<Arc<PortalConfig>>,
    Path(doctor_id): Path<String>,
    Query(query): Query<SlotQuery>,
) -> Result<Json<Value>, AppError> {
    let availability_service = AvailabilityService::new(&state);

    let derived = availability_service.derive_for_date(&doctor_id, query.date).await?;

    Ok(Json(json!({
        "success": true,
        "data": {
            "doctorId": derived.doctor_id,
            "date": derived.date,
            "availability": derived.derivation,
            "slots": derived.derivation.slots(),
            "message": derived.derivation.user_message()
        }
    })))
}
