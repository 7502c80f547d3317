use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde_json::{json, Value};
use tracing::info;

use notification_cell::{Refresh, RefreshSink};
use shared_models::{
    auth::{Role, SessionContext},
    error::AppError,
};
use shared_utils::extractor::require_role;

use crate::models::{PortalBookingRequest, UpdateStatusRequest, WorkingHoursUpdate};
use crate::router::AppointmentState;
use crate::services::{AppointmentService, BookingFlow, RemoteBookingBackend, SubmitOutcome};

// ==============================================================================
// APPOINTMENT LISTINGS
// ==============================================================================

#[axum::debug_handler]
pub async fn get_my_appointments(
    State(state): State<AppointmentState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state.config);

    let appointments = state
        .cache
        .get_or_load(session.user_id(), session.token(), &service)
        .await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "count": appointments.len()
    })))
}

#[axum::debug_handler]
pub async fn get_doctor_appointments(
    State(state): State<AppointmentState>,
    Extension(session): Extension<SessionContext>,
    Path(doctor_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, &[Role::Doctor, Role::Admin])?;

    let service = AppointmentService::new(&state.config);
    let appointments = service.doctor_appointments(&doctor_id, session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": appointments,
        "count": appointments.len()
    })))
}

// ==============================================================================
// BOOKING
// ==============================================================================

/// Runs the whole booking flow for the signed-in patient.
///
/// A rejected submission answers with the conflict feedback and the slots as
/// re-derived after the rejection.
#[axum::debug_handler]
pub async fn book_appointment(
    State(state): State<AppointmentState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<PortalBookingRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    require_role(&session, &[Role::Patient])?;
    let time = request.parsed_time()?;

    let booking_session = state.sessions.session_for(session.user_id());
    let flow = BookingFlow::new(RemoteBookingBackend::new(&state.config, session.token()), booking_session);

    let outcome = flow.book(&request.doctor_id, request.date, time).await?;

    match outcome {
        SubmitOutcome::Confirmed(appointment) => {
            state.sessions.release(session.user_id(), flow.session());
            state.cache.invalidate(session.user_id());
            state.cache.invalidate(&appointment.doctor_id);
            info!("Patient {} booked appointment {}", session.user_id(), appointment.id);

            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "data": appointment,
                    "message": "Appointment booked successfully"
                })),
            ))
        }
        SubmitOutcome::Rejected(feedback) => {
            let derivation = flow
                .session()
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .derivation()
                .cloned();
            if feedback.is_fatal() {
                state.sessions.release(session.user_id(), flow.session());
            }

            let status = StatusCode::from_u16(feedback.status_code()).unwrap_or(StatusCode::CONFLICT);
            Ok((
                status,
                Json(json!({
                    "success": false,
                    "message": feedback.message,
                    "feedback": feedback,
                    "slots": derivation.as_ref().map(|d| d.slots()).unwrap_or_default(),
                    "availability": derivation
                })),
            ))
        }
    }
}

// ==============================================================================
// STATUS AND SCHEDULE MANAGEMENT
// ==============================================================================

#[axum::debug_handler]
pub async fn update_appointment_status(
    State(state): State<AppointmentState>,
    Extension(session): Extension<SessionContext>,
    Path(appointment_id): Path<String>,
    Json(request): Json<UpdateStatusRequest>,
) -> Result<Json<Value>, AppError> {
    let service = AppointmentService::new(&state.config);

    let appointment = service
        .transition(&appointment_id, request.status, session.token())
        .await?;

    state.cache.invalidate_appointment(&appointment_id);
    state.cache.invalidate(session.user_id());

    Ok(Json(json!({
        "success": true,
        "data": appointment,
        "message": format!("Appointment {}", request.status)
    })))
}

#[axum::debug_handler]
pub async fn update_working_hours(
    State(state): State<AppointmentState>,
    Extension(session): Extension<SessionContext>,
    Json(update): Json<WorkingHoursUpdate>,
) -> Result<Json<Value>, AppError> {
    require_role(&session, &[Role::Doctor])?;

    let service = AppointmentService::new(&state.config);
    let message = service.update_working_hours(&update, session.token()).await?;

    // Anyone looking at this doctor's days has to re-derive.
    state.sessions.apply(&Refresh::Slots {
        doctor_id: session.user_id().to_string(),
        date: None,
    });

    Ok(Json(json!({
        "success": true,
        "message": message.unwrap_or_else(|| "Working hours updated".to_string())
    })))
}
