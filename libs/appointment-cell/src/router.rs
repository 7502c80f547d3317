use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, patch, post},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::session_guard;

use crate::handlers;
use crate::services::{AppointmentCache, BookingSessions};

/// Shared by every appointment route; the cache and sessions outlive requests.
#[derive(Clone)]
pub struct AppointmentState {
    pub config: Arc<PortalConfig>,
    pub cache: Arc<AppointmentCache>,
    pub sessions: Arc<BookingSessions>,
}

impl AppointmentState {
    pub fn new(config: Arc<PortalConfig>) -> Self {
        let sessions = Arc::new(BookingSessions::new(config.slot_staleness(), config.session_idle()));
        Self {
            config,
            cache: Arc::new(AppointmentCache::new()),
            sessions,
        }
    }
}

pub fn appointment_routes(state: AppointmentState) -> Router {
    // All appointment operations require a verified session
    Router::new()
        .route("/my", get(handlers::get_my_appointments))
        .route("/book", post(handlers::book_appointment))
        .route("/doctor/{doctor_id}", get(handlers::get_doctor_appointments))
        .route("/{appointment_id}/status", patch(handlers::update_appointment_status))
        .route("/working-hours", patch(handlers::update_working_hours))
        .layer(middleware::from_fn_with_state(state.config.clone(), session_guard))
        .with_state(state)
}
