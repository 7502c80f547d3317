use std::sync::Arc;

use axum::{routing::get, Router};

use shared_config::PortalConfig;

use crate::handlers;

pub fn doctor_routes(state: Arc<PortalConfig>) -> Router {
    // Directory browsing is public, like the doctor search pages.
    Router::new()
        .route("/", get(handlers::search_doctors))
        .route("/specialties", get(handlers::list_specialties))
        .route("/{doctor_id}", get(handlers::get_doctor))
        .route("/{doctor_id}/slots", get(handlers::get_doctor_slots))
        .with_state(state)
}
