use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::{admin_guard, session_guard};

use crate::handlers;

pub fn admin_routes(config: Arc<PortalConfig>) -> Router {
    let public_routes = Router::new()
        .route("/check", get(handlers::check_admin))
        .route("/setup", post(handlers::setup_admin))
        .route("/login", post(handlers::login_admin));

    // Layers run bottom-up: the session guard first, then the role check.
    let console_routes = Router::new()
        .route("/doctors", get(handlers::list_doctors))
        .route("/doctors/{doctor_id}", delete(handlers::delete_doctor))
        .route("/doctors/{doctor_id}/approve", post(handlers::approve_doctor))
        .route("/reviews/{review_id}", delete(handlers::delete_review))
        .route("/messages", get(handlers::list_messages))
        .layer(middleware::from_fn(admin_guard))
        .layer(middleware::from_fn_with_state(config.clone(), session_guard));

    Router::new()
        .merge(public_routes)
        .merge(console_routes)
        .with_state(config)
}
