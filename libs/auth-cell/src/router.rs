use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::session_guard;

use crate::handlers;

pub fn auth_routes(state: Arc<PortalConfig>) -> Router {
    let public_routes = Router::new()
        .route("/login", post(handlers::login))
        .route("/register", post(handlers::register))
        .route("/forgot-password", post(handlers::forgot_password))
        .route("/reset-password", post(handlers::reset_password))
        .route("/verify", get(handlers::verify));

    let protected_routes = Router::new()
        .route("/change-password", post(handlers::change_password))
        .layer(middleware::from_fn_with_state(state.clone(), session_guard));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}
