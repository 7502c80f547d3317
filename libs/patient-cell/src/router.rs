use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::session_guard;

use crate::handlers;

pub fn patient_routes(config: Arc<PortalConfig>) -> Router {
    Router::new()
        .route("/me", get(handlers::get_profile).patch(handlers::update_profile))
        .route("/me/username", put(handlers::update_username))
        .route("/me/avatar", post(handlers::upload_avatar))
        .route("/reviews", post(handlers::submit_review))
        // GET takes a doctor id, DELETE a review id.
        .route("/reviews/{id}", get(handlers::list_reviews).delete(handlers::delete_review))
        .route(
            "/prescriptions",
            get(handlers::list_prescriptions).post(handlers::create_prescription),
        )
        .layer(middleware::from_fn_with_state(config.clone(), session_guard))
        .with_state(config)
}
