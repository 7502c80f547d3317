use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::{push_ingest_guard, session_guard};

use crate::handlers::{ingest_event, list_notifications, stream_refreshes, NotificationState};
use crate::services::PushHub;

pub fn notification_routes(config: Arc<PortalConfig>, hub: PushHub) -> Router {
    let state = NotificationState {
        config: config.clone(),
        hub,
    };

    let protected_routes = Router::new()
        .route("/", get(list_notifications))
        .route("/stream", get(stream_refreshes))
        .layer(middleware::from_fn_with_state(config.clone(), session_guard));

    // The backend relays its realtime events here, signed with the shared push token.
    let ingest_routes = Router::new()
        .route("/events", post(ingest_event))
        .layer(middleware::from_fn_with_state(config, push_ingest_guard));

    Router::new()
        .merge(protected_routes)
        .merge(ingest_routes)
        .with_state(state)
}
