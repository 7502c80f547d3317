use std::sync::Arc;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};

use shared_config::PortalConfig;
use shared_utils::extractor::session_guard;

use crate::handlers;
use crate::services::ChatThreads;

#[derive(Clone)]
pub struct ChatState {
    pub config: Arc<PortalConfig>,
    pub threads: Arc<ChatThreads>,
}

impl ChatState {
    pub fn new(config: Arc<PortalConfig>) -> Self {
        let threads = Arc::new(ChatThreads::new(config.session_idle()));
        Self { config, threads }
    }
}

pub fn chat_routes(state: ChatState) -> Router {
    Router::new()
        .route("/conversations", get(handlers::list_conversations))
        .route("/history/{peer_id}", get(handlers::get_history))
        .route("/thread/{peer_id}", get(handlers::get_thread).delete(handlers::close_thread))
        .route("/send", post(handlers::send_message))
        .layer(middleware::from_fn_with_state(state.config.clone(), session_guard))
        .with_state(state)
}
