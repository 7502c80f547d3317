use std::sync::Arc;

use axum::{routing::get, Json, Router};
use serde_json::json;
use tokio::task::JoinHandle;

use admin_cell::admin_routes;
use appointment_cell::{appointment_routes, AppointmentState};
use auth_cell::auth_routes;
use chat_cell::{chat_routes, ChatState};
use doctor_cell::router::doctor_routes;
use notification_cell::{notification_routes, spawn_refresh_loop, PushHub, RefreshSink};
use patient_cell::patient_routes;
use shared_config::PortalConfig;

/// Long-lived state shared by the cells: caches, sessions and the push hub.
#[derive(Clone)]
pub struct PortalState {
    pub config: Arc<PortalConfig>,
    pub hub: PushHub,
    pub appointments: AppointmentState,
    pub chat: ChatState,
}

impl PortalState {
    pub fn new(config: Arc<PortalConfig>) -> Self {
        Self {
            hub: PushHub::new(config.push_channel_capacity),
            appointments: AppointmentState::new(config.clone()),
            chat: ChatState::new(config.clone()),
            config,
        }
    }

    /// Feed push events to every view that caches backend state.
    pub fn spawn_refresh_loop(&self) -> JoinHandle<()> {
        let sinks: Vec<Arc<dyn RefreshSink>> = vec![
            self.appointments.cache.clone() as Arc<dyn RefreshSink>,
            self.appointments.sessions.clone() as Arc<dyn RefreshSink>,
            self.chat.threads.clone() as Arc<dyn RefreshSink>,
        ];
        spawn_refresh_loop(&self.hub, sinks)
    }
}

pub fn create_router(state: PortalState) -> Router {
    let config = state.config.clone();

    Router::new()
        .route("/", get(|| async { "Telehealth portal is running!" }))
        .route(
            "/health",
            get(|| async { Json(json!({ "status": "ok" })) }),
        )
        .nest("/auth", auth_routes(config.clone()))
        .nest("/doctors", doctor_routes(config.clone()))
        .nest("/appointments", appointment_routes(state.appointments))
        .nest("/chat", chat_routes(state.chat))
        .nest("/notifications", notification_routes(config.clone(), state.hub))
        .nest("/patients", patient_routes(config.clone()))
        .nest("/admin", admin_routes(config))
}
