use std::sync::Arc;

use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    Extension,
};
use futures::{SinkExt, StreamExt};
use serde_json::{json, Value};
use tracing::{debug, info, warn};

use shared_config::PortalConfig;
use shared_models::{auth::SessionContext, error::AppError};

use crate::models::{PushEvent, Refresh};
use crate::services::{refreshes_for, Delivery, NotificationService, PushHub, Subscription};

#[derive(Clone)]
pub struct NotificationState {
    pub config: Arc<PortalConfig>,
    pub hub: PushHub,
}

/// Notifications of the signed-in user, with unread count.
pub async fn list_notifications(
    State(state): State<NotificationState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let service = NotificationService::new(&state.config);

    let feed = service.feed(session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": feed.notifications,
        "unreadCount": feed.unread_count
    })))
}

/// Ingest a push event relayed by the backend.
pub async fn ingest_event(
    State(state): State<NotificationState>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    let event = PushEvent::from_value(payload)?;
    let name = event.name();

    let delivered = state.hub.publish(event);
    info!("Ingested push event {} ({} subscribers)", name, delivered);

    Ok((
        StatusCode::ACCEPTED,
        Json(json!({
            "success": true,
            "event": name,
            "delivered": delivered
        })),
    ))
}

/// Websocket relay of refresh hints for the session's user.
pub async fn stream_refreshes(
    State(state): State<NotificationState>,
    Extension(session): Extension<SessionContext>,
    ws: WebSocketUpgrade,
) -> Response {
    let subscription = state.hub.subscribe();
    let user_id = session.user_id().to_string();

    ws.on_upgrade(move |socket| relay_refreshes(socket, subscription, user_id))
        .into_response()
}

async fn relay_refreshes(socket: WebSocket, mut subscription: Subscription, user_id: String) {
    let (mut sender, mut receiver) = socket.split();
    info!("Refresh stream opened for user {}", user_id);

    loop {
        tokio::select! {
            delivery = subscription.recv() => {
                let Some(delivery) = delivery else { break };
                let Some(frame) = refresh_frame(&delivery, &user_id) else { continue };

                if let Err(e) = sender.send(Message::Text(frame.to_string().into())).await {
                    warn!("Refresh stream for user {} failed: {}", user_id, e);
                    break;
                }
            }
            incoming = receiver.next() => {
                match incoming {
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Err(e)) => {
                        debug!("Refresh stream for user {} errored: {}", user_id, e);
                        break;
                    }
                    Some(Ok(_)) => {}
                }
            }
        }
    }

    info!("Refresh stream closed for user {}", user_id);
}

/// The frame sent to one user, or `None` when the delivery does not concern them.
pub fn refresh_frame(delivery: &Delivery, user_id: &str) -> Option<Value> {
    let (event, refreshes) = match delivery {
        Delivery::Event(event) => (event.name(), refreshes_for(event)),
        Delivery::Missed(_) => ("resync", Refresh::resync()),
    };

    let relevant: Vec<Refresh> = refreshes.into_iter().filter(|r| r.concerns(user_id)).collect();
    if relevant.is_empty() {
        return None;
    }

    Some(json!({
        "event": event,
        "refresh": relevant
    }))
}
