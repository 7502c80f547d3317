use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::Utc;
use serde_json::{json, Value};
use tracing::{info, warn};

use shared_models::{auth::SessionContext, error::AppError};

use crate::models::SendMessageRequest;
use crate::router::ChatState;
use crate::services::ChatService;

#[axum::debug_handler]
pub async fn list_conversations(
    State(state): State<ChatState>,
    Extension(session): Extension<SessionContext>,
) -> Result<Json<Value>, AppError> {
    let service = ChatService::new(&state.config);

    let conversations = service.conversations(session.role(), session.token()).await?;

    Ok(Json(json!({
        "success": true,
        "data": conversations,
        "total": conversations.len()
    })))
}

/// Opens (or re-opens) the thread with `peer_id` from a fresh history.
#[axum::debug_handler]
pub async fn get_history(
    State(state): State<ChatState>,
    Extension(session): Extension<SessionContext>,
    Path(peer_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let service = ChatService::new(&state.config);

    let history = service.history(&peer_id, session.token()).await?;
    let entries = state.threads.with_thread(session.user_id(), &peer_id, |thread| {
        thread.replace_history(history);
        thread.entries().to_vec()
    });

    Ok(Json(json!({
        "success": true,
        "data": entries
    })))
}

/// The open thread as the portal holds it, including pushed and pending messages.
#[axum::debug_handler]
pub async fn get_thread(
    State(state): State<ChatState>,
    Extension(session): Extension<SessionContext>,
    Path(peer_id): Path<String>,
) -> Result<Json<Value>, AppError> {
    let entries = state
        .threads
        .snapshot(session.user_id(), &peer_id)
        .ok_or_else(|| AppError::NotFound(format!("No open conversation with {}", peer_id)))?;

    Ok(Json(json!({
        "success": true,
        "data": entries,
        "total": entries.len()
    })))
}

#[axum::debug_handler]
pub async fn close_thread(
    State(state): State<ChatState>,
    Extension(session): Extension<SessionContext>,
    Path(peer_id): Path<String>,
) -> Json<Value> {
    let closed = state.threads.close(session.user_id(), &peer_id);

    Json(json!({
        "success": true,
        "closed": closed
    }))
}

/// Sends a message, showing it as pending in the thread until the backend answers.
#[axum::debug_handler]
pub async fn send_message(
    State(state): State<ChatState>,
    Extension(session): Extension<SessionContext>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<Value>), AppError> {
    request.validate()?;

    let owner = session.user_id();
    let local_id = state
        .threads
        .with_thread(owner, &request.to, |thread| thread.push_pending(&request.message, Utc::now()));

    let service = ChatService::new(&state.config);
    match service.send(&request, session.token()).await {
        Ok(message) => {
            let confirmed = message.clone();
            state
                .threads
                .with_thread(owner, &request.to, |thread| thread.confirm(local_id, confirmed))?;
            info!("User {} sent a message to {}", owner, request.to);

            Ok((
                StatusCode::CREATED,
                Json(json!({
                    "success": true,
                    "localId": local_id,
                    "data": message
                })),
            ))
        }
        Err(e) => {
            warn!("Message from {} to {} failed: {}", owner, request.to, e);
            if let Err(lost) = state
                .threads
                .with_thread(owner, &request.to, |thread| thread.fail(local_id))
            {
                warn!("{}", lost);
            }
            Err(e.into())
        }
    }
}
