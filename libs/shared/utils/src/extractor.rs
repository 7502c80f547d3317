use std::sync::Arc;

use axum::{
    body::Body,
    extract::State,
    http::{HeaderMap, Request},
    middleware::Next,
    response::Response,
};
use tracing::{debug, warn};

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::auth::{Role, SessionContext, TokenVerification};
use shared_models::error::{ApiError, AppError};

/// Pulls the bearer token out of the `Authorization` header.
pub fn bearer_token(headers: &HeaderMap) -> Result<String, AppError> {
    let auth_header = headers
        .get("Authorization")
        .ok_or_else(|| AppError::Auth("Missing authorization header".to_string()))?;

    let auth_value = auth_header
        .to_str()
        .map_err(|_| AppError::Auth("Invalid authorization header format".to_string()))?;

    let token = auth_value
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Auth("Invalid authorization header format".to_string()))?
        .trim();

    if token.is_empty() {
        return Err(AppError::Auth("Empty bearer token".to_string()));
    }

    Ok(token.to_string())
}

/// Route guard: verifies the token with the backend and injects a `SessionContext`.
pub async fn session_guard(
    State(config): State<Arc<PortalConfig>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())?;

    let client = ApiClient::new(&config);
    let verification: TokenVerification = client
        .get_data("/auth/verify-token", Some(&token))
        .await
        .map_err(|e| match e {
            ApiError::Http { status: 401 | 403, .. } => {
                warn!("Rejected session token: {}", e);
                AppError::Auth("Session expired or invalid".to_string())
            }
            other => AppError::from(other),
        })?;

    debug!("Session verified for user {}", verification.user.id);
    request
        .extensions_mut()
        .insert(SessionContext::new(token, verification.user));

    Ok(next.run(request).await)
}

/// Header carrying the shared secret on backend push relays.
pub const PUSH_TOKEN_HEADER: &str = "x-push-token";

/// Checks the push relay secret against the configured one. With no secret
/// configured nothing is accepted.
pub fn check_push_token(headers: &HeaderMap, expected: Option<&str>) -> Result<(), AppError> {
    let expected = expected.ok_or_else(|| AppError::Auth("Push ingest is not configured".to_string()))?;

    let presented = headers
        .get(PUSH_TOKEN_HEADER)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Auth("Missing push token".to_string()))?;

    if presented.trim() != expected {
        return Err(AppError::Auth("Invalid push token".to_string()));
    }
    Ok(())
}

/// Route guard for backend push ingest.
pub async fn push_ingest_guard(
    State(config): State<Arc<PortalConfig>>,
    request: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    if let Err(e) = check_push_token(request.headers(), config.push_ingest_token.as_deref()) {
        warn!("Rejected push relay: {}", e);
        return Err(e);
    }
    Ok(next.run(request).await)
}

/// Route guard for the admin console; must run after `session_guard`.
pub async fn admin_guard(request: Request<Body>, next: Next) -> Result<Response, AppError> {
    let session = extract_session(&request)?;
    require_role(&session, &[Role::Admin])?;
    Ok(next.run(request).await)
}

pub fn extract_session<B>(request: &Request<B>) -> Result<SessionContext, AppError> {
    request
        .extensions()
        .get::<SessionContext>()
        .cloned()
        .ok_or_else(|| AppError::Auth("Session not found in request extensions".to_string()))
}

pub fn require_role(session: &SessionContext, roles: &[Role]) -> Result<(), AppError> {
    if session.has_role(roles) {
        return Ok(());
    }

    let allowed = roles
        .iter()
        .map(Role::to_string)
        .collect::<Vec<_>>()
        .join(", ");
    Err(AppError::Forbidden(format!(
        "This action requires one of the roles: {}",
        allowed
    )))
}
