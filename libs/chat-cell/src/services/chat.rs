use reqwest::Method;
use serde_json::json;
use tracing::debug;

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::{auth::Role, ApiError};

use crate::models::{ChatError, ChatMessage, Conversation, SendMessageRequest};

pub struct ChatService {
    client: ApiClient,
}

impl ChatService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn history(&self, peer_id: &str, auth_token: &str) -> Result<Vec<ChatMessage>, ApiError> {
        let path = format!("/chat/history?withUserId={}", urlencoding::encode(peer_id));
        debug!("Fetching chat history: {}", path);
        self.client.get_data(&path, Some(auth_token)).await
    }

    pub async fn send(&self, request: &SendMessageRequest, auth_token: &str) -> Result<ChatMessage, ChatError> {
        request.validate()?;

        let body = json!({
            "to": request.to,
            "message": request.message.trim()
        });
        let message = self
            .client
            .request_data(Method::POST, "/chat/send", body.into(), Some(auth_token))
            .await?;
        Ok(message)
    }

    /// Conversation partners for the signed-in role.
    pub async fn conversations(&self, role: Role, auth_token: &str) -> Result<Vec<Conversation>, ChatError> {
        let path = match role {
            Role::Patient => "/chat/conversations/patient",
            Role::Doctor => "/chat/conversations/doctor",
            Role::Admin => return Err(ChatError::NoConversations),
        };
        Ok(self.client.get_data(path, Some(auth_token)).await?)
    }
}
