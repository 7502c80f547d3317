use tracing::debug;

use shared_config::PortalConfig;
use shared_gateway::ApiClient;
use shared_models::ApiError;

use crate::models::{Notification, NotificationFeed, SmsLog};

pub struct NotificationService {
    client: ApiClient,
}

impl NotificationService {
    pub fn new(config: &PortalConfig) -> Self {
        Self {
            client: ApiClient::new(config),
        }
    }

    pub async fn list(&self, auth_token: &str) -> Result<Vec<Notification>, ApiError> {
        self.client.get_data("/notifications", Some(auth_token)).await
    }

    /// Notifications together with how many are unread.
    pub async fn feed(&self, auth_token: &str) -> Result<NotificationFeed, ApiError> {
        let feed = NotificationFeed::new(self.list(auth_token).await?);
        debug!("Loaded {} notifications ({} unread)", feed.notifications.len(), feed.unread_count);
        Ok(feed)
    }

    /// Outbound SMS log, admin only.
    pub async fn sms_logs(&self, auth_token: &str) -> Result<Vec<SmsLog>, ApiError> {
        self.client.get_data("/notifications/sms/logs", Some(auth_token)).await
    }
}
