use std::env;
use std::time::Duration;
use tracing::warn;

const DEFAULT_API_BASE_URL: &str = "http://localhost:5000/api";

#[derive(Debug, Clone)]
pub struct PortalConfig {
    pub api_base_url: String,
    pub port: u16,
    pub request_timeout_secs: u64,
    pub slot_staleness_secs: u64,
    pub push_channel_capacity: usize,
    /// Booking sessions and chat threads untouched for this long are dropped.
    pub session_idle_secs: u64,
    /// Shared secret the backend sends with pushed events.
    pub push_ingest_token: Option<String>,
}

impl PortalConfig {
    pub fn from_env() -> Self {
        let api_base_url = env::var("API_BASE_URL")
            .unwrap_or_else(|_| {
                warn!("API_BASE_URL not set, using {}", DEFAULT_API_BASE_URL);
                DEFAULT_API_BASE_URL.to_string()
            });

        let config = Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            port: parse_or("PORTAL_PORT", 3000),
            request_timeout_secs: parse_or("REQUEST_TIMEOUT_SECS", 15),
            slot_staleness_secs: parse_or("SLOT_STALENESS_SECS", 60),
            push_channel_capacity: parse_or("PUSH_CHANNEL_CAPACITY", 256),
            session_idle_secs: parse_or("SESSION_IDLE_SECS", 1800),
            push_ingest_token: env::var("PUSH_INGEST_TOKEN").ok().filter(|t| !t.trim().is_empty()),
        };

        if config.push_ingest_token.is_none() {
            warn!("PUSH_INGEST_TOKEN not set, pushed events will be rejected");
        }

        if !config.is_configured() {
            warn!("Portal not fully configured - API base URL is empty");
        }

        config
    }

    /// Config pointing at an arbitrary backend, used by tests and embedders.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            api_base_url: base_url.trim_end_matches('/').to_string(),
            port: 3000,
            request_timeout_secs: 15,
            slot_staleness_secs: 60,
            push_channel_capacity: 256,
            session_idle_secs: 1800,
            push_ingest_token: None,
        }
    }

    pub fn is_configured(&self) -> bool {
        !self.api_base_url.is_empty()
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn slot_staleness(&self) -> Duration {
        Duration::from_secs(self.slot_staleness_secs)
    }

    pub fn session_idle(&self) -> Duration {
        Duration::from_secs(self.session_idle_secs)
    }
}

fn parse_or<T: std::str::FromStr + std::fmt::Display>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            warn!("{} has invalid value {:?}, using default {}", key, raw, default);
            default
        }),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let config = PortalConfig::with_base_url("http://api.local/api/");
        assert_eq!(config.api_base_url, "http://api.local/api");
        assert!(config.is_configured());
    }

    #[test]
    fn durations_follow_seconds() {
        let config = PortalConfig::with_base_url("http://api.local");
        assert_eq!(config.request_timeout(), Duration::from_secs(15));
        assert_eq!(config.slot_staleness(), Duration::from_secs(60));
    }
}
