use reqwest::{
    header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION, CONTENT_TYPE},
    multipart::Form,
    Client, Method, StatusCode,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error, warn};

use shared_config::PortalConfig;
use shared_models::{ApiEnvelope, ApiError};

const ERROR_SNIPPET_LEN: usize = 200;

/// Body of an outgoing request.
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Binary form payload, sent as multipart without a JSON content type.
    Form(Form),
}

impl From<Value> for RequestBody {
    fn from(value: Value) -> Self {
        RequestBody::Json(value)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(config: &PortalConfig) -> Self {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .unwrap_or_else(|e| {
                warn!("Failed to build HTTP client with timeout ({}), using defaults", e);
                Client::new()
            });

        Self {
            client,
            base_url: config.api_base_url.clone(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            let value = HeaderValue::from_str(&format!("Bearer {}", token))
                .map_err(|_| ApiError::Validation("Auth token contains invalid characters".to_string()))?;
            headers.insert(AUTHORIZATION, value);
        }

        Ok(headers)
    }

    /// Sends a request and decodes the whole JSON body into `T`.
    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let value = self.request_value(method, path, body, auth_token).await?;
        decode(value)
    }

    /// Sends a request and unwraps the `{success, data, message}` envelope.
    pub async fn request_data<T>(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        let envelope = self.request_envelope(method, path, body, auth_token).await?;
        match envelope.data {
            Some(data) => decode(data),
            None => Err(ApiError::Parse("Response envelope carried no data".to_string())),
        }
    }

    /// Like `request_data` for endpoints that only acknowledge; returns the message.
    pub async fn request_ack(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<Option<String>, ApiError> {
        let envelope = self.request_envelope(method, path, body, auth_token).await?;
        Ok(envelope.message)
    }

    pub async fn get_data<T>(&self, path: &str, auth_token: Option<&str>) -> Result<T, ApiError>
    where
        T: DeserializeOwned,
    {
        self.request_data(Method::GET, path, RequestBody::Empty, auth_token).await
    }

    async fn request_envelope(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<ApiEnvelope<Value>, ApiError> {
        let value = self.request_value(method, path, body, auth_token).await?;
        let envelope: ApiEnvelope<Value> = decode(value)?;

        if !envelope.success {
            let message = envelope
                .message
                .clone()
                .unwrap_or_else(|| "Request was not successful".to_string());
            warn!("Backend declined {}: {}", path, message);
            // Declined with a 2xx status; keep 200 so callers can still classify by message.
            return Err(ApiError::Http {
                status: StatusCode::OK.as_u16(),
                message,
                body: serde_json::to_value(&envelope).unwrap_or(Value::Null),
            });
        }

        Ok(envelope)
    }

    /// Sends a request and returns the raw JSON body (`Null` when empty).
    pub async fn request_value(
        &self,
        method: Method,
        path: &str,
        body: RequestBody,
        auth_token: Option<&str>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut req = self
            .client
            .request(method, &url)
            .headers(self.get_headers(auth_token)?);

        req = match body {
            RequestBody::Empty => req,
            RequestBody::Json(value) => req
                .header(CONTENT_TYPE, HeaderValue::from_static("application/json"))
                .json(&value),
            RequestBody::Form(form) => req.multipart(form),
        };

        let response = req.send().await.map_err(|e| {
            error!("Request to {} failed: {}", url, e);
            if e.is_timeout() {
                ApiError::Network(format!("Request to {} timed out", path))
            } else {
                ApiError::Network(e.to_string())
            }
        })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Network(format!("Failed to read response body: {}", e)))?;

        if looks_like_html(&text) {
            error!("API returned HTML instead of JSON ({}) for {}", status, path);
            return Err(ApiError::Parse(format!(
                "Server returned HTML instead of JSON (status {})",
                status.as_u16()
            )));
        }

        if !status.is_success() {
            let body = serde_json::from_str::<Value>(&text)
                .unwrap_or_else(|_| Value::String(snippet(&text)));
            let message = error_message(&body, status);
            error!("API error ({}): {}", status, message);
            return Err(ApiError::Http {
                status: status.as_u16(),
                message,
                body,
            });
        }

        if text.trim().is_empty() {
            return Ok(Value::Null);
        }

        serde_json::from_str(&text).map_err(|e| {
            error!("Invalid JSON from {}: {}", path, e);
            ApiError::Parse(format!("Invalid JSON response: {}", snippet(&text)))
        })
    }
}

fn decode<T: DeserializeOwned>(value: Value) -> Result<T, ApiError> {
    serde_json::from_value(value)
        .map_err(|e| ApiError::Parse(format!("Unexpected response shape: {}", e)))
}

fn looks_like_html(text: &str) -> bool {
    let head: String = text.trim_start().chars().take(9).collect::<String>().to_ascii_lowercase();
    head.starts_with("<!doctype") || head.starts_with("<html")
}

fn snippet(text: &str) -> String {
    text.chars().take(ERROR_SNIPPET_LEN).collect()
}

fn error_message(body: &Value, status: StatusCode) -> String {
    let from_error = |e: &Value| {
        e.as_str()
            .map(str::to_string)
            .or_else(|| e.get("message").and_then(Value::as_str).map(str::to_string))
    };

    body.get("message")
        .and_then(Value::as_str)
        .map(str::to_string)
        .or_else(|| body.get("error").and_then(from_error))
        .or_else(|| body.as_str().filter(|s| !s.is_empty()).map(str::to_string))
        .unwrap_or_else(|| format!("Request failed ({})", status.as_u16()))
}
