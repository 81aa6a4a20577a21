use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE};
use std::time::Duration;
use tracing::{debug, error, info};

use crate::payload::{EventType, WebhookPayload, EVENT_TYPE_HEADER, TOKEN_HEADER};
use crate::sanitizer::Sanitizer;

pub const DEFAULT_WEBHOOK_TIMEOUT: Duration = Duration::from_secs(30);

/// Delivers a payload to the review service.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Send once. `true` only when the receiver accepted the payload.
    async fn send(&self, payload: &WebhookPayload, event: EventType) -> bool;
}

/// Posts payloads as JSON over HTTP. A send is never retried.
pub struct WebhookClient {
    client: reqwest::Client,
    endpoint: String,
    token: String,
}

impl WebhookClient {
    pub fn new(endpoint: impl Into<String>, token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("svnhook/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
            token: token.into(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn headers(&self, event: EventType) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(
            HeaderName::from_bytes(EVENT_TYPE_HEADER.as_bytes())?,
            HeaderValue::from_static(event.as_str()),
        );
        headers.insert(
            HeaderName::from_bytes(TOKEN_HEADER.as_bytes())?,
            HeaderValue::from_str(&self.token).context("Access token is not a valid header value")?,
        );
        Ok(headers)
    }
}

#[async_trait]
impl Dispatcher for WebhookClient {
    async fn send(&self, payload: &WebhookPayload, event: EventType) -> bool {
        let headers = match self.headers(event) {
            Ok(headers) => headers,
            Err(e) => {
                error!("Failed to send {} webhook: {:#}", event, e);
                return false;
            }
        };

        info!("Sending {} webhook to {}", event, self.endpoint);
        debug!("Webhook headers: {:?}", Sanitizer::sanitize_headers(&headers));

        let response = match self
            .client
            .post(&self.endpoint)
            .headers(headers)
            .json(payload)
            .send()
            .await
        {
            Ok(response) => response,
            Err(e) => {
                error!("Failed to send {} webhook to {}: {}", event, self.endpoint, e);
                return false;
            }
        };

        let status = response.status();
        if status.is_success() {
            info!("{} webhook accepted with status {}", event, status);
            true
        } else {
            let body = response.text().await.unwrap_or_default();
            error!(
                "{} webhook rejected with status {}: {}",
                event, status, body
            );
            false
        }
    }
}
