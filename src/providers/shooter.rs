use async_trait::async_trait;
use bytes::Bytes;
use log::debug;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use reqwest::Client;
use std::time::Duration;

use crate::errors::TransportError;
use crate::providers::{SubtitleRequest, Transport};

/// HTTP transport for the shooter.cn subtitle API
#[derive(Debug, Clone)]
pub struct ShooterClient {
    /// HTTP client for making requests
    client: Client,
}

impl ShooterClient {
    /// Create a client whose requests give up after `timeout`
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::builder()
                .timeout(timeout)
                .connect_timeout(timeout.min(Duration::from_secs(10)))
                .build()
                .unwrap_or_default(),
        }
    }
}

impl Default for ShooterClient {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

#[async_trait]
impl Transport for ShooterClient {
    async fn send(&self, request: &SubtitleRequest) -> Result<Bytes, TransportError> {
        let url = request
            .parsed_url()
            .map_err(|e| TransportError::Connection(format!("invalid URL {}: {}", request.url, e)))?;

        debug!("POST {} ({} byte body)", url, request.body.len());
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, &request.user_agent)
            .header(CONTENT_TYPE, request.content_type())
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::Status { status_code: status.as_u16() });
        }

        Ok(response.bytes().await?)
    }
}
