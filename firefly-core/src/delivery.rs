//! Batch delivery to the collector endpoint
//!
//! Two-tier fallback:
//! 1. Beacon tier: fire-and-forget send, detached from the caller. The only
//!    observable outcome is whether the payload was accepted for delivery;
//!    the HTTP status is never seen, so a server-side 4xx/5xx still counts
//!    as delivered. Accepted limitation of the tier, not a bug.
//! 2. Fetch tier: awaited POST. Any network failure or non-2xx response is a
//!    delivery failure.
//!
//! No retries happen here. A failed batch is returned to the caller intact
//! for handoff to the offline store; retry is the store's job next session.

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use std::time::Duration;

use crate::config::PipelineConfig;
use crate::error::{Error, Result};
use crate::event::Batch;

/// Beacon payloads above this size are rejected up front, mirroring the
/// browser sendBeacon quota.
pub const BEACON_MAX_BYTES: usize = 64 * 1024;

/// Transport seam between the delivery strategy and the network.
///
/// Production uses [`HttpTransport`]; tests inject scripted implementations.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Fire-and-forget durable send. Returns whether the payload was
    /// accepted for delivery; the HTTP outcome is unobservable.
    async fn send_beacon(&self, body: Vec<u8>) -> bool;

    /// Awaited send. Err on network failure or non-2xx response.
    async fn send(&self, body: Vec<u8>) -> Result<()>;
}

/// HTTP transport for the collector endpoint.
pub struct HttpTransport {
    http_client: reqwest::Client,
    endpoint_url: String,
}

impl HttpTransport {
    /// Build the transport from pipeline configuration.
    ///
    /// Returns an error if the configuration is invalid or missing the
    /// endpoint URL.
    pub fn new(config: &PipelineConfig) -> Result<Self> {
        config.validate()?;

        let endpoint_url = config
            .endpoint_url
            .clone()
            .ok_or_else(|| Error::Config("pipeline.endpoint_url is required".to_string()))?;

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            endpoint_url,
        })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn send_beacon(&self, body: Vec<u8>) -> bool {
        if body.len() > BEACON_MAX_BYTES {
            return false;
        }

        let client = self.http_client.clone();
        let url = self.endpoint_url.clone();
        // Detached: the task outlives the caller, like a browser beacon
        // outlives the page. Failures are logged, never reported back.
        tokio::spawn(async move {
            if let Err(e) = client.post(&url).body(body).send().await {
                tracing::debug!(error = %e, "Beacon send failed after handoff");
            }
        });
        true
    }

    async fn send(&self, body: Vec<u8>) -> Result<()> {
        let response = self
            .http_client
            .post(&self.endpoint_url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::Delivery(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Delivery(format!("API error ({})", status)))
        }
    }
}

/// Result of one delivery attempt.
#[derive(Debug)]
pub enum DeliveryOutcome {
    /// The batch was delivered (or accepted by the beacon tier).
    Delivered,
    /// Both tiers failed; the batch is returned unchanged for persistence.
    Failed(Batch),
}

/// Chooses a transport tier and reports success/failure.
pub struct DeliveryStrategy<T> {
    transport: T,
}

impl<T: Transport> DeliveryStrategy<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Attempt to transmit a batch, beacon tier first.
    pub async fn deliver(&self, batch: Batch) -> DeliveryOutcome {
        let body = match batch.to_wire_body() {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(error = %e, "Failed to serialize batch, keeping for retry");
                return DeliveryOutcome::Failed(batch);
            }
        };

        if self.transport.send_beacon(body.clone()).await {
            tracing::debug!(events = batch.len(), "Batch accepted by beacon transport");
            return DeliveryOutcome::Delivered;
        }

        match self.transport.send(body).await {
            Ok(()) => {
                tracing::debug!(events = batch.len(), "Batch delivered via fetch transport");
                DeliveryOutcome::Delivered
            }
            Err(e) => {
                tracing::warn!(
                    events = batch.len(),
                    error = %e,
                    "Batch delivery failed on both tiers"
                );
                DeliveryOutcome::Failed(batch)
            }
        }
    }
}
