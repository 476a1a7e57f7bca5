//! Single-subscription delivery to a push service (RFC 8030).
//!
//! [`PushDispatcher`] encrypts a message for one subscription, signs a VAPID
//! assertion for its endpoint, POSTs it and classifies the response. It
//! never touches the subscription store; eviction is the caller's decision.

// Rust guideline compliant 2026-02

use reqwest::header::{AUTHORIZATION, CONTENT_ENCODING, CONTENT_TYPE};
use std::sync::Arc;
use std::time::Duration;

use crate::error::{PushError, Result};
use crate::notifications::encryption;
use crate::notifications::push::{PushMessage, Subscription, Urgency};
use crate::notifications::vapid::VapidAuthenticator;

/// Outcome of one delivery attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryResult {
    /// Accepted by the push service (2xx).
    Delivered,
    /// Subscription no longer exists (404/410). Evict it.
    Expired {
        /// HTTP status returned.
        status: u16,
    },
    /// Temporary failure (429, 5xx, timeout, network). Keep the subscription.
    Transient {
        /// Human-readable cause.
        reason: String,
    },
    /// Request refused for another reason (other 4xx). Keep the subscription.
    Rejected {
        /// HTTP status returned.
        status: u16,
        /// Response body, for logs.
        body: String,
    },
}

impl DeliveryResult {
    /// Whether the push service accepted the message.
    pub fn is_delivered(&self) -> bool {
        matches!(self, Self::Delivered)
    }

    /// Whether the subscription should be evicted.
    pub fn is_expired(&self) -> bool {
        matches!(self, Self::Expired { .. })
    }
}

/// Short, log-safe form of an endpoint.
///
/// Endpoint paths are bearer capabilities; only the origin and a short
/// prefix of the path are logged.
pub(crate) fn endpoint_label(endpoint: &str) -> String {
    match reqwest::Url::parse(endpoint) {
        Ok(url) => {
            let path: String = url.path().chars().take(12).collect();
            format!("{}{}…", url.origin().ascii_serialization(), path)
        }
        Err(_) => endpoint.chars().take(24).collect(),
    }
}

/// Delivers encrypted, VAPID-authenticated messages to push services.
///
/// The caller should share one dispatcher (and therefore one
/// `reqwest::Client`) across deliveries for connection pooling.
#[derive(Debug)]
pub struct PushDispatcher {
    client: reqwest::Client,
    authenticator: Arc<VapidAuthenticator>,
    ttl: u32,
    urgency: Option<Urgency>,
}

impl PushDispatcher {
    /// Build a dispatcher whose requests time out after `timeout`.
    pub fn new(
        authenticator: Arc<VapidAuthenticator>,
        ttl: u32,
        timeout: Duration,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| PushError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self::with_client(client, authenticator, ttl))
    }

    /// Build a dispatcher around an existing client.
    pub fn with_client(
        client: reqwest::Client,
        authenticator: Arc<VapidAuthenticator>,
        ttl: u32,
    ) -> Self {
        Self {
            client,
            authenticator,
            ttl,
            urgency: None,
        }
    }

    /// Attach an `Urgency` header to every delivery.
    pub fn with_urgency(mut self, urgency: Option<Urgency>) -> Self {
        self.urgency = urgency;
        self
    }

    /// `TTL` header value in seconds.
    pub fn ttl(&self) -> u32 {
        self.ttl
    }

    /// Deliver `message` to one subscription and classify the response.
    ///
    /// Returns `Err` only when the request could not be built: malformed
    /// subscriber keys ([`PushError::Encryption`]) or endpoint
    /// ([`PushError::SubscriptionInvalid`]). Network failures are
    /// [`DeliveryResult::Transient`].
    pub async fn deliver(
        &self,
        subscription: &Subscription,
        message: &PushMessage,
    ) -> Result<DeliveryResult> {
        let payload = message
            .to_payload()
            .map_err(|e| PushError::Encryption(format!("failed to serialize message: {e}")))?;
        let body = encryption::encrypt_for(subscription, &payload)?;
        let authorization = self.authenticator.authorization(&subscription.endpoint)?;

        let mut request = self
            .client
            .post(&subscription.endpoint)
            .header(AUTHORIZATION, authorization)
            .header(CONTENT_ENCODING, "aes128gcm")
            .header(CONTENT_TYPE, "application/octet-stream")
            .header("TTL", self.ttl.to_string());

        if let Some(urgency) = self.urgency {
            request = request.header("Urgency", urgency.as_str());
        }

        if let Some(topic) = &message.topic {
            request = request.header("Topic", topic.as_str());
        }

        let label = endpoint_label(&subscription.endpoint);
        let response = match request.body(body).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timed out".to_string()
                } else {
                    format!("request failed: {e}")
                };
                log::warn!("[WebPush] Transient failure for {}: {}", label, reason);
                return Ok(DeliveryResult::Transient { reason });
            }
        };

        let status = response.status().as_u16();
        let result = match status {
            200..=299 => DeliveryResult::Delivered,
            404 | 410 => {
                log::info!("[WebPush] Subscription expired ({}) for {}", status, label);
                DeliveryResult::Expired { status }
            }
            429 | 500..=599 => {
                log::warn!("[WebPush] Push service unavailable ({}) for {}", status, label);
                DeliveryResult::Transient {
                    reason: format!("HTTP {status}"),
                }
            }
            _ => {
                let body = response.text().await.unwrap_or_default();
                log::warn!("[WebPush] Push rejected (HTTP {}) for {}: {}", status, label, body);
                DeliveryResult::Rejected { status, body }
            }
        };

        Ok(result)
    }
}
