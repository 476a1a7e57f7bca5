//! Push subscriptions and notification messages.
//!
//! A [`Subscription`] is one browser/device registration for a member.
//! A [`PushMessage`] is the ephemeral JSON document delivered to it.

// Rust guideline compliant 2026-02

use base64::{engine::general_purpose::URL_SAFE_NO_PAD as BASE64URL, Engine};
use chrono::{DateTime, Utc};
use p256::PublicKey;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::constants::{AUTH_SECRET_LEN, MAX_TOPIC_LEN, P256_POINT_LEN};
use crate::error::{PushError, Result};

/// Identifier of a portal member. Owned by the surrounding application.
pub type MemberId = i64;

/// A stored push subscription.
///
/// The endpoint is the natural key: at most one subscription exists per
/// endpoint, while a member may own many (one per device/browser).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    /// Surrogate identifier, stable across re-subscribes.
    pub id: Uuid,
    /// Owning member.
    pub member_id: MemberId,
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Browser's P-256 ECDH public key (base64url, 65 bytes decoded).
    pub p256dh: String,
    /// Shared auth secret (base64url, 16 bytes decoded).
    pub auth: String,
    /// User agent of the subscribing browser, if reported.
    pub user_agent: Option<String>,
    /// When the endpoint was first registered.
    pub created_at: DateTime<Utc>,
}

/// Subscription data as received from a browser, before storage.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewSubscription {
    /// Owning member.
    pub member_id: MemberId,
    /// Push service endpoint URL.
    pub endpoint: String,
    /// Browser's P-256 ECDH public key (base64url).
    pub p256dh: String,
    /// Shared auth secret (base64url).
    pub auth: String,
    /// User agent of the subscribing browser.
    pub user_agent: Option<String>,
}

impl NewSubscription {
    /// Reject malformed endpoints and keys before they reach storage.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.endpoint)
            .map_err(|e| PushError::SubscriptionInvalid(format!("endpoint is not a URL: {e}")))?;
        if !matches!(url.scheme(), "https" | "http") || url.host_str().is_none() {
            return Err(PushError::SubscriptionInvalid(format!(
                "endpoint must be an absolute http(s) URL, got {}",
                url.scheme()
            )));
        }

        decode_subscriber_key(&self.p256dh).map_err(PushError::SubscriptionInvalid)?;
        decode_auth_secret(&self.auth).map_err(PushError::SubscriptionInvalid)?;
        Ok(())
    }

    /// Materialize a fresh subscription record.
    pub(crate) fn into_subscription(self) -> Subscription {
        Subscription {
            id: Uuid::new_v4(),
            member_id: self.member_id,
            endpoint: self.endpoint,
            p256dh: self.p256dh,
            auth: self.auth,
            user_agent: self.user_agent,
            created_at: Utc::now(),
        }
    }
}

/// Decode base64url leniently: padding and the standard alphabet are accepted
/// because browsers and form layers are not consistent about either.
pub(crate) fn decode_base64url(value: &str) -> std::result::Result<Vec<u8>, base64::DecodeError> {
    let normalized: String = value
        .trim()
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            other => other,
        })
        .collect();
    BASE64URL.decode(normalized)
}

/// Decode and validate a subscriber `p256dh` key.
///
/// Must be a 65-byte uncompressed point (leading `0x04`) on P-256.
pub(crate) fn decode_subscriber_key(p256dh: &str) -> std::result::Result<PublicKey, String> {
    let bytes = decode_base64url(p256dh).map_err(|e| format!("p256dh is not base64url: {e}"))?;
    parse_subscriber_key(&bytes)
}

/// Validate raw subscriber key bytes.
pub(crate) fn parse_subscriber_key(bytes: &[u8]) -> std::result::Result<PublicKey, String> {
    if bytes.len() != P256_POINT_LEN || bytes[0] != 0x04 {
        return Err(format!(
            "p256dh must be a {P256_POINT_LEN}-byte uncompressed P-256 point, got {} bytes",
            bytes.len()
        ));
    }
    PublicKey::from_sec1_bytes(bytes).map_err(|_| "p256dh is not a point on P-256".to_string())
}

/// Decode and validate a subscriber auth secret (16 bytes).
pub(crate) fn decode_auth_secret(auth: &str) -> std::result::Result<[u8; AUTH_SECRET_LEN], String> {
    let bytes = decode_base64url(auth).map_err(|e| format!("auth is not base64url: {e}"))?;
    let len = bytes.len();
    bytes
        .try_into()
        .map_err(|_| format!("auth secret must be {AUTH_SECRET_LEN} bytes, got {len}"))
}

/// Delivery urgency hint (RFC 8030 §5.3).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Urgency {
    /// On power and wifi only.
    VeryLow,
    /// On power or wifi.
    Low,
    /// Default service behavior.
    Normal,
    /// Deliver immediately, even on low battery.
    High,
}

impl Urgency {
    /// Header value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::VeryLow => "very-low",
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for Urgency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A notification as the service worker receives it.
///
/// Serialized to JSON and encrypted; never persisted.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    /// Notification title.
    pub title: String,
    /// Notification body text.
    pub body: String,
    /// Free-form data for the service worker (e.g. `{"type": "leave_decision"}`).
    #[serde(default)]
    pub data: Map<String, Value>,
    /// Creation time in milliseconds since the Unix epoch.
    pub timestamp: i64,
    /// Replaces pending messages with the same topic on the push service.
    #[serde(skip)]
    pub topic: Option<String>,
}

impl PushMessage {
    /// Create a message stamped with the current time.
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            data: Map::new(),
            timestamp: Utc::now().timestamp_millis(),
            topic: None,
        }
    }

    /// Attach the data map.
    pub fn with_data(mut self, data: Map<String, Value>) -> Self {
        self.data = data;
        self
    }

    /// Set a `Topic` so newer messages replace undelivered older ones.
    ///
    /// Topics longer than 32 characters or outside the base64url alphabet
    /// are dropped with a warning.
    pub fn with_topic(mut self, topic: impl Into<String>) -> Self {
        let topic = topic.into();
        let valid = !topic.is_empty()
            && topic.len() <= MAX_TOPIC_LEN
            && topic
                .bytes()
                .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_');
        if valid {
            self.topic = Some(topic);
        } else {
            log::warn!("[WebPush] Ignoring invalid topic {:?}", topic);
        }
        self
    }

    /// JSON payload bytes handed to the encryptor.
    pub fn to_payload(&self) -> serde_json::Result<Vec<u8>> {
        serde_json::to_vec(self)
    }
}
