//! Web push notification delivery.
//!
//! Encrypts notification payloads for browser push subscriptions and
//! delivers them to push services with VAPID authentication.
//!
//! # Architecture
//!
//! ```text
//! Portal calls NotificationSender::send(member, title, body, data)
//!     ↓
//! SubscriptionStore::list_for(member)          one entry per device/browser
//!     ↓ (bounded fan-out)
//! PushDispatcher::deliver(subscription)
//!     ├─ encryption: RFC 8291 aes128gcm body, fresh ephemeral key + salt
//!     ├─ vapid:      RFC 8292 ES256 JWT for the endpoint's origin
//!     └─ POST endpoint → Delivered | Expired | Transient | Rejected
//!     ↓
//! Expired → SubscriptionStore::evict(endpoint)
//! ```
//!
//! # VAPID Keys
//!
//! The server holds one P-256 ECDSA keypair (RFC 8292), loaded once from
//! configuration. The public key is handed to browsers as
//! `applicationServerKey` so they can subscribe.
//!
//! # Push Subscriptions
//!
//! Browsers post their subscription (endpoint + `p256dh` + `auth`) to the
//! portal, which calls `subscribe`. The endpoint is the natural key; a 404
//! or 410 from the push service evicts it.

// Rust guideline compliant 2026-02

pub mod dispatch;
pub mod encryption;
pub mod push;
pub mod sender;
pub mod vapid;

pub use dispatch::{DeliveryResult, PushDispatcher};
pub use push::{MemberId, NewSubscription, PushMessage, Subscription, Urgency};
pub use sender::NotificationSender;
pub use vapid::{VapidAuthenticator, VapidKeys};
