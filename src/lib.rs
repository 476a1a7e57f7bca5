//! Brigade push - Web Push delivery engine for the brigade portal.
//!
//! The portal (members, calendar, notices, leave, polls) talks to this crate
//! through [`NotificationSender`]: `subscribe`, `unsubscribe` and `send`.
//! Everything below that is the push engine proper.
//!
//! # Modules
//!
//! - [`notifications`] - encryption, VAPID signing, delivery and fan-out
//! - [`store`] - subscription persistence (in-memory and SQLite)
//! - [`config`] - configuration loading/saving
//! - [`error`] - error taxonomy

// Rust guideline compliant 2026-02

pub mod config;
pub mod constants;
pub mod error;
pub mod notifications;
pub mod store;

// Re-export commonly used types
pub use config::PushConfig;
pub use error::{PushError, Result, StorageError};
pub use notifications::{
    DeliveryResult, MemberId, NotificationSender, PushDispatcher, PushMessage, Subscription,
    VapidAuthenticator, VapidKeys,
};
pub use store::{MemoryStore, SqliteStore, SubscriptionStore};
