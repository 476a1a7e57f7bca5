//! Error types for the push engine.
//!
//! Delivery outcomes (expired, transient, rejected) are not errors; they are
//! reported through [`DeliveryResult`](crate::notifications::DeliveryResult).

// Rust guideline compliant 2026-02

/// Main error type for push engine operations.
#[derive(Debug, thiserror::Error)]
pub enum PushError {
    /// Missing or malformed VAPID configuration. Disables sending.
    #[error("configuration error: {0}")]
    Config(String),

    /// Subscription rejected before it reached storage.
    #[error("invalid subscription: {0}")]
    SubscriptionInvalid(String),

    /// Payload could not be encrypted for a subscriber.
    #[error("encryption error: {0}")]
    Encryption(String),

    /// Storage error.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Storage layer errors.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Database error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A persisted row could not be turned back into a subscription.
    #[error("corrupt subscription row {id}: {reason}")]
    CorruptRow {
        /// Row identifier.
        id: String,
        /// What was wrong with it.
        reason: String,
    },
}

/// Convenience alias used across the library.
pub type Result<T, E = PushError> = std::result::Result<T, E>;
