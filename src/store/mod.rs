//! Subscription storage.
//!
//! Subscriptions are keyed by endpoint. Storing an endpoint that already
//! exists updates it in place; eviction is an idempotent delete that is
//! safe to run concurrently with other evictions.

// Rust guideline compliant 2026-02

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

use async_trait::async_trait;

use crate::error::StorageError;
use crate::notifications::push::{MemberId, NewSubscription, Subscription};

/// Trait for subscription storage backends.
#[async_trait]
pub trait SubscriptionStore: Send + Sync {
    /// Insert a subscription, or update the existing one with the same endpoint.
    ///
    /// Re-subscribing keeps `id` and `created_at` and takes the new member,
    /// keys and user agent. Returns the stored record.
    async fn store(&self, subscription: NewSubscription) -> Result<Subscription, StorageError>;

    /// Remove `endpoint` if it belongs to `member_id`.
    ///
    /// Returns `true` if a subscription was deleted.
    async fn remove(&self, member_id: MemberId, endpoint: &str) -> Result<bool, StorageError>;

    /// All subscriptions owned by `member_id`, in no particular order.
    async fn list_for(&self, member_id: MemberId) -> Result<Vec<Subscription>, StorageError>;

    /// Delete `endpoint` regardless of owner. Deleting an absent endpoint is a no-op.
    async fn evict(&self, endpoint: &str) -> Result<(), StorageError>;
}
