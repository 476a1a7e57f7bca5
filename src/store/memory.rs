//! In-process subscription store.
//!
//! Backed by a `HashMap` keyed by endpoint. Suitable for tests and for
//! single-process deployments that do not need subscriptions to survive
//! restarts.

// Rust guideline compliant 2026-02

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::SubscriptionStore;
use crate::error::StorageError;
use crate::notifications::push::{MemberId, NewSubscription, Subscription};

/// Stores push subscriptions in memory, one entry per endpoint.
#[derive(Debug, Default)]
pub struct MemoryStore {
    /// Maps endpoint → subscription.
    subscriptions: RwLock<HashMap<String, Subscription>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored subscriptions.
    pub async fn len(&self) -> usize {
        self.subscriptions.read().await.len()
    }

    /// Whether the store is empty.
    pub async fn is_empty(&self) -> bool {
        self.subscriptions.read().await.is_empty()
    }

    /// Check if a subscription exists for `endpoint`.
    pub async fn contains(&self, endpoint: &str) -> bool {
        self.subscriptions.read().await.contains_key(endpoint)
    }
}

#[async_trait]
impl SubscriptionStore for MemoryStore {
    async fn store(&self, subscription: NewSubscription) -> Result<Subscription, StorageError> {
        let mut subscriptions = self.subscriptions.write().await;

        let stored = match subscriptions.get(&subscription.endpoint) {
            Some(existing) => {
                if existing.member_id != subscription.member_id {
                    log::info!(
                        "[WebPush] Endpoint moved from member {} to member {}",
                        existing.member_id,
                        subscription.member_id
                    );
                }
                Subscription {
                    id: existing.id,
                    created_at: existing.created_at,
                    ..subscription.into_subscription()
                }
            }
            None => subscription.into_subscription(),
        };

        subscriptions.insert(stored.endpoint.clone(), stored.clone());
        Ok(stored)
    }

    async fn remove(&self, member_id: MemberId, endpoint: &str) -> Result<bool, StorageError> {
        let mut subscriptions = self.subscriptions.write().await;
        match subscriptions.get(endpoint) {
            Some(sub) if sub.member_id == member_id => {
                subscriptions.remove(endpoint);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_for(&self, member_id: MemberId) -> Result<Vec<Subscription>, StorageError> {
        Ok(self
            .subscriptions
            .read()
            .await
            .values()
            .filter(|sub| sub.member_id == member_id)
            .cloned()
            .collect())
    }

    async fn evict(&self, endpoint: &str) -> Result<(), StorageError> {
        self.subscriptions.write().await.remove(endpoint);
        Ok(())
    }
}
