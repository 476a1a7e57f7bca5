//! Notification facade used by the portal.
//!
//! The portal calls three operations: [`NotificationSender::subscribe`],
//! [`NotificationSender::unsubscribe`] and [`NotificationSender::send`].
//! Per-subscription failures are logged and folded into a boolean; they
//! never surface as errors to the caller.

// Rust guideline compliant 2026-02

use futures_util::{stream, StreamExt};
use serde_json::{Map, Value};
use std::sync::Arc;

use super::dispatch::{endpoint_label, DeliveryResult, PushDispatcher};
use super::push::{MemberId, NewSubscription, PushMessage, Subscription};
use crate::config::PushConfig;
use crate::constants::DEFAULT_CONCURRENCY;
use crate::store::SubscriptionStore;

/// Fans notifications out to a member's subscriptions and evicts expired ones.
pub struct NotificationSender {
    store: Arc<dyn SubscriptionStore>,
    dispatcher: Option<Arc<PushDispatcher>>,
    concurrency: usize,
}

impl std::fmt::Debug for NotificationSender {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSender")
            .field("enabled", &self.is_enabled())
            .field("concurrency", &self.concurrency)
            .finish_non_exhaustive()
    }
}

impl NotificationSender {
    /// Sender that delivers through `dispatcher`.
    pub fn new(store: Arc<dyn SubscriptionStore>, dispatcher: PushDispatcher) -> Self {
        Self {
            store,
            dispatcher: Some(Arc::new(dispatcher)),
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Sender that stores subscriptions but never delivers.
    pub fn disabled(store: Arc<dyn SubscriptionStore>) -> Self {
        Self {
            store,
            dispatcher: None,
            concurrency: DEFAULT_CONCURRENCY,
        }
    }

    /// Build from configuration.
    ///
    /// A configuration error is logged here, once, and leaves the sender
    /// disabled; it never aborts the host.
    pub fn from_config(config: &PushConfig, store: Arc<dyn SubscriptionStore>) -> Self {
        let sender = match config.dispatcher() {
            Ok(Some(dispatcher)) => {
                log::info!("[WebPush] Push delivery enabled");
                Self::new(store, dispatcher)
            }
            Ok(None) => {
                log::info!("[WebPush] Push delivery disabled by configuration");
                Self::disabled(store)
            }
            Err(e) => {
                log::error!("[WebPush] {e}; push delivery disabled");
                Self::disabled(store)
            }
        };
        sender.with_concurrency(config.concurrency)
    }

    /// Bound the number of deliveries in flight per fan-out (minimum 1).
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    /// Whether VAPID configuration loaded and sending is possible.
    pub fn is_enabled(&self) -> bool {
        self.dispatcher.is_some()
    }

    /// Register (or refresh) a browser subscription for a member.
    ///
    /// Malformed endpoints or keys are rejected before storage.
    pub async fn subscribe(
        &self,
        member_id: MemberId,
        endpoint: &str,
        p256dh: &str,
        auth: &str,
        user_agent: Option<&str>,
    ) -> bool {
        let subscription = NewSubscription {
            member_id,
            endpoint: endpoint.trim().to_string(),
            p256dh: p256dh.trim().to_string(),
            auth: auth.trim().to_string(),
            user_agent: user_agent.map(str::to_string),
        };

        if let Err(e) = subscription.validate() {
            log::warn!("[WebPush] Rejected subscription for member {}: {}", member_id, e);
            return false;
        }

        match self.store.store(subscription).await {
            Ok(stored) => {
                log::info!(
                    "[WebPush] Stored subscription {} for member {} ({})",
                    &stored.id.to_string()[..8],
                    member_id,
                    endpoint_label(&stored.endpoint)
                );
                true
            }
            Err(e) => {
                log::error!(
                    "[WebPush] Failed to store subscription for member {}: {}",
                    member_id,
                    e
                );
                false
            }
        }
    }

    /// Remove a member's subscription. Returns `true` if one was removed.
    pub async fn unsubscribe(&self, member_id: MemberId, endpoint: &str) -> bool {
        match self.store.remove(member_id, endpoint.trim()).await {
            Ok(removed) => removed,
            Err(e) => {
                log::error!(
                    "[WebPush] Failed to remove subscription for member {}: {}",
                    member_id,
                    e
                );
                false
            }
        }
    }

    /// Send a notification to every subscription of `member_id`.
    ///
    /// Returns `true` if at least one subscription accepted it. A member
    /// with no subscriptions yields `false`.
    pub async fn send(
        &self,
        member_id: MemberId,
        title: &str,
        body: &str,
        data: Map<String, Value>,
    ) -> bool {
        let message = PushMessage::new(title, body).with_data(data);
        self.send_message(member_id, &message).await
    }

    /// Send a prepared message to every subscription of `member_id`.
    pub async fn send_message(&self, member_id: MemberId, message: &PushMessage) -> bool {
        let Some(dispatcher) = self.dispatcher.as_deref() else {
            log::debug!("[WebPush] Sending disabled; dropping message for member {}", member_id);
            return false;
        };

        let subscriptions = match self.store.list_for(member_id).await {
            Ok(subscriptions) => subscriptions,
            Err(e) => {
                log::error!(
                    "[WebPush] Failed to load subscriptions for member {}: {}",
                    member_id,
                    e
                );
                return false;
            }
        };

        if subscriptions.is_empty() {
            log::debug!("[WebPush] Member {} has no push subscriptions", member_id);
            return false;
        }

        let delivered = stream::iter(subscriptions)
            .map(|subscription| async move {
                self.deliver_one(dispatcher, &subscription, message).await
            })
            .buffer_unordered(self.concurrency)
            .fold(0usize, |count, ok| async move { count + usize::from(ok) })
            .await;

        log::debug!("[WebPush] Member {}: {} subscription(s) accepted", member_id, delivered);
        delivered > 0
    }

    /// Send the same notification to several members independently.
    ///
    /// One member's failure never blocks another's delivery. Returns the
    /// outcome per member, in completion order.
    pub async fn send_to_members(
        &self,
        member_ids: &[MemberId],
        title: &str,
        body: &str,
        data: Map<String, Value>,
    ) -> Vec<(MemberId, bool)> {
        let message = PushMessage::new(title, body).with_data(data);
        let message = &message;

        stream::iter(member_ids.iter().copied())
            .map(|member_id| async move {
                (member_id, self.send_message(member_id, message).await)
            })
            .buffer_unordered(self.concurrency)
            .collect()
            .await
    }

    async fn deliver_one(
        &self,
        dispatcher: &PushDispatcher,
        subscription: &Subscription,
        message: &PushMessage,
    ) -> bool {
        match dispatcher.deliver(subscription, message).await {
            Ok(DeliveryResult::Delivered) => true,
            Ok(DeliveryResult::Expired { .. }) => {
                if let Err(e) = self.store.evict(&subscription.endpoint).await {
                    log::error!(
                        "[WebPush] Failed to evict {}: {}",
                        endpoint_label(&subscription.endpoint),
                        e
                    );
                } else {
                    log::info!("[WebPush] Evicted {}", endpoint_label(&subscription.endpoint));
                }
                false
            }
            Ok(DeliveryResult::Transient { .. } | DeliveryResult::Rejected { .. }) => false,
            Err(e) => {
                log::warn!(
                    "[WebPush] Skipping subscription {}: {}",
                    endpoint_label(&subscription.endpoint),
                    e
                );
                false
            }
        }
    }
}
