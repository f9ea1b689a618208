// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Topic channel subscription and cache invalidation.
//!
//! The manager keeps exactly one subscription to a fixed channel while the
//! join condition holds:
//!
//! ```text
//! authenticated ∧ state == Connected ∧ transport present
//! ```
//!
//! [`ChannelSubscriptionManager::reconcile`] is called after every input the
//! runtime processes. It subscribes when the condition turns true and
//! unsubscribes when it turns false, so subscribe and unsubscribe calls are
//! paired one to one per condition change no matter how often it runs.

use std::sync::Arc;

use pulse_core::ConnectionState;
use tracing::{debug, info, trace, warn};

use crate::transport::{ChannelMessage, Transport};
use crate::BoxFuture;

/// Channel carrying inventory change notifications.
pub const DEFAULT_CHANNEL: &str = "inventory";
/// Event name that triggers a refetch.
pub const DEFAULT_EVENT: &str = "resource.created";
/// Query key refetched when the watched event arrives.
pub const DEFAULT_QUERY_KEY: &str = "inventory";

/// Keyed data cache that can refresh its active queries.
pub trait CacheInvalidator: Send + Sync {
    /// Refetch the active queries under `query_key`.
    ///
    /// The returned future is spawned and never awaited by the caller.
    fn refetch_active(&self, query_key: &str) -> BoxFuture<'static, ()>;
}

/// Which channel to join and what to do with its events.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelConfig {
    pub channel: String,
    pub event: String,
    pub query_key: String,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig {
            channel: DEFAULT_CHANNEL.to_string(),
            event: DEFAULT_EVENT.to_string(),
            query_key: DEFAULT_QUERY_KEY.to_string(),
        }
    }
}

/// An active subscription and the handler bound to it.
pub struct SubscriptionHandle {
    channel: String,
    event: String,
    query_key: String,
    invalidator: Arc<dyn CacheInvalidator>,
}

impl SubscriptionHandle {
    pub fn channel(&self) -> &str {
        &self.channel
    }

    pub fn event(&self) -> &str {
        &self.event
    }

    /// Run the handler for `message`. Returns true if a refetch was started.
    fn handle(&self, message: &ChannelMessage) -> bool {
        if message.channel != self.channel || message.name != self.event {
            trace!(channel = %message.channel, name = %message.name, "ignoring channel event");
            return false;
        }

        debug!(query_key = %self.query_key, "refetching after {}", message.name);
        tokio::spawn(self.invalidator.refetch_active(&self.query_key));
        true
    }
}

impl std::fmt::Debug for SubscriptionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SubscriptionHandle")
            .field("channel", &self.channel)
            .field("event", &self.event)
            .field("query_key", &self.query_key)
            .finish()
    }
}

/// Whether a subscription should exist.
pub fn join_condition(authenticated: bool, state: ConnectionState, has_transport: bool) -> bool {
    authenticated && state.is_connected() && has_transport
}

/// Maintains the single topic subscription.
pub struct ChannelSubscriptionManager {
    config: ChannelConfig,
    invalidator: Arc<dyn CacheInvalidator>,
    subscription: Option<SubscriptionHandle>,
}

impl ChannelSubscriptionManager {
    pub fn new(config: ChannelConfig, invalidator: Arc<dyn CacheInvalidator>) -> Self {
        ChannelSubscriptionManager {
            config,
            invalidator,
            subscription: None,
        }
    }

    pub fn config(&self) -> &ChannelConfig {
        &self.config
    }

    pub fn is_subscribed(&self) -> bool {
        self.subscription.is_some()
    }

    pub fn subscription(&self) -> Option<&SubscriptionHandle> {
        self.subscription.as_ref()
    }

    /// Bring the subscription in line with the join condition.
    ///
    /// Returns true if a subscription was created or destroyed.
    pub async fn reconcile<T>(
        &mut self,
        authenticated: bool,
        state: ConnectionState,
        transport: Option<&mut T>,
    ) -> bool
    where
        T: Transport + ?Sized,
    {
        let wanted = join_condition(authenticated, state, transport.is_some());
        match (wanted, transport) {
            (true, Some(transport)) if self.subscription.is_none() => {
                self.subscribe(transport).await
            }
            (false, transport) if self.subscription.is_some() => {
                self.unsubscribe(transport).await;
                true
            }
            _ => false,
        }
    }

    /// Drop the subscription regardless of the join condition.
    pub async fn unmount<T>(&mut self, transport: Option<&mut T>)
    where
        T: Transport + ?Sized,
    {
        if self.subscription.is_some() {
            self.unsubscribe(transport).await;
        }
    }

    /// Replace the cache invalidator.
    ///
    /// An active subscription is re-created so its handler uses the new
    /// invalidator.
    pub async fn set_invalidator<T>(
        &mut self,
        invalidator: Arc<dyn CacheInvalidator>,
        transport: Option<&mut T>,
    ) where
        T: Transport + ?Sized,
    {
        self.invalidator = invalidator;
        if self.subscription.is_none() {
            return;
        }
        match transport {
            Some(transport) => {
                self.unsubscribe(Some(&mut *transport)).await;
                self.subscribe(transport).await;
            }
            None => self.unsubscribe::<T>(None).await,
        }
    }

    /// Route an inbound message to the subscription handler.
    ///
    /// Returns true if it triggered a refetch.
    pub fn dispatch(&self, message: &ChannelMessage) -> bool {
        match &self.subscription {
            Some(subscription) => subscription.handle(message),
            None => {
                trace!(name = %message.name, "channel event while unsubscribed");
                false
            }
        }
    }

    async fn subscribe<T>(&mut self, transport: &mut T) -> bool
    where
        T: Transport + ?Sized,
    {
        if let Err(e) = transport.subscribe(&self.config.channel).await {
            warn!(channel = %self.config.channel, "channel subscribe failed: {}", e);
            return false;
        }

        self.subscription = Some(SubscriptionHandle {
            channel: self.config.channel.clone(),
            event: self.config.event.clone(),
            query_key: self.config.query_key.clone(),
            invalidator: Arc::clone(&self.invalidator),
        });
        info!(channel = %self.config.channel, event = %self.config.event, "subscribed");
        true
    }

    async fn unsubscribe<T>(&mut self, transport: Option<&mut T>)
    where
        T: Transport + ?Sized,
    {
        let Some(subscription) = self.subscription.take() else {
            return;
        };
        if let Some(transport) = transport {
            if let Err(e) = transport.unsubscribe(&subscription.channel).await {
                debug!(channel = %subscription.channel, "channel unsubscribe failed: {}", e);
            }
        }
        info!(channel = %subscription.channel, "unsubscribed");
    }
}

#[cfg(test)]
#[path = "channel_tests.rs"]
mod tests;
