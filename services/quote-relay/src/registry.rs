//! Subscription registry
//!
//! Tracks every live connection together with its single-instrument filter.
//! Entries live in a sharded concurrent map; each operation locks only the
//! shard it touches, so a reader never sees a half-applied update.

use crate::outbound::Outbound;
use dashmap::DashMap;
use futures::future::join_all;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{debug, info, warn};
use types::ids::InstrumentId;

/// Unique connection identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Registry entry: transport plus current filter.
struct Subscriber {
    outbound: Arc<dyn Outbound>,
    /// `None` matches nothing.
    subscription: Option<InstrumentId>,
}

pub struct SubscriptionRegistry {
    subscribers: DashMap<ConnectionId, Subscriber>,
    next_id: AtomicU64,
}

impl Default for SubscriptionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl SubscriptionRegistry {
    pub fn new() -> Self {
        Self {
            subscribers: DashMap::new(),
            next_id: AtomicU64::new(1),
        }
    }

    /// Register a new connection with no subscription and return its ID.
    pub fn register(&self, outbound: Arc<dyn Outbound>) -> ConnectionId {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        self.subscribers.insert(
            id,
            Subscriber {
                outbound,
                subscription: None,
            },
        );
        debug!(connection = %id, "Connection registered");
        id
    }

    /// Remove a connection. Returns false if it was already gone.
    pub fn unregister(&self, id: ConnectionId) -> bool {
        let removed = self.subscribers.remove(&id).is_some();
        debug!(connection = %id, removed, "Connection unregistered");
        removed
    }

    /// Replace the connection's filter.
    ///
    /// Returns false (and changes nothing) for an unknown connection.
    pub fn set_subscription(&self, id: ConnectionId, instrument: InstrumentId) -> bool {
        match self.subscribers.get_mut(&id) {
            Some(mut subscriber) => {
                subscriber.subscription = Some(instrument);
                true
            }
            None => false,
        }
    }

    pub fn subscription_of(&self, id: ConnectionId) -> Option<InstrumentId> {
        self.subscribers.get(&id).and_then(|s| s.subscription)
    }

    /// All connections whose filter equals `instrument`.
    pub fn subscribers_of(&self, instrument: InstrumentId) -> Vec<(ConnectionId, Arc<dyn Outbound>)> {
        self.subscribers
            .iter()
            .filter(|entry| entry.subscription == Some(instrument))
            .map(|entry| (*entry.key(), Arc::clone(&entry.outbound)))
            .collect()
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Drain the registry and close every transport concurrently.
    pub async fn close_all(&self) {
        let ids: Vec<ConnectionId> = self.subscribers.iter().map(|e| *e.key()).collect();
        let drained: Vec<(ConnectionId, Arc<dyn Outbound>)> = ids
            .into_iter()
            .filter_map(|id| self.subscribers.remove(&id))
            .map(|(id, subscriber)| (id, subscriber.outbound))
            .collect();

        let count = drained.len();
        let results = join_all(drained.into_iter().map(|(id, outbound)| async move {
            (id, outbound.close().await)
        }))
        .await;

        for (id, result) in results {
            if let Err(e) = result {
                warn!(connection = %id, error = %e, "Failed to close connection");
            }
        }
        info!(connections = count, "Subscribers disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingOutbound;

    fn outbound() -> Arc<dyn Outbound> {
        Arc::new(RecordingOutbound::new())
    }

    #[test]
    fn test_register_assigns_unique_ids() {
        let registry = SubscriptionRegistry::new();
        let a = registry.register(outbound());
        let b = registry.register(outbound());

        assert_ne!(a, b);
        assert_eq!(registry.len(), 2);
        assert_eq!(registry.subscription_of(a), None);
    }

    #[test]
    fn test_subscription_replaces() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register(outbound());

        assert!(registry.set_subscription(id, InstrumentId::new(1)));
        assert!(registry.set_subscription(id, InstrumentId::new(2)));

        assert_eq!(registry.subscription_of(id), Some(InstrumentId::new(2)));
        assert!(registry.subscribers_of(InstrumentId::new(1)).is_empty());
        assert_eq!(registry.subscribers_of(InstrumentId::new(2)).len(), 1);
    }

    #[test]
    fn test_unset_subscription_matches_nothing() {
        let registry = SubscriptionRegistry::new();
        registry.register(outbound());

        assert!(registry.subscribers_of(InstrumentId::new(1)).is_empty());
    }

    #[test]
    fn test_subscribers_of_filters() {
        let registry = SubscriptionRegistry::new();
        let a = registry.register(outbound());
        let b = registry.register(outbound());
        let c = registry.register(outbound());
        registry.set_subscription(a, InstrumentId::new(1));
        registry.set_subscription(b, InstrumentId::new(1));
        registry.set_subscription(c, InstrumentId::new(3));

        let mut ids: Vec<ConnectionId> = registry
            .subscribers_of(InstrumentId::new(1))
            .into_iter()
            .map(|(id, _)| id)
            .collect();
        ids.sort();
        assert_eq!(ids, vec![a, b]);
    }

    #[test]
    fn test_unregister() {
        let registry = SubscriptionRegistry::new();
        let id = registry.register(outbound());
        registry.set_subscription(id, InstrumentId::new(1));

        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert!(registry.is_empty());
        assert!(registry.subscribers_of(InstrumentId::new(1)).is_empty());
        assert!(!registry.set_subscription(id, InstrumentId::new(1)));
    }

    #[tokio::test]
    async fn test_close_all_drains_and_closes() {
        let registry = SubscriptionRegistry::new();
        let first = Arc::new(RecordingOutbound::new());
        let second = Arc::new(RecordingOutbound::new());
        registry.register(first.clone());
        registry.register(second.clone());

        registry.close_all().await;

        assert!(registry.is_empty());
        assert!(first.is_closed());
        assert!(second.is_closed());
    }
}
