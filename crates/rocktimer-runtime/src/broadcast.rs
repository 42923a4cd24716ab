//! Observer broadcast
//!
//! Each observer owns a watch channel. Publishing overwrites the slot, so a
//! slow observer only ever misses intermediate snapshots and never blocks the
//! publisher. Observers whose receiver is gone are pruned on the next publish.

use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::watch;

use rocktimer_core::SubscriberId;

use crate::StateSnapshot;

struct Subscriber {
    id: SubscriberId,
    tx: watch::Sender<Arc<StateSnapshot>>,
}

struct HubInner {
    subscribers: Vec<Subscriber>,
    latest: Arc<StateSnapshot>,
    next_id: u64,
    published: u64,
    stale: u64,
}

/// Hub statistics
#[derive(Clone, Debug, Default)]
pub struct HubStats {
    pub subscribers: usize,
    pub published: u64,
    /// Snapshots refused because a newer one had already gone out
    pub stale: u64,
}

/// Fan-out point for state snapshots
pub struct ObserverHub {
    inner: Mutex<HubInner>,
}

impl ObserverHub {
    pub fn new(initial: StateSnapshot) -> Self {
        ObserverHub {
            inner: Mutex::new(HubInner {
                subscribers: Vec::new(),
                latest: Arc::new(initial),
                next_id: 1,
                published: 0,
                stale: 0,
            }),
        }
    }

    /// Register an observer. It starts out holding the latest snapshot.
    pub fn subscribe(&self) -> Subscription {
        let mut inner = self.inner.lock();
        let id = SubscriberId::new(inner.next_id);
        inner.next_id += 1;

        let (tx, rx) = watch::channel(Arc::clone(&inner.latest));
        inner.subscribers.push(Subscriber { id, tx });
        tracing::debug!(subscriber = id.0, "observer subscribed");

        Subscription { id, rx }
    }

    /// Deliver a snapshot to every live observer.
    /// Returns the number of observers reached.
    pub fn publish(&self, snapshot: StateSnapshot) -> usize {
        let mut inner = self.inner.lock();

        // Publication happens after the node lock is released, so two
        // publishers can race; the older snapshot must not overwrite the newer.
        if snapshot.seq < inner.latest.seq {
            inner.stale += 1;
            return 0;
        }

        let snapshot = Arc::new(snapshot);
        inner.latest = Arc::clone(&snapshot);
        inner.published += 1;

        inner.subscribers.retain(|subscriber| {
            let delivered = subscriber.tx.send(Arc::clone(&snapshot)).is_ok();
            if !delivered {
                tracing::debug!(subscriber = subscriber.id.0, "observer gone, removing");
            }
            delivered
        });

        inner.subscribers.len()
    }

    /// Get latest published snapshot
    pub fn latest(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.inner.lock().latest)
    }

    /// Get number of registered observers
    pub fn subscriber_count(&self) -> usize {
        self.inner.lock().subscribers.len()
    }

    pub fn stats(&self) -> HubStats {
        let inner = self.inner.lock();
        HubStats {
            subscribers: inner.subscribers.len(),
            published: inner.published,
            stale: inner.stale,
        }
    }
}

/// One observer's view of the snapshot stream
pub struct Subscription {
    id: SubscriberId,
    rx: watch::Receiver<Arc<StateSnapshot>>,
}

impl Subscription {
    pub fn id(&self) -> SubscriberId {
        self.id
    }

    /// Latest snapshot delivered to this observer
    pub fn current(&self) -> Arc<StateSnapshot> {
        Arc::clone(&self.rx.borrow())
    }

    /// Wait for the next snapshot. `None` once the hub has dropped this observer.
    pub async fn recv(&mut self) -> Option<Arc<StateSnapshot>> {
        self.rx.changed().await.ok()?;
        Some(Arc::clone(&self.rx.borrow_and_update()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::time::Duration;

    use rocktimer_core::SystemState;
    use rocktimer_state::MeasurementSession;

    fn snapshot(seq: u64, state: SystemState) -> StateSnapshot {
        StateSnapshot {
            seq,
            state,
            session: MeasurementSession::new().view(),
            sensors: BTreeMap::new(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        let mut sub = hub.subscribe();
        assert_eq!(sub.current().seq, 0);

        assert_eq!(hub.publish(snapshot(1, SystemState::Armed)), 1);

        let got = sub.recv().await.unwrap();
        assert_eq!(got.seq, 1);
        assert_eq!(got.state, SystemState::Armed);
    }

    #[tokio::test]
    async fn test_dropped_observer_does_not_block_others() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        let gone = hub.subscribe();
        let mut alive = hub.subscribe();
        assert_eq!(hub.subscriber_count(), 2);

        drop(gone);
        assert_eq!(hub.publish(snapshot(1, SystemState::Armed)), 1);
        assert_eq!(hub.subscriber_count(), 1);

        let got = tokio::time::timeout(Duration::from_secs(1), alive.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(got.seq, 1);
    }

    #[tokio::test]
    async fn test_slow_observer_sees_latest() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        let mut slow = hub.subscribe();

        for seq in 1..=5 {
            hub.publish(snapshot(seq, SystemState::Armed));
        }

        // Intermediate snapshots are coalesced
        assert_eq!(slow.recv().await.unwrap().seq, 5);
    }

    #[test]
    fn test_stale_snapshot_refused() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        let sub = hub.subscribe();

        hub.publish(snapshot(3, SystemState::Measuring));
        assert_eq!(hub.publish(snapshot(2, SystemState::Armed)), 0);

        assert_eq!(hub.latest().seq, 3);
        assert_eq!(sub.current().state, SystemState::Measuring);
        assert_eq!(hub.stats().stale, 1);
    }

    #[tokio::test]
    async fn test_recv_ends_when_hub_dropped() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        let mut sub = hub.subscribe();
        drop(hub);
        assert!(sub.recv().await.is_none());
    }

    #[test]
    fn test_late_subscriber_starts_at_latest() {
        let hub = ObserverHub::new(snapshot(0, SystemState::Idle));
        hub.publish(snapshot(4, SystemState::Completed));
        let sub = hub.subscribe();
        assert_eq!(sub.current().seq, 4);
    }
}
