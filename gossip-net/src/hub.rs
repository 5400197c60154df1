//! Subscription hub: fan-out of admitted messages to application consumers.
//!
//! Each subscriber gets its own unbounded queue, so a slow consumer never
//! stalls the node worker — it consumes memory instead. That trade is
//! deliberate and not mitigated here; applications with lagging consumers
//! should drain or unsubscribe.

use {
    crate::envelope::GossipMessage,
    log::trace,
    std::{
        collections::HashMap,
        sync::{Arc, Mutex},
    },
    tokio::sync::mpsc,
};

type Item<P> = Arc<GossipMessage<P>>;

struct HubInner<P> {
    subscribers: HashMap<u64, mpsc::UnboundedSender<Item<P>>>,
    next_id: u64,
    closed: bool,
}

/// Delivers each published message exactly once to every active
/// subscriber, in the order the node admitted them locally. Ordering
/// between subscribers is unspecified.
pub struct SubscriptionHub<P> {
    inner: Mutex<HubInner<P>>,
}

impl<P> SubscriptionHub<P> {
    pub(crate) fn new() -> Self {
        Self {
            inner: Mutex::new(HubInner {
                subscribers: HashMap::new(),
                next_id: 0,
                closed: false,
            }),
        }
    }

    /// Register a new subscriber.
    ///
    /// Subscribing to a hub whose node has already stopped yields a
    /// subscription that terminates immediately.
    pub(crate) fn subscribe(&self) -> Subscription<P> {
        let (tx, rx) = mpsc::unbounded_channel();
        let mut inner = self.inner.lock().expect("hub lock poisoned");
        let id = inner.next_id;
        inner.next_id += 1;
        if !inner.closed {
            inner.subscribers.insert(id, tx);
        }
        // When closed, tx drops here and the subscription yields None.
        Subscription { id, rx }
    }

    /// Remove a subscriber. Items already queued to it remain readable;
    /// no new items will arrive.
    pub(crate) fn unsubscribe(&self, subscription: &Subscription<P>) {
        let mut inner = self.inner.lock().expect("hub lock poisoned");
        inner.subscribers.remove(&subscription.id);
    }

    /// Deliver `item` to every active subscriber.
    ///
    /// Subscribers whose reader has been dropped are pruned here.
    pub(crate) fn publish(&self, item: Item<P>) {
        let mut inner = self.inner.lock().expect("hub lock poisoned");
        if inner.closed {
            return;
        }
        inner
            .subscribers
            .retain(|id, tx| match tx.send(Arc::clone(&item)) {
                Ok(()) => true,
                Err(_) => {
                    trace!("pruning subscriber {id}: reader dropped");
                    false
                }
            });
    }

    /// Terminate every subscription after it drains. Idempotent.
    pub(crate) fn close(&self) {
        let mut inner = self.inner.lock().expect("hub lock poisoned");
        inner.closed = true;
        inner.subscribers.clear();
    }

    /// Number of active subscribers.
    #[cfg(test)]
    pub(crate) fn subscriber_count(&self) -> usize {
        self.inner.lock().expect("hub lock poisoned").subscribers.len()
    }
}

/// Reader handle yielding the lazy sequence of messages admitted by the
/// node after the subscription was taken.
///
/// The sequence ends (`recv` returns `None`) once the node stops and every
/// already-queued item has been consumed. There is no error channel:
/// termination simply means the node stopped.
pub struct Subscription<P> {
    id: u64,
    rx: mpsc::UnboundedReceiver<Item<P>>,
}

impl<P> Subscription<P> {
    /// Await the next admitted message, or `None` once the sequence ends.
    pub async fn recv(&mut self) -> Option<Item<P>> {
        self.rx.recv().await
    }

    /// Non-blocking variant: a message if one is queued, `None` otherwise.
    pub fn try_recv(&mut self) -> Option<Item<P>> {
        self.rx.try_recv().ok()
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
