//! The gossip node runtime.
//!
//! Composes the endpoint, cache, hub, and discovery into the epidemic
//! pipeline and owns the lifecycle. One long-running worker task drives
//! receive → decode → admit → mark-self → publish → forward; an
//! application-originated message enters the same tail of the pipeline,
//! skipping receive and publish.
//!
//! ```text
//!  ┌────────────────────────────────────────────────────────┐
//!  │                      GossipNode                        │
//!  │                                                        │
//!  │  endpoint.recv ──▶ codec.decode ──▶ cache.try_admit    │
//!  │                                          │ admitted    │
//!  │                               mark self notified       │
//!  │                                          │             │
//!  │                     ┌────────────────────┤             │
//!  │                     ▼                    ▼             │
//!  │             hub (subscribers)   discovery → forward    │
//!  │                                 to unnotified peers    │
//!  │                                                        │
//!  │  originate(payload) ─────────────────────┘             │
//!  │  (fresh envelope, no local publish)                    │
//!  └────────────────────────────────────────────────────────┘
//! ```

use {
    crate::{
        cache::ExpiringCache,
        codec::Codec,
        config::GossipNetConfig,
        discovery,
        endpoint::{DatagramEndpoint, UdpEndpoint},
        envelope::{Envelope, GossipMessage},
        error::{GossipNetError, Result},
        hub::{Subscription, SubscriptionHub},
        peer::PeerIdentity,
    },
    log::{debug, error, info, trace, warn},
    std::{
        fmt,
        net::SocketAddr,
        sync::{Arc, Mutex},
    },
    tokio::{sync::watch, task::JoinHandle, time::timeout},
};

/// Lifecycle state of a [`GossipNode`].
///
/// `Created → Running → Stopped`, with `Closed` a terminal sink reachable
/// from any state. A node is started at most once and never reused after
/// close.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeState {
    /// Constructed, worker not yet started.
    Created,
    /// Worker running.
    Running,
    /// Worker stopped; subscriptions have terminated.
    Stopped,
    /// Resources released; every operation now fails.
    Closed,
}

impl fmt::Display for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Created => "Created",
            Self::Running => "Running",
            Self::Stopped => "Stopped",
            Self::Closed => "Closed",
        };
        f.write_str(name)
    }
}

struct NodeInner {
    state: NodeState,
    worker: Option<JoinHandle<()>>,
    shutdown: Option<watch::Sender<bool>>,
}

/// The shared half of the node: everything the worker task and the public
/// operations both touch.
struct Pipeline<C: Codec, E: DatagramEndpoint> {
    config: GossipNetConfig,
    self_identity: PeerIdentity,
    codec: C,
    endpoint: E,
    cache: ExpiringCache,
    hub: SubscriptionHub<C::Payload>,
}

impl<C: Codec, E: DatagramEndpoint> Pipeline<C, E> {
    /// Receive loop. Runs until stop is signalled, the endpoint closes, or
    /// receive failures burst past the configured limit.
    async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        info!("gossip node {}: worker started", self.self_identity);
        let mut consecutive_failures: u32 = 0;

        loop {
            tokio::select! {
                // Also fires when the node is dropped without stop().
                _ = shutdown.changed() => {
                    info!("gossip node {}: stop signal received", self.self_identity);
                    break;
                }
                received = self.endpoint.recv() => match received {
                    Ok((bytes, from)) => {
                        consecutive_failures = 0;
                        self.process_datagram(&bytes, from).await;
                    }
                    Err(GossipNetError::Closed) => {
                        info!("gossip node {}: endpoint closed", self.self_identity);
                        break;
                    }
                    Err(e) => {
                        consecutive_failures = consecutive_failures.saturating_add(1);
                        warn!(
                            "gossip node {}: receive failed ({} consecutive): {}",
                            self.self_identity, consecutive_failures, e
                        );
                        if consecutive_failures >= self.config.max_consecutive_receive_failures {
                            error!(
                                "gossip node {}: {} consecutive receive failures, giving up",
                                self.self_identity, consecutive_failures
                            );
                            break;
                        }
                    }
                }
            }
        }

        self.hub.close();
        info!("gossip node {}: worker stopped", self.self_identity);
    }

    /// The per-datagram pipeline: decode, admit, mark self, publish,
    /// forward.
    async fn process_datagram(&self, bytes: &[u8], from: SocketAddr) {
        let mut message = match self.codec.decode(bytes) {
            Ok(message) => message,
            Err(e) => {
                warn!(
                    "gossip node {}: dropping undecodable datagram from {}: {}",
                    self.self_identity, from, e
                );
                return;
            }
        };

        if !self.cache.try_admit(message.envelope()) {
            trace!(
                "gossip node {}: duplicate {} from {}, dropped",
                self.self_identity,
                message.envelope().id(),
                from
            );
            return;
        }

        // Mutate before forwarding so every sent copy carries the updated
        // set. Self may already be present when the peer list contains this
        // node's own identity; processing continues either way.
        message.envelope_mut().mark_notified(&self.self_identity);
        debug!(
            "gossip node {}: accepted message {} from {}",
            self.self_identity,
            message.envelope().id(),
            from
        );

        let message = Arc::new(message);
        self.hub.publish(Arc::clone(&message));
        self.forward(&message).await;
    }

    /// Send `message` to every discovered peer absent from its
    /// notified-set. Returns how many sends the endpoint accepted.
    ///
    /// Discovery failure, encode failure, and per-peer send failures are
    /// absorbed here with logging; the cycle never aborts part-way.
    async fn forward(&self, message: &GossipMessage<C::Payload>) -> usize {
        let peers = match discovery::enumerate(&self.config).await {
            Ok(peers) => peers,
            Err(e) => {
                warn!(
                    "gossip node {}: discovery failed, empty neighbour set this cycle: {}",
                    self.self_identity, e
                );
                return 0;
            }
        };

        let envelope = message.envelope();
        let targets: Vec<&PeerIdentity> = peers
            .iter()
            .filter(|&peer| *peer != self.self_identity && !envelope.is_notified(peer))
            .collect();
        if targets.is_empty() {
            return 0;
        }

        // One serialization per cycle; forwarding never edits received
        // bytes in place.
        let bytes = match self.codec.encode(message) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(
                    "gossip node {}: encode of {} failed, nothing forwarded: {}",
                    self.self_identity,
                    envelope.id(),
                    e
                );
                return 0;
            }
        };

        let mut accepted = 0usize;
        for peer in targets {
            match self.endpoint.send_to(&bytes, peer).await {
                Ok(_) => accepted += 1,
                Err(e) => warn!(
                    "gossip node {}: forward of {} to {} failed: {}",
                    self.self_identity,
                    envelope.id(),
                    peer,
                    e
                ),
            }
        }
        trace!(
            "gossip node {}: forwarded {} to {} peers",
            self.self_identity,
            envelope.id(),
            accepted
        );
        accepted
    }
}

/// A gossip node: one participant in the epidemic dissemination network.
///
/// Exposes three operations to the embedding application — originate a
/// message, consume incoming messages via subscriptions, and participate in
/// forwarding (by being started). The node exclusively owns its endpoint,
/// cache, hub, and worker task.
pub struct GossipNode<C: Codec, E: DatagramEndpoint> {
    pipeline: Arc<Pipeline<C, E>>,
    inner: Mutex<NodeInner>,
}

impl<C: Codec> GossipNode<C, UdpEndpoint> {
    /// Construct a node on a freshly bound UDP endpoint at
    /// `0.0.0.0:self_port`.
    pub async fn bind(config: GossipNetConfig, codec: C) -> Result<Self> {
        config.validate()?;
        let endpoint = UdpEndpoint::bind(config.self_port, config.max_datagram_size).await?;
        Self::new(config, codec, endpoint)
    }
}

impl<C: Codec, E: DatagramEndpoint> GossipNode<C, E> {
    /// Construct a node over an already-built endpoint.
    ///
    /// Fails with [`GossipNetError::Config`] when the configuration is
    /// invalid.
    pub fn new(config: GossipNetConfig, codec: C, endpoint: E) -> Result<Self> {
        config.validate()?;
        let cache = ExpiringCache::new(config.message_ttl, config.sweep_interval)?;
        let self_identity = config.self_identity();
        Ok(Self {
            pipeline: Arc::new(Pipeline {
                config,
                self_identity,
                codec,
                endpoint,
                cache,
                hub: SubscriptionHub::new(),
            }),
            inner: Mutex::new(NodeInner {
                state: NodeState::Created,
                worker: None,
                shutdown: None,
            }),
        })
    }

    /// This node's identity as inserted into notified-sets.
    pub fn identity(&self) -> &PeerIdentity {
        &self.pipeline.self_identity
    }

    /// The node's configuration.
    pub fn config(&self) -> &GossipNetConfig {
        &self.pipeline.config
    }

    /// The duplicate-suppression cache.
    pub fn cache(&self) -> &ExpiringCache {
        &self.pipeline.cache
    }

    /// Current lifecycle state.
    pub fn state(&self) -> NodeState {
        self.inner.lock().expect("node lock poisoned").state
    }

    /// Start the receive/process/forward worker.
    ///
    /// Only valid on a [`NodeState::Created`] node; any other state fails
    /// with [`GossipNetError::Lifecycle`].
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock().expect("node lock poisoned");
        if inner.state != NodeState::Created {
            return Err(GossipNetError::Lifecycle(format!(
                "start() requires a Created node, this node is {}",
                inner.state
            )));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let worker = tokio::spawn(Arc::clone(&self.pipeline).run(shutdown_rx));

        inner.state = NodeState::Running;
        inner.worker = Some(worker);
        inner.shutdown = Some(shutdown_tx);
        Ok(())
    }

    /// Stop the worker, drain in-flight processing, and terminate every
    /// subscriber sequence.
    ///
    /// Waits up to `stop_grace` for the worker to acknowledge, then closes
    /// the endpoint forcibly to unblock it. Idempotent once stopped; fails
    /// with [`GossipNetError::Lifecycle`] on a node that was never started
    /// or is closed.
    pub async fn stop(&self) -> Result<()> {
        let (worker, shutdown) = {
            let mut inner = self.inner.lock().expect("node lock poisoned");
            match inner.state {
                NodeState::Running => {
                    inner.state = NodeState::Stopped;
                    (inner.worker.take(), inner.shutdown.take())
                }
                NodeState::Stopped => return Ok(()),
                state => {
                    return Err(GossipNetError::Lifecycle(format!(
                        "stop() requires a Running node, this node is {state}"
                    )))
                }
            }
        };

        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(true);
        }
        self.join_worker(worker).await;
        // The worker closes the hub on exit; repeat in case it was aborted.
        self.pipeline.hub.close();
        Ok(())
    }

    /// Release the endpoint and cache. Callable from any state; stops the
    /// worker first when running. Operations after close fail with
    /// [`GossipNetError::Lifecycle`].
    pub async fn close(&self) -> Result<()> {
        let (previous, worker, shutdown) = {
            let mut inner = self.inner.lock().expect("node lock poisoned");
            if inner.state == NodeState::Closed {
                return Err(GossipNetError::Lifecycle(
                    "close() on an already closed node".into(),
                ));
            }
            let previous = inner.state;
            inner.state = NodeState::Closed;
            (previous, inner.worker.take(), inner.shutdown.take())
        };

        if previous == NodeState::Running {
            if let Some(shutdown) = shutdown {
                let _ = shutdown.send(true);
            }
            self.join_worker(worker).await;
        }

        self.pipeline.endpoint.close();
        self.pipeline.hub.close();
        info!("gossip node {}: closed", self.pipeline.self_identity);
        Ok(())
    }

    async fn join_worker(&self, worker: Option<JoinHandle<()>>) {
        let Some(mut worker) = worker else { return };
        match timeout(self.pipeline.config.stop_grace, &mut worker).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!(
                "gossip node {}: worker task failed: {}",
                self.pipeline.self_identity, e
            ),
            Err(_) => {
                warn!(
                    "gossip node {}: worker did not stop within {:?}, closing endpoint",
                    self.pipeline.self_identity, self.pipeline.config.stop_grace
                );
                self.pipeline.endpoint.close();
                if let Err(e) = worker.await {
                    error!(
                        "gossip node {}: worker task failed: {}",
                        self.pipeline.self_identity, e
                    );
                }
            }
        }
    }

    /// Originate a message: fresh envelope, admit to the local cache, mark
    /// self notified, and forward to the current neighbour set.
    ///
    /// The originator does not observe its own message through
    /// subscription. Returns the number of peers the endpoint accepted a
    /// send for — a statement of attempts, not of delivery.
    pub async fn originate(&self, payload: C::Payload) -> Result<usize> {
        {
            let inner = self.inner.lock().expect("node lock poisoned");
            if inner.state == NodeState::Closed {
                return Err(GossipNetError::Lifecycle("originate() after close".into()));
            }
        }

        let mut envelope = Envelope::originate();
        self.pipeline.cache.try_admit(&envelope);
        envelope.mark_notified(&self.pipeline.self_identity);

        let message = GossipMessage::from_parts(envelope, payload);
        debug!(
            "gossip node {}: originating {}",
            self.pipeline.self_identity,
            message.envelope().id()
        );
        Ok(self.pipeline.forward(&message).await)
    }

    /// Register a subscriber. Items flow while the node runs; the sequence
    /// terminates cleanly when it stops.
    pub fn subscribe(&self) -> Result<Subscription<C::Payload>> {
        let inner = self.inner.lock().expect("node lock poisoned");
        if inner.state == NodeState::Closed {
            return Err(GossipNetError::Lifecycle("subscribe() after close".into()));
        }
        Ok(self.pipeline.hub.subscribe())
    }

    /// Remove a subscriber. Items already queued to it remain readable.
    pub fn unsubscribe(&self, subscription: &Subscription<C::Payload>) -> Result<()> {
        let inner = self.inner.lock().expect("node lock poisoned");
        if inner.state == NodeState::Closed {
            return Err(GossipNetError::Lifecycle("unsubscribe() after close".into()));
        }
        self.pipeline.hub.unsubscribe(subscription);
        Ok(())
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            codec::JsonCodec,
            endpoint::{MemoryEndpoint, MemoryNetwork},
        },
        serde::{Deserialize, Serialize},
        std::time::Duration,
    };

    #[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
    struct Note {
        text: String,
    }

    fn note(text: &str) -> Note {
        Note { text: text.into() }
    }

    type TestNode = GossipNode<JsonCodec<Note>, MemoryEndpoint>;

    fn node_on(network: &MemoryNetwork, host: &str, peers: &[&str]) -> TestNode {
        let mut config = GossipNetConfig::dev_default(host, 9055);
        config.static_peers = peers
            .iter()
            .map(|h| PeerIdentity::new(*h, 9055))
            .collect();
        let endpoint = network.endpoint(config.self_identity());
        GossipNode::new(config, JsonCodec::new(), endpoint).unwrap()
    }

    #[tokio::test]
    async fn test_start_requires_created() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        assert_eq!(node.state(), NodeState::Created);

        node.start().unwrap();
        assert_eq!(node.state(), NodeState::Running);
        assert!(matches!(node.start(), Err(GossipNetError::Lifecycle(_))));

        node.stop().await.unwrap();
        assert!(matches!(node.start(), Err(GossipNetError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_stop_is_idempotent_once_stopped() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        node.start().unwrap();
        node.stop().await.unwrap();
        node.stop().await.unwrap();
        assert_eq!(node.state(), NodeState::Stopped);
    }

    #[tokio::test]
    async fn test_stop_before_start_is_misuse() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        assert!(matches!(node.stop().await, Err(GossipNetError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        node.close().await.unwrap();
        assert_eq!(node.state(), NodeState::Closed);

        assert!(matches!(node.start(), Err(GossipNetError::Lifecycle(_))));
        assert!(matches!(
            node.originate(note("x")).await,
            Err(GossipNetError::Lifecycle(_))
        ));
        assert!(matches!(node.subscribe(), Err(GossipNetError::Lifecycle(_))));
        assert!(matches!(node.close().await, Err(GossipNetError::Lifecycle(_))));
    }

    #[tokio::test]
    async fn test_close_while_running_implies_stop() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        node.start().unwrap();
        node.close().await.unwrap();
        assert_eq!(node.state(), NodeState::Closed);
    }

    #[tokio::test]
    async fn test_originate_counts_accepted_sends() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &["node-b", "node-c"]);
        // Memory sends to unregistered peers still succeed, like UDP.
        let sent = node.originate(note("hello")).await.unwrap();
        assert_eq!(sent, 2);
        assert_eq!(node.cache().len(), 1);
    }

    #[tokio::test]
    async fn test_originate_excludes_self_from_targets() {
        let network = MemoryNetwork::new();
        // Peer list contains this node's own identity.
        let node = node_on(&network, "node-a", &["node-a", "node-b"]);
        let sent = node.originate(note("hello")).await.unwrap();
        assert_eq!(sent, 1);
    }

    #[tokio::test]
    async fn test_forwarded_copy_carries_originator_in_notified_set() {
        let network = MemoryNetwork::new();
        let observer = network.endpoint(PeerIdentity::new("node-b", 9055));
        let node = node_on(&network, "node-a", &["node-b"]);

        node.originate(note("hello")).await.unwrap();

        let (bytes, _) = tokio::time::timeout(Duration::from_secs(2), observer.recv())
            .await
            .expect("timeout")
            .unwrap();
        let codec = JsonCodec::<Note>::new();
        let message = codec.decode(&bytes).unwrap();
        assert!(message.envelope().is_notified(&PeerIdentity::new("node-a", 9055)));
        assert_eq!(message.payload(), &note("hello"));
    }

    #[tokio::test]
    async fn test_received_message_published_and_duplicate_dropped() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        let mut reader = node.subscribe().unwrap();
        node.start().unwrap();

        // Hand-deliver the same datagram twice from a foreign sender.
        let sender = network.endpoint(PeerIdentity::new("node-x", 9055));
        let codec = JsonCodec::<Note>::new();
        let mut envelope = Envelope::originate();
        envelope.mark_notified(&PeerIdentity::new("node-x", 9055));
        let bytes = codec
            .encode(&GossipMessage::from_parts(envelope, note("once")))
            .unwrap();
        sender.send_to(&bytes, node.identity()).await.unwrap();
        sender.send_to(&bytes, node.identity()).await.unwrap();

        let first = tokio::time::timeout(Duration::from_secs(2), reader.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(first.payload(), &note("once"));
        // Second copy was suppressed by the cache.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(reader.try_recv().is_none());
        assert_eq!(node.cache().len(), 1);

        node.stop().await.unwrap();
        assert!(reader.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_undecodable_datagram_is_skipped() {
        let network = MemoryNetwork::new();
        let node = node_on(&network, "node-a", &[]);
        let mut reader = node.subscribe().unwrap();
        node.start().unwrap();

        let sender = network.endpoint(PeerIdentity::new("node-x", 9055));
        sender.send_to(b"not a message", node.identity()).await.unwrap();

        // The worker logs and keeps going; a valid datagram still arrives.
        let codec = JsonCodec::<Note>::new();
        let mut envelope = Envelope::originate();
        envelope.mark_notified(&PeerIdentity::new("node-x", 9055));
        let bytes = codec
            .encode(&GossipMessage::from_parts(envelope, note("valid")))
            .unwrap();
        sender.send_to(&bytes, node.identity()).await.unwrap();

        let item = tokio::time::timeout(Duration::from_secs(2), reader.recv())
            .await
            .expect("timeout")
            .unwrap();
        assert_eq!(item.payload(), &note("valid"));
        node.stop().await.unwrap();
    }
}
