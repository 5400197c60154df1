//! Datagram endpoint abstraction and implementations.
//!
//! The node runtime depends on an abstract unreliable unicast channel so
//! that tests can substitute a queueing stand-in for the real UDP socket.
//! One datagram in, zero or one datagram out, no ordering guarantees, no
//! fragmentation handled above this layer.

use {
    crate::{
        error::{GossipNetError, Result},
        peer::PeerIdentity,
    },
    async_trait::async_trait,
    std::net::SocketAddr,
    tokio::{net::UdpSocket, sync::watch},
};

/// An unreliable, message-oriented network endpoint.
///
/// The receive path has a single consumer (the node worker); the send path
/// may be used concurrently and delivers each datagram to completion before
/// the next begins.
#[async_trait]
pub trait DatagramEndpoint: Send + Sync + 'static {
    /// Send one datagram to `peer`. Returns the number of bytes accepted.
    async fn send_to(&self, bytes: &[u8], peer: &PeerIdentity) -> Result<usize>;

    /// Receive one datagram, blocking until one is available or the
    /// endpoint is closed — in which case this returns
    /// [`GossipNetError::Closed`].
    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)>;

    /// Close the endpoint, unblocking any pending `recv`. Idempotent.
    fn close(&self);

    /// Whether `close` has been called.
    fn is_closed(&self) -> bool;
}

// ── UDP implementation ──────────────────────────────────────────────────────

/// A [`DatagramEndpoint`] over a UDP socket bound to all local interfaces,
/// with broadcast permitted.
pub struct UdpEndpoint {
    socket: UdpSocket,
    max_datagram_size: usize,
    closed_tx: watch::Sender<bool>,
    closed_rx: watch::Receiver<bool>,
}

impl UdpEndpoint {
    /// Bind `0.0.0.0:port`. Receives are read into a buffer of
    /// `max_datagram_size` bytes; anything longer was truncated by the OS
    /// and will surface downstream as a decode failure.
    pub async fn bind(port: u16, max_datagram_size: usize) -> Result<Self> {
        let socket = UdpSocket::bind(("0.0.0.0", port))
            .await
            .map_err(GossipNetError::Endpoint)?;
        socket.set_broadcast(true).map_err(GossipNetError::Endpoint)?;

        let (closed_tx, closed_rx) = watch::channel(false);
        Ok(Self {
            socket,
            max_datagram_size,
            closed_tx,
            closed_rx,
        })
    }

    /// The bound local address (useful when binding port 0 in tests).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.socket.local_addr().map_err(GossipNetError::Endpoint)
    }
}

#[async_trait]
impl DatagramEndpoint for UdpEndpoint {
    async fn send_to(&self, bytes: &[u8], peer: &PeerIdentity) -> Result<usize> {
        if self.is_closed() {
            return Err(GossipNetError::Closed);
        }
        self.socket
            .send_to(bytes, (peer.host(), peer.port()))
            .await
            .map_err(|source| GossipNetError::Send {
                peer: peer.to_string(),
                source,
            })
    }

    async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
        let mut closed = self.closed_rx.clone();
        if *closed.borrow() {
            return Err(GossipNetError::Closed);
        }

        let mut buf = vec![0u8; self.max_datagram_size];
        tokio::select! {
            res = self.socket.recv_from(&mut buf) => match res {
                Ok((len, from)) => {
                    buf.truncate(len);
                    Ok((buf, from))
                }
                Err(e) => Err(GossipNetError::Receive(e)),
            },
            _ = closed.changed() => Err(GossipNetError::Closed),
        }
    }

    fn close(&self) {
        let _ = self.closed_tx.send(true);
    }

    fn is_closed(&self) -> bool {
        *self.closed_rx.borrow()
    }
}

// ── In-memory implementation for tests ──────────────────────────────────────

#[cfg(any(test, feature = "dev-context-only-utils"))]
pub use memory::{MemoryEndpoint, MemoryNetwork};

#[cfg(any(test, feature = "dev-context-only-utils"))]
mod memory {
    use {
        super::*,
        std::{
            collections::{HashMap, HashSet},
            net::{IpAddr, Ipv4Addr},
            sync::{Arc, Mutex},
        },
        tokio::sync::mpsc,
    };

    type Datagram = (Vec<u8>, SocketAddr);

    #[derive(Default)]
    struct NetworkInner {
        inboxes: Mutex<HashMap<PeerIdentity, mpsc::UnboundedSender<Datagram>>>,
        blackholes: Mutex<HashSet<PeerIdentity>>,
    }

    /// A switchboard of in-memory endpoints keyed by peer identity.
    ///
    /// Cheaply clonable handle; clones share the switchboard. Datagrams
    /// sent to an unregistered or blackholed identity vanish silently,
    /// matching UDP's fire-and-forget semantics.
    #[derive(Clone, Default)]
    pub struct MemoryNetwork {
        inner: Arc<NetworkInner>,
    }

    impl MemoryNetwork {
        pub fn new() -> Self {
            Self::default()
        }

        /// Create and register an endpoint for `identity`.
        pub fn endpoint(&self, identity: PeerIdentity) -> MemoryEndpoint {
            let (tx, rx) = mpsc::unbounded_channel();
            self.inner
                .inboxes
                .lock()
                .expect("memory network lock poisoned")
                .insert(identity.clone(), tx);

            let (closed_tx, closed_rx) = watch::channel(false);
            MemoryEndpoint {
                identity,
                network: self.clone(),
                rx: tokio::sync::Mutex::new(rx),
                closed_tx,
                closed_rx,
            }
        }

        /// Simulate packet loss: drop every datagram addressed to `peer`.
        pub fn blackhole(&self, peer: PeerIdentity) {
            self.inner
                .blackholes
                .lock()
                .expect("memory network lock poisoned")
                .insert(peer);
        }

        fn deliver(&self, to: &PeerIdentity, datagram: Datagram) {
            if self
                .inner
                .blackholes
                .lock()
                .expect("memory network lock poisoned")
                .contains(to)
            {
                return;
            }
            if let Some(tx) = self
                .inner
                .inboxes
                .lock()
                .expect("memory network lock poisoned")
                .get(to)
            {
                let _ = tx.send(datagram);
            }
        }

        fn unregister(&self, identity: &PeerIdentity) {
            self.inner
                .inboxes
                .lock()
                .expect("memory network lock poisoned")
                .remove(identity);
        }
    }

    /// Queue-backed [`DatagramEndpoint`] stand-in for tests.
    pub struct MemoryEndpoint {
        identity: PeerIdentity,
        network: MemoryNetwork,
        rx: tokio::sync::Mutex<mpsc::UnboundedReceiver<Datagram>>,
        closed_tx: watch::Sender<bool>,
        closed_rx: watch::Receiver<bool>,
    }

    impl MemoryEndpoint {
        /// The identity this endpoint is registered under.
        pub fn identity(&self) -> &PeerIdentity {
            &self.identity
        }

        fn synthetic_addr(&self) -> SocketAddr {
            let ip = self
                .identity
                .host()
                .parse::<IpAddr>()
                .unwrap_or(IpAddr::V4(Ipv4Addr::LOCALHOST));
            SocketAddr::new(ip, self.identity.port())
        }
    }

    #[async_trait]
    impl DatagramEndpoint for MemoryEndpoint {
        async fn send_to(&self, bytes: &[u8], peer: &PeerIdentity) -> Result<usize> {
            if self.is_closed() {
                return Err(GossipNetError::Closed);
            }
            self.network
                .deliver(peer, (bytes.to_vec(), self.synthetic_addr()));
            Ok(bytes.len())
        }

        async fn recv(&self) -> Result<(Vec<u8>, SocketAddr)> {
            let mut closed = self.closed_rx.clone();
            if *closed.borrow() {
                return Err(GossipNetError::Closed);
            }

            let mut rx = self.rx.lock().await;
            tokio::select! {
                datagram = rx.recv() => match datagram {
                    Some(d) => Ok(d),
                    // All senders gone: the network dropped us.
                    None => Err(GossipNetError::Closed),
                },
                _ = closed.changed() => Err(GossipNetError::Closed),
            }
        }

        fn close(&self) {
            self.network.unregister(&self.identity);
            let _ = self.closed_tx.send(true);
        }

        fn is_closed(&self) -> bool {
            *self.closed_rx.borrow()
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use {super::*, std::time::Duration};

    #[tokio::test]
    async fn test_udp_send_and_receive() {
        let a = UdpEndpoint::bind(0, 65_536).await.unwrap();
        let b = UdpEndpoint::bind(0, 65_536).await.unwrap();
        let b_port = b.local_addr().unwrap().port();

        let peer_b = PeerIdentity::new("127.0.0.1", b_port);
        let sent = a.send_to(b"ping", &peer_b).await.unwrap();
        assert_eq!(sent, 4);

        let (bytes, _from) = tokio::time::timeout(Duration::from_secs(2), b.recv())
            .await
            .expect("timeout waiting for datagram")
            .unwrap();
        assert_eq!(bytes, b"ping");
    }

    #[tokio::test]
    async fn test_udp_close_unblocks_recv() {
        let endpoint = std::sync::Arc::new(UdpEndpoint::bind(0, 65_536).await.unwrap());

        let receiver = std::sync::Arc::clone(&endpoint);
        let handle = tokio::spawn(async move { receiver.recv().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        endpoint.close();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("close did not unblock recv")
            .unwrap();
        assert!(matches!(result, Err(GossipNetError::Closed)));
    }

    #[tokio::test]
    async fn test_udp_close_is_idempotent() {
        let endpoint = UdpEndpoint::bind(0, 65_536).await.unwrap();
        endpoint.close();
        endpoint.close();
        assert!(endpoint.is_closed());
        assert!(matches!(
            endpoint.send_to(b"x", &PeerIdentity::new("127.0.0.1", 9)).await,
            Err(GossipNetError::Closed)
        ));
    }

    #[tokio::test]
    async fn test_memory_delivery() {
        let network = MemoryNetwork::new();
        let a = network.endpoint(PeerIdentity::new("node-a", 9055));
        let b = network.endpoint(PeerIdentity::new("node-b", 9055));

        a.send_to(b"hello", b.identity()).await.unwrap();
        let (bytes, _) = b.recv().await.unwrap();
        assert_eq!(bytes, b"hello");
    }

    #[tokio::test]
    async fn test_memory_send_to_unknown_peer_is_silent() {
        let network = MemoryNetwork::new();
        let a = network.endpoint(PeerIdentity::new("node-a", 9055));
        // Fire-and-forget: no error for an absent addressee.
        let sent = a
            .send_to(b"void", &PeerIdentity::new("nobody", 9055))
            .await
            .unwrap();
        assert_eq!(sent, 4);
    }

    #[tokio::test]
    async fn test_memory_blackhole_drops_datagrams() {
        let network = MemoryNetwork::new();
        let a = network.endpoint(PeerIdentity::new("node-a", 9055));
        let b = network.endpoint(PeerIdentity::new("node-b", 9055));

        network.blackhole(b.identity().clone());
        a.send_to(b"lost", b.identity()).await.unwrap();

        let result = tokio::time::timeout(Duration::from_millis(100), b.recv()).await;
        assert!(result.is_err(), "blackholed datagram was delivered");
    }

    #[tokio::test]
    async fn test_memory_close_unblocks_recv() {
        let network = MemoryNetwork::new();
        let endpoint = std::sync::Arc::new(network.endpoint(PeerIdentity::new("node-a", 9055)));

        let receiver = std::sync::Arc::clone(&endpoint);
        let handle = tokio::spawn(async move { receiver.recv().await });

        tokio::time::sleep(Duration::from_millis(50)).await;
        endpoint.close();

        let result = tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .expect("close did not unblock recv")
            .unwrap();
        assert!(matches!(result, Err(GossipNetError::Closed)));
    }
}
