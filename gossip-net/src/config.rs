//! Configuration for a gossip node.

use {
    crate::{
        error::{GossipNetError, Result},
        peer::PeerIdentity,
    },
    std::time::Duration,
};

/// How the node discovers candidate peers for forwarding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DiscoveryMode {
    /// Use the configured `static_peers` list verbatim.
    #[default]
    Static,
    /// Resolve the rendezvous hostname to all A/AAAA records on every
    /// forward cycle and pair each address with `self_port`.
    Dns,
}

/// Configuration for a gossip node.
///
/// Created by the application and held immutable for the node's life.
#[derive(Debug, Clone)]
pub struct GossipNetConfig {
    /// Hostname or address literal this node is known by to its peers.
    /// Required; also the identity inserted into the notified-set.
    pub self_host: String,

    /// UDP port this node binds and advertises.
    /// Default: `9055`. Zero is invalid.
    pub self_port: u16,

    /// Peer discovery mode. Default: [`DiscoveryMode::Static`].
    pub discovery_mode: DiscoveryMode,

    /// Candidate peers for static discovery.
    pub static_peers: Vec<PeerIdentity>,

    /// Hostname resolved by DNS discovery. When `None`, `self_host` is
    /// resolved instead (the legacy behaviour, which conflates the bind
    /// name with the cluster rendezvous name).
    pub discovery_host: Option<String>,

    /// How long a message id is remembered for duplicate suppression.
    /// Default: 600 s. Must be greater than zero.
    pub message_ttl: Duration,

    /// Upper bound on the cache's opportunistic cleanup frequency.
    /// Default: 60 s. Correctness never depends on sweep timeliness.
    pub sweep_interval: Duration,

    /// Receive buffer size. Datagrams longer than this are truncated by the
    /// OS and will fail to decode. Default: 64 KiB. Senders should keep
    /// encoded messages within a safe unicast MTU (≈1200 bytes).
    pub max_datagram_size: usize,

    /// How long `stop()` waits for the worker to acknowledge before
    /// forcibly closing the endpoint. Default: 5 s.
    pub stop_grace: Duration,

    /// Number of consecutive receive failures after which the worker gives
    /// up and stops. Default: 100.
    pub max_consecutive_receive_failures: u32,
}

impl Default for GossipNetConfig {
    fn default() -> Self {
        Self {
            self_host: String::new(),
            self_port: 9055,
            discovery_mode: DiscoveryMode::Static,
            static_peers: Vec::new(),
            discovery_host: None,
            message_ttl: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(60),
            max_datagram_size: 65_536,
            stop_grace: Duration::from_secs(5),
            max_consecutive_receive_failures: 100,
        }
    }
}

impl GossipNetConfig {
    /// Build a config for a node at `self_host:self_port` with the
    /// remaining fields at their defaults.
    pub fn new(self_host: impl Into<String>, self_port: u16) -> Self {
        Self {
            self_host: self_host.into(),
            self_port,
            ..Self::default()
        }
    }

    /// The identity this node inserts into notified-sets and excludes from
    /// its own forward targets.
    pub fn self_identity(&self) -> PeerIdentity {
        PeerIdentity::new(self.self_host.clone(), self.self_port)
    }

    /// Check the configuration for constructability.
    ///
    /// Rejects an empty `self_host`, a zero `self_port`, a zero TTL, a zero
    /// grace period, a zero receive buffer, and any static peer with port 0.
    pub fn validate(&self) -> Result<()> {
        if self.self_host.is_empty() {
            return Err(GossipNetError::Config("self_host must not be empty".into()));
        }
        if self.self_port == 0 {
            return Err(GossipNetError::Config("self_port 0 is reserved as invalid".into()));
        }
        if self.message_ttl.is_zero() {
            return Err(GossipNetError::Config("message_ttl must be greater than zero".into()));
        }
        if self.stop_grace.is_zero() {
            return Err(GossipNetError::Config("stop_grace must be greater than zero".into()));
        }
        if self.max_datagram_size == 0 {
            return Err(GossipNetError::Config("max_datagram_size must be greater than zero".into()));
        }
        if let Some(peer) = self.static_peers.iter().find(|p| p.port() == 0) {
            return Err(GossipNetError::Config(format!(
                "static peer {} has port 0, which is reserved as invalid",
                peer.host()
            )));
        }
        Ok(())
    }

    /// Create a config suitable for local testing with short timeouts.
    #[cfg(any(test, feature = "dev-context-only-utils"))]
    pub fn dev_default(self_host: impl Into<String>, self_port: u16) -> Self {
        Self {
            self_host: self_host.into(),
            self_port,
            message_ttl: Duration::from_secs(10),
            sweep_interval: Duration::from_millis(100),
            stop_grace: Duration::from_secs(1),
            max_consecutive_receive_failures: 5,
            ..Self::default()
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = GossipNetConfig::new("node-a", 9055);
        assert_eq!(cfg.self_port, 9055);
        assert_eq!(cfg.discovery_mode, DiscoveryMode::Static);
        assert_eq!(cfg.message_ttl, Duration::from_secs(600));
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn test_rejects_empty_host() {
        let cfg = GossipNetConfig::new("", 9055);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_port_zero() {
        let cfg = GossipNetConfig::new("node-a", 0);
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_zero_ttl() {
        let mut cfg = GossipNetConfig::new("node-a", 9055);
        cfg.message_ttl = Duration::ZERO;
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_rejects_static_peer_with_port_zero() {
        let mut cfg = GossipNetConfig::new("node-a", 9055);
        cfg.static_peers = vec![PeerIdentity::new("node-b", 0)];
        assert!(cfg.validate().is_err());
    }

    #[test]
    fn test_self_identity() {
        let cfg = GossipNetConfig::new("node-a", 9055);
        assert_eq!(cfg.self_identity(), PeerIdentity::new("node-a", 9055));
    }
}
