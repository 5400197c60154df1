//! Stateless peer discovery.
//!
//! Discovery is pure: it is re-evaluated on every forward cycle and keeps
//! no membership table. The node's forward path treats a failure as an
//! empty neighbour set for that cycle; applications calling
//! [`enumerate`] directly observe the error.

use {
    crate::{
        config::{DiscoveryMode, GossipNetConfig},
        error::{GossipNetError, Result},
        peer::PeerIdentity,
    },
    log::debug,
    tokio::net::lookup_host,
};

/// Return the current set of candidate peers for forwarding.
///
/// - [`DiscoveryMode::Static`]: the configured `static_peers`, verbatim and
///   in configured order. Infallible.
/// - [`DiscoveryMode::Dns`]: resolves the rendezvous hostname
///   (`discovery_host`, falling back to `self_host`) to all A/AAAA records
///   and pairs each resolved address with `self_port`. The resulting hosts
///   are numeric address literals.
///
/// The candidate set may include this node's own identity; the forward path
/// excludes it.
pub async fn enumerate(config: &GossipNetConfig) -> Result<Vec<PeerIdentity>> {
    match config.discovery_mode {
        DiscoveryMode::Static => Ok(config.static_peers.clone()),
        DiscoveryMode::Dns => {
            let host = config
                .discovery_host
                .as_deref()
                .unwrap_or(&config.self_host);

            // Port here only satisfies the resolver's address syntax; every
            // candidate is advertised on self_port.
            let addrs = lookup_host((host, config.self_port))
                .await
                .map_err(|e| GossipNetError::Discovery(format!("lookup of {host} failed: {e}")))?;

            let peers: Vec<PeerIdentity> = addrs
                .map(|addr| PeerIdentity::new(addr.ip().to_string(), config.self_port))
                .collect();
            debug!("dns discovery resolved {host} to {} peers", peers.len());
            Ok(peers)
        }
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
