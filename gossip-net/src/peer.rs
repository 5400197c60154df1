//! Peer identity value type.

use {
    serde::{Deserialize, Serialize},
    std::fmt,
};

/// Identity of a peer on the gossip network: a hostname (or numeric address
/// literal) paired with a UDP port.
///
/// Hosts are compared byte-for-byte as supplied — no canonicalization, no
/// resolution. Operators must configure the same spelling on every node for
/// two identities to be recognised as the same peer.
///
/// Ordering is lexicographic on host, then numeric on port. The derive
/// order of the fields below is load-bearing for that.
///
/// On the wire a peer is a `{"hostname": ..., "port": ...}` record; decode
/// also accepts the common alternative casings of the field names.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerIdentity {
    #[serde(rename = "hostname", alias = "Hostname", alias = "HostName", alias = "HOSTNAME")]
    host: String,
    #[serde(alias = "Port", alias = "PORT")]
    port: u16,
}

impl PeerIdentity {
    /// Create a new peer identity. Immutable after construction.
    ///
    /// Port 0 is reserved as invalid; it is accepted here so that identities
    /// can be built before validation, and rejected by
    /// [`GossipNetConfig::validate`](crate::config::GossipNetConfig::validate).
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// The host as supplied at construction.
    pub fn host(&self) -> &str {
        &self.host
    }

    /// The UDP port.
    pub fn port(&self) -> u16 {
        self.port
    }
}

impl fmt::Display for PeerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_host_port() {
        let peer = PeerIdentity::new("10.0.0.5", 9055);
        assert_eq!(peer.to_string(), "10.0.0.5:9055");
    }

    #[test]
    fn test_equality_is_literal() {
        // Hostnames are not canonicalized: spelling matters.
        assert_ne!(
            PeerIdentity::new("Node-A.example", 9055),
            PeerIdentity::new("node-a.example", 9055)
        );
        assert_eq!(
            PeerIdentity::new("node-a.example", 9055),
            PeerIdentity::new("node-a.example", 9055)
        );
    }

    #[test]
    fn test_ordering_host_then_port() {
        let a1 = PeerIdentity::new("alpha", 9000);
        let a2 = PeerIdentity::new("alpha", 9001);
        let b1 = PeerIdentity::new("beta", 1);
        assert!(a1 < a2);
        assert!(a2 < b1);

        let mut peers = vec![b1.clone(), a2.clone(), a1.clone()];
        peers.sort();
        assert_eq!(peers, vec![a1, a2, b1]);
    }

    #[test]
    fn test_wire_field_names() {
        let peer = PeerIdentity::new("10.0.0.5", 9055);
        let json = serde_json::to_string(&peer).unwrap();
        assert_eq!(json, r#"{"hostname":"10.0.0.5","port":9055}"#);
    }

    #[test]
    fn test_decode_accepts_alternative_casings() {
        let decoded: PeerIdentity =
            serde_json::from_str(r#"{"Hostname":"10.0.0.5","Port":9055}"#).unwrap();
        assert_eq!(decoded, PeerIdentity::new("10.0.0.5", 9055));
    }
}
