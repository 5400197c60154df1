//! Shared harness for multi-node gossip scenarios.
//!
//! Builds clusters of real [`GossipNode`]s wired over the in-memory
//! datagram network, with a small JSON payload type. Raw
//! [`MemoryEndpoint`]s double as foreign senders and as taps for asserting
//! what a node actually put on the wire.

use {
    gossip_net::{
        codec::JsonCodec,
        endpoint::{MemoryEndpoint, MemoryNetwork},
        envelope::GossipMessage,
        hub::Subscription,
        node::GossipNode,
        peer::PeerIdentity,
        GossipNetConfig,
    },
    serde::{Deserialize, Serialize},
    std::{sync::Arc, time::Duration},
};

// ─── Constants ───────────────────────────────────────────────────────────────

/// Port every test identity advertises.
pub const TEST_PORT: u16 = 9055;

/// How long tests allow in-flight datagrams to propagate.
pub const SETTLE: Duration = Duration::from_millis(150);

// ─── Payload ─────────────────────────────────────────────────────────────────

/// Minimal application payload carried through the cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestPayload {
    pub text: String,
}

pub fn payload(text: &str) -> TestPayload {
    TestPayload { text: text.into() }
}

pub type TestCodec = JsonCodec<TestPayload>;
pub type TestNode = GossipNode<TestCodec, MemoryEndpoint>;

// ─── Cluster helpers ─────────────────────────────────────────────────────────

pub fn identity(host: &str) -> PeerIdentity {
    PeerIdentity::new(host, TEST_PORT)
}

/// Build a node wired into `network` with the given static peers.
/// Not started; tests drive the lifecycle themselves.
pub fn build_node(network: &MemoryNetwork, host: &str, peers: &[&str]) -> TestNode {
    let mut config = GossipNetConfig::dev_default(host, TEST_PORT);
    config.static_peers = peers.iter().map(|h| identity(h)).collect();
    let endpoint = network.endpoint(config.self_identity());
    GossipNode::new(config, JsonCodec::new(), endpoint).expect("valid test config")
}

/// Encode a wire datagram the way a foreign implementation of the JSON
/// reference format would, with the given already-notified hosts.
pub fn foreign_datagram(id: &str, notified_hosts: &[&str], text: &str) -> Vec<u8> {
    let notified: Vec<serde_json::Value> = notified_hosts
        .iter()
        .map(|host| serde_json::json!({ "hostname": host, "port": TEST_PORT }))
        .collect();
    serde_json::to_vec(&serde_json::json!({
        "id": id,
        "timestamp": "2026-08-02T10:00:00.000Z",
        "notifiedNodes": notified,
        "text": text,
    }))
    .expect("wire json")
}

/// Await the next subscription item with a bounded wait.
pub async fn recv_within(
    reader: &mut Subscription<TestPayload>,
    wait: Duration,
) -> Option<Arc<GossipMessage<TestPayload>>> {
    tokio::time::timeout(wait, reader.recv()).await.ok().flatten()
}

/// Let in-flight datagrams propagate.
pub async fn settle() {
    tokio::time::sleep(SETTLE).await;
}

/// Route `log` output through the test harness when `RUST_LOG` is set.
pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}
