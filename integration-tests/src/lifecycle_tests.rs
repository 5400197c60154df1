//! Node lifecycle behaviour under traffic.

use {
    crate::harness::{build_node, foreign_datagram, identity, init_logging, recv_within},
    gossip_net::{
        endpoint::{DatagramEndpoint, MemoryNetwork},
        error::GossipNetError,
        node::NodeState,
    },
    std::time::{Duration, Instant},
};

const WAIT: Duration = Duration::from_secs(2);

#[tokio::test]
async fn test_stop_drains_and_terminates_subscribers() {
    init_logging();
    let network = MemoryNetwork::new();
    let sender = network.endpoint(identity("node-x"));
    let node = build_node(&network, "node-b", &[]);

    let mut reader = node.subscribe().unwrap();
    node.start().unwrap();

    let datagram = foreign_datagram(
        "5f4e3d2c-1b0a-4f9e-8d7c-6b5a4f3e2d1c",
        &["node-x"],
        "last words",
    );
    sender.send_to(&datagram, node.identity()).await.unwrap();

    // Ensure the item is through the pipeline, then stop.
    let seen = recv_within(&mut reader, WAIT).await.expect("item lost");
    assert_eq!(seen.payload().text, "last words");

    let stopping = Instant::now();
    node.stop().await.unwrap();
    assert!(
        stopping.elapsed() < node.config().stop_grace,
        "stop() needed the full grace period on an idle worker"
    );
    assert_eq!(node.state(), NodeState::Stopped);

    // The sequence ends cleanly after the drain.
    assert!(reader.recv().await.is_none());
}

#[tokio::test]
async fn test_subscription_taken_after_stop_terminates_immediately() {
    init_logging();
    let network = MemoryNetwork::new();
    let node = build_node(&network, "node-b", &[]);
    node.start().unwrap();
    node.stop().await.unwrap();

    let mut late = node.subscribe().unwrap();
    assert!(late.recv().await.is_none());
}

#[tokio::test]
async fn test_originate_allowed_before_start_and_after_stop() {
    init_logging();
    let network = MemoryNetwork::new();
    let tap = network.endpoint(identity("node-p"));
    let node = build_node(&network, "node-b", &["node-p"]);

    // The forward tail needs no worker.
    assert_eq!(node.originate(crate::harness::payload("early")).await.unwrap(), 1);
    assert!(tokio::time::timeout(WAIT, tap.recv()).await.is_ok());

    node.start().unwrap();
    node.stop().await.unwrap();
    assert_eq!(node.originate(crate::harness::payload("late")).await.unwrap(), 1);
    assert!(tokio::time::timeout(WAIT, tap.recv()).await.is_ok());
}

#[tokio::test]
async fn test_close_releases_and_forbids_further_use() {
    init_logging();
    let network = MemoryNetwork::new();
    let node = build_node(&network, "node-b", &[]);
    node.start().unwrap();
    node.close().await.unwrap();
    assert_eq!(node.state(), NodeState::Closed);

    assert!(matches!(
        node.originate(crate::harness::payload("x")).await,
        Err(GossipNetError::Lifecycle(_))
    ));
    assert!(matches!(node.subscribe(), Err(GossipNetError::Lifecycle(_))));
    assert!(matches!(node.close().await, Err(GossipNetError::Lifecycle(_))));
}
