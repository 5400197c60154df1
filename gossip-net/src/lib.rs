//! Epidemic Message Dissemination
//!
//! This crate implements gossip-style message propagation across a set of
//! peers on an IP network. Each peer hosts a [`GossipNode`] that exposes
//! three operations to the embedding application:
//!
//! - **Originate** — build a message with a fresh identity and current UTC
//!   timestamp and push it into the network.
//! - **Consume** — subscribe to the lazy sequence of messages this node
//!   admits.
//! - **Forward** — participate in the epidemic: every admitted message is
//!   re-sent to every discovered peer not yet listed in its notified-set.
//!
//! Propagation terminates because the notified-set embedded in every
//! envelope grows at each hop, and a node never forwards to a peer already
//! in the set. A TTL-bounded cache suppresses re-processing of duplicates.
//!
//! There is no reliability layer: no acks, no retransmits, no ordering
//! between distinct messages, and no delivery promise beyond what UDP
//! gives.
//!
//! ## Architecture
//!
//! ```text
//!  ┌─────────────────────────────────────────────────┐
//!  │  Application                                    │
//!  │  originate(payload)      subscribe() → items    │
//!  └──────────┬──────────────────────▲───────────────┘
//!             │                      │
//!  ┌──────────▼──────────────────────┴───────────────┐
//!  │  GossipNode (node.rs)                           │
//!  │  • lifecycle: Created→Running→Stopped / Closed  │
//!  │  • worker: recv → decode → admit → publish →    │
//!  │    forward to unnotified peers                  │
//!  └───┬───────────┬───────────┬───────────┬─────────┘
//!      │           │           │           │
//!  ┌───▼───┐  ┌────▼────┐  ┌───▼────┐  ┌───▼──────┐
//!  │ codec │  │ expiring│  │  sub   │  │discovery │
//!  │       │  │  cache  │  │  hub   │  │          │
//!  └───┬───┘  └─────────┘  └────────┘  └──────────┘
//!      │
//!  ┌───▼─────────────────────────────────────────────┐
//!  │  DatagramEndpoint (endpoint.rs)                 │
//!  │  UDP socket, or an in-memory queue in tests     │
//!  └─────────────────────────────────────────────────┘
//! ```
//!
//! ## Crate modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`]    | `GossipNetConfig` defaults, validation, discovery mode |
//! | [`error`]     | Crate-wide error enum |
//! | [`peer`]      | `PeerIdentity` value type |
//! | [`envelope`]  | Message envelope and envelope+payload pair |
//! | [`codec`]     | Codec contract, JSON reference format, bincode framing |
//! | [`endpoint`]  | Datagram endpoint trait, UDP and in-memory impls |
//! | [`discovery`] | Static and DNS peer enumeration |
//! | [`cache`]     | TTL-bounded duplicate suppression |
//! | [`hub`]       | Subscriber fan-out |
//! | [`node`]      | The node runtime and lifecycle |

pub mod cache;
pub mod codec;
pub mod config;
pub mod discovery;
pub mod endpoint;
pub mod envelope;
pub mod error;
pub mod hub;
pub mod node;
pub mod peer;

pub use {
    cache::ExpiringCache,
    codec::{BincodeCodec, Codec, JsonCodec},
    config::{DiscoveryMode, GossipNetConfig},
    endpoint::{DatagramEndpoint, UdpEndpoint},
    envelope::{Envelope, GossipMessage},
    error::{GossipNetError, Result},
    hub::Subscription,
    node::{GossipNode, NodeState},
    peer::PeerIdentity,
};
