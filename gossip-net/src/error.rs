//! Error types for the gossip dissemination library.

use thiserror::Error;

/// Errors that can occur across the gossip stack.
#[derive(Error, Debug)]
pub enum GossipNetError {
    /// The supplied configuration is invalid.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// An operation was attempted in a lifecycle state that forbids it.
    #[error("lifecycle violation: {0}")]
    Lifecycle(String),

    /// A datagram could not be decoded into a message.
    #[error("decode error: {0}")]
    Decode(String),

    /// A message could not be serialized by the codec.
    #[error("encode error: {0}")]
    Encode(String),

    /// An encoded message exceeds the codec's configured size cap.
    #[error("message too large: {size} bytes (max {max} bytes)")]
    MessageTooLarge {
        /// Actual encoded size.
        size: usize,
        /// Configured maximum.
        max: usize,
    },

    /// Sending a datagram to a peer failed.
    #[error("send to {peer} failed: {source}")]
    Send {
        /// The destination peer, rendered as `host:port`.
        peer: String,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Receiving from the endpoint failed.
    #[error("receive error: {0}")]
    Receive(#[source] std::io::Error),

    /// Binding or configuring the underlying socket failed.
    #[error("endpoint setup failed: {0}")]
    Endpoint(#[source] std::io::Error),

    /// The endpoint is closed; no further datagrams will arrive.
    ///
    /// This is the normal termination path for a receive loop, not a fault.
    #[error("endpoint closed")]
    Closed,

    /// Peer discovery failed.
    #[error("discovery failed: {0}")]
    Discovery(String),
}

/// Convenience result type for gossip operations.
pub type Result<T> = std::result::Result<T, GossipNetError>;
