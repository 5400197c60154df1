//! Multi-Node Gossip Integration Tests
//!
//! End-to-end scenario suite for the gossip dissemination library, driving
//! real nodes over the in-memory datagram network:
//!
//! 1. **Propagation** — a message originated at one node reaches every
//!    connected node exactly once, with the notified-set recording its path
//!    (also exercised over real loopback UDP)
//! 2. **Duplicates** — back-to-back copies of one message publish once,
//!    forward once, and occupy one cache entry; expired ids re-admit
//! 3. **Subscribers** — multi-reader fan-out, unsubscribe races, slow
//!    readers
//! 4. **Lifecycle** — stop drains and terminates subscriptions within the
//!    grace period

pub mod harness;




#[cfg(test)]
mod lifecycle_tests;
