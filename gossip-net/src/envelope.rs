//! Message envelope: the attributes carried by every gossiped payload.
//!
//! The envelope travels with the payload inside every datagram and records
//! the message identity, its origination instant, and the growing set of
//! peers that have already handled it. Applications get read-only views;
//! only the node runtime assigns or mutates envelope fields, which is what
//! keeps the propagation invariants intact.

use {
    crate::peer::PeerIdentity,
    chrono::{DateTime, Utc},
    serde::{Deserialize, Serialize},
    uuid::Uuid,
};

/// Base attributes of every gossiped message.
///
/// Wire field names are `id`, `timestamp`, and `notifiedNodes`; decode also
/// accepts the common alternative casings. The notified-set is
/// insertion-ordered so that serialization is deterministic for a given
/// propagation path.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    /// Unique per originated message; never mutated on forward.
    #[serde(alias = "Id", alias = "ID")]
    id: Uuid,

    /// Instant of origination in UTC. Monotonic only with respect to the
    /// originator's clock.
    #[serde(alias = "Timestamp", alias = "TIMESTAMP")]
    timestamp: DateTime<Utc>,

    /// Peers that have already handled this message. Grows monotonically
    /// along any single propagation path; no duplicates.
    #[serde(
        rename = "notifiedNodes",
        alias = "NotifiedNodes",
        alias = "notifiednodes",
        alias = "notified_nodes"
    )]
    notified_nodes: Vec<PeerIdentity>,
}

impl Envelope {
    /// Build a fresh envelope at originate time: new v4 id, current UTC
    /// instant, empty notified-set.
    pub(crate) fn originate() -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            notified_nodes: Vec::new(),
        }
    }

    /// The message identity.
    pub fn id(&self) -> Uuid {
        self.id
    }

    /// The origination instant.
    pub fn timestamp(&self) -> DateTime<Utc> {
        self.timestamp
    }

    /// Read-only view of the notified-set, in insertion order.
    pub fn notified_nodes(&self) -> &[PeerIdentity] {
        &self.notified_nodes
    }

    /// Whether `peer` is already recorded as having handled this message.
    pub fn is_notified(&self, peer: &PeerIdentity) -> bool {
        self.notified_nodes.contains(peer)
    }

    /// Append `peer` to the notified-set unless already present.
    ///
    /// Returns whether the set grew. Never removes or reorders existing
    /// entries.
    pub(crate) fn mark_notified(&mut self, peer: &PeerIdentity) -> bool {
        if self.is_notified(peer) {
            return false;
        }
        self.notified_nodes.push(peer.clone());
        true
    }
}

/// An envelope paired with its application payload — the unit the codec
/// round-trips, the hub publishes, and the node forwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GossipMessage<P> {
    envelope: Envelope,
    payload: P,
}

impl<P> GossipMessage<P> {
    /// Reassemble a message from a decoded envelope and payload.
    ///
    /// Intended for [`Codec`](crate::codec::Codec) implementations; there is
    /// no way to obtain an `Envelope` other than decoding one or asking the
    /// runtime to originate one.
    pub fn from_parts(envelope: Envelope, payload: P) -> Self {
        Self { envelope, payload }
    }

    /// The message envelope.
    pub fn envelope(&self) -> &Envelope {
        &self.envelope
    }

    /// The application payload.
    pub fn payload(&self) -> &P {
        &self.payload
    }

    /// Split into envelope and payload.
    pub fn into_parts(self) -> (Envelope, P) {
        (self.envelope, self.payload)
    }

    pub(crate) fn envelope_mut(&mut self) -> &mut Envelope {
        &mut self.envelope
    }
}

// ── Tests ───────────────────────────────────────────────────────────────────
