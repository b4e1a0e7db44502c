//! Decision engine contract
//!
//! One engine instance runs per node. The contact driver calls it when
//! contacts open and close, on periodic ticks, and whenever it needs a
//! forwarding decision for a (message, peer) pair. Engines read their peers
//! only through [`PeerDirectory`], which hands out owned snapshots.

use std::fmt::Debug;

use oppnet_core::{BufferStatus, Message, MessageId, PeerIdentity, SimTime};

use crate::contact::Contact;
use crate::error::{EngineKind, RoutingError, RoutingResult};
use crate::info::RoutingInfo;
use crate::snapshot::EngineSnapshot;

/// Read-only access to the engines of other nodes
pub trait PeerDirectory<I: PeerIdentity> {
    /// Engine family installed on a peer
    fn kind_of(&self, peer: &I) -> RoutingResult<EngineKind>;

    /// Owned snapshot of a peer's engine state at `now`
    fn snapshot(&self, peer: &I, now: SimTime) -> RoutingResult<EngineSnapshot<I>>;

    /// Check whether a peer currently holds a message
    fn has_message(&self, peer: &I, id: &MessageId) -> bool;

    /// Check whether a message has been delivered to a peer
    fn has_delivered(&self, peer: &I, id: &MessageId) -> bool;
}

/// Everything an engine callback may look at besides its own state
pub struct DecisionContext<'a, I: PeerIdentity> {
    /// The node owning the engine
    pub this_host: &'a I,
    /// Current simulated time
    pub now: SimTime,
    /// Engines of every other node
    pub peers: &'a dyn PeerDirectory<I>,
    /// Occupancy of the owning node's buffer
    pub buffer: BufferStatus,
}

impl<'a, I: PeerIdentity> DecisionContext<'a, I> {
    pub fn new(
        this_host: &'a I,
        now: SimTime,
        peers: &'a dyn PeerDirectory<I>,
        buffer: BufferStatus,
    ) -> Self {
        Self {
            this_host,
            now,
            peers,
            buffer,
        }
    }

    /// Snapshot of a peer's engine at the current instant
    pub fn peer_snapshot(&self, peer: &I) -> RoutingResult<EngineSnapshot<I>> {
        self.peers.snapshot(peer, self.now)
    }

    /// Fail with a protocol mismatch unless `peer` runs `expected`
    pub fn ensure_peer_kind(&self, peer: &I, expected: EngineKind) -> RoutingResult<()> {
        let found = self.peers.kind_of(peer)?;
        if found != expected {
            return Err(RoutingError::ProtocolMismatch {
                peer: peer.short_id(),
                expected,
                found,
            });
        }
        Ok(())
    }
}

/// A routing policy running on one node
///
/// Every method is called for the owning node only. Methods that depend on a
/// peer receive a [`DecisionContext`] and must not assume anything about the
/// peer beyond what its snapshot exposes.
pub trait DecisionEngine<I: PeerIdentity>: Debug + Send {
    /// Engine family
    fn kind(&self) -> EngineKind;

    /// A contact with `peer` came up
    fn connection_up(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()>;

    /// The contact with `peer` went down
    fn connection_down(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()>;

    /// Handshake for a new contact, called on both ends before any other call
    fn do_exchange_for_new_connection(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        contact: &Contact<I>,
        peer: &I,
    ) -> RoutingResult<()>;

    /// Accept or reject a locally created message
    ///
    /// Engines may attach their own metadata. Returning false discards it.
    fn new_message(&mut self, message: &mut Message<I>) -> RoutingResult<bool>;

    /// Check whether `node` is the message's destination
    fn is_final_dest(&self, message: &Message<I>, node: &I) -> bool {
        message.to == *node
    }

    /// Whether a received message should be kept in the buffer
    fn should_save_received_message(
        &self,
        message: &Message<I>,
        this_host: &I,
    ) -> RoutingResult<bool>;

    /// The forwarding decision for one (message, peer) pair
    fn should_send_message_to_host(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        message: &Message<I>,
        other_host: &I,
    ) -> RoutingResult<bool>;

    /// Whether to drop the local copy after relaying it to `other_host`
    fn should_delete_sent_message(
        &self,
        message: &Message<I>,
        other_host: &I,
    ) -> RoutingResult<bool>;

    /// Whether to drop a message that `reporting_host` says it already delivered
    fn should_delete_old_message(
        &self,
        message: &Message<I>,
        reporting_host: &I,
    ) -> RoutingResult<bool>;

    /// Periodic housekeeping
    fn update(&mut self, ctx: &DecisionContext<'_, I>) -> RoutingResult<()>;

    /// Fresh instance with the same configuration and empty dynamic state
    fn replicate(&self) -> Box<dyn DecisionEngine<I>>;

    /// Owned view of this engine's state for peers
    fn snapshot(&self, now: SimTime) -> EngineSnapshot<I>;

    /// Human-readable routing state
    fn routing_info(&mut self, now: SimTime) -> RoutingInfo;

    /// Ranking of a (message, peer) candidate; higher is tried first
    fn transfer_priority(
        &self,
        _ctx: &DecisionContext<'_, I>,
        _message: &Message<I>,
        _peer: &I,
    ) -> RoutingResult<f64> {
        Ok(0.0)
    }

    /// Receiver side of a completed transfer
    fn message_transferred(
        &mut self,
        _ctx: &DecisionContext<'_, I>,
        _message: &mut Message<I>,
        _from: &I,
    ) -> RoutingResult<()> {
        Ok(())
    }

    /// Sender side of a completed transfer
    fn transfer_done(&mut self, _message: &mut Message<I>, _to: &I) -> RoutingResult<()> {
        Ok(())
    }
}
