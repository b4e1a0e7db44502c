//! Helpers shared by unit tests

use std::collections::HashMap;

use oppnet_core::{BufferStatus, MessageId, PeerIdentity, SimTime, SimulationIdentity};

use crate::engine::{DecisionContext, PeerDirectory};
use crate::error::{EngineKind, RoutingError, RoutingResult};
use crate::snapshot::EngineSnapshot;

pub(crate) fn make_id(c: char) -> SimulationIdentity {
    SimulationIdentity::new(c).unwrap()
}

/// Fixed snapshots standing in for live peers
pub(crate) struct SnapshotDirectory<I: PeerIdentity> {
    snapshots: HashMap<I, EngineSnapshot<I>>,
}

impl<I: PeerIdentity> SnapshotDirectory<I> {
    pub(crate) fn new() -> Self {
        Self {
            snapshots: HashMap::new(),
        }
    }

    pub(crate) fn with(mut self, peer: I, snapshot: EngineSnapshot<I>) -> Self {
        self.snapshots.insert(peer, snapshot);
        self
    }

    pub(crate) fn set(&mut self, peer: I, snapshot: EngineSnapshot<I>) {
        self.snapshots.insert(peer, snapshot);
    }
}

impl<I: PeerIdentity> PeerDirectory<I> for SnapshotDirectory<I> {
    fn kind_of(&self, peer: &I) -> RoutingResult<EngineKind> {
        self.snapshots
            .get(peer)
            .map(EngineSnapshot::kind)
            .ok_or_else(|| RoutingError::UnknownPeer {
                peer: peer.short_id(),
            })
    }

    fn snapshot(&self, peer: &I, _now: SimTime) -> RoutingResult<EngineSnapshot<I>> {
        self.snapshots
            .get(peer)
            .cloned()
            .ok_or_else(|| RoutingError::UnknownPeer {
                peer: peer.short_id(),
            })
    }

    fn has_message(&self, _peer: &I, _id: &MessageId) -> bool {
        false
    }

    fn has_delivered(&self, _peer: &I, _id: &MessageId) -> bool {
        false
    }
}

pub(crate) fn ctx_at<'a, I: PeerIdentity>(
    this_host: &'a I,
    now: f64,
    peers: &'a dyn PeerDirectory<I>,
) -> DecisionContext<'a, I> {
    DecisionContext::new(
        this_host,
        SimTime::from_secs(now),
        peers,
        BufferStatus::unbounded(0),
    )
}
