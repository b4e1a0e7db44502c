//! Read-only engine snapshots exchanged during contacts
//!
//! An engine never hands out references into its own maps. Peers receive
//! owned copies, aged to the instant of the query, and must extract the
//! variant matching their own engine family.

use std::collections::HashMap;

use oppnet_core::PeerIdentity;

use crate::community::CommunityView;
use crate::error::{EngineKind, RoutingError, RoutingResult};

/// Delivery predictions of a spray-and-focus peer
#[derive(Debug, Clone, PartialEq)]
pub struct PredictionSnapshot<I: PeerIdentity> {
    pub predictions: HashMap<I, f64>,
}

impl<I: PeerIdentity> PredictionSnapshot<I> {
    /// Prediction for a destination (0 if unknown)
    pub fn prediction_for(&self, host: &I) -> f64 {
        self.predictions.get(host).copied().unwrap_or(0.0)
    }

    /// Iterate over `(destination, prediction)` pairs
    pub fn iter(&self) -> impl Iterator<Item = (&I, f64)> {
        self.predictions.iter().map(|(host, p)| (host, *p))
    }
}

/// Rank of a PeopleRank-family peer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankSnapshot {
    pub rank: f64,
}

/// Community and centrality state of a DistributedPeopleRank peer
#[derive(Debug, Clone, PartialEq)]
pub struct CommunitySnapshot<I: PeerIdentity> {
    pub view: CommunityView<I>,
    pub local_centrality: f64,
    pub global_centrality: f64,
}

/// Owned state exposed by a peer's engine
#[derive(Debug, Clone, PartialEq)]
pub enum EngineSnapshot<I: PeerIdentity> {
    SprayAndFocus(PredictionSnapshot<I>),
    PeopleRank(RankSnapshot),
    PeopleRank2(RankSnapshot),
    DistributedPeopleRank(CommunitySnapshot<I>),
}

impl<I: PeerIdentity> EngineSnapshot<I> {
    /// Engine family that produced the snapshot
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineSnapshot::SprayAndFocus(_) => EngineKind::SprayAndFocus,
            EngineSnapshot::PeopleRank(_) => EngineKind::PeopleRank,
            EngineSnapshot::PeopleRank2(_) => EngineKind::PeopleRank2,
            EngineSnapshot::DistributedPeopleRank(_) => EngineKind::DistributedPeopleRank,
        }
    }

    pub fn into_predictions(self, peer: &I) -> RoutingResult<PredictionSnapshot<I>> {
        match self {
            EngineSnapshot::SprayAndFocus(s) => Ok(s),
            other => Err(other.mismatch(peer, EngineKind::SprayAndFocus)),
        }
    }

    pub fn into_rank(self, peer: &I) -> RoutingResult<RankSnapshot> {
        match self {
            EngineSnapshot::PeopleRank(s) => Ok(s),
            other => Err(other.mismatch(peer, EngineKind::PeopleRank)),
        }
    }

    pub fn into_friend_rank(self, peer: &I) -> RoutingResult<RankSnapshot> {
        match self {
            EngineSnapshot::PeopleRank2(s) => Ok(s),
            other => Err(other.mismatch(peer, EngineKind::PeopleRank2)),
        }
    }

    pub fn into_community(self, peer: &I) -> RoutingResult<CommunitySnapshot<I>> {
        match self {
            EngineSnapshot::DistributedPeopleRank(s) => Ok(s),
            other => Err(other.mismatch(peer, EngineKind::DistributedPeopleRank)),
        }
    }

    fn mismatch(&self, peer: &I, expected: EngineKind) -> RoutingError {
        RoutingError::ProtocolMismatch {
            peer: peer.short_id(),
            expected,
            found: self.kind(),
        }
    }
}
