//! Transfer opportunities
//!
//! Engines only decide whether a (message, peer) pair is worth a transfer
//! and how highly to rank it. Collecting candidates, ordering them and
//! trying them one at a time is shared by every engine.

use std::cmp::Ordering;

use oppnet_core::{MessageId, PeerIdentity, SimTime};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// A message that could be handed to a connected peer
#[derive(Debug, Clone, PartialEq)]
pub struct TransferCandidate<I: PeerIdentity> {
    pub message_id: MessageId,
    pub peer: I,
    /// Engine-supplied ranking; higher goes first
    pub priority: f64,
    /// When the local copy was received
    pub received_at: SimTime,
}

/// Tie-breaking rule between equally ranked candidates
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "kebab-case")]
pub enum QueuePolicy {
    /// Oldest received message first
    #[default]
    Fifo,
    /// Seeded random order
    Random { seed: u64 },
}

/// Orders candidates according to a queue policy
#[derive(Debug)]
pub struct TransferPlanner {
    policy: QueuePolicy,
    rng: Option<StdRng>,
}

impl TransferPlanner {
    pub fn new(policy: QueuePolicy) -> Self {
        let rng = match policy {
            QueuePolicy::Fifo => None,
            QueuePolicy::Random { seed } => Some(StdRng::seed_from_u64(seed)),
        };
        Self { policy, rng }
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    /// Sort by descending priority, breaking ties by policy
    pub fn order<I: PeerIdentity>(&mut self, candidates: &mut [TransferCandidate<I>]) {
        match self.rng.as_mut() {
            None => candidates.sort_by(|a, b| {
                by_priority(a, b)
                    .then_with(|| by_time(a.received_at, b.received_at))
                    .then_with(|| a.message_id.cmp(&b.message_id))
            }),
            Some(rng) => {
                candidates.shuffle(rng);
                candidates.sort_by(by_priority);
            }
        }
    }
}

fn by_priority<I: PeerIdentity>(a: &TransferCandidate<I>, b: &TransferCandidate<I>) -> Ordering {
    b.priority.partial_cmp(&a.priority).unwrap_or(Ordering::Equal)
}

fn by_time(a: SimTime, b: SimTime) -> Ordering {
    a.partial_cmp(&b).unwrap_or(Ordering::Equal)
}

/// One-off ordering with a fresh planner
pub fn order_candidates<I: PeerIdentity>(candidates: &mut [TransferCandidate<I>], policy: QueuePolicy) {
    TransferPlanner::new(policy).order(candidates);
}
