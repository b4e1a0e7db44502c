//! Contact history
//!
//! Each engine that reasons about social ties keeps a log of the closed
//! contact intervals it has had with every peer.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::identity::PeerIdentity;
use crate::time::SimTime;

/// A closed contact interval
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Interval {
    /// When the contact came up
    pub start: SimTime,
    /// When the contact went down
    pub end: SimTime,
}

impl Interval {
    /// Create a new interval
    pub fn new(start: SimTime, end: SimTime) -> Self {
        Self { start, end }
    }

    /// Length of the interval in seconds
    pub fn duration(&self) -> f64 {
        self.end.elapsed_since(self.start)
    }
}

/// Per-peer log of past contact intervals
///
/// Append-only: intervals are recorded in the order contacts close and are
/// never removed.
#[derive(Debug, Clone)]
pub struct ContactHistory<I: PeerIdentity> {
    intervals: HashMap<I, Vec<Interval>>,
}

impl<I: PeerIdentity> ContactHistory<I> {
    /// Create an empty history
    pub fn new() -> Self {
        Self {
            intervals: HashMap::new(),
        }
    }

    /// Append a closed interval for a peer
    pub fn record(&mut self, peer: &I, interval: Interval) {
        self.intervals
            .entry(peer.clone())
            .or_default()
            .push(interval);
    }

    /// Intervals recorded with a peer (empty if never met)
    pub fn intervals(&self, peer: &I) -> &[Interval] {
        self.intervals.get(peer).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Check whether any interval was recorded with a peer
    pub fn contains(&self, peer: &I) -> bool {
        self.intervals.contains_key(peer)
    }

    /// All peers with at least one recorded interval
    pub fn peers(&self) -> impl Iterator<Item = &I> {
        self.intervals.keys()
    }

    /// Cumulative contact time with a peer, in seconds
    pub fn total_duration(&self, peer: &I) -> f64 {
        self.intervals(peer).iter().map(Interval::duration).sum()
    }

    /// Iterate over peers and their intervals
    pub fn iter(&self) -> impl Iterator<Item = (&I, &[Interval])> {
        self.intervals.iter().map(|(p, v)| (p, v.as_slice()))
    }

    /// Number of peers in the history
    pub fn len(&self) -> usize {
        self.intervals.len()
    }

    /// Check whether the history is empty
    pub fn is_empty(&self) -> bool {
        self.intervals.is_empty()
    }
}

impl<I: PeerIdentity> Default for ContactHistory<I> {
    fn default() -> Self {
        Self::new()
    }
}
