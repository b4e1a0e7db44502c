//! Centrality estimators
//!
//! Centrality is derived purely from the owning node's contact history.
//! The local variant only counts peers inside the node's community.

use std::collections::{BTreeMap, HashSet};
use std::fmt::Debug;

use oppnet_core::{ContactHistory, PeerIdentity, SimTime};
use serde::{Deserialize, Serialize};

use crate::community::CommunityDetection;

/// Centrality estimator owned by one engine
pub trait Centrality<I: PeerIdentity>: Debug + Send {
    /// Centrality over every peer in the history
    fn global_centrality(&self, history: &ContactHistory<I>, now: SimTime) -> f64;

    /// Centrality over peers inside `community`
    fn local_centrality(
        &self,
        history: &ContactHistory<I>,
        community: &dyn CommunityDetection<I>,
        now: SimTime,
    ) -> f64;

    /// Fresh estimator with the same configuration
    fn replicate(&self) -> Box<dyn Centrality<I>>;
}

/// Number of distinct peers ever met
#[derive(Debug, Clone, Copy, Default)]
pub struct DegreeCentrality;

impl<I: PeerIdentity> Centrality<I> for DegreeCentrality {
    fn global_centrality(&self, history: &ContactHistory<I>, _now: SimTime) -> f64 {
        history.len() as f64
    }

    fn local_centrality(
        &self,
        history: &ContactHistory<I>,
        community: &dyn CommunityDetection<I>,
        _now: SimTime,
    ) -> f64 {
        history
            .peers()
            .filter(|peer| community.is_host_in_community(peer))
            .count() as f64
    }

    fn replicate(&self) -> Box<dyn Centrality<I>> {
        Box::new(*self)
    }
}

/// Average number of distinct peers met per time window
///
/// Contacts are bucketed by their start time. Every window since the start
/// of the simulation counts, including empty ones.
#[derive(Debug, Clone, Copy)]
pub struct AverageWindowCentrality {
    time_window: f64,
}

impl AverageWindowCentrality {
    /// Default window is 21600 seconds (six hours)
    pub fn new(time_window: f64) -> Self {
        Self { time_window }
    }

    fn average<'a, I: PeerIdentity>(
        &self,
        history: &'a ContactHistory<I>,
        include: impl Fn(&I) -> bool,
        now: SimTime,
    ) -> f64 {
        let mut windows: BTreeMap<u64, HashSet<&'a I>> = BTreeMap::new();
        for (peer, intervals) in history.iter() {
            if !include(peer) {
                continue;
            }
            for interval in intervals {
                let index = (interval.start.as_secs() / self.time_window).floor() as u64;
                windows.entry(index).or_default().insert(peer);
            }
        }

        let elapsed = (now.as_secs() / self.time_window).floor() as u64 + 1;
        let total: usize = windows.values().map(HashSet::len).sum();
        total as f64 / elapsed as f64
    }
}

impl Default for AverageWindowCentrality {
    fn default() -> Self {
        Self::new(21600.0)
    }
}

impl<I: PeerIdentity> Centrality<I> for AverageWindowCentrality {
    fn global_centrality(&self, history: &ContactHistory<I>, now: SimTime) -> f64 {
        self.average(history, |_| true, now)
    }

    fn local_centrality(
        &self,
        history: &ContactHistory<I>,
        community: &dyn CommunityDetection<I>,
        now: SimTime,
    ) -> f64 {
        self.average(history, |peer| community.is_host_in_community(peer), now)
    }

    fn replicate(&self) -> Box<dyn Centrality<I>> {
        Box::new(*self)
    }
}

/// Centrality estimator selected by configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum CentralitySettings {
    Degree,
    AverageWindow {
        #[serde(default = "default_time_window")]
        time_window: f64,
    },
}

fn default_time_window() -> f64 {
    21600.0
}

impl Default for CentralitySettings {
    fn default() -> Self {
        CentralitySettings::AverageWindow {
            time_window: default_time_window(),
        }
    }
}

impl CentralitySettings {
    /// Instantiate the selected estimator
    pub fn build<I: PeerIdentity>(&self) -> Box<dyn Centrality<I>> {
        match *self {
            CentralitySettings::Degree => Box::new(DegreeCentrality),
            CentralitySettings::AverageWindow { time_window } => {
                Box::new(AverageWindowCentrality::new(time_window))
            }
        }
    }
}
