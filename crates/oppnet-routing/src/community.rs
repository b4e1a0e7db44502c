//! Community detection services
//!
//! A node builds its local community from familiar peers: peers whose
//! cumulative contact time exceeds a threshold. Strangers are admitted
//! when enough of their own familiar set already sits in our community.
//!
//! - [`SimpleCommunity`]: admit when the overlap ratio exceeds `lambda`
//! - [`KCliqueCommunity`]: admit when at least `k - 1` familiars overlap

use std::collections::HashSet;
use std::fmt::Debug;

use oppnet_core::{Interval, PeerIdentity};
use serde::{Deserialize, Serialize};

/// Owned community state exposed to peers
#[derive(Debug, Clone, PartialEq)]
pub struct CommunityView<I: PeerIdentity> {
    /// Peers whose cumulative contact time passed the threshold
    pub familiar: HashSet<I>,
    /// Members of the local community
    pub local: HashSet<I>,
}

impl<I: PeerIdentity> Default for CommunityView<I> {
    fn default() -> Self {
        Self {
            familiar: HashSet::new(),
            local: HashSet::new(),
        }
    }
}

/// Community membership detector owned by one engine
pub trait CommunityDetection<I: PeerIdentity>: Debug + Send {
    /// Check whether a host belongs to the local community
    fn is_host_in_community(&self, host: &I) -> bool;

    /// Members of the local community
    fn local_community(&self) -> &HashSet<I>;

    /// Owned copy of the community state
    fn view(&self) -> CommunityView<I>;

    /// A contact with `peer` came up
    fn new_connection(&mut self, this_host: &I, peer: &I, peer_view: &CommunityView<I>);

    /// The contact with `peer` closed; `history` holds every interval with it
    fn connection_lost(&mut self, this_host: &I, peer: &I, history: &[Interval]);

    /// Fresh detector with the same configuration
    fn replicate(&self) -> Box<dyn CommunityDetection<I>>;
}

/// Familiar set and local community shared by both detectors
#[derive(Debug, Clone)]
struct Membership<I: PeerIdentity> {
    familiar: HashSet<I>,
    local: HashSet<I>,
}

impl<I: PeerIdentity> Membership<I> {
    fn new() -> Self {
        Self {
            familiar: HashSet::new(),
            local: HashSet::new(),
        }
    }

    fn join_self(&mut self, this_host: &I) {
        self.local.insert(this_host.clone());
    }

    /// Promote `peer` to familiar once it has spent enough time in contact
    fn observe(&mut self, peer: &I, history: &[Interval], familiar_threshold: f64) {
        let total: f64 = history.iter().map(Interval::duration).sum();
        if total > familiar_threshold {
            self.familiar.insert(peer.clone());
            self.local.insert(peer.clone());
        }
    }

    /// Number of the peer's familiars already in our community
    fn overlap(&self, peer_view: &CommunityView<I>) -> usize {
        peer_view
            .familiar
            .iter()
            .filter(|h| self.local.contains(*h))
            .count()
    }

    fn view(&self) -> CommunityView<I> {
        CommunityView {
            familiar: self.familiar.clone(),
            local: self.local.clone(),
        }
    }
}

/// Overlap-ratio community detection
#[derive(Debug, Clone)]
pub struct SimpleCommunity<I: PeerIdentity> {
    lambda: f64,
    familiar_threshold: f64,
    membership: Membership<I>,
}

impl<I: PeerIdentity> SimpleCommunity<I> {
    /// Default `lambda` is 0.6 and the familiar threshold 700 seconds
    pub fn new(lambda: f64, familiar_threshold: f64) -> Self {
        Self {
            lambda,
            familiar_threshold,
            membership: Membership::new(),
        }
    }
}

impl<I: PeerIdentity> CommunityDetection<I> for SimpleCommunity<I> {
    fn is_host_in_community(&self, host: &I) -> bool {
        self.membership.local.contains(host)
    }

    fn local_community(&self) -> &HashSet<I> {
        &self.membership.local
    }

    fn view(&self) -> CommunityView<I> {
        self.membership.view()
    }

    fn new_connection(&mut self, this_host: &I, peer: &I, peer_view: &CommunityView<I>) {
        self.membership.join_self(this_host);
        if self.membership.local.contains(peer) || peer_view.familiar.is_empty() {
            return;
        }
        let ratio = self.membership.overlap(peer_view) as f64 / peer_view.familiar.len() as f64;
        if ratio > self.lambda {
            tracing::debug!(
                host = %this_host.short_id(),
                peer = %peer.short_id(),
                ratio,
                "Peer joined local community"
            );
            self.membership.local.insert(peer.clone());
        }
    }

    fn connection_lost(&mut self, this_host: &I, peer: &I, history: &[Interval]) {
        self.membership.join_self(this_host);
        self.membership
            .observe(peer, history, self.familiar_threshold);
    }

    fn replicate(&self) -> Box<dyn CommunityDetection<I>> {
        Box::new(Self::new(self.lambda, self.familiar_threshold))
    }
}

/// k-clique community detection
#[derive(Debug, Clone)]
pub struct KCliqueCommunity<I: PeerIdentity> {
    k: usize,
    familiar_threshold: f64,
    membership: Membership<I>,
}

impl<I: PeerIdentity> KCliqueCommunity<I> {
    /// Default `k` is 5 and the familiar threshold 700 seconds
    pub fn new(k: usize, familiar_threshold: f64) -> Self {
        Self {
            k,
            familiar_threshold,
            membership: Membership::new(),
        }
    }
}

impl<I: PeerIdentity> CommunityDetection<I> for KCliqueCommunity<I> {
    fn is_host_in_community(&self, host: &I) -> bool {
        self.membership.local.contains(host)
    }

    fn local_community(&self) -> &HashSet<I> {
        &self.membership.local
    }

    fn view(&self) -> CommunityView<I> {
        self.membership.view()
    }

    fn new_connection(&mut self, this_host: &I, peer: &I, peer_view: &CommunityView<I>) {
        self.membership.join_self(this_host);
        if self.membership.local.contains(peer) {
            return;
        }
        let overlap = self.membership.overlap(peer_view);
        if overlap + 1 >= self.k {
            tracing::debug!(
                host = %this_host.short_id(),
                peer = %peer.short_id(),
                overlap,
                "Peer joined local community"
            );
            self.membership.local.insert(peer.clone());
        }
    }

    fn connection_lost(&mut self, this_host: &I, peer: &I, history: &[Interval]) {
        self.membership.join_self(this_host);
        self.membership
            .observe(peer, history, self.familiar_threshold);
    }

    fn replicate(&self) -> Box<dyn CommunityDetection<I>> {
        Box::new(Self::new(self.k, self.familiar_threshold))
    }
}

/// Community detection algorithm selected by configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "algorithm", rename_all = "kebab-case")]
pub enum CommunitySettings {
    Simple {
        #[serde(default = "default_lambda")]
        lambda: f64,
        #[serde(default = "default_familiar_threshold")]
        familiar_threshold: f64,
    },
    KClique {
        #[serde(default = "default_k")]
        k: usize,
        #[serde(default = "default_familiar_threshold")]
        familiar_threshold: f64,
    },
}

fn default_lambda() -> f64 {
    0.6
}

fn default_k() -> usize {
    5
}

fn default_familiar_threshold() -> f64 {
    700.0
}

impl Default for CommunitySettings {
    fn default() -> Self {
        CommunitySettings::Simple {
            lambda: default_lambda(),
            familiar_threshold: default_familiar_threshold(),
        }
    }
}

impl CommunitySettings {
    /// Instantiate the selected detector
    pub fn build<I: PeerIdentity>(&self) -> Box<dyn CommunityDetection<I>> {
        match *self {
            CommunitySettings::Simple {
                lambda,
                familiar_threshold,
            } => Box::new(SimpleCommunity::new(lambda, familiar_threshold)),
            CommunitySettings::KClique {
                k,
                familiar_threshold,
            } => Box::new(KCliqueCommunity::new(k, familiar_threshold)),
        }
    }
}
