//! PeopleRank routing
//!
//! Each node keeps a single importance score, bumped on every contact with
//! the damped PageRank step `rank = (1 - d) + d * rank / |neighbors|`.
//! Messages flow toward peers whose rank is not lower than ours.

use std::collections::HashSet;

use oppnet_core::{ContactHistory, Message, PeerIdentity, SimTime};
use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactClock};
use crate::engine::{DecisionContext, DecisionEngine};
use crate::error::{EngineKind, RoutingResult};
use crate::info::RoutingInfo;
use crate::snapshot::{EngineSnapshot, RankSnapshot};

/// PeopleRank configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleRankConfig {
    /// Damping factor (d)
    /// Default: 0.85
    pub damping_factor: f64,
}

impl Default for PeopleRankConfig {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
        }
    }
}

/// PeopleRank decision engine
#[derive(Debug, Clone)]
pub struct PeopleRankEngine<I: PeerIdentity> {
    config: PeopleRankConfig,
    rank: f64,
    neighbors: HashSet<I>,
    clock: ContactClock<I>,
    history: ContactHistory<I>,
}

impl<I: PeerIdentity> PeopleRankEngine<I> {
    pub fn new(config: PeopleRankConfig) -> Self {
        Self {
            config,
            rank: 0.0,
            neighbors: HashSet::new(),
            clock: ContactClock::new(),
            history: ContactHistory::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PeopleRankConfig::default())
    }

    /// Current rank of the owning node
    pub fn rank(&self) -> f64 {
        self.rank
    }

    /// Distinct peers ever contacted
    pub fn neighbors(&self) -> &HashSet<I> {
        &self.neighbors
    }

    /// Closed contact intervals
    pub fn history(&self) -> &ContactHistory<I> {
        &self.history
    }

    fn peer_rank(ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<f64> {
        Ok(ctx.peer_snapshot(peer)?.into_rank(peer)?.rank)
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for PeopleRankEngine<I> {
    fn kind(&self) -> EngineKind {
        EngineKind::PeopleRank
    }

    fn connection_up(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if peer == ctx.this_host {
            return Ok(());
        }
        self.neighbors.insert(peer.clone());

        let d = self.config.damping_factor;
        self.rank = (1.0 - d) + d * self.rank / self.neighbors.len() as f64;

        tracing::debug!(
            host = %ctx.this_host.short_id(),
            peer = %peer.short_id(),
            rank = self.rank,
            neighbors = self.neighbors.len(),
            "Recomputed rank"
        );
        Ok(())
    }

    fn connection_down(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if let Some(interval) = self.clock.close(peer, ctx.now)
            && interval.duration() > 0.0
            && peer != ctx.this_host
        {
            self.history.record(peer, interval);
        }
        Ok(())
    }

    fn do_exchange_for_new_connection(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        _contact: &Contact<I>,
        peer: &I,
    ) -> RoutingResult<()> {
        ctx.ensure_peer_kind(peer, EngineKind::PeopleRank)?;
        self.clock.start(peer, ctx.now);
        Ok(())
    }

    fn new_message(&mut self, _message: &mut Message<I>) -> RoutingResult<bool> {
        Ok(true)
    }

    fn should_save_received_message(
        &self,
        message: &Message<I>,
        this_host: &I,
    ) -> RoutingResult<bool> {
        Ok(message.to != *this_host)
    }

    fn should_send_message_to_host(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        message: &Message<I>,
        other_host: &I,
    ) -> RoutingResult<bool> {
        if message.to == *other_host {
            return Ok(true);
        }
        let theirs = Self::peer_rank(ctx, other_host)?;
        tracing::trace!(
            message = %message.id,
            peer = %other_host.short_id(),
            theirs,
            ours = self.rank,
            "Compared ranks"
        );
        Ok(theirs >= self.rank)
    }

    fn should_delete_sent_message(
        &self,
        _message: &Message<I>,
        _other_host: &I,
    ) -> RoutingResult<bool> {
        Ok(true)
    }

    fn should_delete_old_message(
        &self,
        message: &Message<I>,
        reporting_host: &I,
    ) -> RoutingResult<bool> {
        Ok(message.to == *reporting_host)
    }

    fn update(&mut self, _ctx: &DecisionContext<'_, I>) -> RoutingResult<()> {
        Ok(())
    }

    fn replicate(&self) -> Box<dyn DecisionEngine<I>> {
        Box::new(Self::new(self.config.clone()))
    }

    fn snapshot(&self, _now: SimTime) -> EngineSnapshot<I> {
        EngineSnapshot::PeopleRank(RankSnapshot { rank: self.rank })
    }

    fn routing_info(&mut self, _now: SimTime) -> RoutingInfo {
        RoutingInfo::new(format!("rank : {:.6}", self.rank))
            .with_child(RoutingInfo::new(format!(
                "{} neighbor(s)",
                self.neighbors.len()
            )))
            .with_child(RoutingInfo::new(format!(
                "{} peer(s) with contact history",
                self.history.len()
            )))
    }

    fn transfer_priority(
        &self,
        ctx: &DecisionContext<'_, I>,
        _message: &Message<I>,
        peer: &I,
    ) -> RoutingResult<f64> {
        Self::peer_rank(ctx, peer)
    }
}
