//! DistributedPeopleRank routing
//!
//! Forwarding decisions combine a pluggable community detector with a
//! pluggable centrality estimator:
//!
//! 1. The destination itself is always a valid next hop
//! 2. If exactly one side shares a community with the destination, that side
//!    carries the message
//! 3. If both do, the side with higher local centrality wins
//! 4. If neither does, the side with higher global centrality wins
//!
//! Several lifecycle hooks are not provided by this engine and report
//! [`RoutingError::UnsupportedOperation`] instead of a default answer.

use std::collections::HashSet;

use oppnet_core::{ContactHistory, Message, PeerIdentity, SimTime};

use crate::centrality::Centrality;
use crate::community::CommunityDetection;
use crate::contact::{Contact, ContactClock};
use crate::engine::{DecisionContext, DecisionEngine};
use crate::error::{EngineKind, RoutingError, RoutingResult};
use crate::info::RoutingInfo;
use crate::snapshot::{CommunitySnapshot, EngineSnapshot};

/// Community- and centrality-aware rank engine
#[derive(Debug)]
pub struct DistributedPeopleRankEngine<I: PeerIdentity> {
    community: Box<dyn CommunityDetection<I>>,
    centrality: Box<dyn Centrality<I>>,
    clock: ContactClock<I>,
    history: ContactHistory<I>,
}

impl<I: PeerIdentity> DistributedPeopleRankEngine<I> {
    pub fn new(
        community: Box<dyn CommunityDetection<I>>,
        centrality: Box<dyn Centrality<I>>,
    ) -> Self {
        Self {
            community,
            centrality,
            clock: ContactClock::new(),
            history: ContactHistory::new(),
        }
    }

    /// Check whether a host is in this node's local community
    pub fn communes_with_host(&self, host: &I) -> bool {
        self.community.is_host_in_community(host)
    }

    pub fn local_centrality(&self, now: SimTime) -> f64 {
        self.centrality
            .local_centrality(&self.history, self.community.as_ref(), now)
    }

    pub fn global_centrality(&self, now: SimTime) -> f64 {
        self.centrality.global_centrality(&self.history, now)
    }

    /// Closed contact intervals
    pub fn history(&self) -> &ContactHistory<I> {
        &self.history
    }

    /// Local community of the owning node
    ///
    /// Not provided by this engine; query the detector through
    /// [`DistributedPeopleRankEngine::communes_with_host`] instead.
    pub fn local_community(&self) -> RoutingResult<&HashSet<I>> {
        Err(self.unsupported("local_community"))
    }

    fn unsupported(&self, operation: &'static str) -> RoutingError {
        RoutingError::UnsupportedOperation {
            engine: EngineKind::DistributedPeopleRank,
            operation,
        }
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for DistributedPeopleRankEngine<I> {
    fn kind(&self) -> EngineKind {
        EngineKind::DistributedPeopleRank
    }

    fn connection_up(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if peer == ctx.this_host {
            return Ok(());
        }
        let peer_state = ctx.peer_snapshot(peer)?.into_community(peer)?;
        self.community
            .new_connection(ctx.this_host, peer, &peer_state.view);
        Ok(())
    }

    fn connection_down(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if peer == ctx.this_host {
            return Ok(());
        }
        if let Some(interval) = self.clock.close(peer, ctx.now)
            && interval.duration() > 0.0
        {
            self.history.record(peer, interval);
        }
        self.community
            .connection_lost(ctx.this_host, peer, self.history.intervals(peer));
        Ok(())
    }

    fn do_exchange_for_new_connection(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        _contact: &Contact<I>,
        peer: &I,
    ) -> RoutingResult<()> {
        ctx.ensure_peer_kind(peer, EngineKind::DistributedPeopleRank)?;
        self.clock.start(peer, ctx.now);
        Ok(())
    }

    fn new_message(&mut self, _message: &mut Message<I>) -> RoutingResult<bool> {
        Err(self.unsupported("new_message"))
    }

    fn should_save_received_message(
        &self,
        _message: &Message<I>,
        _this_host: &I,
    ) -> RoutingResult<bool> {
        Err(self.unsupported("should_save_received_message"))
    }

    fn should_send_message_to_host(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        message: &Message<I>,
        other_host: &I,
    ) -> RoutingResult<bool> {
        let dest = &message.to;
        if dest == other_host {
            return Ok(true);
        }

        let peer = ctx.peer_snapshot(other_host)?.into_community(other_host)?;
        let peer_in_community = peer.view.local.contains(dest);
        let me_in_community = self.communes_with_host(dest);

        let forward = match (peer_in_community, me_in_community) {
            (true, false) => true,
            (false, true) => false,
            (true, true) => peer.local_centrality > self.local_centrality(ctx.now),
            (false, false) => peer.global_centrality > self.global_centrality(ctx.now),
        };

        tracing::trace!(
            message = %message.id,
            peer = %other_host.short_id(),
            peer_in_community,
            me_in_community,
            forward,
            "Community decision"
        );
        Ok(forward)
    }

    fn should_delete_sent_message(
        &self,
        _message: &Message<I>,
        _other_host: &I,
    ) -> RoutingResult<bool> {
        Err(self.unsupported("should_delete_sent_message"))
    }

    fn should_delete_old_message(
        &self,
        _message: &Message<I>,
        _reporting_host: &I,
    ) -> RoutingResult<bool> {
        Err(self.unsupported("should_delete_old_message"))
    }

    fn update(&mut self, _ctx: &DecisionContext<'_, I>) -> RoutingResult<()> {
        Err(self.unsupported("update"))
    }

    fn replicate(&self) -> Box<dyn DecisionEngine<I>> {
        Box::new(Self::new(
            self.community.replicate(),
            self.centrality.replicate(),
        ))
    }

    fn snapshot(&self, now: SimTime) -> EngineSnapshot<I> {
        EngineSnapshot::DistributedPeopleRank(CommunitySnapshot {
            view: self.community.view(),
            local_centrality: self.local_centrality(now),
            global_centrality: self.global_centrality(now),
        })
    }

    fn routing_info(&mut self, now: SimTime) -> RoutingInfo {
        let mut members: Vec<String> = self
            .community
            .local_community()
            .iter()
            .map(|h| h.to_string())
            .collect();
        members.sort();

        RoutingInfo::new(format!("community of {}", members.len()))
            .with_child(RoutingInfo::new(format!("members : {}", members.join(", "))))
            .with_child(RoutingInfo::new(format!(
                "local centrality : {:.6}",
                self.local_centrality(now)
            )))
            .with_child(RoutingInfo::new(format!(
                "global centrality : {:.6}",
                self.global_centrality(now)
            )))
    }
}
