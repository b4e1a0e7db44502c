//! PeopleRank2 routing
//!
//! Only contacts lasting at least `threshold` seconds count as friendship
//! edges. Ranks live in a table keyed by host and are recomputed whenever a
//! contact closes:
//!
//! `rank = (1 - d) + d * sum(rank_j) / total_friends`
//!
//! where the sum runs over every tracked host with at least one friend and
//! `total_friends` is the friend count summed over the whole table.

use std::collections::{HashMap, HashSet};

use oppnet_core::{ContactHistory, Message, PeerIdentity, SimTime};
use serde::{Deserialize, Serialize};

use crate::contact::{Contact, ContactClock};
use crate::engine::{DecisionContext, DecisionEngine};
use crate::error::{EngineKind, RoutingResult};
use crate::info::RoutingInfo;
use crate::snapshot::{EngineSnapshot, RankSnapshot};

/// PeopleRank2 configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeopleRank2Config {
    /// Damping factor (d)
    /// Default: 0.85
    pub damping_factor: f64,

    /// Minimum contact duration for a friendship edge, in seconds
    /// Default: 700
    pub threshold: f64,
}

impl Default for PeopleRank2Config {
    fn default() -> Self {
        Self {
            damping_factor: 0.85,
            threshold: 700.0,
        }
    }
}

/// Rank table entry
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RankEntry {
    pub rank: f64,
    pub friends: usize,
}

/// PeopleRank2 decision engine
#[derive(Debug, Clone)]
pub struct PeopleRank2Engine<I: PeerIdentity> {
    config: PeopleRank2Config,
    per: HashMap<I, RankEntry>,
    friends: HashSet<I>,
    clock: ContactClock<I>,
    history: ContactHistory<I>,
}

impl<I: PeerIdentity> PeopleRank2Engine<I> {
    pub fn new(config: PeopleRank2Config) -> Self {
        Self {
            config,
            per: HashMap::new(),
            friends: HashSet::new(),
            clock: ContactClock::new(),
            history: ContactHistory::new(),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(PeopleRank2Config::default())
    }

    /// Rank computed from the current table
    ///
    /// The value does not depend on which host is being ranked; it is the
    /// damped, friend-normalized sum over the whole table.
    pub fn calculate_per(&self) -> f64 {
        let d = self.config.damping_factor;
        let total_friends: usize = self.per.values().map(|e| e.friends).sum();

        let sum = if total_friends == 0 {
            0.0
        } else {
            self.per
                .values()
                .filter(|e| e.friends > 0)
                .map(|e| e.rank / total_friends as f64)
                .sum()
        };
        (1.0 - d) + d * sum
    }

    /// Stored rank of a host (0 if untracked)
    pub fn ranking(&self, host: &I) -> f64 {
        self.per.get(host).map_or(0.0, |e| e.rank)
    }

    /// Stored ranks of every tracked host
    pub fn all_rankings(&self) -> HashMap<I, f64> {
        self.per
            .iter()
            .map(|(host, e)| (host.clone(), e.rank))
            .collect()
    }

    /// Peers with at least one friendship-length contact
    pub fn friends(&self) -> &HashSet<I> {
        &self.friends
    }

    /// Friendship-length contact intervals
    pub fn history(&self) -> &ContactHistory<I> {
        &self.history
    }

    /// Recompute every entry from the table as it stood before the pass
    fn recompute(&mut self, peer: &I) {
        let mut circle: HashSet<&I> = self.history.peers().collect();
        circle.insert(peer);
        let friend_count = circle.len();

        let rank = self.calculate_per();
        let hosts: Vec<I> = self.history.peers().cloned().collect();
        for host in hosts {
            self.per.insert(
                host,
                RankEntry {
                    rank,
                    friends: friend_count,
                },
            );
        }
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for PeopleRank2Engine<I> {
    fn kind(&self) -> EngineKind {
        EngineKind::PeopleRank2
    }

    fn connection_up(&mut self, _ctx: &DecisionContext<'_, I>, _peer: &I) -> RoutingResult<()> {
        Ok(())
    }

    fn connection_down(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if peer == ctx.this_host {
            return Ok(());
        }
        if let Some(interval) = self.clock.close(peer, ctx.now)
            && interval.duration() >= self.config.threshold
        {
            self.history.record(peer, interval);
            if self.friends.insert(peer.clone()) {
                tracing::debug!(
                    host = %ctx.this_host.short_id(),
                    peer = %peer.short_id(),
                    duration = interval.duration(),
                    "New friendship"
                );
            }
        }

        self.recompute(peer);
        tracing::debug!(
            host = %ctx.this_host.short_id(),
            rank = self.calculate_per(),
            tracked = self.per.len(),
            "Recomputed rank table"
        );
        Ok(())
    }

    fn do_exchange_for_new_connection(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        _contact: &Contact<I>,
        peer: &I,
    ) -> RoutingResult<()> {
        ctx.ensure_peer_kind(peer, EngineKind::PeopleRank2)?;
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
        if self.friends.contains(other_host) {
            return Ok(true);
        }

        let theirs = ctx.peer_snapshot(other_host)?.into_friend_rank(other_host)?.rank;
        let ours = self.calculate_per();
        tracing::trace!(
            message = %message.id,
            peer = %other_host.short_id(),
            theirs,
            ours,
            free = ctx.buffer.free(),
            "Compared ranks"
        );
        Ok(ctx.buffer.has_capacity() && theirs >= ours)
    }

    fn should_delete_sent_message(
        &self,
        _message: &Message<I>,
        _other_host: &I,
    ) -> RoutingResult<bool> {
        Ok(false)
    }

    fn should_delete_old_message(
        &self,
        _message: &Message<I>,
        _reporting_host: &I,
    ) -> RoutingResult<bool> {
        Ok(true)
    }

    fn update(&mut self, _ctx: &DecisionContext<'_, I>) -> RoutingResult<()> {
        Ok(())
    }

    fn replicate(&self) -> Box<dyn DecisionEngine<I>> {
        Box::new(Self::new(self.config.clone()))
    }

    fn snapshot(&self, _now: SimTime) -> EngineSnapshot<I> {
        EngineSnapshot::PeopleRank2(RankSnapshot {
            rank: self.calculate_per(),
        })
    }

    fn routing_info(&mut self, _now: SimTime) -> RoutingInfo {
        let mut entries: Vec<(&I, &RankEntry)> = self.per.iter().collect();
        entries.sort_by_key(|(host, _)| host.to_string());

        let mut info = RoutingInfo::new(format!(
            "rank : {:.6}, {} friend(s)",
            self.calculate_per(),
            self.friends.len()
        ));
        for (host, entry) in entries {
            info.add_child(RoutingInfo::new(format!(
                "{} : {:.6} ({} friends)",
                host, entry.rank, entry.friends
            )));
        }
        info
    }

    fn transfer_priority(
        &self,
        ctx: &DecisionContext<'_, I>,
        _message: &Message<I>,
        peer: &I,
    ) -> RoutingResult<f64> {
        Ok(ctx.peer_snapshot(peer)?.into_friend_rank(peer)?.rank)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SnapshotDirectory, ctx_at, make_id};
    use oppnet_core::{BufferStatus, SimulationIdentity};

    fn rank_of(rank: f64) -> EngineSnapshot<SimulationIdentity> {
        EngineSnapshot::PeopleRank2(RankSnapshot { rank })
    }

    fn meet(
        engine: &mut PeopleRank2Engine<SimulationIdentity>,
        host: &SimulationIdentity,
        peers: &SnapshotDirectory<SimulationIdentity>,
        peer: char,
        start: f64,
        end: f64,
    ) {
        let peer = make_id(peer);
        let contact = Contact::new(*host, peer, SimTime::from_secs(start));
        let up = ctx_at(host, start, peers);
        engine
            .do_exchange_for_new_connection(&up, &contact, &peer)
            .unwrap();
        engine.connection_up(&up, &peer).unwrap();
        engine
            .connection_down(&ctx_at(host, end, peers), &peer)
            .unwrap();
    }

    fn directory() -> SnapshotDirectory<SimulationIdentity> {
        SimulationIdentity::range_to('F')
            .into_iter()
            .fold(SnapshotDirectory::new(), |dir, id| dir.with(id, rank_of(0.0)))
    }

    #[test]
    fn test_friendship_threshold_boundary() {
        let a = make_id('A');
        let peers = directory();
        let mut engine = PeopleRank2Engine::with_defaults();

        meet(&mut engine, &a, &peers, 'B', 0.0, 700.0);
        meet(&mut engine, &a, &peers, 'C', 0.0, 699.0);

        assert!(engine.friends().contains(&make_id('B')));
        assert!(!engine.friends().contains(&make_id('C')));
        assert!(engine.history().contains(&make_id('B')));
        assert!(!engine.history().contains(&make_id('C')));
    }

    #[test]
    fn test_rank_table_recomputation() {
        let a = make_id('A');
        let peers = directory();
        let mut engine = PeopleRank2Engine::with_defaults();

        // Empty table: (1 - d)
        assert!((engine.calculate_per() - 0.15).abs() < 1e-12);

        meet(&mut engine, &a, &peers, 'B', 0.0, 800.0);
        // B tracked with the rank the empty table produced
        assert!((engine.ranking(&make_id('B')) - 0.15).abs() < 1e-12);

        meet(&mut engine, &a, &peers, 'C', 1000.0, 1800.0);
        // Both entries computed from the table holding only B = (0.15, 1):
        // 0.15 + 0.85 * 0.15 / 1
        let expected = 0.15 + 0.85 * 0.15;
        assert!((engine.ranking(&make_id('B')) - expected).abs() < 1e-12);
        assert!((engine.ranking(&make_id('C')) - expected).abs() < 1e-12);
        assert_eq!(engine.all_rankings().len(), 2);
        assert_eq!(engine.ranking(&make_id('D')), 0.0);
    }

    #[test]
    fn test_friend_is_always_forwarded_to() {
        let a = make_id('A');
        let peers = directory();
        let mut engine = PeopleRank2Engine::with_defaults();
        meet(&mut engine, &a, &peers, 'B', 0.0, 700.0);

        let msg = Message::new("M1", a, make_id('Z'), 10, SimTime::ZERO);
        let mut ctx = ctx_at(&a, 800.0, &peers);
        ctx.buffer = BufferStatus {
            used: 100,
            capacity: Some(100),
        };
        assert!(engine.should_send_message_to_host(&ctx, &msg, &make_id('B')).unwrap());
    }

    #[test]
    fn test_rank_gate_requires_buffer_space() {
        let a = make_id('A');
        let peers = directory().with(make_id('E'), rank_of(5.0));
        let mut engine = PeopleRank2Engine::with_defaults();

        let msg = Message::new("M1", a, make_id('Z'), 10, SimTime::ZERO);
        let mut ctx = ctx_at(&a, 0.0, &peers);
        assert!(engine.should_send_message_to_host(&ctx, &msg, &make_id('E')).unwrap());
        // Lower-ranked stranger
        assert!(!engine.should_send_message_to_host(&ctx, &msg, &make_id('F')).unwrap());

        ctx.buffer = BufferStatus {
            used: 100,
            capacity: Some(100),
        };
        assert!(!engine.should_send_message_to_host(&ctx, &msg, &make_id('E')).unwrap());
    }

    #[test]
    fn test_cleanup_policy() {
        let engine = PeopleRank2Engine::<SimulationIdentity>::with_defaults();
        let msg = Message::new("M1", make_id('A'), make_id('Z'), 10, SimTime::ZERO);
        assert!(!engine.should_delete_sent_message(&msg, &make_id('B')).unwrap());
        assert!(engine.should_delete_old_message(&msg, &make_id('B')).unwrap());
    }

    #[test]
    fn test_replicate_starts_empty() {
        let a = make_id('A');
        let peers = directory();
        let mut engine = PeopleRank2Engine::with_defaults();
        meet(&mut engine, &a, &peers, 'B', 0.0, 800.0);

        let fresh = engine.replicate();
        assert_eq!(fresh.kind(), EngineKind::PeopleRank2);
        let rank = fresh.snapshot(SimTime::ZERO).into_friend_rank(&a).unwrap().rank;
        assert!((rank - 0.15).abs() < 1e-12);
    }
}
