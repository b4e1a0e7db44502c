//! Contact-driven network harness
//!
//! Holds one engine and one buffer per node and applies contact, message
//! and tick events to them in a fixed order:
//!
//! - Contact up: handshake on both ends, `connection_up` on both ends, then
//!   each end drops messages the other has already received as destination
//! - Tick: engine update, expiry, direct delivery to connected destinations,
//!   then ranked transfer candidates until one transfer succeeds. A failed
//!   engine update is counted and logged; the rest of the tick still runs.
//!
//! While a node's engine runs, the node is taken out of the node table and
//! the rest of the table is exposed to it as a read-only [`PeerDirectory`].

use std::collections::{HashMap, HashSet};

use oppnet_core::{
    BufferStatus, Message, MessageBuffer, MessageId, MessageStore, PeerIdentity, SimTime,
    StorageError,
};
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::contact::Contact;
use crate::engine::{DecisionContext, DecisionEngine, PeerDirectory};
use crate::error::{EngineKind, RoutingError, RoutingResult};
use crate::info::RoutingInfo;
use crate::settings::{ConfigError, RoutingConfig};
use crate::snapshot::EngineSnapshot;
use crate::transfer::{QueuePolicy, TransferCandidate, TransferPlanner};

/// Per-node resources shared by every engine
#[derive(Debug, Clone, Default)]
pub struct NetworkOptions {
    /// Buffer capacity per node in bytes (None = unbounded)
    pub buffer_size: Option<usize>,
    /// Time-to-live for created messages in seconds
    pub message_ttl: Option<f64>,
    /// Tie-breaking between equally ranked candidates
    pub queue_policy: QueuePolicy,
}

impl From<&RoutingConfig> for NetworkOptions {
    fn from(config: &RoutingConfig) -> Self {
        Self {
            buffer_size: config.buffer_size,
            message_ttl: config.message_ttl,
            queue_policy: config.queue_policy,
        }
    }
}

/// Network-wide counters
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct NetworkStats {
    /// Messages accepted at their source
    pub created: u64,
    /// Completed hand-offs, including final deliveries
    pub relayed: u64,
    /// First arrivals at the destination
    pub delivered: u64,
    /// Messages evicted or cleaned up as already delivered
    pub dropped: u64,
    /// Messages removed after their TTL ran out
    pub expired: u64,
    /// Engine calls that failed
    pub aborted: u64,
}

impl NetworkStats {
    /// Fraction of created messages that reached their destination
    pub fn delivery_ratio(&self) -> f64 {
        if self.created == 0 {
            0.0
        } else {
            self.delivered as f64 / self.created as f64
        }
    }
}

/// A completed hand-off
#[derive(Debug, Clone, PartialEq)]
pub struct Transfer<I: PeerIdentity> {
    pub message_id: MessageId,
    pub from: I,
    pub to: I,
    /// The receiver was the destination
    pub delivered: bool,
}

/// Outcome of one round of update ticks
#[derive(Debug)]
pub struct TickSummary<I: PeerIdentity> {
    pub transfers: Vec<Transfer<I>>,
    pub errors: Vec<(I, RoutingError)>,
}

#[derive(Debug)]
struct NodeSlot<I: PeerIdentity> {
    engine: Box<dyn DecisionEngine<I>>,
    buffer: MessageBuffer<I>,
    connections: Vec<I>,
    delivered: HashSet<MessageId>,
}

/// Read-only view of every node except the one currently acting
struct NodeTable<'a, I: PeerIdentity>(&'a HashMap<I, NodeSlot<I>>);

impl<'a, I: PeerIdentity> NodeTable<'a, I> {
    fn slot(&self, peer: &I) -> RoutingResult<&'a NodeSlot<I>> {
        self.0.get(peer).ok_or_else(|| RoutingError::UnknownPeer {
            peer: peer.short_id(),
        })
    }
}

impl<I: PeerIdentity> PeerDirectory<I> for NodeTable<'_, I> {
    fn kind_of(&self, peer: &I) -> RoutingResult<EngineKind> {
        Ok(self.slot(peer)?.engine.kind())
    }

    fn snapshot(&self, peer: &I, now: SimTime) -> RoutingResult<EngineSnapshot<I>> {
        Ok(self.slot(peer)?.engine.snapshot(now))
    }

    fn has_message(&self, peer: &I, id: &MessageId) -> bool {
        self.0.get(peer).is_some_and(|slot| slot.buffer.contains(id))
    }

    fn has_delivered(&self, peer: &I, id: &MessageId) -> bool {
        self.0
            .get(peer)
            .is_some_and(|slot| slot.delivered.contains(id))
    }
}

/// A set of nodes driven by contact and tick events
#[derive(Debug)]
pub struct ContactNetwork<I: PeerIdentity> {
    nodes: HashMap<I, NodeSlot<I>>,
    order: Vec<I>,
    now: SimTime,
    options: NetworkOptions,
    planner: TransferPlanner,
    stats: NetworkStats,
}

impl<I: PeerIdentity> ContactNetwork<I> {
    /// Install replicas of `prototype` on every host
    pub fn from_prototype(
        hosts: impl IntoIterator<Item = I>,
        prototype: &dyn DecisionEngine<I>,
        options: NetworkOptions,
    ) -> Self {
        Self::with_engines(
            hosts.into_iter().map(|host| (host, prototype.replicate())),
            options,
        )
    }

    /// Build the prototype from settings and install it on every host
    pub fn from_config(
        hosts: impl IntoIterator<Item = I>,
        config: &RoutingConfig,
    ) -> Result<Self, ConfigError> {
        let prototype = config.build_prototype::<I>()?;
        Ok(Self::from_prototype(
            hosts,
            prototype.as_ref(),
            NetworkOptions::from(config),
        ))
    }

    /// Install individually constructed engines
    pub fn with_engines(
        engines: impl IntoIterator<Item = (I, Box<dyn DecisionEngine<I>>)>,
        options: NetworkOptions,
    ) -> Self {
        let mut nodes = HashMap::new();
        let mut order = Vec::new();
        for (host, engine) in engines {
            let buffer = match options.buffer_size {
                Some(capacity) => MessageBuffer::with_capacity(capacity),
                None => MessageBuffer::unbounded(),
            };
            if !nodes.contains_key(&host) {
                order.push(host.clone());
            }
            nodes.insert(
                host,
                NodeSlot {
                    engine,
                    buffer,
                    connections: Vec::new(),
                    delivered: HashSet::new(),
                },
            );
        }

        Self {
            nodes,
            order,
            now: SimTime::ZERO,
            planner: TransferPlanner::new(options.queue_policy),
            options,
            stats: NetworkStats::default(),
        }
    }

    /// Current simulated time
    pub fn now(&self) -> SimTime {
        self.now
    }

    /// Move the clock forward; earlier times are ignored
    pub fn advance_to(&mut self, now: SimTime) {
        if now > self.now {
            self.now = now;
        }
    }

    /// Hosts in installation order
    pub fn hosts(&self) -> &[I] {
        &self.order
    }

    pub fn stats(&self) -> &NetworkStats {
        &self.stats
    }

    pub fn buffer(&self, host: &I) -> Option<&MessageBuffer<I>> {
        self.nodes.get(host).map(|slot| &slot.buffer)
    }

    /// Buffer occupancy of a host
    pub fn buffer_status(&self, host: &I) -> Option<BufferStatus> {
        self.buffer(host).map(MessageStore::status)
    }

    pub fn engine(&self, host: &I) -> Option<&dyn DecisionEngine<I>> {
        self.nodes.get(host).map(|slot| slot.engine.as_ref())
    }

    /// A host's copy of a message
    pub fn message(&self, host: &I, id: &MessageId) -> Option<&Message<I>> {
        self.buffer(host)?.get(id)
    }

    /// Check whether a message reached `host` as its destination
    pub fn has_delivered(&self, host: &I, id: &MessageId) -> bool {
        self.nodes
            .get(host)
            .is_some_and(|slot| slot.delivered.contains(id))
    }

    pub fn is_connected(&self, a: &I, b: &I) -> bool {
        self.nodes
            .get(a)
            .is_some_and(|slot| slot.connections.contains(b))
    }

    /// Routing-state report of one host
    pub fn routing_report(&mut self, host: &I) -> RoutingResult<RoutingInfo> {
        let now = self.now;
        let slot = self
            .nodes
            .get_mut(host)
            .ok_or_else(|| unknown(host))?;
        Ok(slot.engine.routing_info(now))
    }

    /// Open a contact between two hosts
    pub fn connection_up(&mut self, a: &I, b: &I) -> RoutingResult<()> {
        let result = self.open_contact(a, b);
        self.record(result)
    }

    /// Close the contact between two hosts
    pub fn connection_down(&mut self, a: &I, b: &I) -> RoutingResult<()> {
        let result = self.close_contact(a, b);
        self.record(result)
    }

    /// Create a message at `from`
    ///
    /// Returns false if the source engine rejected it.
    pub fn create_message(
        &mut self,
        from: &I,
        to: &I,
        id: impl Into<MessageId>,
        size: usize,
    ) -> RoutingResult<bool> {
        let mut message = Message::new(id, from.clone(), to.clone(), size, self.now);
        if let Some(ttl) = self.options.message_ttl {
            message = message.with_ttl(ttl);
        }

        let result = self.with_node(from, |slot, _ctx| {
            if !slot.engine.new_message(&mut message)? {
                return Ok(None);
            }
            let evicted = slot.buffer.make_room_for(message.size);
            slot.buffer.insert(message)?;
            Ok(Some(evicted.len()))
        });

        match self.record(result)? {
            Some(evicted) => {
                self.stats.created += 1;
                self.stats.dropped += evicted as u64;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Run one update tick on a host
    ///
    /// At most one transfer happens per tick.
    pub fn update(&mut self, host: &I) -> RoutingResult<Option<Transfer<I>>> {
        let result = self.tick(host);
        self.record(result)
    }

    /// Run one update tick on every host, in installation order
    pub fn update_all(&mut self) -> TickSummary<I> {
        let mut summary = TickSummary {
            transfers: Vec::new(),
            errors: Vec::new(),
        };
        for host in self.order.clone() {
            match self.update(&host) {
                Ok(Some(transfer)) => summary.transfers.push(transfer),
                Ok(None) => {}
                Err(err) => summary.errors.push((host, err)),
            }
        }
        summary
    }

    fn record<R>(&mut self, result: RoutingResult<R>) -> RoutingResult<R> {
        if let Err(err) = &result {
            self.abort(err);
        }
        result
    }

    fn abort(&mut self, err: &RoutingError) {
        self.stats.aborted += 1;
        warn!(time = %self.now, error = %err, "Routing decision aborted");
    }

    /// Run `f` on one node with every other node visible read-only
    ///
    /// The node is put back even when `f` fails.
    fn with_node<R>(
        &mut self,
        host: &I,
        f: impl FnOnce(&mut NodeSlot<I>, &DecisionContext<'_, I>) -> RoutingResult<R>,
    ) -> RoutingResult<R> {
        let (key, mut slot) = self
            .nodes
            .remove_entry(host)
            .ok_or_else(|| unknown(host))?;
        let result = {
            let peers = NodeTable(&self.nodes);
            let ctx = DecisionContext::new(&key, self.now, &peers, slot.buffer.status());
            f(&mut slot, &ctx)
        };
        self.nodes.insert(key, slot);
        result
    }

    fn open_contact(&mut self, a: &I, b: &I) -> RoutingResult<()> {
        if a == b || !self.nodes.contains_key(b) {
            return Err(unknown(b));
        }
        if self.is_connected(a, b) {
            return Ok(());
        }
        let contact = Contact::new(a.clone(), b.clone(), self.now);

        self.with_node(a, |slot, ctx| {
            slot.engine.do_exchange_for_new_connection(ctx, &contact, b)
        })?;
        self.with_node(b, |slot, ctx| {
            slot.engine.do_exchange_for_new_connection(ctx, &contact, a)
        })?;

        for (host, peer) in [(a, b), (b, a)] {
            self.with_node(host, |slot, ctx| {
                slot.connections.push(peer.clone());
                slot.engine.connection_up(ctx, peer)
            })?;
        }
        debug!(time = %self.now, a = %a.short_id(), b = %b.short_id(), "Contact up");

        self.drop_delivered(a, b)?;
        self.drop_delivered(b, a)
    }

    fn close_contact(&mut self, a: &I, b: &I) -> RoutingResult<()> {
        if !self.is_connected(a, b) {
            return Ok(());
        }
        for (host, peer) in [(a, b), (b, a)] {
            self.with_node(host, |slot, ctx| {
                slot.connections.retain(|c| c != peer);
                slot.engine.connection_down(ctx, peer)
            })?;
        }
        debug!(time = %self.now, a = %a.short_id(), b = %b.short_id(), "Contact down");
        Ok(())
    }

    /// Let `holder` discard messages that `reporter` already received
    fn drop_delivered(&mut self, holder: &I, reporter: &I) -> RoutingResult<()> {
        let dropped = self.with_node(holder, |slot, ctx| {
            let stale: Vec<MessageId> = slot
                .buffer
                .messages()
                .filter(|m| ctx.peers.has_delivered(reporter, &m.id))
                .map(|m| m.id.clone())
                .collect();

            let mut dropped = 0;
            for id in stale {
                let Some(message) = slot.buffer.get(&id) else {
                    continue;
                };
                if slot.engine.should_delete_old_message(message, reporter)? {
                    slot.buffer.remove(&id);
                    dropped += 1;
                }
            }
            Ok(dropped)
        })?;
        self.stats.dropped += dropped;
        Ok(())
    }

    fn tick(&mut self, host: &I) -> RoutingResult<Option<Transfer<I>>> {
        let now = self.now;
        let (updated, expired) = self.with_node(host, |slot, ctx| {
            let updated = slot.engine.update(ctx);
            Ok((updated, slot.buffer.drop_expired(now).len()))
        })?;
        self.stats.expired += expired as u64;
        if let Err(err) = updated {
            self.abort(&err);
        }

        // Messages whose destination is in range go first
        let deliverable = self.with_node(host, |slot, ctx| {
            let mut ready: Vec<&Message<I>> = slot
                .buffer
                .messages()
                .filter(|m| slot.connections.contains(&m.to))
                .filter(|m| !ctx.peers.has_delivered(&m.to, &m.id))
                .collect();
            ready.sort_by(|a, b| {
                a.received_at
                    .partial_cmp(&b.received_at)
                    .unwrap_or(std::cmp::Ordering::Equal)
            });
            Ok(ready
                .into_iter()
                .map(|m| (m.id.clone(), m.to.clone()))
                .collect::<Vec<_>>())
        })?;
        for (id, to) in deliverable {
            if let Some(transfer) = self.transfer(host, &to, &id)? {
                return Ok(Some(transfer));
            }
        }

        let mut candidates = self.with_node(host, |slot, ctx| {
            let mut candidates = Vec::new();
            for peer in &slot.connections {
                for message in slot.buffer.messages() {
                    if message.to == *peer
                        || ctx.peers.has_message(peer, &message.id)
                        || ctx.peers.has_delivered(peer, &message.id)
                    {
                        continue;
                    }
                    if !slot
                        .engine
                        .should_send_message_to_host(ctx, message, peer)?
                    {
                        continue;
                    }
                    let priority = slot.engine.transfer_priority(ctx, message, peer)?;
                    trace!(
                        host = %ctx.this_host.short_id(),
                        peer = %peer.short_id(),
                        message = %message.id,
                        priority,
                        "Transfer candidate"
                    );
                    candidates.push(TransferCandidate {
                        message_id: message.id.clone(),
                        peer: peer.clone(),
                        priority,
                        received_at: message.received_at,
                    });
                }
            }
            Ok(candidates)
        })?;

        self.planner.order(&mut candidates);
        for candidate in candidates {
            if let Some(transfer) = self.transfer(host, &candidate.peer, &candidate.message_id)? {
                return Ok(Some(transfer));
            }
        }
        Ok(None)
    }

    /// Hand a copy of `id` from `from` to `to`
    ///
    /// Returns None if the receiver had no room for it.
    fn transfer(&mut self, from: &I, to: &I, id: &MessageId) -> RoutingResult<Option<Transfer<I>>> {
        let now = self.now;
        let Some(original) = self.message(from, id) else {
            return Ok(None);
        };
        let mut copy = original.replicate_for_transfer(now);

        // Receiver side; its state only changes once every hook has agreed
        let received = self.with_node(to, |slot, ctx| {
            let delivered = slot.engine.is_final_dest(&copy, ctx.this_host);
            slot.engine.message_transferred(ctx, &mut copy, from)?;
            let save = slot.engine.should_save_received_message(&copy, ctx.this_host)?;

            let mut evicted = 0;
            if save {
                evicted = slot.buffer.make_room_for(copy.size).len();
                match slot.buffer.insert(copy) {
                    Ok(()) => {}
                    Err(StorageError::CapacityExceeded { .. }) => return Ok(None),
                    Err(err) => return Err(err.into()),
                }
            }
            let first_delivery = delivered && slot.delivered.insert(id.clone());
            Ok(Some((delivered, first_delivery, evicted)))
        })?;
        let Some((delivered, first_delivery, evicted)) = received else {
            debug!(message = %id, to = %to.short_id(), "Receiver has no room");
            return Ok(None);
        };
        self.stats.dropped += evicted as u64;
        self.stats.relayed += 1;
        if first_delivery {
            self.stats.delivered += 1;
        }

        // Sender side
        let slot = self.nodes.get_mut(from).ok_or_else(|| unknown(from))?;
        if let Some(message) = slot.buffer.get_mut(id) {
            slot.engine.transfer_done(message, to)?;
            if slot.engine.should_delete_sent_message(message, to)? {
                slot.buffer.remove(id);
            }
        }

        debug!(
            time = %now,
            message = %id,
            from = %from.short_id(),
            to = %to.short_id(),
            delivered,
            "Transferred message"
        );
        Ok(Some(Transfer {
            message_id: id.clone(),
            from: from.clone(),
            to: to.clone(),
            delivered,
        }))
    }
}

fn unknown<I: PeerIdentity>(host: &I) -> RoutingError {
    RoutingError::UnknownPeer {
        peer: host.short_id(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::people_rank::PeopleRankEngine;
    use crate::snapshot::RankSnapshot;
    use crate::spray_focus::{MSG_COUNT_PROPERTY, SprayAndFocusEngine};
    use crate::test_support::make_id;
    use oppnet_core::SimulationIdentity;

    /// Forwards everything and fails chosen hooks on demand
    #[derive(Debug, Clone, Default)]
    struct FlakyEngine {
        fail_update: bool,
        fail_receive: bool,
    }

    impl FlakyEngine {
        fn broken(operation: &'static str) -> RoutingError {
            RoutingError::UnsupportedOperation {
                engine: EngineKind::PeopleRank,
                operation,
            }
        }
    }

    impl DecisionEngine<SimulationIdentity> for FlakyEngine {
        fn kind(&self) -> EngineKind {
            EngineKind::PeopleRank
        }

        fn connection_up(
            &mut self,
            _ctx: &DecisionContext<'_, SimulationIdentity>,
            _peer: &SimulationIdentity,
        ) -> RoutingResult<()> {
            Ok(())
        }

        fn connection_down(
            &mut self,
            _ctx: &DecisionContext<'_, SimulationIdentity>,
            _peer: &SimulationIdentity,
        ) -> RoutingResult<()> {
            Ok(())
        }

        fn do_exchange_for_new_connection(
            &mut self,
            _ctx: &DecisionContext<'_, SimulationIdentity>,
            _contact: &Contact<SimulationIdentity>,
            _peer: &SimulationIdentity,
        ) -> RoutingResult<()> {
            Ok(())
        }

        fn new_message(&mut self, _message: &mut Message<SimulationIdentity>) -> RoutingResult<bool> {
            Ok(true)
        }

        fn should_save_received_message(
            &self,
            message: &Message<SimulationIdentity>,
            this_host: &SimulationIdentity,
        ) -> RoutingResult<bool> {
            Ok(message.to != *this_host)
        }

        fn should_send_message_to_host(
            &mut self,
            _ctx: &DecisionContext<'_, SimulationIdentity>,
            _message: &Message<SimulationIdentity>,
            _other_host: &SimulationIdentity,
        ) -> RoutingResult<bool> {
            Ok(true)
        }

        fn should_delete_sent_message(
            &self,
            _message: &Message<SimulationIdentity>,
            _other_host: &SimulationIdentity,
        ) -> RoutingResult<bool> {
            Ok(true)
        }

        fn should_delete_old_message(
            &self,
            message: &Message<SimulationIdentity>,
            reporting_host: &SimulationIdentity,
        ) -> RoutingResult<bool> {
            Ok(message.to == *reporting_host)
        }

        fn update(&mut self, _ctx: &DecisionContext<'_, SimulationIdentity>) -> RoutingResult<()> {
            if self.fail_update {
                return Err(Self::broken("update"));
            }
            Ok(())
        }

        fn replicate(&self) -> Box<dyn DecisionEngine<SimulationIdentity>> {
            Box::new(self.clone())
        }

        fn snapshot(&self, _now: SimTime) -> EngineSnapshot<SimulationIdentity> {
            EngineSnapshot::PeopleRank(RankSnapshot { rank: 0.0 })
        }

        fn routing_info(&mut self, _now: SimTime) -> RoutingInfo {
            RoutingInfo::new("flaky")
        }

        fn message_transferred(
            &mut self,
            _ctx: &DecisionContext<'_, SimulationIdentity>,
            _message: &mut Message<SimulationIdentity>,
            _from: &SimulationIdentity,
        ) -> RoutingResult<()> {
            if self.fail_receive {
                return Err(Self::broken("message_transferred"));
            }
            Ok(())
        }
    }

    fn flaky_network(
        engines: [(char, FlakyEngine); 2],
        options: NetworkOptions,
    ) -> ContactNetwork<SimulationIdentity> {
        ContactNetwork::with_engines(
            engines.map(|(c, engine)| {
                let engine: Box<dyn DecisionEngine<SimulationIdentity>> = Box::new(engine);
                (make_id(c), engine)
            }),
            options,
        )
    }

    fn spray_network(hosts: &[char]) -> ContactNetwork<SimulationIdentity> {
        let prototype = SprayAndFocusEngine::<SimulationIdentity>::with_defaults();
        ContactNetwork::from_prototype(
            hosts.iter().map(|c| make_id(*c)),
            &prototype,
            NetworkOptions::default(),
        )
    }

    #[test]
    fn test_direct_delivery() {
        let (a, c) = (make_id('A'), make_id('C'));
        let mut net = spray_network(&['A', 'C']);

        assert!(net.create_message(&a, &c, "M1", 100).unwrap());
        net.connection_up(&a, &c).unwrap();
        let transfer = net.update(&a).unwrap().unwrap();

        assert!(transfer.delivered);
        assert!(net.has_delivered(&c, &MessageId::new("M1")));
        assert!(net.message(&a, &MessageId::new("M1")).is_none());
        assert!(net.message(&c, &MessageId::new("M1")).is_none());
        assert_eq!(net.stats().delivered, 1);
        assert_eq!(net.stats().delivery_ratio(), 1.0);
    }

    #[test]
    fn test_relay_then_stale_copy_dropped() {
        let (a, b, c) = (make_id('A'), make_id('B'), make_id('C'));
        let id = MessageId::new("M1");
        let mut net = spray_network(&['A', 'B', 'C']);

        // B learns about C first
        net.connection_up(&b, &c).unwrap();
        net.connection_down(&b, &c).unwrap();

        net.create_message(&a, &c, "M1", 100).unwrap();
        net.connection_up(&a, &b).unwrap();
        let transfer = net.update(&a).unwrap().unwrap();
        assert_eq!(transfer.to, b);
        assert!(!transfer.delivered);

        let copies = |net: &ContactNetwork<SimulationIdentity>, host| {
            net.message(host, &id)
                .unwrap()
                .int_property(MSG_COUNT_PROPERTY)
                .unwrap()
        };
        assert_eq!(copies(&net, &a), Some(3));
        assert_eq!(copies(&net, &b), Some(3));

        net.connection_up(&a, &c).unwrap();
        assert!(net.update(&a).unwrap().unwrap().delivered);

        net.connection_up(&b, &c).unwrap();
        assert!(net.message(&b, &id).is_none());
        assert_eq!(net.stats().dropped, 1);
    }

    #[test]
    fn test_equal_predictions_do_not_forward() {
        let (a, b, c) = (make_id('A'), make_id('B'), make_id('C'));
        let mut net = spray_network(&['A', 'B', 'C']);

        net.create_message(&a, &c, "M1", 100).unwrap();
        net.connection_up(&a, &b).unwrap();
        assert!(net.update(&a).unwrap().is_none());
        assert!(net.message(&b, &MessageId::new("M1")).is_none());
    }

    #[test]
    fn test_protocol_mismatch_leaves_nodes_apart() {
        let (a, b) = (make_id('A'), make_id('B'));
        let spray: Box<dyn DecisionEngine<SimulationIdentity>> =
            Box::new(SprayAndFocusEngine::with_defaults());
        let people_rank: Box<dyn DecisionEngine<SimulationIdentity>> =
            Box::new(PeopleRankEngine::with_defaults());
        let engines = vec![(a, spray), (b, people_rank)];
        let mut net = ContactNetwork::with_engines(engines, NetworkOptions::default());

        let err = net.connection_up(&a, &b).unwrap_err();
        assert!(err.is_protocol_mismatch());
        assert!(!net.is_connected(&a, &b));
        assert_eq!(net.stats().aborted, 1);
        assert_eq!(net.hosts().len(), 2);
    }

    #[test]
    fn test_unknown_host() {
        let mut net = spray_network(&['A']);
        let err = net.create_message(&make_id('Q'), &make_id('A'), "M1", 1);
        assert!(matches!(err, Err(RoutingError::UnknownPeer { .. })));
        assert!(net.connection_up(&make_id('A'), &make_id('Q')).is_err());
    }

    #[test]
    fn test_expired_messages_dropped_on_tick() {
        let (a, b) = (make_id('A'), make_id('B'));
        let prototype = SprayAndFocusEngine::<SimulationIdentity>::with_defaults();
        let options = NetworkOptions {
            message_ttl: Some(10.0),
            ..NetworkOptions::default()
        };
        let mut net = ContactNetwork::from_prototype([a, b], &prototype, options);

        net.create_message(&a, &b, "M1", 10).unwrap();
        net.advance_to(SimTime::from_secs(20.0));
        assert!(net.update(&a).unwrap().is_none());
        assert_eq!(net.stats().expired, 1);
        assert!(net.buffer(&a).unwrap().is_empty());
    }

    #[test]
    fn test_clock_is_monotonic() {
        let mut net = spray_network(&['A']);
        net.advance_to(SimTime::from_secs(50.0));
        net.advance_to(SimTime::from_secs(10.0));
        assert_eq!(net.now(), SimTime::from_secs(50.0));
    }

    #[test]
    fn test_buffer_full_evicts_oldest() {
        let (a, b) = (make_id('A'), make_id('B'));
        let prototype = SprayAndFocusEngine::<SimulationIdentity>::with_defaults();
        let options = NetworkOptions {
            buffer_size: Some(150),
            ..NetworkOptions::default()
        };
        let mut net = ContactNetwork::from_prototype([a, b], &prototype, options);

        net.create_message(&a, &b, "M1", 100).unwrap();
        net.advance_to(SimTime::from_secs(1.0));
        net.create_message(&a, &b, "M2", 100).unwrap();

        assert!(net.message(&a, &MessageId::new("M1")).is_none());
        assert!(net.message(&a, &MessageId::new("M2")).is_some());
        assert_eq!(net.stats().dropped, 1);
        assert_eq!(net.buffer_status(&a).unwrap().used, 100);
    }

    #[test]
    fn test_failed_engine_update_does_not_stall_tick() {
        let (a, b) = (make_id('A'), make_id('B'));
        let stuck = FlakyEngine {
            fail_update: true,
            ..FlakyEngine::default()
        };
        let options = NetworkOptions {
            message_ttl: Some(10.0),
            ..NetworkOptions::default()
        };
        let mut net = flaky_network([('A', stuck), ('B', FlakyEngine::default())], options);

        net.create_message(&a, &b, "old", 10).unwrap();
        net.advance_to(SimTime::from_secs(15.0));
        net.create_message(&a, &b, "fresh", 10).unwrap();
        net.connection_up(&a, &b).unwrap();

        let transfer = net.update(&a).unwrap().unwrap();
        assert_eq!(transfer.message_id, MessageId::new("fresh"));
        assert!(transfer.delivered);
        assert_eq!(net.stats().expired, 1);
        assert_eq!(net.stats().aborted, 1);
        assert!(net.buffer(&a).unwrap().is_empty());

        let summary = net.update_all();
        assert!(summary.errors.is_empty());
        assert_eq!(net.stats().aborted, 2);
    }

    #[test]
    fn test_failed_receive_leaves_no_delivery_mark() {
        let (a, b) = (make_id('A'), make_id('B'));
        let picky = FlakyEngine {
            fail_receive: true,
            ..FlakyEngine::default()
        };
        let mut net = flaky_network(
            [('A', FlakyEngine::default()), ('B', picky)],
            NetworkOptions::default(),
        );

        net.create_message(&a, &b, "M1", 10).unwrap();
        net.connection_up(&a, &b).unwrap();
        assert!(net.update(&a).is_err());

        assert!(!net.has_delivered(&b, &MessageId::new("M1")));
        assert!(net.message(&a, &MessageId::new("M1")).is_some());
        assert_eq!(net.stats().delivered, 0);
        assert_eq!(net.stats().relayed, 0);
    }

    #[test]
    fn test_oversized_message_is_not_created() {
        let a = make_id('A');
        let options = NetworkOptions {
            buffer_size: Some(50),
            ..NetworkOptions::default()
        };
        let mut net = flaky_network(
            [('A', FlakyEngine::default()), ('B', FlakyEngine::default())],
            options,
        );

        assert!(net.create_message(&a, &make_id('B'), "M1", 80).is_err());
        assert!(net.buffer(&a).unwrap().is_empty());
        assert_eq!(net.stats().created, 0);

        // The same id can still be created once it fits
        assert!(net.create_message(&a, &make_id('B'), "M1", 40).unwrap());
    }
}
