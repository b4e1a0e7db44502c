//! Spray-and-focus routing
//!
//! Each message starts with a fixed budget of replicas. While more than one
//! replica is left the budget is split between sender and receiver on every
//! hand-off (spray). The last replica is forwarded only to peers whose
//! delivery prediction for the destination beats ours (focus).

use oppnet_core::{Message, PeerIdentity, PropertyValue, SimTime};
use serde::{Deserialize, Serialize};

use crate::contact::Contact;
use crate::engine::{DecisionContext, DecisionEngine};
use crate::error::{EngineKind, RoutingError, RoutingResult};
use crate::info::RoutingInfo;
use crate::prediction::DeliveryPredictions;
use crate::snapshot::{EngineSnapshot, PredictionSnapshot};

/// Message property holding the remaining replica count
pub const MSG_COUNT_PROPERTY: &str = "spray_and_focus.copies";

/// Spray-and-focus configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SprayAndFocusConfig {
    /// Replicas attached to a newly created message
    /// Default: 6
    pub initial_copies: i64,

    /// Length of one aging unit in seconds
    /// Default: 30
    pub seconds_in_time_unit: f64,

    /// Transitivity scaling factor
    /// Default: 0.25
    pub beta: f64,

    /// Prediction assigned on first encounter
    /// Default: 0.75
    pub p_init: f64,

    /// Aging constant applied per time unit
    /// Default: 0.98
    pub gamma: f64,
}

impl Default for SprayAndFocusConfig {
    fn default() -> Self {
        Self {
            initial_copies: 6,
            seconds_in_time_unit: 30.0,
            beta: 0.25,
            p_init: 0.75,
            gamma: 0.98,
        }
    }
}

/// Replicas the sender keeps after a hand-off
///
/// Zero means the local copy should be discarded.
pub fn sender_copies_after_transfer(copies: i64) -> i64 {
    if copies > 1 { copies / 2 } else { copies - 1 }
}

/// Replicas the receiver gets during the spray phase
pub fn receiver_copies_binary(copies: i64) -> i64 {
    (copies + 1) / 2
}

/// Replicas the receiver gets when focusing the last copy
///
/// `ceil(n * p_from / (p_from + p_dest))`, never less than one.
pub fn focus_copies(copies: i64, p_from: f64, p_dest: f64) -> i64 {
    let total = p_from + p_dest;
    if total <= 0.0 {
        return 1;
    }
    let focused = (copies as f64 * p_from / total).ceil() as i64;
    focused.max(1)
}

fn copies_of<I: PeerIdentity>(message: &Message<I>) -> RoutingResult<i64> {
    message
        .int_property(MSG_COUNT_PROPERTY)?
        .ok_or_else(|| RoutingError::MissingProtocolMetadata {
            message: message.id.to_string(),
            property: MSG_COUNT_PROPERTY.to_string(),
        })
}

/// Spray-and-focus decision engine
#[derive(Debug, Clone)]
pub struct SprayAndFocusEngine<I: PeerIdentity> {
    config: SprayAndFocusConfig,
    predictions: DeliveryPredictions<I>,
}

impl<I: PeerIdentity> SprayAndFocusEngine<I> {
    /// Create an engine with the given configuration
    pub fn new(config: SprayAndFocusConfig) -> Self {
        let predictions = DeliveryPredictions::new(config.seconds_in_time_unit, config.gamma);
        Self {
            config,
            predictions,
        }
    }

    /// Create with default configuration
    pub fn with_defaults() -> Self {
        Self::new(SprayAndFocusConfig::default())
    }

    /// Get the configuration
    pub fn config(&self) -> &SprayAndFocusConfig {
        &self.config
    }

    /// Prediction for a destination, aged to `now`
    pub fn prediction_for(&mut self, host: &I, now: SimTime) -> f64 {
        self.predictions.get(host, now)
    }

    /// The prediction table
    pub fn predictions(&self) -> &DeliveryPredictions<I> {
        &self.predictions
    }

    fn peer_prediction(
        ctx: &DecisionContext<'_, I>,
        peer: &I,
        destination: &I,
    ) -> RoutingResult<f64> {
        Ok(ctx
            .peer_snapshot(peer)?
            .into_predictions(peer)?
            .prediction_for(destination))
    }
}

impl<I: PeerIdentity> DecisionEngine<I> for SprayAndFocusEngine<I> {
    fn kind(&self) -> EngineKind {
        EngineKind::SprayAndFocus
    }

    fn connection_up(&mut self, ctx: &DecisionContext<'_, I>, peer: &I) -> RoutingResult<()> {
        if peer == ctx.this_host {
            return Ok(());
        }
        let peer_predictions = ctx.peer_snapshot(peer)?.into_predictions(peer)?;

        self.predictions
            .update_direct(peer, self.config.p_init, ctx.now);
        self.predictions.update_transitive(
            ctx.this_host,
            peer,
            peer_predictions.iter(),
            self.config.beta,
            ctx.now,
        );

        tracing::debug!(
            host = %ctx.this_host.short_id(),
            peer = %peer.short_id(),
            prediction = self.predictions.aged_prediction(peer, ctx.now),
            known = self.predictions.len(),
            "Updated delivery predictions"
        );
        Ok(())
    }

    fn connection_down(&mut self, _ctx: &DecisionContext<'_, I>, _peer: &I) -> RoutingResult<()> {
        Ok(())
    }

    fn do_exchange_for_new_connection(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        _contact: &Contact<I>,
        peer: &I,
    ) -> RoutingResult<()> {
        ctx.ensure_peer_kind(peer, EngineKind::SprayAndFocus)
    }

    fn new_message(&mut self, message: &mut Message<I>) -> RoutingResult<bool> {
        message.add_property(
            MSG_COUNT_PROPERTY,
            PropertyValue::Int(self.config.initial_copies),
        )?;
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
        copies_of(message)?;

        let theirs = Self::peer_prediction(ctx, other_host, &message.to)?;
        let ours = self.predictions.get(&message.to, ctx.now);

        tracing::trace!(
            message = %message.id,
            peer = %other_host.short_id(),
            theirs,
            ours,
            "Compared delivery predictions"
        );
        Ok(theirs > ours)
    }

    fn should_delete_sent_message(
        &self,
        message: &Message<I>,
        other_host: &I,
    ) -> RoutingResult<bool> {
        if message.to == *other_host {
            return Ok(true);
        }
        Ok(copies_of(message)? <= 0)
    }

    fn should_delete_old_message(
        &self,
        message: &Message<I>,
        reporting_host: &I,
    ) -> RoutingResult<bool> {
        Ok(message.to == *reporting_host)
    }

    fn update(&mut self, ctx: &DecisionContext<'_, I>) -> RoutingResult<()> {
        self.predictions.age(ctx.now);
        Ok(())
    }

    fn replicate(&self) -> Box<dyn DecisionEngine<I>> {
        Box::new(Self::new(self.config.clone()))
    }

    fn snapshot(&self, now: SimTime) -> EngineSnapshot<I> {
        EngineSnapshot::SprayAndFocus(PredictionSnapshot {
            predictions: self.predictions.aged_view(now),
        })
    }

    fn routing_info(&mut self, now: SimTime) -> RoutingInfo {
        self.predictions.age(now);

        let mut entries: Vec<(&I, f64)> = self.predictions.iter().collect();
        entries.sort_by_key(|(host, _)| host.to_string());

        let mut info = RoutingInfo::new(format!("{} delivery prediction(s)", entries.len()));
        for (host, p) in entries {
            info.add_child(RoutingInfo::new(format!("{} : {:.6}", host, p)));
        }
        info
    }

    fn transfer_priority(
        &self,
        ctx: &DecisionContext<'_, I>,
        message: &Message<I>,
        peer: &I,
    ) -> RoutingResult<f64> {
        Self::peer_prediction(ctx, peer, &message.to)
    }

    fn message_transferred(
        &mut self,
        ctx: &DecisionContext<'_, I>,
        message: &mut Message<I>,
        from: &I,
    ) -> RoutingResult<()> {
        let copies = copies_of(message)?;
        let received = if copies > 1 {
            receiver_copies_binary(copies)
        } else {
            let p_from = self.predictions.get(from, ctx.now);
            let p_dest = self.predictions.get(&message.to, ctx.now);
            focus_copies(copies, p_from, p_dest)
        };
        message.update_property(MSG_COUNT_PROPERTY, PropertyValue::Int(received));
        Ok(())
    }

    fn transfer_done(&mut self, message: &mut Message<I>, _to: &I) -> RoutingResult<()> {
        let copies = copies_of(message)?;
        message.update_property(
            MSG_COUNT_PROPERTY,
            PropertyValue::Int(sender_copies_after_transfer(copies)),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{SnapshotDirectory, ctx_at, make_id};
    use oppnet_core::SimulationIdentity;
    use std::collections::HashMap;

    fn predictions_of(entries: &[(char, f64)]) -> EngineSnapshot<SimulationIdentity> {
        let predictions: HashMap<_, _> = entries.iter().map(|(c, p)| (make_id(*c), *p)).collect();
        EngineSnapshot::SprayAndFocus(PredictionSnapshot { predictions })
    }

    fn make_message(to: char) -> Message<SimulationIdentity> {
        Message::new("M1", make_id('A'), make_id(to), 100, SimTime::ZERO)
    }

    #[test]
    fn test_copy_arithmetic() {
        assert_eq!(sender_copies_after_transfer(4), 2);
        assert_eq!(sender_copies_after_transfer(5), 2);
        assert_eq!(sender_copies_after_transfer(1), 0);
        assert_eq!(receiver_copies_binary(4), 2);
        assert_eq!(receiver_copies_binary(5), 3);

        // Spray never creates replicas
        for n in 2..20 {
            assert_eq!(sender_copies_after_transfer(n) + receiver_copies_binary(n), n);
        }
    }

    #[test]
    fn test_focus_copies() {
        assert_eq!(focus_copies(1, 0.4, 0.2), 1);
        assert_eq!(focus_copies(1, 0.0, 0.0), 1);
        assert_eq!(focus_copies(1, 0.0, 0.9), 1);
        assert_eq!(focus_copies(4, 0.5, 0.5), 2);
    }

    #[test]
    fn test_new_message_attaches_copies() {
        let mut engine = SprayAndFocusEngine::<SimulationIdentity>::with_defaults();
        let mut msg = make_message('Z');
        assert!(engine.new_message(&mut msg).unwrap());
        assert_eq!(msg.int_property(MSG_COUNT_PROPERTY).unwrap(), Some(6));
    }

    #[test]
    fn test_connection_up_direct_and_transitive() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(make_id('B'), predictions_of(&[('C', 0.8), ('A', 0.5)]));
        let mut engine = SprayAndFocusEngine::with_defaults();

        engine
            .connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'))
            .unwrap();

        let now = SimTime::ZERO;
        assert!((engine.prediction_for(&make_id('B'), now) - 0.75).abs() < 1e-12);
        assert!((engine.prediction_for(&make_id('C'), now) - 0.75 * 0.8 * 0.25).abs() < 1e-12);
        assert_eq!(engine.prediction_for(&a, now), 0.0);
    }

    #[test]
    fn test_connection_up_rejects_other_engine() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(
            make_id('B'),
            EngineSnapshot::PeopleRank(crate::snapshot::RankSnapshot { rank: 0.5 }),
        );
        let mut engine = SprayAndFocusEngine::with_defaults();

        let err = engine.connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'));
        assert!(matches!(err, Err(RoutingError::ProtocolMismatch { .. })));
        // Nothing was recorded
        assert!(engine.predictions().is_empty());
    }

    #[test]
    fn test_should_send_compares_predictions() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new()
            .with(make_id('B'), predictions_of(&[('D', 0.6)]))
            .with(make_id('C'), predictions_of(&[('D', 0.1)]));
        let mut engine = SprayAndFocusEngine::with_defaults();
        let mut msg = make_message('D');
        engine.new_message(&mut msg).unwrap();

        // Learn D indirectly: 0.75 * 0.6 * 0.25 = 0.1125
        engine
            .connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'))
            .unwrap();

        let ctx = ctx_at(&a, 0.0, &peers);
        assert!(engine.should_send_message_to_host(&ctx, &msg, &make_id('B')).unwrap());
        assert!(!engine.should_send_message_to_host(&ctx, &msg, &make_id('C')).unwrap());
        // Destination always qualifies
        assert!(engine.should_send_message_to_host(&ctx, &msg, &make_id('D')).unwrap());
    }

    #[test]
    fn test_missing_copies_property() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(make_id('B'), predictions_of(&[]));
        let mut engine = SprayAndFocusEngine::with_defaults();
        let msg = make_message('D');

        let err = engine.should_send_message_to_host(&ctx_at(&a, 0.0, &peers), &msg, &make_id('B'));
        assert!(matches!(err, Err(RoutingError::MissingProtocolMetadata { .. })));

        let mut msg = msg;
        assert!(engine.transfer_done(&mut msg, &make_id('B')).is_err());
    }

    #[test]
    fn test_transfer_hooks_split_replicas() {
        let a = make_id('A');
        let b = make_id('B');
        let peers = SnapshotDirectory::new();
        let mut sender = SprayAndFocusEngine::<SimulationIdentity>::new(SprayAndFocusConfig {
            initial_copies: 4,
            ..Default::default()
        });
        let mut receiver = sender.clone();

        let mut msg = make_message('Z');
        sender.new_message(&mut msg).unwrap();
        let mut copy = msg.replicate_for_transfer(SimTime::from_secs(1.0));

        receiver
            .message_transferred(&ctx_at(&b, 1.0, &peers), &mut copy, &a)
            .unwrap();
        sender.transfer_done(&mut msg, &b).unwrap();

        assert_eq!(msg.int_property(MSG_COUNT_PROPERTY).unwrap(), Some(2));
        assert_eq!(copy.int_property(MSG_COUNT_PROPERTY).unwrap(), Some(2));
        assert!(!sender.should_delete_sent_message(&msg, &b).unwrap());
    }

    #[test]
    fn test_last_copy_is_moved() {
        let mut engine = SprayAndFocusEngine::<SimulationIdentity>::with_defaults();
        let mut msg = make_message('Z');
        msg.update_property(MSG_COUNT_PROPERTY, PropertyValue::Int(1));

        engine.transfer_done(&mut msg, &make_id('B')).unwrap();
        assert_eq!(msg.int_property(MSG_COUNT_PROPERTY).unwrap(), Some(0));
        assert!(engine.should_delete_sent_message(&msg, &make_id('B')).unwrap());
    }

    #[test]
    fn test_snapshot_does_not_age_table() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(make_id('B'), predictions_of(&[]));
        let mut engine = SprayAndFocusEngine::with_defaults();
        engine
            .connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'))
            .unwrap();

        let later = SimTime::from_secs(60.0);
        let snapshot = engine.snapshot(later).into_predictions(&a).unwrap();
        assert_eq!(engine.predictions().last_age_update(), SimTime::ZERO);
        assert!((snapshot.prediction_for(&make_id('B')) - 0.7203).abs() < 1e-4);
    }

    #[test]
    fn test_replicate_starts_empty() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(make_id('B'), predictions_of(&[]));
        let mut engine = SprayAndFocusEngine::with_defaults();
        engine
            .connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'))
            .unwrap();

        let fresh = engine.replicate();
        assert_eq!(fresh.kind(), EngineKind::SprayAndFocus);
        let snapshot = fresh.snapshot(SimTime::ZERO).into_predictions(&a).unwrap();
        assert!(snapshot.predictions.is_empty());
    }

    #[test]
    fn test_routing_info_lists_predictions() {
        let a = make_id('A');
        let peers = SnapshotDirectory::new().with(make_id('B'), predictions_of(&[]));
        let mut engine = SprayAndFocusEngine::with_defaults();
        engine
            .connection_up(&ctx_at(&a, 0.0, &peers), &make_id('B'))
            .unwrap();

        let info = engine.routing_info(SimTime::ZERO);
        assert_eq!(info.text, "1 delivery prediction(s)");
        assert_eq!(info.children[0].text, "B : 0.750000");
    }
}
