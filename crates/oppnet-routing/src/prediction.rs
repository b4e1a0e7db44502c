//! Delivery-prediction table with lazy aging
//!
//! Key rules:
//! - **Aging**: before any read or write, every value is multiplied by
//!   `gamma^(elapsed / unit)`; nothing happens when no time has passed
//! - **Direct update**: `P(a,b) = P(a,b) + (1 - P(a,b)) * P_init` on contact
//! - **Transitivity**: `P(a,c) = P(a,c) + (1 - P(a,c)) * P(a,b) * P(b,c) * beta`
//!
//! Read-only queries compute the aged value without touching the table, and
//! agree with what a mutating read at the same instant would return.

use std::collections::HashMap;

use oppnet_core::{PeerIdentity, SimTime};

/// Per-destination delivery predictions owned by one engine
#[derive(Debug, Clone)]
pub struct DeliveryPredictions<I: PeerIdentity> {
    values: HashMap<I, f64>,
    last_age_update: SimTime,
    seconds_in_time_unit: f64,
    gamma: f64,
}

impl<I: PeerIdentity> DeliveryPredictions<I> {
    /// Create an empty table
    pub fn new(seconds_in_time_unit: f64, gamma: f64) -> Self {
        Self {
            values: HashMap::new(),
            last_age_update: SimTime::ZERO,
            seconds_in_time_unit,
            gamma,
        }
    }

    /// Multiplier that aging at `now` would apply
    ///
    /// None when no time passed or the time unit is unusable.
    fn aging_factor(&self, now: SimTime) -> Option<f64> {
        let units = now.elapsed_since(self.last_age_update) / self.seconds_in_time_unit;
        if units == 0.0 || !units.is_finite() {
            return None;
        }
        Some(self.gamma.powf(units))
    }

    /// Apply pending decay up to `now`
    pub fn age(&mut self, now: SimTime) {
        let Some(mult) = self.aging_factor(now) else {
            return;
        };
        for value in self.values.values_mut() {
            *value *= mult;
        }
        self.last_age_update = now;
    }

    /// Prediction for a destination after aging to `now` (0 if unknown)
    pub fn get(&mut self, host: &I, now: SimTime) -> f64 {
        self.age(now);
        self.values.get(host).copied().unwrap_or(0.0)
    }

    /// Aged prediction computed without mutating the table
    pub fn aged_prediction(&self, host: &I, now: SimTime) -> f64 {
        let mult = self.aging_factor(now).unwrap_or(1.0);
        self.values.get(host).map_or(0.0, |p| p * mult)
    }

    /// Owned copy of the whole table, aged to `now`, without mutating it
    pub fn aged_view(&self, now: SimTime) -> HashMap<I, f64> {
        let mult = self.aging_factor(now).unwrap_or(1.0);
        self.values
            .iter()
            .map(|(host, p)| (host.clone(), p * mult))
            .collect()
    }

    /// Strengthen the prediction for a peer just met
    pub fn update_direct(&mut self, peer: &I, p_init: f64, now: SimTime) {
        let old = self.get(peer, now);
        self.values.insert(peer.clone(), old + (1.0 - old) * p_init);
    }

    /// Propagate predictions learned from `peer`
    ///
    /// Entries for `this_host` are skipped; a node never predicts itself.
    pub fn update_transitive<'p>(
        &mut self,
        this_host: &I,
        peer: &I,
        peer_predictions: impl IntoIterator<Item = (&'p I, f64)>,
        beta: f64,
        now: SimTime,
    ) where
        I: 'p,
    {
        let p_peer = self.get(peer, now);
        for (host, p_peer_host) in peer_predictions {
            if host == this_host {
                continue;
            }
            let old = self.values.get(host).copied().unwrap_or(0.0);
            let new = old + (1.0 - old) * p_peer * p_peer_host * beta;
            self.values.insert(host.clone(), new);
        }
    }

    /// Raw stored values, not aged
    pub fn iter(&self) -> impl Iterator<Item = (&I, f64)> {
        self.values.iter().map(|(host, p)| (host, *p))
    }

    /// Number of known destinations
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check whether the table is empty
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Time of the last applied decay
    pub fn last_age_update(&self) -> SimTime {
        self.last_age_update
    }
}
