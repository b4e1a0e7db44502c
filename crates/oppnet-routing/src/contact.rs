//! Contacts between pairs of nodes

use std::collections::HashMap;

use oppnet_core::{Interval, PeerIdentity, SimTime};

/// A freshly established contact between two nodes
#[derive(Debug, Clone, PartialEq)]
pub struct Contact<I: PeerIdentity> {
    /// Node that initiated the contact
    pub a: I,
    /// Node on the other end
    pub b: I,
    /// When the contact came up
    pub started_at: SimTime,
}

impl<I: PeerIdentity> Contact<I> {
    /// Create a contact record
    pub fn new(a: I, b: I, started_at: SimTime) -> Self {
        Self { a, b, started_at }
    }

    /// The end of the contact that is not `host`
    pub fn other_end(&self, host: &I) -> &I {
        if *host == self.a { &self.b } else { &self.a }
    }

    /// Check whether `host` is one of the ends
    pub fn involves(&self, host: &I) -> bool {
        self.a == *host || self.b == *host
    }
}

/// Start timestamps of open contacts, keyed by peer
#[derive(Debug, Clone)]
pub(crate) struct ContactClock<I: PeerIdentity> {
    starts: HashMap<I, SimTime>,
}

impl<I: PeerIdentity> ContactClock<I> {
    pub(crate) fn new() -> Self {
        Self {
            starts: HashMap::new(),
        }
    }

    pub(crate) fn start(&mut self, peer: &I, now: SimTime) {
        self.starts.insert(peer.clone(), now);
    }

    /// Close the open contact with `peer`
    ///
    /// Returns None if no start was recorded for it.
    pub(crate) fn close(&mut self, peer: &I, now: SimTime) -> Option<Interval> {
        self.starts
            .remove(peer)
            .map(|start| Interval::new(start, now))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppnet_core::SimulationIdentity;

    fn make_id(c: char) -> SimulationIdentity {
        SimulationIdentity::new(c).unwrap()
    }

    #[test]
    fn test_other_end() {
        let contact = Contact::new(make_id('A'), make_id('B'), SimTime::ZERO);
        assert_eq!(contact.other_end(&make_id('A')), &make_id('B'));
        assert_eq!(contact.other_end(&make_id('B')), &make_id('A'));
        assert!(contact.involves(&make_id('A')));
        assert!(!contact.involves(&make_id('C')));
    }

    #[test]
    fn test_clock_close() {
        let mut clock = ContactClock::new();
        clock.start(&make_id('B'), SimTime::from_secs(10.0));

        let interval = clock.close(&make_id('B'), SimTime::from_secs(25.0)).unwrap();
        assert_eq!(interval.duration(), 15.0);

        // Closing twice has nothing to close
        assert!(clock.close(&make_id('B'), SimTime::from_secs(30.0)).is_none());
    }
}
