//! Message records carried through the network
//!
//! Messages are opaque to the routing core apart from their destination,
//! size, lifetime and a bag of named properties that engines use to attach
//! algorithm-specific metadata (for example a remaining replica count).

use std::collections::BTreeMap;
use std::fmt::Display;

use serde::{Deserialize, Serialize};

use crate::error::MessageError;
use crate::identity::PeerIdentity;
use crate::time::SimTime;

/// Unique identifier for a message
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(String);

impl MessageId {
    /// Create a new message ID
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the ID as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for MessageId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for MessageId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for MessageId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Typed value stored in a message's property bag
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PropertyValue {
    Int(i64),
    Float(f64),
    Text(String),
    Flag(bool),
}

impl PropertyValue {
    fn type_name(&self) -> &'static str {
        match self {
            PropertyValue::Int(_) => "integer",
            PropertyValue::Float(_) => "float",
            PropertyValue::Text(_) => "text",
            PropertyValue::Flag(_) => "flag",
        }
    }
}

/// A message held in a node's buffer
///
/// Generic over the identity type, allowing use with both simulation
/// identities and trace host addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(bound = "I: PeerIdentity")]
pub struct Message<I: PeerIdentity> {
    /// Unique message identifier
    pub id: MessageId,
    /// Original sender
    pub from: I,
    /// Final destination
    pub to: I,
    /// Size in bytes
    pub size: usize,
    /// Time-to-live in seconds, measured from creation (None = never expires)
    pub ttl: Option<f64>,
    /// When the message was created at its source
    pub created_at: SimTime,
    /// When the current holder received its copy
    pub received_at: SimTime,
    /// Number of hops this copy has travelled
    pub hop_count: u32,
    /// Algorithm-specific metadata
    properties: BTreeMap<String, PropertyValue>,
}

impl<I: PeerIdentity> Message<I> {
    /// Create a new message at its source
    pub fn new(id: impl Into<MessageId>, from: I, to: I, size: usize, created_at: SimTime) -> Self {
        Self {
            id: id.into(),
            from,
            to,
            size,
            ttl: None,
            created_at,
            received_at: created_at,
            hop_count: 0,
            properties: BTreeMap::new(),
        }
    }

    /// Set the time-to-live in seconds
    pub fn with_ttl(mut self, ttl: f64) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Add a new property
    ///
    /// Fails if the property already exists; use [`Message::update_property`]
    /// to overwrite.
    pub fn add_property(
        &mut self,
        key: impl Into<String>,
        value: PropertyValue,
    ) -> Result<(), MessageError> {
        let key = key.into();
        if self.properties.contains_key(&key) {
            return Err(MessageError::PropertyExists {
                message: self.id.to_string(),
                key,
            });
        }
        self.properties.insert(key, value);
        Ok(())
    }

    /// Insert or replace a property
    pub fn update_property(&mut self, key: impl Into<String>, value: PropertyValue) {
        self.properties.insert(key.into(), value);
    }

    /// Get a property by name
    pub fn property(&self, key: &str) -> Option<&PropertyValue> {
        self.properties.get(key)
    }

    /// Get an integer property
    ///
    /// Returns `Ok(None)` if the property is absent and an error if it holds
    /// a value of another type.
    pub fn int_property(&self, key: &str) -> Result<Option<i64>, MessageError> {
        match self.properties.get(key) {
            None => Ok(None),
            Some(PropertyValue::Int(v)) => Ok(Some(*v)),
            Some(_) => Err(MessageError::PropertyType {
                message: self.id.to_string(),
                key: key.to_string(),
                expected: PropertyValue::Int(0).type_name(),
            }),
        }
    }

    /// Iterate over all properties
    pub fn properties(&self) -> impl Iterator<Item = (&str, &PropertyValue)> {
        self.properties.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Check whether the message has outlived its TTL
    pub fn is_expired(&self, now: SimTime) -> bool {
        self.remaining_ttl(now).is_some_and(|left| left <= 0.0)
    }

    /// Seconds of lifetime left (None = never expires)
    pub fn remaining_ttl(&self, now: SimTime) -> Option<f64> {
        self.ttl
            .map(|ttl| ttl - now.elapsed_since(self.created_at))
    }

    /// Produce the receiver's copy for a hop
    ///
    /// Properties are copied as-is; the receiving engine adjusts them in its
    /// transfer completion hook.
    pub fn replicate_for_transfer(&self, now: SimTime) -> Self {
        let mut copy = self.clone();
        copy.received_at = now;
        copy.hop_count += 1;
        copy
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SimulationIdentity;

    fn make_message() -> Message<SimulationIdentity> {
        Message::new(
            "M1",
            SimulationIdentity::new('A').unwrap(),
            SimulationIdentity::new('Z').unwrap(),
            1024,
            SimTime::from_secs(100.0),
        )
    }

    #[test]
    fn test_add_property_rejects_duplicates() {
        let mut msg = make_message();
        msg.add_property("copies", PropertyValue::Int(4)).unwrap();
        let err = msg.add_property("copies", PropertyValue::Int(2));
        assert!(matches!(err, Err(MessageError::PropertyExists { .. })));
        assert_eq!(msg.int_property("copies").unwrap(), Some(4));
    }

    #[test]
    fn test_update_property_overwrites() {
        let mut msg = make_message();
        msg.update_property("copies", PropertyValue::Int(4));
        msg.update_property("copies", PropertyValue::Int(1));
        assert_eq!(msg.int_property("copies").unwrap(), Some(1));
    }

    #[test]
    fn test_int_property_type_mismatch() {
        let mut msg = make_message();
        msg.update_property("copies", PropertyValue::Text("four".into()));
        assert!(matches!(
            msg.int_property("copies"),
            Err(MessageError::PropertyType { .. })
        ));
        assert_eq!(msg.int_property("missing").unwrap(), None);
    }

    #[test]
    fn test_ttl_expiry() {
        let msg = make_message().with_ttl(60.0);
        assert!(!msg.is_expired(SimTime::from_secs(159.0)));
        assert!(msg.is_expired(SimTime::from_secs(160.0)));
        assert_eq!(msg.remaining_ttl(SimTime::from_secs(130.0)), Some(30.0));

        let forever = make_message();
        assert!(!forever.is_expired(SimTime::from_secs(1e9)));
    }

    #[test]
    fn test_replicate_for_transfer() {
        let mut msg = make_message();
        msg.update_property("copies", PropertyValue::Int(4));
        let copy = msg.replicate_for_transfer(SimTime::from_secs(150.0));
        assert_eq!(copy.hop_count, 1);
        assert_eq!(copy.received_at, SimTime::from_secs(150.0));
        assert_eq!(copy.created_at, msg.created_at);
        assert_eq!(copy.int_property("copies").unwrap(), Some(4));
    }

    #[test]
    fn test_message_serialization() {
        let mut msg = make_message();
        msg.update_property("copies", PropertyValue::Int(3));
        let json = serde_json::to_string(&msg).unwrap();
        let back: Message<SimulationIdentity> = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, msg.id);
        assert_eq!(back.int_property("copies").unwrap(), Some(3));
    }
}
