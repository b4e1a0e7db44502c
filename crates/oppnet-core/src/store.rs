//! Message store contract and an in-memory buffer
//!
//! The routing layer consumes buffers only through [`MessageStore`]: it
//! enumerates held messages, looks messages up, adds and removes them, and
//! reads or updates named properties on them.

use std::collections::HashMap;

use crate::error::StorageError;
use crate::identity::PeerIdentity;
use crate::message::{Message, MessageId};
use crate::time::SimTime;

/// Occupancy of a message buffer, in bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferStatus {
    /// Bytes currently occupied
    pub used: usize,
    /// Total capacity (None = unbounded)
    pub capacity: Option<usize>,
}

impl BufferStatus {
    /// Status of an unbounded buffer
    pub fn unbounded(used: usize) -> Self {
        Self {
            used,
            capacity: None,
        }
    }

    /// Bytes still free (`usize::MAX` when unbounded)
    pub fn free(&self) -> usize {
        self.capacity
            .map_or(usize::MAX, |cap| cap.saturating_sub(self.used))
    }

    /// Whether any space is left
    pub fn has_capacity(&self) -> bool {
        self.free() > 0
    }
}

/// Storage abstraction for held messages
pub trait MessageStore<I: PeerIdentity> {
    /// Iterate over all held messages
    ///
    /// Every call starts a fresh iteration.
    fn messages(&self) -> Box<dyn Iterator<Item = &Message<I>> + '_>;

    /// Look up a message by ID
    fn get(&self, id: &MessageId) -> Option<&Message<I>>;

    /// Look up a message by ID for property updates
    fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message<I>>;

    /// Add a message
    fn insert(&mut self, message: Message<I>) -> Result<(), StorageError>;

    /// Remove a message, returning it if it was held
    fn remove(&mut self, id: &MessageId) -> Option<Message<I>>;

    /// Current occupancy
    fn status(&self) -> BufferStatus;

    /// Check whether a message is held
    fn contains(&self, id: &MessageId) -> bool {
        self.get(id).is_some()
    }

    /// Number of held messages
    fn len(&self) -> usize {
        self.messages().count()
    }

    /// Check whether the store is empty
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// In-memory message buffer with an optional byte capacity
#[derive(Debug, Clone)]
pub struct MessageBuffer<I: PeerIdentity> {
    messages: HashMap<MessageId, Message<I>>,
    capacity: Option<usize>,
    used: usize,
}

impl<I: PeerIdentity> MessageBuffer<I> {
    /// Create a buffer holding at most `capacity` bytes
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            messages: HashMap::new(),
            capacity: Some(capacity),
            used: 0,
        }
    }

    /// Create a buffer without a size limit
    pub fn unbounded() -> Self {
        Self {
            messages: HashMap::new(),
            capacity: None,
            used: 0,
        }
    }

    /// Evict oldest-received messages until `size` more bytes fit
    ///
    /// Returns the IDs of evicted messages. Nothing is evicted if the message
    /// could never fit.
    pub fn make_room_for(&mut self, size: usize) -> Vec<MessageId> {
        let Some(capacity) = self.capacity else {
            return Vec::new();
        };
        if size > capacity {
            return Vec::new();
        }

        let mut by_age: Vec<(SimTime, MessageId)> = self
            .messages
            .values()
            .map(|m| (m.received_at, m.id.clone()))
            .collect();
        by_age.sort_by(|a, b| {
            a.0.partial_cmp(&b.0)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.1.cmp(&b.1))
        });

        let mut evicted = Vec::new();
        for (_, id) in by_age {
            if self.used + size <= capacity {
                break;
            }
            if self.remove(&id).is_some() {
                evicted.push(id);
            }
        }

        if !evicted.is_empty() {
            tracing::debug!(count = evicted.len(), size, "Evicted messages to make room");
        }
        evicted
    }

    /// Remove and return every message whose TTL has run out
    pub fn drop_expired(&mut self, now: SimTime) -> Vec<Message<I>> {
        let expired: Vec<MessageId> = self
            .messages
            .values()
            .filter(|m| m.is_expired(now))
            .map(|m| m.id.clone())
            .collect();

        expired
            .into_iter()
            .filter_map(|id| self.remove(&id))
            .collect()
    }
}

impl<I: PeerIdentity> Default for MessageBuffer<I> {
    fn default() -> Self {
        Self::unbounded()
    }
}

impl<I: PeerIdentity> MessageStore<I> for MessageBuffer<I> {
    fn messages(&self) -> Box<dyn Iterator<Item = &Message<I>> + '_> {
        Box::new(self.messages.values())
    }

    fn get(&self, id: &MessageId) -> Option<&Message<I>> {
        self.messages.get(id)
    }

    fn get_mut(&mut self, id: &MessageId) -> Option<&mut Message<I>> {
        self.messages.get_mut(id)
    }

    fn insert(&mut self, message: Message<I>) -> Result<(), StorageError> {
        if self.messages.contains_key(&message.id) {
            return Err(StorageError::Duplicate(message.id.to_string()));
        }
        if let Some(capacity) = self.capacity
            && self.used + message.size > capacity
        {
            return Err(StorageError::CapacityExceeded {
                size: message.size,
                capacity,
            });
        }
        self.used += message.size;
        self.messages.insert(message.id.clone(), message);
        Ok(())
    }

    fn remove(&mut self, id: &MessageId) -> Option<Message<I>> {
        let removed = self.messages.remove(id)?;
        self.used -= removed.size;
        Some(removed)
    }

    fn status(&self) -> BufferStatus {
        BufferStatus {
            used: self.used,
            capacity: self.capacity,
        }
    }

    fn len(&self) -> usize {
        self.messages.len()
    }
}
