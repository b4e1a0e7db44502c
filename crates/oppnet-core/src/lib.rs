//! # oppnet Core
//!
//! Core types shared by the oppnet routing engines and simulation driver.
//!
//! Everything in this crate is deliberately passive: the routing engines in
//! `oppnet-routing` own all decision logic and only read or update the types
//! defined here.
//!
//! ## Key Traits
//!
//! - [`PeerIdentity`]: Opaque, hashable node handle (char for tests, numeric address for traces)
//! - [`MessageStore`]: The message buffer contract consumed by the routing layer
//!
//! ## Key Types
//!
//! - [`SimTime`]: Logical simulation timestamp in seconds
//! - [`Message`]: An opaque message record with a typed property bag
//! - [`MessageBuffer`]: In-memory, capacity-bounded [`MessageStore`]
//! - [`ContactHistory`]: Per-peer log of closed contact intervals

pub mod error;
pub mod history;
pub mod identity;
pub mod message;
pub mod store;
pub mod time;

// Re-export main types
pub use error::*;
pub use history::*;
pub use identity::*;
pub use message::*;
pub use store::*;
pub use time::*;
