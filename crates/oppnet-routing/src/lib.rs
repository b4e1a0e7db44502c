//! # oppnet Routing
//!
//! Contact-time forwarding decisions for opportunistic networks.
//!
//! Every node runs one [`DecisionEngine`]. The engine is told when contacts
//! open and close and is asked, for each (message, peer) pair, whether a copy
//! should be handed over. Engines only ever see their peers through owned
//! [`EngineSnapshot`]s, so no engine can mutate another node's state.
//!
//! ## Engines
//!
//! - **Spray-and-focus**: Binary replica splitting while more than one copy
//!   is left, then single-copy forwarding along aging PRoPHET delivery
//!   predictions.
//!
//! - **PeopleRank**: A PageRank-style social rank grown on every contact;
//!   messages move towards better-ranked peers.
//!
//! - **PeopleRank2**: Friendship (long cumulative contact) based rank with a
//!   buffer gate and a friend override.
//!
//! - **DistributedPeopleRank**: Community detection plus local and global
//!   centrality. Only the decision path is implemented; the rest reports
//!   [`RoutingError::UnsupportedOperation`].
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use oppnet_core::{SimTime, SimulationIdentity};
//! use oppnet_routing::{ContactNetwork, RoutingConfig};
//!
//! let config = RoutingConfig::from_toml_str(r#"
//!     [engine]
//!     name = "spray-and-focus"
//!     initial_copies = 8
//! "#)?;
//!
//! let hosts = SimulationIdentity::range_to('D');
//! let mut net = ContactNetwork::from_config(hosts, &config)?;
//!
//! let (a, b) = (SimulationIdentity('A'), SimulationIdentity('B'));
//! net.create_message(&a, &b, "M1", 1024)?;
//! net.connection_up(&a, &b)?;
//! net.update_all();
//! ```
//!
//! ## Architecture
//!
//! - [`engine`]: The engine contract and the peer directory it reads through
//! - [`spray_focus`], [`people_rank`], [`people_rank2`], [`distributed`]: Engines
//! - [`prediction`]: Aging delivery-prediction table
//! - [`community`], [`centrality`]: Pluggable services for community-aware ranking
//! - [`transfer`]: Ordering of transfer candidates
//! - [`network`]: Contact-driven harness applying events to a set of nodes
//! - [`settings`]: TOML-backed engine selection and validation

pub mod centrality;
pub mod community;
pub mod contact;
pub mod distributed;
pub mod engine;
pub mod error;
pub mod info;
pub mod network;
pub mod people_rank;
pub mod people_rank2;
pub mod prediction;
pub mod settings;
pub mod snapshot;
pub mod spray_focus;
pub mod transfer;

#[cfg(test)]
mod test_support;

// Re-export main types
pub use centrality::{AverageWindowCentrality, Centrality, CentralitySettings, DegreeCentrality};
pub use community::{
    CommunityDetection, CommunitySettings, CommunityView, KCliqueCommunity, SimpleCommunity,
};
pub use contact::Contact;
pub use distributed::DistributedPeopleRankEngine;
pub use engine::{DecisionContext, DecisionEngine, PeerDirectory};
pub use error::{EngineKind, RoutingError, RoutingResult};
pub use info::RoutingInfo;
pub use network::{ContactNetwork, NetworkOptions, NetworkStats, TickSummary, Transfer};
pub use people_rank::{PeopleRankConfig, PeopleRankEngine};
pub use people_rank2::{PeopleRank2Config, PeopleRank2Engine, RankEntry};
pub use prediction::DeliveryPredictions;
pub use settings::{ConfigError, ConfigWarning, EngineSettings, RoutingConfig};
pub use snapshot::{CommunitySnapshot, EngineSnapshot, PredictionSnapshot, RankSnapshot};
pub use spray_focus::{SprayAndFocusConfig, SprayAndFocusEngine};
pub use transfer::{QueuePolicy, TransferCandidate, TransferPlanner};
