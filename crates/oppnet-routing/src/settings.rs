//! Routing configuration
//!
//! Settings are read from TOML. Every key is optional and falls back to the
//! documented default of its engine family:
//!
//! ```toml
//! buffer_size = 5000000
//! message_ttl = 86400.0
//!
//! [queue_policy]
//! mode = "random"
//! seed = 7
//!
//! [engine]
//! name = "distributed-people-rank"
//!
//! [engine.community]
//! algorithm = "k-clique"
//! k = 4
//! ```
//!
//! Community and centrality algorithms are a closed set resolved when the
//! prototype engine is built.

use std::fmt::Display;
use std::path::{Path, PathBuf};

use oppnet_core::PeerIdentity;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::centrality::CentralitySettings;
use crate::community::CommunitySettings;
use crate::distributed::DistributedPeopleRankEngine;
use crate::engine::DecisionEngine;
use crate::error::EngineKind;
use crate::people_rank::{PeopleRankConfig, PeopleRankEngine};
use crate::people_rank2::{PeopleRank2Config, PeopleRank2Engine};
use crate::spray_focus::{SprayAndFocusConfig, SprayAndFocusEngine};
use crate::transfer::QueuePolicy;

/// Errors loading a settings file
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid settings: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Failed to serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("Cannot build engine: {0}")]
    Unusable(ConfigWarning),
}

/// Engine family and its parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "kebab-case")]
pub enum EngineSettings {
    SprayAndFocus(SprayAndFocusConfig),
    PeopleRank(PeopleRankConfig),
    PeopleRank2(PeopleRank2Config),
    DistributedPeopleRank {
        #[serde(default)]
        community: CommunitySettings,
        #[serde(default)]
        centrality: CentralitySettings,
    },
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettings::SprayAndFocus(SprayAndFocusConfig::default())
    }
}

impl EngineSettings {
    /// Engine family selected by these settings
    pub fn kind(&self) -> EngineKind {
        match self {
            EngineSettings::SprayAndFocus(_) => EngineKind::SprayAndFocus,
            EngineSettings::PeopleRank(_) => EngineKind::PeopleRank,
            EngineSettings::PeopleRank2(_) => EngineKind::PeopleRank2,
            EngineSettings::DistributedPeopleRank { .. } => EngineKind::DistributedPeopleRank,
        }
    }

    /// Build the prototype engine every node replicates from
    pub fn build<I: PeerIdentity>(&self) -> Box<dyn DecisionEngine<I>> {
        match self {
            EngineSettings::SprayAndFocus(config) => {
                Box::new(SprayAndFocusEngine::new(config.clone()))
            }
            EngineSettings::PeopleRank(config) => Box::new(PeopleRankEngine::new(config.clone())),
            EngineSettings::PeopleRank2(config) => {
                Box::new(PeopleRank2Engine::new(config.clone()))
            }
            EngineSettings::DistributedPeopleRank {
                community,
                centrality,
            } => Box::new(DistributedPeopleRankEngine::new(
                community.build(),
                centrality.build(),
            )),
        }
    }
}

/// Complete routing configuration for a simulation run
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Buffer capacity per node in bytes (None = unbounded)
    pub buffer_size: Option<usize>,
    /// Time-to-live for created messages in seconds (None = never expire)
    pub message_ttl: Option<f64>,
    /// Tie-breaking between equally ranked transfer candidates
    pub queue_policy: QueuePolicy,
    /// Engine installed on every node
    pub engine: EngineSettings,
}

impl RoutingConfig {
    /// Social-network preset: PeopleRank2 with bounded buffers
    pub fn social() -> Self {
        Self {
            engine: EngineSettings::PeopleRank2(PeopleRank2Config::default()),
            buffer_size: Some(5_000_000),
            message_ttl: Some(86_400.0),
            queue_policy: QueuePolicy::Fifo,
        }
    }

    /// Parse settings from TOML text
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    /// Read settings from a TOML file
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Render the effective settings as TOML
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Build the prototype engine
    ///
    /// Fails on the first warning that would leave the engine unable to run.
    pub fn build_prototype<I: PeerIdentity>(
        &self,
    ) -> Result<Box<dyn DecisionEngine<I>>, ConfigError> {
        if let Some(fatal) = self.validate().into_iter().find(ConfigWarning::is_fatal) {
            return Err(ConfigError::Unusable(fatal));
        }
        Ok(self.engine.build())
    }

    /// Check for suspicious values
    pub fn validate(&self) -> Vec<ConfigWarning> {
        let mut warnings = Vec::new();

        match &self.engine {
            EngineSettings::SprayAndFocus(config) => {
                if config.initial_copies < 1 {
                    warnings.push(ConfigWarning::NonPositiveCopies);
                }
                if !config.seconds_in_time_unit.is_finite() || config.seconds_in_time_unit <= 0.0 {
                    warnings.push(ConfigWarning::NonPositiveTimeUnit);
                }
                for (name, value) in [
                    ("beta", config.beta),
                    ("p_init", config.p_init),
                    ("gamma", config.gamma),
                ] {
                    if !(0.0..=1.0).contains(&value) {
                        warnings.push(ConfigWarning::OutOfUnitRange(name));
                    }
                }
            }
            EngineSettings::PeopleRank(config) => {
                if !(0.0..=1.0).contains(&config.damping_factor) {
                    warnings.push(ConfigWarning::OutOfUnitRange("damping_factor"));
                }
            }
            EngineSettings::PeopleRank2(config) => {
                if !(0.0..=1.0).contains(&config.damping_factor) {
                    warnings.push(ConfigWarning::OutOfUnitRange("damping_factor"));
                }
                if config.threshold < 0.0 {
                    warnings.push(ConfigWarning::NegativeThreshold);
                }
            }
            EngineSettings::DistributedPeopleRank {
                community,
                centrality,
            } => {
                match community {
                    CommunitySettings::Simple {
                        lambda,
                        familiar_threshold,
                    } => {
                        if !(0.0..=1.0).contains(lambda) {
                            warnings.push(ConfigWarning::OutOfUnitRange("lambda"));
                        }
                        if *familiar_threshold < 0.0 {
                            warnings.push(ConfigWarning::NegativeThreshold);
                        }
                    }
                    CommunitySettings::KClique {
                        k,
                        familiar_threshold,
                    } => {
                        if *k == 0 {
                            warnings.push(ConfigWarning::ZeroCliqueSize);
                        }
                        if *familiar_threshold < 0.0 {
                            warnings.push(ConfigWarning::NegativeThreshold);
                        }
                    }
                }
                if let CentralitySettings::AverageWindow { time_window } = centrality
                    && *time_window <= 0.0
                {
                    warnings.push(ConfigWarning::NonPositiveTimeWindow);
                }
                // Lifecycle hooks of this engine are not implemented
                warnings.push(ConfigWarning::IncompleteEngine);
            }
        }

        if self.buffer_size == Some(0) {
            warnings.push(ConfigWarning::ZeroBufferSize);
        }
        if self.message_ttl.is_some_and(|ttl| ttl <= 0.0) {
            warnings.push(ConfigWarning::NonPositiveTtl);
        }

        warnings
    }

    /// Check if the configuration is valid (no warnings)
    pub fn is_valid(&self) -> bool {
        self.validate().is_empty()
    }
}

/// Configuration warnings
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigWarning {
    /// Spray-and-focus starts messages with no replicas
    NonPositiveCopies,
    /// Aging time unit is zero or negative
    NonPositiveTimeUnit,
    /// A probability-like parameter lies outside [0, 1]
    OutOfUnitRange(&'static str),
    /// A duration threshold is negative
    NegativeThreshold,
    /// k-clique detection with k = 0
    ZeroCliqueSize,
    /// Centrality window is zero or negative
    NonPositiveTimeWindow,
    /// Buffers cannot hold any message
    ZeroBufferSize,
    /// Messages expire immediately
    NonPositiveTtl,
    /// Engine reports unsupported operations during normal runs
    IncompleteEngine,
}

impl ConfigWarning {
    /// Whether an engine built from these settings could not run at all
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConfigWarning::NonPositiveTimeUnit)
    }
}

impl Display for ConfigWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigWarning::NonPositiveCopies => write!(f, "initial_copies must be at least 1"),
            ConfigWarning::NonPositiveTimeUnit => {
                write!(f, "seconds_in_time_unit must be positive")
            }
            ConfigWarning::OutOfUnitRange(name) => write!(f, "{} lies outside [0, 1]", name),
            ConfigWarning::NegativeThreshold => write!(f, "threshold is negative"),
            ConfigWarning::ZeroCliqueSize => write!(f, "k-clique size k is 0"),
            ConfigWarning::NonPositiveTimeWindow => write!(f, "time_window must be positive"),
            ConfigWarning::ZeroBufferSize => write!(f, "buffer_size is 0"),
            ConfigWarning::NonPositiveTtl => write!(f, "message_ttl must be positive"),
            ConfigWarning::IncompleteEngine => write!(
                f,
                "distributed-people-rank does not implement message creation, cleanup or update"
            ),
        }
    }
}
