//! Node identity abstractions
//!
//! This module provides the [`PeerIdentity`] trait that abstracts over
//! different node handle implementations:
//!
//! - `SimulationIdentity`: Simple char-based identity for tests ('A'..'Z')
//! - `HostAddress`: Numeric host address used by contact traces

use std::fmt::{Debug, Display};
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::IdentityError;

/// Trait for node identity abstraction
///
/// The routing core never dereferences an identity; it is used only as a
/// map key and compared for equality.
pub trait PeerIdentity:
    Clone + Eq + Hash + Send + Sync + Debug + Display + Serialize + DeserializeOwned + 'static
{
    /// Get a short display form (for logging)
    fn short_id(&self) -> String {
        format!("{}", self)
    }
}

/// Simple character-based identity for simulation
///
/// Used for testing and development. Maps to characters 'A'..'Z'.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SimulationIdentity(pub char);

impl SimulationIdentity {
    /// Create a new simulation identity from a capital letter
    pub fn new(c: char) -> Option<Self> {
        if c.is_ascii_uppercase() {
            Some(Self(c))
        } else {
            None
        }
    }

    /// Generate all identities from 'A' to the given letter (inclusive)
    pub fn range_to(end: char) -> Vec<Self> {
        ('A'..=end).filter_map(Self::new).collect()
    }

    /// Get the underlying character
    pub fn as_char(&self) -> char {
        self.0
    }
}

impl Display for SimulationIdentity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl PeerIdentity for SimulationIdentity {
    fn short_id(&self) -> String {
        self.0.to_string()
    }
}

impl FromStr for SimulationIdentity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Self::new(c).ok_or_else(|| {
                IdentityError::OutOfRange(format!("simulation identity must be A..Z, got {}", c))
            }),
            _ => Err(IdentityError::InvalidFormat(s.to_string())),
        }
    }
}

/// Numeric host address
///
/// Contact traces name hosts by integer address, optionally with a
/// one-letter group prefix (`"12"`, `"n12"`, `"p3"`). The prefix is
/// not part of the identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HostAddress(pub u32);

impl HostAddress {
    /// Get the numeric address
    pub fn address(&self) -> u32 {
        self.0
    }
}

impl Display for HostAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "n{}", self.0)
    }
}

impl PeerIdentity for HostAddress {}

impl FromStr for HostAddress {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.trim_start_matches(|c: char| c.is_ascii_alphabetic());
        if digits.is_empty() || digits.len() + 1 < s.len() {
            return Err(IdentityError::InvalidFormat(s.to_string()));
        }
        digits
            .parse::<u32>()
            .map(HostAddress)
            .map_err(|_| IdentityError::InvalidFormat(s.to_string()))
    }
}
