//! Simulated time

use std::fmt::Display;
use std::ops::Add;

use serde::{Deserialize, Serialize};

/// Logical simulation timestamp, in seconds since the start of the run
///
/// Time is driven entirely by the external scheduler; nothing in oppnet
/// reads the wall clock.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SimTime(f64);

impl SimTime {
    /// Start of the simulation
    pub const ZERO: SimTime = SimTime(0.0);

    /// Create a timestamp from seconds
    pub fn from_secs(secs: f64) -> Self {
        Self(secs)
    }

    /// Get the timestamp in seconds
    pub fn as_secs(&self) -> f64 {
        self.0
    }

    /// Seconds elapsed since `earlier`
    ///
    /// Returns 0 if `earlier` lies in the future.
    pub fn elapsed_since(&self, earlier: SimTime) -> f64 {
        (self.0 - earlier.0).max(0.0)
    }
}

impl Add<f64> for SimTime {
    type Output = SimTime;

    fn add(self, secs: f64) -> SimTime {
        SimTime(self.0 + secs)
    }
}

impl Display for SimTime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.1}s", self.0)
    }
}
