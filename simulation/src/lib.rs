//! # oppnet Simulation
//!
//! Trace-driven driver for the oppnet routing engines.
//!
//! A [`Trace`] lists contact and message-creation events; a [`TraceRunner`]
//! replays it against a [`ContactNetwork`](oppnet_routing::ContactNetwork)
//! with one engine per host, running periodic update ticks between events.

pub mod runner;
pub mod trace;

pub use runner::{DEFAULT_UPDATE_INTERVAL, NodeReport, RunSummary, TraceRunner};
pub use trace::{Trace, TraceError, TraceEvent};
