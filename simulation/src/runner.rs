//! Trace replay
//!
//! Replays a [`Trace`] against a [`ContactNetwork`]: between events every
//! node gets an update tick each `update_interval` seconds, then the event
//! itself is applied. Engine failures are logged and counted; they never
//! stop the run.

use oppnet_core::{PeerIdentity, SimTime};
use oppnet_logging::NodeContextGuard;
use oppnet_routing::{
    ConfigError, ContactNetwork, NetworkStats, RoutingConfig, RoutingError, RoutingInfo,
};
use serde::Serialize;
use tracing::{debug, info, info_span, warn};
use uuid::Uuid;

use crate::trace::{Trace, TraceEvent};

/// Default seconds between update ticks
pub const DEFAULT_UPDATE_INTERVAL: f64 = 1.0;

/// Outcome of a replay
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub events: usize,
    pub ticks: u64,
    pub transfers: u64,
    pub errors: u64,
    pub end_time: f64,
    pub stats: NetworkStats,
}

/// A routing report of one node
#[derive(Debug, Clone, Serialize)]
pub struct NodeReport {
    pub node: String,
    pub report: RoutingInfo,
}

/// Drives a network through a trace
pub struct TraceRunner<I: PeerIdentity> {
    network: ContactNetwork<I>,
    update_interval: f64,
    next_tick: f64,
    run_id: Uuid,
    ticks: u64,
    transfers: u64,
}

impl<I: PeerIdentity> TraceRunner<I> {
    /// Install the configured engine on every host
    pub fn new(
        config: &RoutingConfig,
        hosts: Vec<I>,
        update_interval: f64,
    ) -> Result<Self, ConfigError> {
        let network = ContactNetwork::from_config(hosts, config)?;
        Ok(Self::with_network(network, update_interval))
    }

    /// Drive an already populated network
    pub fn with_network(network: ContactNetwork<I>, update_interval: f64) -> Self {
        Self {
            network,
            update_interval,
            next_tick: update_interval,
            run_id: Uuid::new_v4(),
            ticks: 0,
            transfers: 0,
        }
    }

    pub fn network(&self) -> &ContactNetwork<I> {
        &self.network
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Replay every event of `trace`
    pub fn run(&mut self, trace: &Trace<I>) -> RunSummary {
        info!(
            run_id = %self.run_id,
            events = trace.len(),
            hosts = self.network.hosts().len(),
            "Starting trace replay"
        );

        for event in trace.events() {
            self.tick_until(event.time());
            self.network.advance_to(event.time());
            self.apply(event);
        }

        let summary = self.summary(trace.len());
        info!(
            run_id = %self.run_id,
            delivered = summary.stats.delivered,
            created = summary.stats.created,
            errors = summary.errors,
            "Trace replay finished"
        );
        summary
    }

    /// Routing reports of every node, in installation order
    pub fn reports(&mut self) -> Vec<NodeReport> {
        let hosts = self.network.hosts().to_vec();
        hosts
            .into_iter()
            .filter_map(|host| {
                let report = self.network.routing_report(&host).ok()?;
                Some(NodeReport {
                    node: host.short_id(),
                    report,
                })
            })
            .collect()
    }

    fn summary(&self, events: usize) -> RunSummary {
        RunSummary {
            run_id: self.run_id,
            events,
            ticks: self.ticks,
            transfers: self.transfers,
            errors: self.network.stats().aborted,
            end_time: self.network.now().as_secs(),
            stats: self.network.stats().clone(),
        }
    }

    /// Run every update round scheduled at or before `time`
    fn tick_until(&mut self, time: SimTime) {
        if self.update_interval <= 0.0 {
            return;
        }
        while self.next_tick <= time.as_secs() {
            self.network.advance_to(SimTime::from_secs(self.next_tick));
            self.tick_all();
            self.next_tick += self.update_interval;
        }
    }

    fn tick_all(&mut self) {
        self.ticks += 1;
        for host in self.network.hosts().to_vec() {
            let _node = NodeContextGuard::new(&host, self.run_id);
            let _span = info_span!("tick", node = %host.short_id()).entered();
            match self.network.update(&host) {
                Ok(Some(_)) => self.transfers += 1,
                Ok(None) => {}
                Err(err) => log_error(&err),
            }
        }
    }

    fn apply(&mut self, event: &TraceEvent<I>) {
        let result = match event {
            TraceEvent::Connection { a, b, up, .. } => {
                let _node = NodeContextGuard::new(a, self.run_id);
                let _span = info_span!("contact", a = %a.short_id(), b = %b.short_id()).entered();
                if *up {
                    self.network.connection_up(a, b)
                } else {
                    self.network.connection_down(a, b)
                }
            }
            TraceEvent::Create {
                id, from, to, size, ..
            } => {
                let _node = NodeContextGuard::new(from, self.run_id);
                let _span = info_span!("create", message = %id).entered();
                self.network
                    .create_message(from, to, id.clone(), *size)
                    .map(|accepted| {
                        if !accepted {
                            debug!(message = %id, "Source engine rejected message");
                        }
                    })
            }
        };

        if let Err(err) = result {
            log_error(&err);
        }
    }
}

/// The network already counted and logged the failure
fn log_error(err: &RoutingError) {
    if err.is_protocol_mismatch() {
        warn!(error = %err, "Contact between incompatible engines");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oppnet_core::{HostAddress, MessageId};

    // Host 2 meets 4 first, so it outranks 1 when they meet
    const TRACE: &str = "\
0    CONN 2 4 up
2    CONN 2 4 down
3    CONN 1 2 up
5    C    M1 1 3 100
9    CONN 1 2 down
20   CONN 2 3 up
30   CONN 2 3 down
";

    fn trace() -> Trace<HostAddress> {
        Trace::parse(TRACE).unwrap()
    }

    #[test]
    fn test_people_rank_relays_and_delivers() {
        let config = RoutingConfig::from_toml_str("[engine]\nname = \"people-rank\"\n").unwrap();
        let trace = trace();
        let mut runner = TraceRunner::new(&config, trace.hosts(), 1.0).unwrap();
        let summary = runner.run(&trace);

        assert_eq!(summary.events, 7);
        assert_eq!(summary.errors, 0);
        assert_eq!(summary.stats.created, 1);
        assert_eq!(summary.stats.delivered, 1);
        assert_eq!(summary.transfers, 2);
        assert!(
            runner
                .network()
                .has_delivered(&HostAddress(3), &MessageId::new("M1"))
        );
    }

    #[test]
    fn test_ticks_follow_interval() {
        let config = RoutingConfig::default();
        let trace = trace();
        let mut runner = TraceRunner::new(&config, trace.hosts(), 10.0).unwrap();
        let summary = runner.run(&trace);
        // Rounds at 10, 20 and 30
        assert_eq!(summary.ticks, 3);
        assert_eq!(summary.end_time, 30.0);
    }

    #[test]
    fn test_unsupported_engine_counts_errors() {
        let config =
            RoutingConfig::from_toml_str("[engine]\nname = \"distributed-people-rank\"\n").unwrap();
        let trace = trace();
        let mut runner = TraceRunner::new(&config, trace.hosts(), 5.0).unwrap();
        let summary = runner.run(&trace);

        // Six rounds of four failed updates, plus the rejected message
        assert_eq!(summary.ticks, 6);
        assert_eq!(summary.errors, 25);
        assert_eq!(summary.stats.created, 0);
        assert_eq!(summary.errors, summary.stats.aborted);
    }

    #[test]
    fn test_reports_cover_every_host() {
        let config = RoutingConfig::default();
        let trace = trace();
        let mut runner = TraceRunner::new(&config, trace.hosts(), 1.0).unwrap();
        runner.run(&trace);

        let reports = runner.reports();
        let nodes: Vec<&str> = reports.iter().map(|r| r.node.as_str()).collect();
        assert_eq!(nodes, vec!["n2", "n4", "n1", "n3"]);
        assert!(reports[0].report.to_string().contains("delivery prediction"));
    }
}
