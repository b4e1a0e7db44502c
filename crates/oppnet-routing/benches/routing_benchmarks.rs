//! Routing decision benchmarks
//!
//! Benchmarks for the hot paths of a contact-driven run:
//! - Delivery-prediction aging and transitive updates
//! - Contact handling and update ticks on a whole network
//! - Transfer candidate ordering
//!
//! Run with: cargo bench -p oppnet-routing

use criterion::{Criterion, black_box, criterion_group, criterion_main};

use oppnet_core::{HostAddress, MessageId, SimTime};
use oppnet_routing::{
    ContactNetwork, DeliveryPredictions, NetworkOptions, PeopleRankEngine, QueuePolicy,
    SprayAndFocusEngine, TransferCandidate, TransferPlanner,
};

// ============================================================================
// Helpers
// ============================================================================

fn host(n: u32) -> HostAddress {
    HostAddress(n)
}

fn filled_table(size: u32) -> DeliveryPredictions<HostAddress> {
    let mut table = DeliveryPredictions::new(30.0, 0.98);
    for n in 1..=size {
        table.update_direct(&host(n), 0.75, SimTime::ZERO);
    }
    table
}

fn candidates(count: usize) -> Vec<TransferCandidate<HostAddress>> {
    (0..count)
        .map(|i| TransferCandidate {
            message_id: MessageId::new(format!("M{i}")),
            peer: host((i % 17) as u32),
            priority: (i % 7) as f64 * 0.1,
            received_at: SimTime::from_secs((i % 11) as f64),
        })
        .collect()
}

// ============================================================================
// Benchmarks
// ============================================================================

fn bench_predictions(c: &mut Criterion) {
    let mut group = c.benchmark_group("predictions");

    group.bench_function("age_500_destinations", |b| {
        let mut table = filled_table(500);
        let mut now = 0.0;
        b.iter(|| {
            now += 30.0;
            table.age(black_box(SimTime::from_secs(now)))
        })
    });

    group.bench_function("aged_view_500_destinations", |b| {
        let table = filled_table(500);
        b.iter(|| table.aged_view(black_box(SimTime::from_secs(90.0))))
    });

    group.bench_function("transitive_update_500_destinations", |b| {
        let peer_table = filled_table(500);
        let peer_view = peer_table.aged_view(SimTime::ZERO);
        let mut table = DeliveryPredictions::new(30.0, 0.98);
        table.update_direct(&host(1), 0.75, SimTime::ZERO);
        b.iter(|| {
            table.update_transitive(
                &host(0),
                &host(1),
                peer_view.iter().map(|(h, p)| (h, *p)),
                0.25,
                SimTime::ZERO,
            )
        })
    });

    group.finish();
}

fn bench_network(c: &mut Criterion) {
    let mut group = c.benchmark_group("network");

    group.bench_function("spray_contact_cycle_50_nodes", |b| {
        let prototype = SprayAndFocusEngine::<HostAddress>::with_defaults();
        let mut net =
            ContactNetwork::from_prototype((0..50).map(host), &prototype, NetworkOptions::default());
        let mut now = 0.0;
        let mut i = 0u32;
        b.iter(|| {
            let (a, z) = (host(i % 50), host((i * 7 + 1) % 50));
            i += 1;
            now += 1.0;
            net.advance_to(SimTime::from_secs(now));
            if a != z {
                let _ = net.connection_up(&a, &z);
                let _ = net.connection_down(&a, &z);
            }
        })
    });

    group.bench_function("people_rank_update_all_20_nodes", |b| {
        let prototype = PeopleRankEngine::<HostAddress>::with_defaults();
        let mut net =
            ContactNetwork::from_prototype((0..20).map(host), &prototype, NetworkOptions::default());
        for n in 1..20 {
            let _ = net.connection_up(&host(0), &host(n));
            let _ = net.create_message(&host(n), &host(0), format!("M{n}"), 100);
        }
        b.iter(|| black_box(net.update_all()))
    });

    group.finish();
}

fn bench_transfer_ordering(c: &mut Criterion) {
    let mut group = c.benchmark_group("transfer");

    group.bench_function("order_fifo_1000", |b| {
        let mut planner = TransferPlanner::new(QueuePolicy::Fifo);
        b.iter(|| {
            let mut list = candidates(1000);
            planner.order(&mut list);
            list
        })
    });

    group.bench_function("order_random_1000", |b| {
        let mut planner = TransferPlanner::new(QueuePolicy::Random { seed: 7 });
        b.iter(|| {
            let mut list = candidates(1000);
            planner.order(&mut list);
            list
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_predictions,
    bench_network,
    bench_transfer_ordering,
);
criterion_main!(benches);
