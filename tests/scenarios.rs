// SPDX-License-Identifier: Apache-2.0

//! Scenario-level tests. Unit tests exercise each module in isolation
//! under `src/unit_tests/`; these drive a whole `Simulation` end to end.

use wsn_sim::config::Range;
use wsn_sim::{Joules, Millis, SimConfig, Simulation};

fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

/// A fast-converging config: generous energy and lux so every cycle is a
/// DISC cycle with ample budget.
fn two_node_config(pt_loss: f64) -> SimConfig {
    let mut c = SimConfig::default();
    c.low_power_nodes = 2;
    c.high_power_nodes = 0;
    c.sim_days = 1;
    c.pt_loss = pt_loss;
    c.low_light_range_lux = Range::new(200.0, 200.0);
    c.e_max = Joules(1_000.0);
    c.e_threshold = Joules(0.0);
    c.e_idle_per_ms = 0.0;
    c.clock_drift_enabled = false;
    c.listen_time_range_ms = Range::new(200, 400);
    c.delay_range_ms = Range::new(1.0, 2.0);
    c.pt_time_ms = 5.0;
    c.ack_send_delay_range_ms = Range::new(1.0, 2.0);
    c
}

/// Two isolated nodes, no loss, no drift, one day. Both discover each
/// other; each ends with a neighbor table of size one.
#[test]
fn two_isolated_nodes_discover_each_other_with_no_loss() {
    init_logging();
    let config = two_node_config(0.0);
    let mut sim = Simulation::new(config, 42).unwrap();
    sim.run_to(Millis(6 * 60 * 60 * 1_000));

    let snap = sim.snapshot();
    for node in &snap {
        assert_eq!(node.neighbors.len(), 1, "node {:?} should know exactly one peer", node.id);
    }
}

/// Two nodes, 50% per-recipient loss, one day, no drift. Discovery is
/// geometric in cycles, so both nodes should still have found each other
/// comfortably within a full simulated day.
#[test]
fn lossy_medium_still_converges_to_discovery() {
    init_logging();
    let config = two_node_config(0.5);
    let mut sim = Simulation::new(config, 7).unwrap();
    sim.run_to(Millis(24 * 60 * 60 * 1_000));

    let snap = sim.snapshot();
    assert!(snap.iter().all(|n| n.neighbors.len() == 1));
}

/// A single node with no peers never succeeds at discovery, so its
/// latency must be reported as "not applicable" (`None`), never zero.
#[test]
fn a_lone_node_reports_latency_as_not_applicable() {
    init_logging();
    let mut config = two_node_config(0.0);
    config.low_power_nodes = 1;
    config.high_power_nodes = 0;
    let mut sim = Simulation::new(config, 1).unwrap();
    sim.run_to(Millis(24 * 60 * 60 * 1_000));

    let row = sim.checkpoint_row();
    assert_eq!(row.avg_discovery_latency_s, None);
    assert!(sim.snapshot()[0].neighbors.is_empty());
}

/// Fixing the seed and config reproduces bit-identical checkpoint rows
/// across independent runs.
#[test]
fn identical_seed_and_config_reproduce_identical_checkpoints() {
    init_logging();
    let make = || {
        let mut rows = Vec::new();
        let mut sim = Simulation::new(two_node_config(0.1), 99).unwrap();
        sim.run(|_, row| rows.push(row));
        rows
    };
    let a = make();
    let b = make();
    assert_eq!(a.len(), b.len());
    for (ra, rb) in a.iter().zip(b.iter()) {
        assert_eq!(ra.e_per_discovery_cycle, rb.e_per_discovery_cycle);
        assert_eq!(ra.discovery_success_rate, rb.discovery_success_rate);
        assert_eq!(ra.sync_success_rate, rb.sync_success_rate);
        assert_eq!(ra.avg_discovery_latency_s, rb.avg_discovery_latency_s);
    }
}

/// Invariant: `0 <= energy <= e_max` for every node, at every point we can
/// observe it.
#[test]
fn energy_never_exceeds_e_max_across_a_run() {
    init_logging();
    let config = two_node_config(0.0);
    let e_max = config.e_max;
    let mut sim = Simulation::new(config, 3).unwrap();
    sim.run_to(Millis(24 * 60 * 60 * 1_000));
    for node in sim.nodes() {
        assert!(node.energy.energy().0 <= e_max.0 + 1e-9);
        assert!(node.energy.energy().0 >= 0.0);
    }
}

/// `run` walks every configured checkpoint in order, once each.
#[test]
fn run_walks_every_configured_checkpoint() {
    init_logging();
    let mut config = two_node_config(0.0);
    config.sim_days = 3;
    let mut sim = Simulation::new(config, 5).unwrap();
    let mut seen = Vec::new();
    sim.run(|idx, _| seen.push(idx));
    assert_eq!(seen, vec![0, 1, 2]);
}

/// Three nodes over a week with a one-day sync cadence eventually run
/// SYNC cycles with a healthy ACK rate once discovery has happened,
/// given a low loss rate and no drift.
#[test]
fn three_nodes_reach_healthy_sync_success_once_discovered() {
    init_logging();
    let mut config = two_node_config(0.01);
    config.low_power_nodes = 3;
    config.sim_days = 7;
    let mut sim = Simulation::new(config, 11).unwrap();
    sim.run_to(Millis(7 * 24 * 60 * 60 * 1_000));

    let snap = sim.snapshot();
    let total_tries: u64 = snap.iter().map(|n| n.kpi.sync_tries).sum();
    let total_acks: u64 = snap.iter().map(|n| n.kpi.acks_received).sum();
    if total_tries > 0 {
        assert!(total_acks as f64 / total_tries as f64 > 0.5);
    }
}

/// Three nodes, drift enabled over 30 days. The drift estimator (always
/// active on a neighbor once it has two or more meeting points) must keep
/// the sync success rate from collapsing even as the per-day offset grows
/// by up to `CLOCK_DRIFT_PER_DAY_MS`: a node re-estimates its peer's clock
/// rate from the rolling meeting-point window every cycle rather than
/// trusting a fixed 1:1 rate, so missed rendezvous are repaired instead of
/// accumulating.
#[test]
fn drift_over_a_month_still_yields_healthy_sync_success() {
    init_logging();
    let mut config = two_node_config(0.01);
    config.low_power_nodes = 3;
    config.sim_days = 30;
    config.clock_drift_enabled = true;
    config.clock_drift_per_day_ms = 500;
    let mut sim = Simulation::new(config, 23).unwrap();

    let mut last_row = None;
    sim.run(|_, row| last_row = Some(row));

    let snap = sim.snapshot();
    let total_tries: u64 = snap.iter().map(|n| n.kpi.sync_tries).sum();
    let total_acks: u64 = snap.iter().map(|n| n.kpi.acks_received).sum();
    assert!(total_tries > 0, "expected at least one SYNC attempt over a month");
    assert!(
        total_acks as f64 / total_tries as f64 > 0.3,
        "drift estimator should keep sync success well above chance even under drift"
    );
    assert!(last_row.is_some());
}
