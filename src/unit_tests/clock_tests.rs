use super::*;
use crate::config::Range;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256StarStar;

#[test]
fn local_time_applies_initial_offset() {
    let mut config = SimConfig::default();
    config.node_start_offset_range_ms = Range::new(500, 500);
    let mut rng = Xoshiro256StarStar::seed_from_u64(1);
    let clock = ClockDrift::new(&config, &mut rng);
    assert_eq!(clock.offset(), 500);
    assert_eq!(clock.local_time(Millis(1_000)), Millis(1_500));
}

#[test]
fn disabled_drift_never_advances() {
    let mut config = SimConfig::default();
    config.clock_drift_enabled = false;
    config.node_start_offset_range_ms = Range::new(0, 0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(2);
    let mut clock = ClockDrift::new(&config, &mut rng);
    for _ in 0..20 {
        clock.advance_one_checkpoint(&mut rng);
    }
    assert_eq!(clock.offset(), 0);
}

#[test]
fn enabled_drift_is_monotonically_nondecreasing() {
    let mut config = SimConfig::default();
    config.clock_drift_enabled = true;
    config.clock_drift_per_day_ms = 800;
    config.node_start_offset_range_ms = Range::new(0, 0);
    let mut rng = Xoshiro256StarStar::seed_from_u64(3);
    let mut clock = ClockDrift::new(&config, &mut rng);
    let mut last = clock.offset();
    for _ in 0..20 {
        clock.advance_one_checkpoint(&mut rng);
        assert!(clock.offset() >= last);
        last = clock.offset();
    }
}
