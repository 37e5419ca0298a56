use proptest::prelude::*;

use procsim::{ComponentKey, Environment, MetricTimeline, Scheduler, TickTime};

proptest! {
    /// Pops come out in (time, -priority, insertion) order, FIFO among
    /// exact ties.
    #[test]
    fn test_event_queue_total_order(
        entries in prop::collection::vec((0u32..50, -3i32..3), 1..60)
    ) {
        let mut scheduler = Scheduler::default();
        for (index, &(time, priority)) in entries.iter().enumerate() {
            scheduler.schedule(
                ComponentKey::from(index),
                TickTime::new(f64::from(time)),
                priority,
                None,
            );
        }
        let mut popped = Vec::new();
        while let Some(entry) = scheduler.pop() {
            let index: usize = entry.component().into();
            popped.push((entry.time(), entries[index].1, index));
        }
        prop_assert_eq!(popped.len(), entries.len());
        for pair in popped.windows(2) {
            let (t1, p1, i1) = pair[0];
            let (t2, p2, i2) = pair[1];
            let ordered = t1 < t2
                || (t1 == t2 && p1 > p2)
                || (t1 == t2 && p1 == p2 && i1 < i2);
            prop_assert!(ordered, "out of order: {:?} before {:?}", pair[0], pair[1]);
        }
    }

    /// The integrated time under a signal equals its time-weighted mean
    /// times the elapsed duration, and every breakpoint reads back its own
    /// value.
    #[test]
    fn test_timeline_area_matches_mean(
        steps in prop::collection::vec((1u32..10, -50i32..50), 1..30)
    ) {
        let mut env = Environment::new();
        let mut timeline = MetricTimeline::new("signal", 0.0, env.clock());
        let mut at = 0.0;
        for &(delta, value) in &steps {
            at += f64::from(delta);
            env.run_until(TickTime::new(at)).unwrap();
            timeline.add_value(f64::from(value));
        }
        env.run_until(TickTime::new(at + 5.0)).unwrap();

        let stats = timeline.stats().unwrap();
        prop_assert!((stats.area - stats.mean * stats.duration).abs() < 1e-6);
        for (time, value) in timeline.iter().unwrap() {
            prop_assert_eq!(timeline.value_at(time).unwrap(), value);
        }
    }

    /// Adding two timelines and subtracting one recovers the other at every
    /// breakpoint of the combination.
    #[test]
    fn test_add_then_subtract_round_trips(
        a_steps in prop::collection::vec((1u32..8, -20i32..20), 1..15),
        b_steps in prop::collection::vec((1u32..8, -20i32..20), 1..15)
    ) {
        let mut env = Environment::new();
        let mut a = MetricTimeline::new("a", 1.0, env.clock());
        let mut b = MetricTimeline::new("b", 2.0, env.clock());
        let mut at = 0.0;
        for (index, &(delta, value)) in a_steps.iter().enumerate() {
            at += f64::from(delta);
            env.run_until(TickTime::new(at)).unwrap();
            a.add_value(f64::from(value));
            if let Some(&(_, value)) = b_steps.get(index) {
                b.add_value(f64::from(value));
            }
        }

        let recovered = &(&a + &b) - &b;
        for (time, value) in recovered.iter().unwrap() {
            prop_assert!((value - a.value_at(time).unwrap()).abs() < 1e-9);
        }
    }
}
