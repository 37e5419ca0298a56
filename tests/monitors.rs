use procsim::{
    CategoryTimeline, EmpiricalDistribution, Environment, MetricTimeline, NumericStatisticMonitor,
    SimError, TickTime,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Make {
    Audi,
    Vw,
}

#[test]
fn test_metric_timeline_weighted_mean() {
    let mut env = Environment::new();
    let mut level = MetricTimeline::new("level", 0.0, env.clock());
    env.run(2.0).unwrap();
    level.add_value(2.0);
    env.run(2.0).unwrap();
    level.add_value(6.0);
    env.run(4.0).unwrap();
    // (2*0 + 2*2 + 4*6) / 8
    let stats = level.stats().unwrap();
    assert!((stats.mean - 3.5).abs() < 1e-9);
    assert!((stats.area - 28.0).abs() < 1e-9);
    assert_eq!(stats.duration, 8.0);
}

#[test]
fn test_category_timeline_proportion() {
    let mut env = Environment::new();
    let mut make = CategoryTimeline::new("make", Make::Audi, env.clock());
    env.run_until(TickTime::new(2.0)).unwrap();
    make.add_value(Make::Vw);
    env.run_until(TickTime::new(8.0)).unwrap();
    assert!((make.proportion_of(&Make::Audi).unwrap() - 0.25).abs() < 1e-9);
    assert_eq!(*make.value().unwrap(), Make::Vw);
}

#[test]
fn test_merged_timeline_breakpoints_and_values() {
    let mut env = Environment::new();
    let mut a = MetricTimeline::new("a", 0.0, env.clock());
    let mut b = MetricTimeline::new("b", 0.0, env.clock());
    env.run_until(TickTime::new(5.0)).unwrap();
    a.add_value(23.0);
    env.run_until(TickTime::new(10.0)).unwrap();
    b.add_value(3.0);
    env.run_until(TickTime::new(12.0)).unwrap();
    b.add_value(5.0);
    env.run_until(TickTime::new(14.0)).unwrap();
    a.add_value(10.0);

    let sum = &a + &b;
    let pairs: Vec<(f64, f64)> = sum
        .iter()
        .unwrap()
        .map(|(time, value)| (time.ticks(), value))
        .collect();
    assert_eq!(
        pairs,
        vec![
            (0.0, 0.0),
            (5.0, 23.0),
            (10.0, 26.0),
            (12.0, 28.0),
            (14.0, 15.0)
        ]
    );
}

#[test]
fn test_add_then_subtract_recovers_the_other() {
    let mut env = Environment::new();
    let mut a = MetricTimeline::new("a", 2.0, env.clock());
    let mut b = MetricTimeline::new("b", 7.0, env.clock());
    env.run_until(TickTime::new(3.0)).unwrap();
    a.add_value(4.5);
    env.run_until(TickTime::new(9.0)).unwrap();
    b.add_value(1.5);
    env.run_until(TickTime::new(11.0)).unwrap();

    let recovered = &(&a + &b) - &b;
    for (time, value) in recovered.iter().unwrap() {
        assert!((value - a.value_at(time).unwrap()).abs() < 1e-9);
    }
}

#[test]
fn test_merged_distribution_total_is_sum_of_areas() {
    let mut env = Environment::new();
    let mut a = MetricTimeline::new("a", 1.0, env.clock());
    let mut b = MetricTimeline::new("b", 4.0, env.clock());
    env.run_until(TickTime::new(6.0)).unwrap();
    a.add_value(2.0);
    env.run_until(TickTime::new(10.0)).unwrap();

    let merged = EmpiricalDistribution::merge([&a, &b]).unwrap();
    let expected = a.stats().unwrap().area + b.stats().unwrap().area;
    assert!((merged.total() - expected).abs() < 1e-9);
    assert!((merged.weight() - 20.0).abs() < 1e-9);
}

#[test]
fn test_integrated_area_matches_mean_times_elapsed() {
    let mut env = Environment::new();
    let mut level = MetricTimeline::new("level", 3.0, env.clock());
    env.run_until(TickTime::new(4.0)).unwrap();
    level.add_value(1.0);
    env.run_until(TickTime::new(9.0)).unwrap();
    let stats = level.stats().unwrap();
    assert!((stats.area - stats.mean * stats.duration).abs() < 1e-9);
}

#[test]
fn test_disabled_monitor_reads_fail_and_writes_drop() {
    let env = Environment::new();
    let mut level = MetricTimeline::new("level", 0.0, env.clock());
    level.disable();
    level.add_value(9.0);
    assert!(matches!(level.stats(), Err(SimError::Unavailable(_))));
    assert!(matches!(level.value(), Err(SimError::Unavailable(_))));
    level.enable();
    assert_eq!(level.value().unwrap(), 0.0);

    let mut stay = NumericStatisticMonitor::new("stay");
    stay.disable();
    stay.add_value(1.0);
    assert!(matches!(stay.count(), Err(SimError::Unavailable(_))));
}

#[test]
fn test_timeline_query_before_first_sample_fails() {
    let mut env = Environment::new();
    env.run_until(TickTime::new(5.0)).unwrap();
    let level = MetricTimeline::new("level", 1.0, env.clock());
    assert!(matches!(
        level.value_at(TickTime::new(4.0)),
        Err(SimError::Domain(_))
    ));
    assert_eq!(level.value_at(TickTime::new(5.0)).unwrap(), 1.0);
}

#[test]
fn test_resource_occupancy_and_availability_derive_from_claims() {
    use procsim::{Activation, Context, Intent, RequestSpec, ResourceKey};

    struct Worker {
        stage: usize,
        resource: ResourceKey,
    }
    impl procsim::Process for Worker {
        fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
            match self.stage {
                0 => {
                    self.stage = 1;
                    Intent::Request(RequestSpec::quantity(self.resource, 2.0))
                }
                1 => {
                    self.stage = 2;
                    Intent::hold(4.0)
                }
                _ => {
                    ctx.release(self.resource, None).unwrap();
                    Intent::Terminate
                }
            }
        }
    }

    let mut env = Environment::new();
    let resource = env.add_resource("server", 4.0);
    env.launch(
        "worker",
        Worker { stage: 0, resource },
        Activation::now(),
    )
    .unwrap();
    env.run(8.0).unwrap();

    let resource = env.resource(resource);
    let availability = resource.availability_timeline();
    assert_eq!(availability.value_at(TickTime::new(2.0)).unwrap(), 2.0);
    assert_eq!(availability.value_at(TickTime::new(6.0)).unwrap(), 4.0);
    let occupancy = resource.occupancy_timeline();
    assert_eq!(occupancy.value_at(TickTime::new(2.0)).unwrap(), 0.5);
    assert_eq!(occupancy.value_at(TickTime::new(6.0)).unwrap(), 0.0);
    // Queue monitors saw the claim come and go.
    let stay = resource.claimer_stay().stats().unwrap();
    assert_eq!(stay.count, 1);
    assert!((stay.mean - 4.0).abs() < 1e-9);
}
