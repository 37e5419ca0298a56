use std::cell::RefCell;
use std::rc::Rc;

use procsim::{
    Activation, ComponentState, Context, Environment, Intent, Process, StateKey, TickTime,
    WaitSpec,
};

type Trace = Rc<RefCell<Vec<(String, f64, bool)>>>;

struct Waiter {
    stage: usize,
    label: String,
    spec: Option<WaitSpec>,
    trace: Trace,
}

impl Waiter {
    fn new(label: &str, spec: WaitSpec, trace: &Trace) -> Self {
        Self {
            stage: 0,
            label: label.to_string(),
            spec: Some(spec),
            trace: Rc::clone(trace),
        }
    }
}

impl Process for Waiter {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
        match self.stage {
            0 => {
                self.stage = 1;
                Intent::Wait(self.spec.take().expect("wait spec consumed twice"))
            }
            _ => {
                self.trace
                    .borrow_mut()
                    .push((self.label.clone(), ctx.now().ticks(), ctx.failed()));
                Intent::Terminate
            }
        }
    }
}

struct Setter<T: Clone + PartialEq + std::fmt::Debug + 'static> {
    stage: usize,
    state: StateKey<T>,
    value: Option<T>,
    delay: f64,
}

impl<T: Clone + PartialEq + std::fmt::Debug + 'static> Process for Setter<T> {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
        match self.stage {
            0 => {
                self.stage = 1;
                Intent::hold(self.delay)
            }
            _ => {
                let value = self.value.take().expect("value consumed twice");
                ctx.set_state(self.state, value);
                Intent::Terminate
            }
        }
    }
}

#[test]
fn test_wait_unblocks_when_predicate_holds() {
    let mut env = Environment::new();
    let light = env.add_state("light", "red");
    let trace: Trace = Rc::default();
    env.launch(
        "driver",
        Waiter::new("driver", WaitSpec::value(light, "green"), &trace),
        Activation::now(),
    )
    .unwrap();
    env.launch(
        "signal",
        Setter {
            stage: 0,
            state: light,
            value: Some("green"),
            delay: 3.0,
        },
        Activation::now(),
    )
    .unwrap();
    env.run_until_empty().unwrap();
    assert_eq!(*trace.borrow(), vec![("driver".to_string(), 3.0, false)]);
    assert_eq!(*env.state_value(light), "green");
}

#[test]
fn test_wait_already_satisfied_never_suspends() {
    let mut env = Environment::new();
    let light = env.add_state("light", "green");
    let trace: Trace = Rc::default();
    env.launch(
        "driver",
        Waiter::new("driver", WaitSpec::value(light, "green"), &trace),
        Activation::now(),
    )
    .unwrap();
    env.run_until_empty().unwrap();
    assert_eq!(*trace.borrow(), vec![("driver".to_string(), 0.0, false)]);
}

#[test]
fn test_wait_timeout_sets_failed() {
    let mut env = Environment::new();
    let light = env.add_state("light", "red");
    let trace: Trace = Rc::default();
    env.launch(
        "driver",
        Waiter::new(
            "driver",
            WaitSpec::value(light, "green").fail_delay(4.0),
            &trace,
        ),
        Activation::now(),
    )
    .unwrap();
    env.run_until_empty().unwrap();
    assert_eq!(*trace.borrow(), vec![("driver".to_string(), 4.0, true)]);
    assert_eq!(*env.state_value(light), "red");
}

#[test]
fn test_wait_any_unblocks_on_either_state() {
    let mut env = Environment::new();
    let east = env.add_state("east", false);
    let west = env.add_state("west", false);
    let trace: Trace = Rc::default();
    env.launch(
        "either",
        Waiter::new(
            "either",
            WaitSpec::value(east, true).and_until(west, |&open| open).any(),
            &trace,
        ),
        Activation::now(),
    )
    .unwrap();
    env.launch(
        "opener",
        Setter {
            stage: 0,
            state: west,
            value: Some(true),
            delay: 2.0,
        },
        Activation::now(),
    )
    .unwrap();
    env.run_until_empty().unwrap();
    assert_eq!(*trace.borrow(), vec![("either".to_string(), 2.0, false)]);
}

#[test]
fn test_wait_all_needs_every_state() {
    let mut env = Environment::new();
    let east = env.add_state("east", false);
    let west = env.add_state("west", false);
    let trace: Trace = Rc::default();
    env.launch(
        "both",
        Waiter::new(
            "both",
            WaitSpec::value(east, true).and_until(west, |&open| open).all(),
            &trace,
        ),
        Activation::now(),
    )
    .unwrap();
    env.launch(
        "east-opener",
        Setter {
            stage: 0,
            state: east,
            value: Some(true),
            delay: 2.0,
        },
        Activation::now(),
    )
    .unwrap();
    env.launch(
        "west-opener",
        Setter {
            stage: 0,
            state: west,
            value: Some(true),
            delay: 5.0,
        },
        Activation::now(),
    )
    .unwrap();
    env.run(3.0).unwrap();
    let both = env.find_component("both").unwrap();
    assert_eq!(env.component_state(both), ComponentState::Waiting);
    env.run_until_empty().unwrap();
    assert_eq!(*trace.borrow(), vec![("both".to_string(), 5.0, false)]);
}

#[test]
fn test_trigger_honors_bounded_waiters_and_reverts() {
    let mut env = Environment::new();
    let gate = env.add_state("gate", false);
    let trace: Trace = Rc::default();
    for label in ["w1", "w2", "w3"] {
        env.launch(
            label,
            Waiter::new(label, WaitSpec::value(gate, true), &trace),
            Activation::now(),
        )
        .unwrap();
    }
    env.run(1.0).unwrap();
    assert_eq!(env.count_in_state(ComponentState::Waiting), 3);

    env.trigger_state(gate, true, 2);
    // The value reverted within the same tick.
    assert!(!env.state_value(gate));
    env.run_until_empty().unwrap();

    let trace = trace.borrow();
    assert_eq!(trace.len(), 2);
    assert!(trace.iter().all(|(_, time, failed)| *time == 1.0 && !failed));
    let left = env.find_component("w3").unwrap();
    assert_eq!(env.component_state(left), ComponentState::Waiting);
}

#[test]
fn test_state_timeline_tracks_history() {
    let mut env = Environment::new();
    let light = env.add_state("light", "red");
    env.launch(
        "signal",
        Setter {
            stage: 0,
            state: light,
            value: Some("green"),
            delay: 6.0,
        },
        Activation::now(),
    )
    .unwrap();
    env.run(8.0).unwrap();
    let timeline = env.state_timeline(light);
    assert_eq!(*timeline.value_at(TickTime::new(3.0)).unwrap(), "red");
    assert_eq!(*timeline.value_at(TickTime::new(7.0)).unwrap(), "green");
    assert!((timeline.proportion_of(&"red").unwrap() - 0.75).abs() < 1e-9);
}
