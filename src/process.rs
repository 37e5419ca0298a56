use crate::environment::Context;
use crate::resource::ResourceKey;
use crate::state::{StateKey, States};
use crate::TickTime;

/// One step of a component's lifecycle.
///
/// A process is driven by the scheduler loop: every time the component
/// becomes current, the driver calls [`resume`](Process::resume) and enacts
/// the returned [`Intent`]. Between intents the process runs to completion
/// atomically; a component suspends *only* at intent boundaries. Without
/// first-class coroutines, implementors keep their resumption point as an
/// explicit state machine (an enum or a stage counter); see the crate-level
/// examples.
///
/// The trait is also implemented for closures, which covers most simple
/// components:
///
/// ```ignore
/// let mut stage = 0;
/// env.add_component("car-", move |_ctx: &mut Context| match stage {
///     0 => { stage = 1; Intent::hold(5.0) }
///     _ => Intent::Terminate,
/// });
/// ```
pub trait Process {
    /// Runs the process up to its next interaction point.
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent;
}

impl<F> Process for F
where
    F: FnMut(&mut Context<'_>) -> Intent,
{
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
        self(ctx)
    }
}

/// An interaction intent yielded by a process.
pub enum Intent {
    /// Stay scheduled and resume after `duration` ticks.
    Hold {
        /// Nonnegative number of ticks to hold for.
        duration: f64,
        /// Scheduling priority of the resumption event.
        priority: i32,
    },
    /// Sleep until another component activates this one.
    Passivate,
    /// Be re-driven at every event time until some other intent is yielded.
    Standby,
    /// Claim quantities of one or more resources, queueing if they cannot
    /// be granted now.
    Request(RequestSpec),
    /// Sleep until the given state predicates hold.
    Wait(WaitSpec),
    /// Put a quantity into a depletable resource, honoring its capacity
    /// limit mode; under the schedule mode the putter suspends until the
    /// level leaves room.
    Put {
        /// The depletable resource receiving the quantity.
        resource: ResourceKey,
        /// Nonnegative quantity to add.
        quantity: f64,
    },
    /// End the process; the component returns to data state.
    Terminate,
}

impl Intent {
    /// Hold for `duration` at default priority.
    #[must_use]
    pub fn hold(duration: f64) -> Self {
        Intent::Hold {
            duration,
            priority: 0,
        }
    }

    /// Hold for `duration` with an explicit scheduling priority.
    #[must_use]
    pub fn hold_with(duration: f64, priority: i32) -> Self {
        Intent::Hold { duration, priority }
    }

    /// Request a single unit of `resource`.
    #[must_use]
    pub fn request(resource: ResourceKey) -> Self {
        Intent::Request(RequestSpec::new(resource))
    }

    /// Put `quantity` into a depletable `resource`.
    #[must_use]
    pub fn put(resource: ResourceKey, quantity: f64) -> Self {
        Intent::Put { resource, quantity }
    }
}

/// What a requester asks of one or more resources.
///
/// With several `(resource, quantity)` pairs the request is honored only when
/// all pairs are satisfiable at once; with [`one_of`](RequestSpec::one_of)
/// the first satisfiable pair in declaration order wins.
pub struct RequestSpec {
    pub(crate) claims: Vec<(ResourceKey, f64)>,
    pub(crate) one_of: bool,
    pub(crate) priority: i32,
    pub(crate) fail_at: Option<TickTime>,
    pub(crate) fail_delay: Option<f64>,
}

impl RequestSpec {
    /// Requests one unit of `resource`.
    #[must_use]
    pub fn new(resource: ResourceKey) -> Self {
        Self {
            claims: vec![(resource, 1.0)],
            one_of: false,
            priority: 0,
            fail_at: None,
            fail_delay: None,
        }
    }

    /// Requests `quantity` units of `resource`.
    #[must_use]
    pub fn quantity(resource: ResourceKey, quantity: f64) -> Self {
        Self {
            claims: vec![(resource, quantity)],
            one_of: false,
            priority: 0,
            fail_at: None,
            fail_delay: None,
        }
    }

    /// Adds another `(resource, quantity)` pair to the request.
    #[must_use]
    pub fn and(mut self, resource: ResourceKey, quantity: f64) -> Self {
        self.claims.push((resource, quantity));
        self
    }

    /// Honor the first satisfiable pair instead of all pairs at once.
    #[must_use]
    pub fn one_of(mut self) -> Self {
        self.one_of = true;
        self
    }

    /// Queueing priority of the requester; higher goes first.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Give up (with the `failed` flag set) at the absolute time `at`.
    #[must_use]
    pub fn fail_at(mut self, at: TickTime) -> Self {
        self.fail_at = Some(at);
        self
    }

    /// Give up (with the `failed` flag set) after `delay` ticks of waiting.
    #[must_use]
    pub fn fail_delay(mut self, delay: f64) -> Self {
        self.fail_delay = Some(delay);
        self
    }

    /// The instant the fail timeout fires, if any: `min(fail_at, now + fail_delay)`.
    pub(crate) fn fail_time(&self, now: TickTime) -> Option<TickTime> {
        let by_delay = self.fail_delay.map(|delay| now + delay);
        match (self.fail_at, by_delay) {
            (Some(at), Some(delayed)) => Some(at.min(delayed)),
            (Some(at), None) => Some(at),
            (None, Some(delayed)) => Some(delayed),
            (None, None) => None,
        }
    }
}

/// How the conditions of a multi-state wait aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitMode {
    /// Every condition must hold.
    All,
    /// At least one condition must hold.
    Any,
}

pub(crate) struct WaitCond {
    pub(crate) state_id: usize,
    pub(crate) eval: Box<dyn Fn(&States) -> bool>,
}

/// What a waiting component is waiting for: one predicate per state, an
/// all/any aggregation, and an optional fail timeout.
pub struct WaitSpec {
    pub(crate) conds: Vec<WaitCond>,
    pub(crate) mode: WaitMode,
    pub(crate) priority: i32,
    pub(crate) fail_at: Option<TickTime>,
    pub(crate) fail_delay: Option<f64>,
}

impl WaitSpec {
    /// Waits until `predicate` holds over the value of `state`.
    #[must_use]
    pub fn until<T, P>(state: StateKey<T>, predicate: P) -> Self
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
        P: Fn(&T) -> bool + 'static,
    {
        Self {
            conds: Vec::new(),
            mode: WaitMode::All,
            priority: 0,
            fail_at: None,
            fail_delay: None,
        }
        .and_until(state, predicate)
    }

    /// Waits until the value of `state` equals `expected`.
    #[must_use]
    pub fn value<T>(state: StateKey<T>, expected: T) -> Self
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        Self::until(state, move |value| *value == expected)
    }

    /// Adds another `(state, predicate)` condition.
    #[must_use]
    pub fn and_until<T, P>(mut self, state: StateKey<T>, predicate: P) -> Self
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
        P: Fn(&T) -> bool + 'static,
    {
        self.conds.push(WaitCond {
            state_id: state.id(),
            eval: Box::new(move |states| predicate(states.value(state))),
        });
        self
    }

    /// Requires every condition to hold (the default).
    #[must_use]
    pub fn all(mut self) -> Self {
        self.mode = WaitMode::All;
        self
    }

    /// Requires at least one condition to hold.
    #[must_use]
    pub fn any(mut self) -> Self {
        self.mode = WaitMode::Any;
        self
    }

    /// Scheduling priority used when the wait is honored.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Give up (with the `failed` flag set) at the absolute time `at`.
    #[must_use]
    pub fn fail_at(mut self, at: TickTime) -> Self {
        self.fail_at = Some(at);
        self
    }

    /// Give up (with the `failed` flag set) after `delay` ticks of waiting.
    #[must_use]
    pub fn fail_delay(mut self, delay: f64) -> Self {
        self.fail_delay = Some(delay);
        self
    }

    pub(crate) fn fail_time(&self, now: TickTime) -> Option<TickTime> {
        let by_delay = self.fail_delay.map(|delay| now + delay);
        match (self.fail_at, by_delay) {
            (Some(at), Some(delayed)) => Some(at.min(delayed)),
            (Some(at), None) => Some(at),
            (None, Some(delayed)) => Some(delayed),
            (None, None) => None,
        }
    }

    /// Evaluates the aggregated clause against the current state values.
    pub(crate) fn satisfied(&self, states: &States) -> bool {
        match self.mode {
            WaitMode::All => self.conds.iter().all(|cond| (cond.eval)(states)),
            WaitMode::Any => self.conds.iter().any(|cond| (cond.eval)(states)),
        }
    }
}

/// Wraps a process body in an outer infinite loop.
///
/// Whenever the inner process terminates, a fresh one is built from the
/// factory and resumed in its place, so the body repeats forever. A body
/// that terminates without yielding anything ends the component instead of
/// spinning.
pub struct Repeat<F, P> {
    factory: F,
    current: P,
}

impl<F, P> Repeat<F, P>
where
    F: FnMut() -> P,
    P: Process,
{
    /// Creates a repeating process from a body factory.
    pub fn new(mut factory: F) -> Self {
        let current = factory();
        Self { factory, current }
    }
}

impl<F, P> Process for Repeat<F, P>
where
    F: FnMut() -> P,
    P: Process,
{
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
        match self.current.resume(ctx) {
            Intent::Terminate => {
                self.current = (self.factory)();
                match self.current.resume(ctx) {
                    // An immediately-terminating body would loop forever.
                    Intent::Terminate => Intent::Terminate,
                    intent => intent,
                }
            }
            intent => intent,
        }
    }
}
