//! The environment: owner of the clock and event queue, the component
//! arena, resources, states, the dependency registry and the event log,
//! and the scheduler loop that drives them.

use delegate::delegate;

use crate::component::{ComponentKey, ComponentState};
use crate::error::SimError;
use crate::generator::Generator;
use crate::process::Process;
use crate::resource::{CapacityLimitMode, Resource, ResourceKey};
use crate::scheduler::ClockRef;
use crate::select::{ResourceSelect, ResourceView};
use crate::state::StateKey;
use crate::timeline::CategoryTimeline;
use crate::TickTime;

mod context;
mod core;
mod events;

pub use context::Context;
pub use events::{Activation, EventKind, EventRecord};

use self::core::Core;

/// Configures an [`Environment`] before any component exists.
#[derive(Debug, Default, Clone)]
pub struct EnvironmentBuilder {
    event_log: bool,
}

impl EnvironmentBuilder {
    /// Records a structured [`EventRecord`] stream during the run.
    #[must_use]
    pub fn event_log(mut self, enabled: bool) -> Self {
        self.event_log = enabled;
        self
    }

    /// Builds the environment.
    #[must_use]
    pub fn build(self) -> Environment {
        Environment {
            core: Core::new(self.event_log),
        }
    }
}

/// Owns every piece of a simulation — the clock and event queue, the
/// component arena, resources, states, the dependency registry and the
/// event log — and runs the scheduler loop.
pub struct Environment {
    core: Core,
}

impl Default for Environment {
    fn default() -> Self {
        Self::builder().build()
    }
}

impl Environment {
    /// Starts configuring a new environment.
    #[must_use]
    pub fn builder() -> EnvironmentBuilder {
        EnvironmentBuilder::default()
    }

    /// Creates an environment with default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    delegate! {
        to self.core.scheduler {
            /// Current simulation time.
            #[must_use]
            pub fn now(&self) -> TickTime;
            /// Number of pending events.
            #[call(len)]
            #[must_use]
            pub fn queue_len(&self) -> usize;
            /// Answers whether any event is pending.
            #[call(is_empty)]
            #[must_use]
            pub fn queue_is_empty(&self) -> bool;
        }
    }

    /// A read-only clock handle for standalone monitors.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        self.core.scheduler.clock()
    }

    // ----- components -----

    /// Registers a component in data state. An empty name auto-generates
    /// one; a name with a trailing `-`, `.` or `_` gets a running index.
    pub fn add_component<P: Process + 'static>(&mut self, name: &str, process: P) -> ComponentKey {
        let key = self.core.components.insert(name, Box::new(process));
        let name = self.core.components.get(key).name.clone();
        self.core.record(EventKind::Created, &name, String::new());
        key
    }

    /// Registers a component and activates it right away.
    pub fn launch<P: Process + 'static>(
        &mut self,
        name: &str,
        process: P,
        activation: Activation,
    ) -> Result<ComponentKey, SimError> {
        let key = self.add_component(name, process);
        self.activate(key, activation)?;
        Ok(key)
    }

    /// Registers a component generator and activates it at the current
    /// instant; its first arrival happens after one inter-arrival draw.
    pub fn add_generator(
        &mut self,
        name: &str,
        generator: Generator,
    ) -> Result<ComponentKey, SimError> {
        self.launch(name, generator, Activation::now())
    }

    /// Schedules `comp` to resume according to `activation`.
    pub fn activate(&mut self, comp: ComponentKey, activation: Activation) -> Result<(), SimError> {
        self.core.activate(comp, activation, None)
    }

    /// Forces `comp` back to data state from wherever it is.
    pub fn cancel(&mut self, comp: ComponentKey) {
        self.core.cancel(comp);
    }

    /// Interrupts `comp`, stacking on top of earlier interrupts.
    pub fn interrupt(&mut self, comp: ComponentKey) -> Result<(), SimError> {
        self.core.interrupt(comp, None)
    }

    /// Unwinds one interrupt level; at depth zero the prior state is
    /// restored with remaining durations preserved.
    pub fn resume(&mut self, comp: ComponentKey) -> Result<(), SimError> {
        self.core.resume_interrupted(comp)
    }

    /// The component's lifecycle state.
    #[must_use]
    pub fn component_state(&self, comp: ComponentKey) -> ComponentState {
        self.core.components.get(comp).state
    }

    /// The component's unique name.
    #[must_use]
    pub fn component_name(&self, comp: ComponentKey) -> &str {
        &self.core.components.get(comp).name
    }

    /// Whether the component's last request or wait failed.
    #[must_use]
    pub fn component_failed(&self, comp: ComponentKey) -> bool {
        self.core.components.get(comp).failed
    }

    /// Looks a component up by name.
    #[must_use]
    pub fn find_component(&self, name: &str) -> Option<ComponentKey> {
        self.core.components.by_name(name)
    }

    /// Number of registered components.
    #[must_use]
    pub fn component_count(&self) -> usize {
        self.core.components.len()
    }

    /// Number of components currently in `state`.
    #[must_use]
    pub fn count_in_state(&self, state: ComponentState) -> usize {
        self.core.components.count_in(state)
    }

    // ----- resources -----

    /// Creates a counting resource.
    pub fn add_resource(&mut self, name: &str, capacity: f64) -> ResourceKey {
        self.core
            .resources
            .add(Resource::counting(name.to_string(), capacity, self.clock()))
    }

    /// Creates a depletable resource in cap mode.
    pub fn add_depletable(&mut self, name: &str, capacity: f64, level: f64) -> ResourceKey {
        self.add_depletable_with_mode(name, capacity, level, CapacityLimitMode::Cap)
    }

    /// Creates a depletable resource with an explicit capacity-limit mode.
    pub fn add_depletable_with_mode(
        &mut self,
        name: &str,
        capacity: f64,
        level: f64,
        mode: CapacityLimitMode,
    ) -> ResourceKey {
        self.core.resources.add(Resource::depletable(
            name.to_string(),
            capacity,
            level,
            mode,
            self.clock(),
        ))
    }

    /// The resource behind `key`, with its queues and monitors.
    #[must_use]
    pub fn resource(&self, key: ResourceKey) -> &Resource {
        self.core.resources.get(key)
    }

    /// A view of all resources for selection policies.
    #[must_use]
    pub fn resources(&self) -> ResourceView<'_> {
        ResourceView::new(&self.core.resources)
    }

    /// Picks a resource for a request of `quantity` units using `policy`.
    pub fn select_resource(
        &self,
        policy: &mut dyn ResourceSelect,
        candidates: &[ResourceKey],
        quantity: f64,
    ) -> Option<ResourceKey> {
        policy.select(&self.resources(), candidates, quantity)
    }

    /// Releases (part of) `comp`'s claim on a counting resource and
    /// re-honors the queue.
    pub fn release(
        &mut self,
        comp: ComponentKey,
        resource: ResourceKey,
        quantity: Option<f64>,
    ) -> Result<f64, SimError> {
        self.core.release(comp, resource, quantity)
    }

    /// Changes a resource's capacity; an increase re-honors its queue.
    pub fn set_capacity(&mut self, resource: ResourceKey, capacity: f64) -> Result<(), SimError> {
        self.core.set_capacity(resource, capacity)
    }

    // ----- states -----

    /// Creates a typed state holding `initial`.
    pub fn add_state<T>(&mut self, name: &str, initial: T) -> StateKey<T>
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        let clock = self.clock();
        self.core.states.add(name.to_string(), initial, clock)
    }

    /// The state's current value.
    #[must_use]
    pub fn state_value<T: 'static>(&self, key: StateKey<T>) -> &T {
        self.core.states.value(key)
    }

    /// The state's recorded history.
    #[must_use]
    pub fn state_timeline<T: 'static>(&self, key: StateKey<T>) -> &CategoryTimeline<T> {
        self.core.states.timeline(key)
    }

    /// Assigns a new value and unblocks every waiter whose clause now holds.
    pub fn set_state<T>(&mut self, key: StateKey<T>, value: T)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        self.core.assign_state(key, value);
    }

    /// Assigns `value`, honors up to `max` waiters, and reverts to the
    /// prior value within the same tick.
    pub fn trigger_state<T>(&mut self, key: StateKey<T>, value: T, max: usize)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        self.core.trigger_state(key, value, max);
    }

    // ----- dependencies and observability -----

    /// Binds a named singleton; rejected once the simulation has started.
    pub fn bind<T: 'static>(&mut self, qualifier: Option<&str>, value: T) -> Result<(), SimError> {
        self.core.registry.bind(qualifier, value)
    }

    /// Resolves a bound singleton.
    pub fn dependency<T: 'static>(&self, qualifier: Option<&str>) -> Result<&T, SimError> {
        self.core.registry.get(qualifier)
    }

    /// The structured event log recorded so far; empty unless enabled at
    /// build time.
    #[must_use]
    pub fn event_records(&self) -> &[EventRecord] {
        self.core.log.as_deref().unwrap_or(&[])
    }

    // ----- the loop -----

    /// Pops and dispatches one event. Returns `false` once the queue is
    /// empty.
    pub fn step(&mut self) -> Result<bool, SimError> {
        if !self.core.started {
            self.core.started = true;
            self.core.registry.freeze();
        }
        let Some(entry) = self.core.scheduler.pop() else {
            return Ok(false);
        };
        // Standby components poll at every event time, ahead of the
        // component whose event was popped.
        self.core.drive_standby()?;
        self.core.dispatch(entry.component, Some(entry.key), entry.process)?;
        Ok(true)
    }

    /// Runs for `duration` ticks of simulated time.
    pub fn run(&mut self, duration: f64) -> Result<(), SimError> {
        if duration < 0.0 {
            return Err(SimError::domain(format!("negative run duration {}", duration)));
        }
        let until = self.now() + duration;
        self.run_until(until)
    }

    /// Runs until the clock reaches `until`, then advances it there even if
    /// the queue drained earlier.
    pub fn run_until(&mut self, until: TickTime) -> Result<(), SimError> {
        loop {
            let next = self.core.scheduler.peek().map(|entry| entry.time());
            match next {
                Some(time) if time <= until => {
                    self.step()?;
                }
                _ => break,
            }
        }
        self.core.scheduler.advance_to(until);
        Ok(())
    }

    /// Runs until no events remain.
    pub fn run_until_empty(&mut self) -> Result<(), SimError> {
        while self.step()? {}
        Ok(())
    }

    /// Runs while `predicate` holds and events remain.
    pub fn run_while<F>(&mut self, predicate: F) -> Result<(), SimError>
    where
        F: Fn(&Environment) -> bool,
    {
        while predicate(self) && self.step()? {}
        Ok(())
    }
}
