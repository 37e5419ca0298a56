use crate::component::{ComponentKey, ComponentState};
use crate::error::SimError;
use crate::process::Process;
use crate::resource::{Resource, ResourceKey};
use crate::select::{ResourceSelect, ResourceView};
use crate::state::StateKey;
use crate::TickTime;

use super::core::Core;
use super::events::{Activation, EventKind};

/// The face of the environment inside a running process.
///
/// Everything here is an *immediate* operation: it takes effect before the
/// call returns and never suspends the caller. Suspension happens only
/// through the [`Intent`](crate::Intent) the process yields back to the
/// driver.
pub struct Context<'a> {
    pub(crate) core: &'a mut Core,
    pub(crate) current: ComponentKey,
}

impl Context<'_> {
    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> TickTime {
        self.core.scheduler.now()
    }

    /// The running component's key.
    #[must_use]
    pub fn key(&self) -> ComponentKey {
        self.current
    }

    /// The running component's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.core.components.get(self.current).name
    }

    /// Whether the component's last request or wait failed (timed out or
    /// was forcibly abandoned).
    #[must_use]
    pub fn failed(&self) -> bool {
        self.core.components.get(self.current).failed
    }

    /// Registers a new component in data state.
    pub fn add_component<P: Process + 'static>(&mut self, name: &str, process: P) -> ComponentKey {
        let key = self.core.components.insert(name, Box::new(process));
        let name = self.core.components.get(key).name.clone();
        self.core.record(EventKind::Created, &name, String::new());
        key
    }

    /// Registers a new component and activates it.
    pub fn spawn<P: Process + 'static>(
        &mut self,
        name: &str,
        process: P,
        activation: Activation,
    ) -> Result<ComponentKey, SimError> {
        let key = self.add_component(name, process);
        self.activate(key, activation)?;
        Ok(key)
    }

    /// Schedules a component to resume. Activating the *running* component
    /// requires an explicit process (a restart).
    pub fn activate(&mut self, comp: ComponentKey, activation: Activation) -> Result<(), SimError> {
        self.core.activate(comp, activation, Some(self.current))
    }

    /// Forces a component back to data state; on the running component this
    /// ends its process after the current step.
    pub fn cancel(&mut self, comp: ComponentKey) {
        self.core.cancel(comp);
    }

    /// Interrupts another component.
    pub fn interrupt(&mut self, comp: ComponentKey) -> Result<(), SimError> {
        self.core.interrupt(comp, Some(self.current))
    }

    /// Unwinds one interrupt level of another component.
    pub fn resume(&mut self, comp: ComponentKey) -> Result<(), SimError> {
        self.core.resume_interrupted(comp)
    }

    /// The lifecycle state of any component.
    #[must_use]
    pub fn state_of(&self, comp: ComponentKey) -> ComponentState {
        self.core.components.get(comp).state
    }

    /// Releases (part of) the running component's claim on a resource.
    pub fn release(&mut self, resource: ResourceKey, quantity: Option<f64>) -> Result<f64, SimError> {
        self.core.release(self.current, resource, quantity)
    }

    /// The resource behind `key`.
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

    /// Changes a resource's capacity; an increase re-honors its queue.
    pub fn set_capacity(&mut self, resource: ResourceKey, capacity: f64) -> Result<(), SimError> {
        self.core.set_capacity(resource, capacity)
    }

    /// The current value of a state.
    #[must_use]
    pub fn state_value<T: 'static>(&self, key: StateKey<T>) -> &T {
        self.core.states.value(key)
    }

    /// Assigns a new value and unblocks satisfied waiters.
    pub fn set_state<T>(&mut self, key: StateKey<T>, value: T)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        self.core.assign_state(key, value);
    }

    /// Assigns `value`, honors up to `max` waiters, then reverts to the
    /// prior value within the same tick.
    pub fn trigger_state<T>(&mut self, key: StateKey<T>, value: T, max: usize)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        self.core.trigger_state(key, value, max);
    }

    /// Resolves a singleton bound on the environment.
    pub fn dependency<T: 'static>(&self, qualifier: Option<&str>) -> Result<&T, SimError> {
        self.core.registry.get(qualifier)
    }
}
