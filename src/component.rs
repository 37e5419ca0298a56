use std::collections::HashMap;

use crate::process::{Process, RequestSpec, WaitSpec};
use crate::scheduler::EventKey;
use crate::TickTime;

/// Identifies a component inside its environment.
#[derive(
    Debug,
    PartialEq,
    PartialOrd,
    Eq,
    Ord,
    Copy,
    Clone,
    Hash,
    derive_more::From,
    derive_more::Into,
    derive_more::Display,
)]
pub struct ComponentKey(usize);

/// Lifecycle state of a component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, strum::Display)]
#[strum(serialize_all = "snake_case")]
pub enum ComponentState {
    /// Not taking part in the simulation; no process is running.
    Data,
    /// Being driven right now; at most one component is current at a time.
    Current,
    /// Has a pending event in the future-event queue.
    Scheduled,
    /// Sleeping until another component activates it.
    Passive,
    /// Queued on one or more resources, waiting to be honored.
    Requesting,
    /// Subscribed to one or more states, waiting for its predicates.
    Waiting,
    /// Re-driven at every event time until it yields something else.
    Standby,
    /// Suspended by an interrupt; resumes to its prior state.
    Interrupted,
}

/// What a suspended component is blocked on. Retained across interrupts so
/// the request or wait can be re-entered on resume.
pub(crate) enum Pending {
    Request(RequestSpec),
    Wait(WaitSpec),
    Put {
        resource: crate::resource::ResourceKey,
        quantity: f64,
    },
}

/// Snapshot of the state a component was in when it was interrupted,
/// including whatever remains of its hold or fail timeout.
pub(crate) enum Suspended {
    Scheduled { remaining: f64, priority: i32 },
    Passive,
    Standby,
    Requesting { remaining_fail: Option<f64> },
    Waiting { remaining_fail: Option<f64> },
}

pub(crate) struct ComponentRecord {
    pub(crate) name: String,
    pub(crate) state: ComponentState,
    /// `None` only while the driver holds the process box during dispatch.
    pub(crate) process: Option<Box<dyn Process>>,
    /// Pending scheduler entry: the resumption event while scheduled, or the
    /// fail-timeout event while requesting or waiting.
    pub(crate) event: Option<EventKey>,
    pub(crate) pending: Option<Pending>,
    /// When the component joined its current requester queue, for
    /// length-of-stay statistics.
    pub(crate) enqueued_at: Option<TickTime>,
    pub(crate) interrupt_depth: u32,
    pub(crate) snapshot: Option<Suspended>,
    pub(crate) failed: bool,
}

/// Arena of all components owned by an environment. Cross-references are
/// [`ComponentKey`] indexes, never direct references.
#[derive(Default)]
pub(crate) struct Components {
    records: Vec<ComponentRecord>,
    name_counters: HashMap<String, usize>,
}

impl Components {
    /// Registers a component in data state and returns its key.
    pub(crate) fn insert(&mut self, name: &str, process: Box<dyn Process>) -> ComponentKey {
        let name = self.resolve_name(name);
        let key = ComponentKey(self.records.len());
        self.records.push(ComponentRecord {
            name,
            state: ComponentState::Data,
            process: Some(process),
            event: None,
            pending: None,
            enqueued_at: None,
            interrupt_depth: 0,
            snapshot: None,
            failed: false,
        });
        key
    }

    /// Applies the naming rules: an empty name auto-generates
    /// `component.<n>`, and a trailing `-`, `.` or `_` appends a running
    /// index per base name.
    fn resolve_name(&mut self, requested: &str) -> String {
        if requested.is_empty() {
            return self.numbered("component.");
        }
        if requested.ends_with(['-', '.', '_']) {
            return self.numbered(requested);
        }
        requested.to_string()
    }

    fn numbered(&mut self, base: &str) -> String {
        let counter = self.name_counters.entry(base.to_string()).or_insert(0);
        *counter += 1;
        format!("{}{}", base, counter)
    }

    pub(crate) fn get(&self, key: ComponentKey) -> &ComponentRecord {
        &self.records[key.0]
    }

    pub(crate) fn get_mut(&mut self, key: ComponentKey) -> &mut ComponentRecord {
        &mut self.records[key.0]
    }

    /// Looks a component up by its unique name.
    pub(crate) fn by_name(&self, name: &str) -> Option<ComponentKey> {
        self.records
            .iter()
            .position(|record| record.name == name)
            .map(ComponentKey)
    }

    pub(crate) fn len(&self) -> usize {
        self.records.len()
    }

    pub(crate) fn count_in(&self, state: ComponentState) -> usize {
        self.records
            .iter()
            .filter(|record| record.state == state)
            .count()
    }
}
