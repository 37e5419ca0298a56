use serde::Serialize;

use crate::error::SimError;
use crate::process::Process;
use crate::TickTime;

/// Kind of a structured event-log record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, strum::Display)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// A component was registered.
    Created,
    /// A component was (re)activated.
    Activated,
    /// A component was scheduled to resume.
    Scheduled,
    /// A component was cancelled back to data state.
    Cancelled,
    /// A component passivated itself.
    Passivated,
    /// A component went into standby polling.
    Standby,
    /// A component queued on one or more resources.
    Requested,
    /// A queued request or wait was honored.
    Honored,
    /// A requester left a queue before being honored.
    Reneged,
    /// A claim was released.
    Released,
    /// A resource's capacity changed.
    CapacityChanged,
    /// A depletable resource's level changed through a put.
    LevelChanged,
    /// A component subscribed to state predicates.
    Waiting,
    /// A state took a new value.
    StateChanged,
    /// A component was interrupted.
    Interrupted,
    /// An interrupted component was resumed.
    Resumed,
    /// A component's process ended.
    Terminated,
}

/// One record of the structured event log: what happened, to whom, when.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventRecord {
    /// Simulation time of the event.
    pub time: f64,
    /// What happened.
    pub kind: EventKind,
    /// The component, resource or state the record is about.
    pub actor: String,
    /// Free-form detail, e.g. the quantity claimed or the new value.
    pub detail: String,
}

/// When and how a component should be (re)activated.
pub struct Activation {
    pub(crate) at: Option<TickTime>,
    pub(crate) delay: f64,
    pub(crate) priority: i32,
    pub(crate) process: Option<Box<dyn Process>>,
}

impl Activation {
    /// Activate at the current instant.
    #[must_use]
    pub fn now() -> Self {
        Self::delay(0.0)
    }

    /// Activate after `delay` ticks.
    #[must_use]
    pub fn delay(delay: f64) -> Self {
        Self {
            at: None,
            delay,
            priority: 0,
            process: None,
        }
    }

    /// Activate at the absolute time `at`.
    #[must_use]
    pub fn at(at: TickTime) -> Self {
        Self {
            at: Some(at),
            delay: 0.0,
            priority: 0,
            process: None,
        }
    }

    /// Scheduling priority of the activation event.
    #[must_use]
    pub fn priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Restart the component with this process instead of its current one.
    #[must_use]
    pub fn process<P: Process + 'static>(mut self, process: P) -> Self {
        self.process = Some(Box::new(process));
        self
    }

    pub(crate) fn resolve(&self, now: TickTime, component: &str) -> Result<TickTime, SimError> {
        if self.delay < 0.0 {
            return Err(SimError::transition(
                component,
                format!("negative activation delay {}", self.delay),
            ));
        }
        let at = self.at.unwrap_or(now + self.delay);
        if at < now {
            return Err(SimError::transition(
                component,
                format!("activation time {} lies in the past (now {})", at, now),
            ));
        }
        Ok(at)
    }
}
