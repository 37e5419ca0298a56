use std::mem;

use crate::component::{ComponentKey, ComponentState, Components, Pending, Suspended};
use crate::error::SimError;
use crate::process::{Intent, Process, RequestSpec, WaitSpec};
use crate::registry::Registry;
use crate::resource::{CapacityLimitMode, PendingPut, ResourceKey, Resources};
use crate::scheduler::{EventKey, Scheduler};
use crate::state::{StateKey, States};

use super::context::Context;
use super::events::{Activation, EventKind, EventRecord};

/// What the driver does after enacting an intent.
enum Flow {
    /// The component stays current; pull the next intent.
    Continue,
    /// The component suspended; return to the scheduler loop.
    Suspend,
    /// The process ended.
    Finish,
}

/// Everything the environment owns. Split from
/// [`Environment`](super::Environment) so the process-facing
/// [`Context`] can borrow it mutably while the driver holds the running
/// component's process box.
pub(crate) struct Core {
    pub(crate) scheduler: Scheduler,
    pub(crate) components: Components,
    pub(crate) resources: Resources,
    pub(crate) states: States,
    pub(crate) registry: Registry,
    pub(crate) standby: Vec<ComponentKey>,
    pub(crate) log: Option<Vec<EventRecord>>,
    pub(crate) started: bool,
}

impl Core {
    pub(crate) fn new(event_log: bool) -> Self {
        Self {
            scheduler: Scheduler::default(),
            components: Components::default(),
            resources: Resources::default(),
            states: States::default(),
            registry: Registry::default(),
            standby: Vec::new(),
            log: event_log.then(Vec::new),
            started: false,
        }
    }

    pub(crate) fn record(&mut self, kind: EventKind, actor: &str, detail: String) {
        let time = self.scheduler.now().ticks();
        if let Some(log) = self.log.as_mut() {
            log.push(EventRecord {
                time,
                kind,
                actor: actor.to_string(),
                detail,
            });
        }
    }

    fn name_of(&self, comp: ComponentKey) -> &str {
        &self.components.get(comp).name
    }

    // ----- activation, cancellation, interruption -----

    pub(crate) fn activate(
        &mut self,
        comp: ComponentKey,
        activation: Activation,
        current: Option<ComponentKey>,
    ) -> Result<(), SimError> {
        let now = self.scheduler.now();
        let at = activation.resolve(now, self.name_of(comp))?;
        if current == Some(comp) {
            // Restarting the current component needs an explicit process;
            // the new process rides on the scheduled event and replaces the
            // running one when the event fires.
            let Some(process) = activation.process else {
                return Err(SimError::transition(
                    self.name_of(comp),
                    "activating the current component requires a process",
                ));
            };
            let record = self.components.get_mut(comp);
            if let Some(event) = record.event.take() {
                self.scheduler.cancel(event);
            }
            let event = self
                .scheduler
                .schedule(comp, at, activation.priority, Some(process));
            self.components.get_mut(comp).event = Some(event);
            let name = self.components.get(comp).name.clone();
            self.record(EventKind::Activated, &name, format!("restarting at {}", at));
            return Ok(());
        }

        self.detach_everything(comp, false);
        let record = self.components.get_mut(comp);
        record.interrupt_depth = 0;
        record.snapshot = None;
        // An interrupted requester keeps its pending spec for resume; a
        // fresh activation abandons it.
        record.pending = None;
        if let Some(process) = activation.process {
            record.process = Some(process);
        }
        let event = self.scheduler.schedule(comp, at, activation.priority, None);
        let record = self.components.get_mut(comp);
        record.event = Some(event);
        record.state = ComponentState::Scheduled;
        let name = record.name.clone();
        log::debug!("[{}] `{}` activated for {}", now, name, at);
        self.record(EventKind::Activated, &name, format!("at {}", at));
        Ok(())
    }

    pub(crate) fn cancel(&mut self, comp: ComponentKey) {
        self.detach_everything(comp, false);
        let record = self.components.get_mut(comp);
        record.state = ComponentState::Data;
        record.interrupt_depth = 0;
        record.snapshot = None;
        record.pending = None;
        let name = record.name.clone();
        log::debug!("`{}` cancelled", name);
        self.record(EventKind::Cancelled, &name, String::new());
    }

    /// Pulls the component out of whatever it is attached to: its pending
    /// scheduler event, requester queues, state subscriptions, the standby
    /// list. Sets `failed` when a request or wait is abandoned. With
    /// `keep_pending` the request/wait spec survives for later re-entry
    /// (the interrupt/resume path).
    fn detach_everything(&mut self, comp: ComponentKey, keep_pending: bool) {
        self.standby.retain(|&c| c != comp);
        let record = self.components.get_mut(comp);
        if let Some(event) = record.event.take() {
            self.scheduler.cancel(event);
        }
        match record.state {
            ComponentState::Requesting => {
                record.failed = true;
                self.detach_request(comp, keep_pending);
            }
            ComponentState::Waiting => {
                record.failed = true;
                self.detach_wait(comp, keep_pending);
            }
            _ => {}
        }
    }

    /// Removes the component from every requester queue (or pending-put
    /// queue) its request involves and re-scans those resources, since a
    /// shorter queue may make the next requester honorable.
    fn detach_request(&mut self, comp: ComponentKey, keep_pending: bool) {
        let record = self.components.get_mut(comp);
        let enqueued_at = record.enqueued_at.take();
        let involved: Vec<ResourceKey> = match &record.pending {
            Some(Pending::Request(spec)) => involved_resources(spec),
            Some(Pending::Put { resource, .. }) => {
                let resource = *resource;
                if !keep_pending {
                    record.pending = None;
                }
                self.resources.get_mut(resource).remove_pending_put(comp);
                return;
            }
            _ => return,
        };
        if !keep_pending {
            record.pending = None;
        }
        let name = self.components.get(comp).name.clone();
        for &resource in &involved {
            self.resources.get_mut(resource).remove_requester(comp, enqueued_at);
        }
        self.record(EventKind::Reneged, &name, String::new());
        for resource in involved {
            self.honor_scan(resource);
        }
    }

    fn detach_wait(&mut self, comp: ComponentKey, keep_pending: bool) {
        let record = self.components.get_mut(comp);
        let ids: Vec<usize> = match &record.pending {
            Some(Pending::Wait(spec)) => spec.conds.iter().map(|cond| cond.state_id).collect(),
            _ => return,
        };
        if !keep_pending {
            record.pending = None;
        }
        record.enqueued_at = None;
        for id in ids {
            self.states.unsubscribe(id, comp);
        }
    }

    pub(crate) fn interrupt(
        &mut self,
        comp: ComponentKey,
        current: Option<ComponentKey>,
    ) -> Result<(), SimError> {
        let record = self.components.get(comp);
        if record.state == ComponentState::Data || current == Some(comp) {
            return Err(SimError::transition(
                &record.name,
                format!("cannot interrupt a {} component", record.state),
            ));
        }
        if record.state == ComponentState::Interrupted {
            self.components.get_mut(comp).interrupt_depth += 1;
            return Ok(());
        }
        let now = self.scheduler.now();
        let remaining = record
            .event
            .and_then(|event| self.scheduler.time_of(event))
            .map(|at| at - now);
        let priority = record
            .event
            .and_then(|event| self.scheduler.priority_of(event))
            .unwrap_or(0);
        let snapshot = match record.state {
            ComponentState::Scheduled => Suspended::Scheduled {
                remaining: remaining.unwrap_or(0.0),
                priority,
            },
            ComponentState::Passive => Suspended::Passive,
            ComponentState::Standby => Suspended::Standby,
            ComponentState::Requesting => Suspended::Requesting {
                remaining_fail: remaining,
            },
            ComponentState::Waiting => Suspended::Waiting {
                remaining_fail: remaining,
            },
            ComponentState::Data | ComponentState::Current | ComponentState::Interrupted => {
                unreachable!("rejected above")
            }
        };
        self.detach_everything(comp, true);
        let record = self.components.get_mut(comp);
        record.snapshot = Some(snapshot);
        record.interrupt_depth = 1;
        record.state = ComponentState::Interrupted;
        let name = record.name.clone();
        log::debug!("[{}] `{}` interrupted", now, name);
        self.record(EventKind::Interrupted, &name, String::new());
        Ok(())
    }

    pub(crate) fn resume_interrupted(&mut self, comp: ComponentKey) -> Result<(), SimError> {
        let record = self.components.get(comp);
        if record.state != ComponentState::Interrupted {
            return Err(SimError::transition(
                &record.name,
                format!("cannot resume a {} component", record.state),
            ));
        }
        let record = self.components.get_mut(comp);
        record.interrupt_depth -= 1;
        if record.interrupt_depth > 0 {
            return Ok(());
        }
        let snapshot = record
            .snapshot
            .take()
            .expect("a first-level interrupt always leaves a snapshot");
        let now = self.scheduler.now();
        let name = record.name.clone();
        self.record(EventKind::Resumed, &name, String::new());
        match snapshot {
            Suspended::Scheduled {
                remaining,
                priority,
            } => {
                let event = self.scheduler.schedule(comp, now + remaining, priority, None);
                let record = self.components.get_mut(comp);
                record.event = Some(event);
                record.state = ComponentState::Scheduled;
            }
            Suspended::Passive => {
                self.components.get_mut(comp).state = ComponentState::Passive;
            }
            Suspended::Standby => {
                self.components.get_mut(comp).state = ComponentState::Standby;
                self.standby.push(comp);
            }
            Suspended::Requesting { remaining_fail } => {
                self.reenter_request(comp, remaining_fail);
            }
            Suspended::Waiting { remaining_fail } => {
                self.reenter_wait(comp, remaining_fail);
            }
        }
        Ok(())
    }

    /// Re-queues a previously interrupted requester (or putter), with
    /// whatever was left of its fail timeout.
    fn reenter_request(&mut self, comp: ComponentKey, remaining_fail: Option<f64>) {
        enum Reentry {
            Request(Vec<ResourceKey>, i32),
            Put(ResourceKey, f64),
            None,
        }
        let now = self.scheduler.now();
        let reentry = {
            let record = self.components.get_mut(comp);
            record.state = ComponentState::Requesting;
            record.enqueued_at = Some(now);
            match &record.pending {
                Some(Pending::Request(spec)) => {
                    Reentry::Request(involved_resources(spec), spec.priority)
                }
                Some(Pending::Put { resource, quantity }) => Reentry::Put(*resource, *quantity),
                _ => Reentry::None,
            }
        };
        match reentry {
            Reentry::Request(involved, priority) => {
                for &resource in &involved {
                    self.resources.get_mut(resource).enqueue_requester(comp, priority);
                }
                if let Some(delay) = remaining_fail {
                    let event = self.scheduler.schedule(comp, now + delay, 0, None);
                    self.components.get_mut(comp).event = Some(event);
                }
                for resource in involved {
                    self.honor_scan(resource);
                }
            }
            Reentry::Put(resource, quantity) => {
                self.resources
                    .get_mut(resource)
                    .push_pending_put(PendingPut { comp, quantity });
                self.drain_puts(resource);
            }
            Reentry::None => {}
        }
    }

    fn reenter_wait(&mut self, comp: ComponentKey, remaining_fail: Option<f64>) {
        let now = self.scheduler.now();
        let (ids, priority, satisfied) = {
            let record = self.components.get(comp);
            match &record.pending {
                Some(Pending::Wait(spec)) => (
                    spec.conds.iter().map(|cond| cond.state_id).collect::<Vec<_>>(),
                    spec.priority,
                    spec.satisfied(&self.states),
                ),
                _ => return,
            }
        };
        if satisfied {
            self.honor_wait(comp, priority);
            return;
        }
        let record = self.components.get_mut(comp);
        record.state = ComponentState::Waiting;
        for id in ids {
            self.states.subscribe(id, comp);
        }
        if let Some(delay) = remaining_fail {
            let event = self.scheduler.schedule(comp, now + delay, 0, None);
            self.components.get_mut(comp).event = Some(event);
        }
    }

    // ----- resources: requests, honoring, release, put -----

    /// The quantities to grant if the component's pending request is
    /// satisfiable right now: all pairs for an all-of request, the first
    /// satisfiable pair for a one-of.
    fn plan(&self, spec: &RequestSpec) -> Option<Vec<(ResourceKey, f64)>> {
        if spec.one_of {
            spec.claims
                .iter()
                .find(|&&(resource, quantity)| self.resources.get(resource).can_grant(quantity))
                .map(|&pair| vec![pair])
        } else {
            spec.claims
                .iter()
                .all(|&(resource, quantity)| self.resources.get(resource).can_grant(quantity))
                .then(|| spec.claims.clone())
        }
    }

    fn grant_plan(&mut self, comp: ComponentKey, plan: &[(ResourceKey, f64)]) {
        for &(resource, quantity) in plan {
            self.resources.get_mut(resource).grant(comp, quantity);
            let name = self.resources.get(resource).name().to_string();
            let actor = self.components.get(comp).name.clone();
            self.record(EventKind::Honored, &actor, format!("{} x {}", name, quantity));
        }
        // A take lowered the level of every depletable involved, which may
        // let a scheduled putter proceed.
        let depletables: Vec<ResourceKey> = plan
            .iter()
            .map(|&(resource, _)| resource)
            .filter(|&resource| self.resources.get(resource).is_depletable())
            .collect();
        for resource in depletables {
            self.drain_puts(resource);
        }
    }

    fn apply_request(&mut self, comp: ComponentKey, spec: RequestSpec) -> Result<Flow, SimError> {
        let now = self.scheduler.now();
        for &(resource, quantity) in &spec.claims {
            if quantity < 0.0 {
                return Err(SimError::domain(format!(
                    "negative request quantity {}",
                    quantity
                )));
            }
            let resource = self.resources.get(resource);
            if quantity > resource.capacity() {
                return Err(SimError::domain(format!(
                    "request of {} from `{}` exceeds its capacity {} and could never be satisfied",
                    quantity,
                    resource.name(),
                    resource.capacity()
                )));
            }
        }
        self.components.get_mut(comp).failed = false;

        if let Some(plan) = self.plan(&spec) {
            self.grant_plan(comp, &plan);
            return Ok(Flow::Continue);
        }

        // Not satisfiable now. A fail time at or before now fails the
        // request outright without queueing.
        if spec.fail_time(now).map_or(false, |at| at <= now) {
            self.components.get_mut(comp).failed = true;
            return Ok(Flow::Continue);
        }

        let involved = involved_resources(&spec);
        for &resource in &involved {
            self.resources.get_mut(resource).enqueue_requester(comp, spec.priority);
        }
        let timeout = spec
            .fail_time(now)
            .map(|at| self.scheduler.schedule(comp, at, 0, None));
        let record = self.components.get_mut(comp);
        record.event = timeout;
        record.pending = Some(Pending::Request(spec));
        record.enqueued_at = Some(now);
        record.state = ComponentState::Requesting;
        let name = record.name.clone();
        log::trace!("[{}] `{}` queued on {} resource(s)", now, name, involved.len());
        self.record(EventKind::Requested, &name, String::new());
        Ok(Flow::Suspend)
    }

    fn honor_plan_of(&self, comp: ComponentKey) -> Option<Vec<(ResourceKey, f64)>> {
        match &self.components.get(comp).pending {
            Some(Pending::Request(spec)) => self.plan(spec),
            _ => None,
        }
    }

    fn honor_request(&mut self, comp: ComponentKey, plan: Vec<(ResourceKey, f64)>) {
        let now = self.scheduler.now();
        let (involved, priority) = {
            let record = self.components.get(comp);
            match &record.pending {
                Some(Pending::Request(spec)) => (involved_resources(spec), spec.priority),
                _ => return,
            }
        };
        let enqueued_at = self.components.get_mut(comp).enqueued_at.take();
        for &resource in &involved {
            self.resources.get_mut(resource).remove_requester(comp, enqueued_at);
        }
        self.grant_plan(comp, &plan);
        let record = self.components.get_mut(comp);
        if let Some(event) = record.event.take() {
            self.scheduler.cancel(event);
        }
        record.pending = None;
        record.failed = false;
        let event = self.scheduler.schedule(comp, now, priority, None);
        let record = self.components.get_mut(comp);
        record.event = Some(event);
        record.state = ComponentState::Scheduled;
        log::debug!("[{}] `{}` honored", now, self.components.get(comp).name);
    }

    /// Re-scans a resource's requester queue after something freed up.
    ///
    /// Counting resources honor strictly in priority-then-FIFO order: the
    /// first unsatisfiable requester blocks the scan. On depletable
    /// resources an unsatisfiable requester blocks only itself. A scan
    /// already in progress is never re-entered; the trigger is remembered
    /// and the queue re-scanned once the running scan finishes.
    fn honor_scan(&mut self, key: ResourceKey) {
        {
            let resource = self.resources.get_mut(key);
            if resource.scanning {
                resource.rescan = true;
                return;
            }
            resource.scanning = true;
        }
        loop {
            let depletable = self.resources.get(key).is_depletable();
            for comp in self.resources.get(key).requester_order() {
                if !self.resources.get(key).has_requester(comp) {
                    continue;
                }
                if let Some(plan) = self.honor_plan_of(comp) {
                    self.honor_request(comp, plan);
                } else if !depletable {
                    break;
                }
            }
            let resource = self.resources.get_mut(key);
            if resource.rescan {
                resource.rescan = false;
            } else {
                resource.scanning = false;
                break;
            }
        }
    }

    pub(crate) fn release(
        &mut self,
        comp: ComponentKey,
        key: ResourceKey,
        quantity: Option<f64>,
    ) -> Result<f64, SimError> {
        let resource = self.resources.get(key);
        if resource.is_depletable() {
            return Err(SimError::domain(format!(
                "`{}` is depletable; levels are raised with put, not release",
                resource.name()
            )));
        }
        if let Some(quantity) = quantity {
            if quantity < 0.0 {
                return Err(SimError::domain(format!(
                    "negative release quantity {}",
                    quantity
                )));
            }
        }
        let released = self.resources.get_mut(key).release_claim(comp, quantity);
        let actor = self.components.get(comp).name.clone();
        let name = self.resources.get(key).name().to_string();
        self.record(EventKind::Released, &actor, format!("{} x {}", name, released));
        self.honor_scan(key);
        Ok(released)
    }

    fn apply_put(
        &mut self,
        comp: ComponentKey,
        key: ResourceKey,
        quantity: f64,
    ) -> Result<Flow, SimError> {
        if quantity < 0.0 {
            return Err(SimError::domain(format!(
                "negative put quantity {}",
                quantity
            )));
        }
        let resource = self.resources.get(key);
        let name = resource.name().to_string();
        if !resource.is_depletable() {
            return Err(SimError::domain(format!("`{}` is not depletable", name)));
        }
        let headroom = resource.headroom();
        match resource.limit_mode() {
            CapacityLimitMode::Fail if quantity > headroom => {
                return Err(SimError::CapacityViolation {
                    resource: name,
                    level: resource.level().expect("depletable checked above"),
                    quantity,
                    capacity: resource.capacity(),
                });
            }
            CapacityLimitMode::Schedule if quantity > headroom => {
                self.resources
                    .get_mut(key)
                    .push_pending_put(PendingPut { comp, quantity });
                let record = self.components.get_mut(comp);
                record.pending = Some(Pending::Put {
                    resource: key,
                    quantity,
                });
                record.state = ComponentState::Requesting;
                record.enqueued_at = Some(self.scheduler.now());
                let actor = record.name.clone();
                self.record(EventKind::Requested, &actor, format!("put {} into {}", quantity, name));
                return Ok(Flow::Suspend);
            }
            _ => {}
        }
        let fit = self.resources.get_mut(key).raise_level(quantity);
        let actor = self.components.get(comp).name.clone();
        self.record(EventKind::LevelChanged, &actor, format!("{} + {}", name, fit));
        self.honor_scan(key);
        Ok(Flow::Continue)
    }

    /// Applies every scheduled put that now fits, head-first, then lets the
    /// raised level honor requesters.
    fn drain_puts(&mut self, key: ResourceKey) {
        let now = self.scheduler.now();
        let mut applied = false;
        while let Some(put) = self.resources.get_mut(key).pop_applicable_put() {
            self.resources.get_mut(key).raise_level(put.quantity);
            let record = self.components.get_mut(put.comp);
            record.pending = None;
            record.enqueued_at = None;
            let event = self.scheduler.schedule(put.comp, now, 0, None);
            let record = self.components.get_mut(put.comp);
            record.event = Some(event);
            record.state = ComponentState::Scheduled;
            let actor = record.name.clone();
            let name = self.resources.get(key).name().to_string();
            self.record(EventKind::LevelChanged, &actor, format!("{} + {}", name, put.quantity));
            applied = true;
        }
        if applied {
            self.honor_scan(key);
        }
    }

    pub(crate) fn set_capacity(&mut self, key: ResourceKey, capacity: f64) -> Result<(), SimError> {
        if capacity < 0.0 {
            return Err(SimError::domain(format!("negative capacity {}", capacity)));
        }
        let grew = capacity > self.resources.get(key).capacity();
        self.resources.get_mut(key).set_capacity(capacity);
        let name = self.resources.get(key).name().to_string();
        self.record(EventKind::CapacityChanged, &name, format!("{}", capacity));
        if grew {
            self.honor_scan(key);
        }
        Ok(())
    }

    // ----- states and waits -----

    fn apply_wait(&mut self, comp: ComponentKey, spec: WaitSpec) -> Result<Flow, SimError> {
        let now = self.scheduler.now();
        self.components.get_mut(comp).failed = false;
        if spec.satisfied(&self.states) {
            return Ok(Flow::Continue);
        }
        if spec.fail_time(now).map_or(false, |at| at <= now) {
            self.components.get_mut(comp).failed = true;
            return Ok(Flow::Continue);
        }
        for cond in &spec.conds {
            self.states.subscribe(cond.state_id, comp);
        }
        let timeout = spec
            .fail_time(now)
            .map(|at| self.scheduler.schedule(comp, at, 0, None));
        let record = self.components.get_mut(comp);
        record.event = timeout;
        record.pending = Some(Pending::Wait(spec));
        record.state = ComponentState::Waiting;
        let name = record.name.clone();
        self.record(EventKind::Waiting, &name, String::new());
        Ok(Flow::Suspend)
    }

    fn honor_wait(&mut self, comp: ComponentKey, priority: i32) {
        let now = self.scheduler.now();
        self.detach_wait(comp, false);
        let record = self.components.get_mut(comp);
        if let Some(event) = record.event.take() {
            self.scheduler.cancel(event);
        }
        record.failed = false;
        let event = self.scheduler.schedule(comp, now, priority, None);
        let record = self.components.get_mut(comp);
        record.event = Some(event);
        record.state = ComponentState::Scheduled;
        let name = record.name.clone();
        self.record(EventKind::Honored, &name, String::new());
    }

    /// Unblocks up to `max` waiters of the state whose predicates (and
    /// all/any clauses) now hold, in subscription order.
    fn honor_state_waiters(&mut self, id: usize, max: usize) -> usize {
        let waiters: Vec<ComponentKey> = self.states.waiters(id).collect();
        let mut honored = 0;
        for comp in waiters {
            if honored >= max {
                break;
            }
            let priority = {
                let record = self.components.get(comp);
                match &record.pending {
                    Some(Pending::Wait(spec)) if spec.satisfied(&self.states) => {
                        Some(spec.priority)
                    }
                    _ => None,
                }
            };
            if let Some(priority) = priority {
                self.honor_wait(comp, priority);
                honored += 1;
            }
        }
        honored
    }

    pub(crate) fn assign_state<T>(&mut self, key: StateKey<T>, value: T)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        let detail = format!("{:?}", value);
        self.states.assign(key, value);
        let name = self.states.name(key.id()).to_string();
        self.record(EventKind::StateChanged, &name, detail);
        self.honor_state_waiters(key.id(), usize::MAX);
    }

    /// Sets the value, honors up to `max` waiters, then reverts to the prior
    /// value within the same tick. The timeline coalesces the two samples,
    /// so the final value replaces the triggered one on read.
    pub(crate) fn trigger_state<T>(&mut self, key: StateKey<T>, value: T, max: usize)
    where
        T: Clone + PartialEq + std::fmt::Debug + 'static,
    {
        let prior = self.states.value(key).clone();
        let detail = format!("{:?} (trigger)", value);
        self.states.assign(key, value);
        let name = self.states.name(key.id()).to_string();
        self.record(EventKind::StateChanged, &name, detail);
        self.honor_state_waiters(key.id(), max);
        self.states.assign(key, prior);
    }

    // ----- the driver -----

    fn apply(&mut self, comp: ComponentKey, intent: Intent) -> Result<Flow, SimError> {
        let now = self.scheduler.now();
        match intent {
            Intent::Hold { duration, priority } => {
                if duration < 0.0 {
                    return Err(SimError::transition(
                        self.name_of(comp),
                        format!("negative hold duration {}", duration),
                    ));
                }
                let record = self.components.get_mut(comp);
                if let Some(event) = record.event.take() {
                    self.scheduler.cancel(event);
                }
                let event = self.scheduler.schedule(comp, now + duration, priority, None);
                let record = self.components.get_mut(comp);
                record.event = Some(event);
                record.state = ComponentState::Scheduled;
                let name = record.name.clone();
                log::trace!("[{}] `{}` holds for {}", now, name, duration);
                self.record(EventKind::Scheduled, &name, format!("hold until {}", now + duration));
                Ok(Flow::Suspend)
            }
            Intent::Passivate => {
                let record = self.components.get_mut(comp);
                if let Some(event) = record.event.take() {
                    self.scheduler.cancel(event);
                }
                record.state = ComponentState::Passive;
                let name = record.name.clone();
                self.record(EventKind::Passivated, &name, String::new());
                Ok(Flow::Suspend)
            }
            Intent::Standby => {
                let record = self.components.get_mut(comp);
                if let Some(event) = record.event.take() {
                    self.scheduler.cancel(event);
                }
                record.state = ComponentState::Standby;
                self.standby.push(comp);
                let name = self.components.get(comp).name.clone();
                self.record(EventKind::Standby, &name, String::new());
                Ok(Flow::Suspend)
            }
            Intent::Request(spec) => self.apply_request(comp, spec),
            Intent::Wait(spec) => self.apply_wait(comp, spec),
            Intent::Put { resource, quantity } => self.apply_put(comp, resource, quantity),
            Intent::Terminate => Ok(Flow::Finish),
        }
    }

    /// Drives one component: resolves reneging if its timeout fired, makes
    /// it current, and pulls intents until it suspends or finishes.
    pub(crate) fn dispatch(
        &mut self,
        comp: ComponentKey,
        via: Option<EventKey>,
        carried: Option<Box<dyn Process>>,
    ) -> Result<(), SimError> {
        {
            let record = self.components.get(comp);
            if let Some(key) = via {
                // A standby component may have cancelled or rescheduled the
                // popped target earlier in this tick; its event handle then
                // no longer matches.
                if record.event != Some(key) {
                    return Ok(());
                }
            }
        }
        self.components.get_mut(comp).event = None;

        // An event firing on a requesting or waiting component is its fail
        // timeout: it resumes with `failed` set.
        match self.components.get(comp).state {
            ComponentState::Requesting => {
                self.components.get_mut(comp).failed = true;
                self.detach_request(comp, false);
            }
            ComponentState::Waiting => {
                self.components.get_mut(comp).failed = true;
                self.detach_wait(comp, false);
            }
            _ => {}
        }

        if let Some(process) = carried {
            self.components.get_mut(comp).process = Some(process);
        }
        self.components.get_mut(comp).state = ComponentState::Current;
        let mut process = self
            .components
            .get_mut(comp)
            .process
            .take()
            .expect("a non-data component always carries a process");

        let result = self.drive(comp, process.as_mut());
        self.components.get_mut(comp).process = Some(process);
        result
    }

    fn drive(&mut self, comp: ComponentKey, process: &mut dyn Process) -> Result<(), SimError> {
        loop {
            let intent = {
                let mut ctx = Context {
                    core: &mut *self,
                    current: comp,
                };
                process.resume(&mut ctx)
            };
            if self.components.get(comp).state == ComponentState::Data {
                // The process cancelled itself; the yielded intent is moot.
                return Ok(());
            }
            match self.apply(comp, intent)? {
                Flow::Continue => {}
                Flow::Suspend => return Ok(()),
                Flow::Finish => {
                    let record = self.components.get_mut(comp);
                    // A restart staged by a self-activation keeps the
                    // component scheduled; otherwise it returns to data.
                    record.state = if record.event.is_some() {
                        ComponentState::Scheduled
                    } else {
                        ComponentState::Data
                    };
                    let name = record.name.clone();
                    self.record(EventKind::Terminated, &name, String::new());
                    return Ok(());
                }
            }
        }
    }

    pub(crate) fn drive_standby(&mut self) -> Result<(), SimError> {
        if self.standby.is_empty() {
            return Ok(());
        }
        let parked = mem::take(&mut self.standby);
        for comp in parked {
            if self.components.get(comp).state == ComponentState::Standby {
                self.dispatch(comp, None, None)?;
            }
        }
        Ok(())
    }
}

/// The unique resources a request touches, in declaration order.
fn involved_resources(spec: &RequestSpec) -> Vec<ResourceKey> {
    let mut seen = Vec::new();
    for &(resource, _) in &spec.claims {
        if !seen.contains(&resource) {
            seen.push(resource);
        }
    }
    seen
}
