use std::collections::VecDeque;

use serde::{Deserialize, Serialize};

use crate::component::ComponentKey;
use crate::error::SimError;
use crate::monitor::NumericStatisticMonitor;
use crate::scheduler::ClockRef;
use crate::timeline::MetricTimeline;
use crate::TickTime;

/// Identifies a resource inside its environment.
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
pub struct ResourceKey(usize);

/// What happens when a `put` would raise a depletable resource's level above
/// its capacity.
#[derive(
    Debug,
    PartialEq,
    Eq,
    Clone,
    Copy,
    strum::EnumString,
    strum::Display,
    Serialize,
    Deserialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CapacityLimitMode {
    /// Truncate the put at capacity.
    Cap,
    /// Reject the put with a capacity violation.
    Fail,
    /// Suspend the putter until the level leaves enough room.
    Schedule,
}

/// An active allocation of a quantity of a resource to a component.
pub(crate) struct Claim {
    pub(crate) comp: ComponentKey,
    pub(crate) quantity: f64,
    since: TickTime,
}

/// A queued requester, ordered by priority (higher first) then FIFO.
pub(crate) struct RequesterEntry {
    pub(crate) comp: ComponentKey,
    pub(crate) priority: i32,
    seq: u64,
}

/// A putter suspended in schedule mode until the level drops.
pub(crate) struct PendingPut {
    pub(crate) comp: ComponentKey,
    pub(crate) quantity: f64,
}

/// A shared, claimable quantity: either a counting resource (capacity and
/// claims) or a depletable one (a level that requests take from and puts
/// feed).
///
/// The resource owns the monitors that observe it; honoring of queued
/// requesters is coordinated by the environment, which is the only caller of
/// the crate-private mutators here.
pub struct Resource {
    name: String,
    capacity: f64,
    /// `Some` iff the resource is depletable.
    level: Option<f64>,
    limit_mode: CapacityLimitMode,
    claims: Vec<Claim>,
    requesters: Vec<RequesterEntry>,
    pending_puts: VecDeque<PendingPut>,
    pub(crate) scanning: bool,
    pub(crate) rescan: bool,
    next_seq: u64,
    claimed_timeline: MetricTimeline,
    capacity_timeline: MetricTimeline,
    level_timeline: Option<MetricTimeline>,
    requester_size_timeline: MetricTimeline,
    claimer_size_timeline: MetricTimeline,
    requester_stay: NumericStatisticMonitor,
    claimer_stay: NumericStatisticMonitor,
    clock: ClockRef,
}

impl Resource {
    pub(crate) fn counting(name: String, capacity: f64, clock: ClockRef) -> Self {
        Self::build(name, capacity, None, CapacityLimitMode::Cap, clock)
    }

    pub(crate) fn depletable(
        name: String,
        capacity: f64,
        level: f64,
        limit_mode: CapacityLimitMode,
        clock: ClockRef,
    ) -> Self {
        Self::build(name, capacity, Some(level), limit_mode, clock)
    }

    fn build(
        name: String,
        capacity: f64,
        level: Option<f64>,
        limit_mode: CapacityLimitMode,
        clock: ClockRef,
    ) -> Self {
        Self {
            claimed_timeline: MetricTimeline::new(format!("{}.claimed", name), 0.0, clock.clone()),
            capacity_timeline: MetricTimeline::new(
                format!("{}.capacity", name),
                capacity,
                clock.clone(),
            ),
            level_timeline: level.map(|initial| {
                MetricTimeline::new(format!("{}.level", name), initial, clock.clone())
            }),
            requester_size_timeline: MetricTimeline::new(
                format!("{}.requesters", name),
                0.0,
                clock.clone(),
            ),
            claimer_size_timeline: MetricTimeline::new(
                format!("{}.claimers", name),
                0.0,
                clock.clone(),
            ),
            requester_stay: NumericStatisticMonitor::new(format!("{}.requesters.stay", name)),
            claimer_stay: NumericStatisticMonitor::new(format!("{}.claimers.stay", name)),
            name,
            capacity,
            level,
            limit_mode,
            claims: Vec::new(),
            requesters: Vec::new(),
            pending_puts: VecDeque::new(),
            scanning: false,
            rescan: false,
            next_seq: 0,
            clock,
        }
    }

    /// The resource's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Answers whether this is a depletable resource.
    #[must_use]
    pub fn is_depletable(&self) -> bool {
        self.level.is_some()
    }

    /// Current capacity.
    #[must_use]
    pub fn capacity(&self) -> f64 {
        self.capacity
    }

    /// Sum of all current claims.
    #[must_use]
    pub fn claimed(&self) -> f64 {
        self.claims.iter().map(|claim| claim.quantity).sum()
    }

    /// Capacity not currently claimed.
    #[must_use]
    pub fn available(&self) -> f64 {
        match self.level {
            Some(level) => level,
            None => self.capacity - self.claimed(),
        }
    }

    /// Current level of a depletable resource.
    pub fn level(&self) -> Result<f64, SimError> {
        self.level
            .ok_or_else(|| SimError::domain(format!("`{}` is not depletable", self.name)))
    }

    pub(crate) fn limit_mode(&self) -> CapacityLimitMode {
        self.limit_mode
    }

    /// Whether a claim of `quantity` could be granted right now.
    pub(crate) fn can_grant(&self, quantity: f64) -> bool {
        match self.level {
            Some(level) => level >= quantity,
            None => self.claimed() + quantity <= self.capacity,
        }
    }

    /// Grants `quantity` to `comp`: claims it on a counting resource, takes
    /// it from the level of a depletable one.
    pub(crate) fn grant(&mut self, comp: ComponentKey, quantity: f64) {
        let now = self.clock.time();
        match self.level.as_mut() {
            Some(level) => {
                *level -= quantity;
                let level = *level;
                self.record_level(level);
            }
            None => {
                match self.claims.iter_mut().find(|claim| claim.comp == comp) {
                    Some(claim) => claim.quantity += quantity,
                    None => self.claims.push(Claim {
                        comp,
                        quantity,
                        since: now,
                    }),
                }
                self.claimed_timeline.add_value(self.claimed());
                self.claimer_size_timeline.add_value(self.claims.len() as f64);
            }
        }
    }

    /// Reduces `comp`'s claim by `quantity` (all of it when `None`) and
    /// returns how much was actually released.
    pub(crate) fn release_claim(&mut self, comp: ComponentKey, quantity: Option<f64>) -> f64 {
        let now = self.clock.time();
        let Some(index) = self.claims.iter().position(|claim| claim.comp == comp) else {
            return 0.0;
        };
        let claim = &mut self.claims[index];
        let released = quantity.map_or(claim.quantity, |q| q.min(claim.quantity));
        claim.quantity -= released;
        if claim.quantity <= 0.0 {
            let claim = self.claims.remove(index);
            self.claimer_stay.add_value(now - claim.since);
            self.claimer_size_timeline.add_value(self.claims.len() as f64);
        }
        self.claimed_timeline.add_value(self.claimed());
        released
    }

    /// Raises the level of a depletable resource by `quantity`, truncating
    /// at capacity. Returns how much fit.
    pub(crate) fn raise_level(&mut self, quantity: f64) -> f64 {
        let capacity = self.capacity;
        let level = self
            .level
            .as_mut()
            .expect("callers verified the resource is depletable");
        let fits = quantity.min(capacity - *level);
        *level += fits;
        let level = *level;
        self.record_level(level);
        fits
    }

    /// Room left before the level hits capacity.
    pub(crate) fn headroom(&self) -> f64 {
        self.capacity - self.level.unwrap_or(self.capacity)
    }

    fn record_level(&mut self, level: f64) {
        if let Some(timeline) = self.level_timeline.as_mut() {
            timeline.add_value(level);
        }
    }

    /// Changes the capacity. The environment re-honors requesters after an
    /// increase.
    pub(crate) fn set_capacity(&mut self, capacity: f64) {
        self.capacity = capacity;
        self.capacity_timeline.add_value(capacity);
    }

    /// Queues `comp` behind every requester of higher priority and all
    /// earlier ones of the same priority.
    pub(crate) fn enqueue_requester(&mut self, comp: ComponentKey, priority: i32) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.requesters.push(RequesterEntry {
            comp,
            priority,
            seq,
        });
        self.requesters
            .sort_by(|a, b| b.priority.cmp(&a.priority).then(a.seq.cmp(&b.seq)));
        self.requester_size_timeline
            .add_value(self.requesters.len() as f64);
    }

    /// Drops `comp` from the requester queue (whether honored or reneging)
    /// and records its length of stay.
    pub(crate) fn remove_requester(&mut self, comp: ComponentKey, since: Option<TickTime>) {
        let before = self.requesters.len();
        self.requesters.retain(|entry| entry.comp != comp);
        if self.requesters.len() < before {
            if let Some(since) = since {
                self.requester_stay.add_value(self.clock.time() - since);
            }
            self.requester_size_timeline
                .add_value(self.requesters.len() as f64);
        }
    }

    /// Requesters in honoring order.
    pub(crate) fn requester_order(&self) -> Vec<ComponentKey> {
        self.requesters.iter().map(|entry| entry.comp).collect()
    }

    pub(crate) fn has_requester(&self, comp: ComponentKey) -> bool {
        self.requesters.iter().any(|entry| entry.comp == comp)
    }

    pub(crate) fn push_pending_put(&mut self, put: PendingPut) {
        self.pending_puts.push_back(put);
    }

    pub(crate) fn remove_pending_put(&mut self, comp: ComponentKey) {
        self.pending_puts.retain(|put| put.comp != comp);
    }

    pub(crate) fn pop_applicable_put(&mut self) -> Option<PendingPut> {
        let fits = self
            .pending_puts
            .front()
            .map_or(false, |put| put.quantity <= self.headroom());
        if fits {
            self.pending_puts.pop_front()
        } else {
            None
        }
    }

    /// Number of queued requesters.
    #[must_use]
    pub fn requester_count(&self) -> usize {
        self.requesters.len()
    }

    /// Number of components currently holding claims.
    #[must_use]
    pub fn claimer_count(&self) -> usize {
        self.claims.len()
    }

    /// Claim held by `comp`, if any.
    #[must_use]
    pub fn claim_of(&self, comp: ComponentKey) -> Option<f64> {
        self.claims
            .iter()
            .find(|claim| claim.comp == comp)
            .map(|claim| claim.quantity)
    }

    /// Piecewise-constant history of the total claimed quantity.
    #[must_use]
    pub fn claimed_timeline(&self) -> &MetricTimeline {
        &self.claimed_timeline
    }

    /// Piecewise-constant history of the capacity.
    #[must_use]
    pub fn capacity_timeline(&self) -> &MetricTimeline {
        &self.capacity_timeline
    }

    /// History of the level of a depletable resource.
    pub fn level_timeline(&self) -> Result<&MetricTimeline, SimError> {
        self.level_timeline
            .as_ref()
            .ok_or_else(|| SimError::domain(format!("`{}` is not depletable", self.name)))
    }

    /// Capacity minus claimed, derived by subtracting the two underlying
    /// timelines.
    #[must_use]
    pub fn availability_timeline(&self) -> MetricTimeline {
        &self.capacity_timeline - &self.claimed_timeline
    }

    /// Claimed over capacity, derived by dividing the two underlying
    /// timelines.
    #[must_use]
    pub fn occupancy_timeline(&self) -> MetricTimeline {
        &self.claimed_timeline / &self.capacity_timeline
    }

    /// History of the requester queue length.
    #[must_use]
    pub fn requester_size_timeline(&self) -> &MetricTimeline {
        &self.requester_size_timeline
    }

    /// History of the claimer count.
    #[must_use]
    pub fn claimer_size_timeline(&self) -> &MetricTimeline {
        &self.claimer_size_timeline
    }

    /// How long honored or reneging requesters spent queued.
    #[must_use]
    pub fn requester_stay(&self) -> &NumericStatisticMonitor {
        &self.requester_stay
    }

    /// How long claimers held their claims.
    #[must_use]
    pub fn claimer_stay(&self) -> &NumericStatisticMonitor {
        &self.claimer_stay
    }
}

/// Arena of all resources owned by an environment.
#[derive(Default)]
pub(crate) struct Resources {
    items: Vec<Resource>,
}

impl Resources {
    pub(crate) fn add(&mut self, resource: Resource) -> ResourceKey {
        let key = ResourceKey(self.items.len());
        self.items.push(resource);
        key
    }

    pub(crate) fn get(&self, key: ResourceKey) -> &Resource {
        &self.items[key.0]
    }

    pub(crate) fn get_mut(&mut self, key: ResourceKey) -> &mut Resource {
        &mut self.items[key.0]
    }
}
