use std::cell::Cell;
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};
use std::rc::Rc;

use crate::component::ComponentKey;
use crate::process::Process;
use crate::TickTime;

/// Shared simulation clock.
pub type Clock = Rc<Cell<TickTime>>;

/// Handle to a scheduled event, used to cancel it before it fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, derive_more::Display)]
pub struct EventKey(u64);

/// Entry stored in the future-event queue.
///
/// Entries order by time, then by priority (higher first), then by insertion
/// sequence, so that two events scheduled for the same instant at the same
/// priority fire in FIFO order.
pub struct EventEntry {
    pub(crate) time: TickTime,
    pub(crate) priority: i32,
    pub(crate) seq: u64,
    pub(crate) key: EventKey,
    pub(crate) component: ComponentKey,
    pub(crate) process: Option<Box<dyn Process>>,
}

impl EventEntry {
    /// The simulation time at which the event fires.
    #[must_use]
    pub fn time(&self) -> TickTime {
        self.time
    }

    /// The component the event dispatches.
    #[must_use]
    pub fn component(&self) -> ComponentKey {
        self.component
    }
}

impl std::fmt::Debug for EventEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventEntry")
            .field("time", &self.time)
            .field("priority", &self.priority)
            .field("seq", &self.seq)
            .field("component", &self.component)
            .finish()
    }
}

impl PartialEq for EventEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for EventEntry {}

impl PartialOrd for EventEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for EventEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        (self.time, Reverse(self.priority), self.seq).cmp(&(
            other.time,
            Reverse(other.priority),
            other.seq,
        ))
    }
}

/// The future-event queue and the simulation clock.
///
/// Insertion and removal of the minimum are `O(log n)`. Cancellation by
/// [`EventKey`] marks the entry and drops it lazily when it reaches the top
/// of the heap, which keeps arbitrary removal logarithmic amortized.
pub struct Scheduler {
    heap: BinaryHeap<Reverse<EventEntry>>,
    pending: HashMap<EventKey, (TickTime, i32)>,
    cancelled: HashSet<EventKey>,
    clock: Clock,
    next_seq: u64,
    next_key: u64,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self {
            heap: BinaryHeap::new(),
            pending: HashMap::new(),
            cancelled: HashSet::new(),
            clock: Rc::new(Cell::new(TickTime::ZERO)),
            next_seq: 0,
            next_key: 0,
        }
    }
}

impl Scheduler {
    /// Current simulation time.
    #[must_use]
    pub fn now(&self) -> TickTime {
        self.clock.get()
    }

    /// Returns a read-only handle to the clock, for monitors that timestamp
    /// their own samples.
    #[must_use]
    pub fn clock(&self) -> ClockRef {
        ClockRef {
            clock: Rc::clone(&self.clock),
        }
    }

    /// Inserts an event dispatching `component` at `at` and returns a handle
    /// that can cancel it.
    pub fn schedule(
        &mut self,
        component: ComponentKey,
        at: TickTime,
        priority: i32,
        process: Option<Box<dyn Process>>,
    ) -> EventKey {
        let key = EventKey(self.next_key);
        self.next_key += 1;
        let seq = self.next_seq;
        self.next_seq += 1;
        self.pending.insert(key, (at, priority));
        self.heap.push(Reverse(EventEntry {
            time: at,
            priority,
            seq,
            key,
            component,
            process,
        }));
        key
    }

    /// Removes the pending event behind `key`. Cancelling an event that has
    /// already fired or been cancelled is a no-op.
    pub fn cancel(&mut self, key: EventKey) {
        if self.pending.remove(&key).is_some() {
            self.cancelled.insert(key);
        }
    }

    /// The time a pending event will fire at, or `None` once it has fired or
    /// been cancelled.
    #[must_use]
    pub fn time_of(&self, key: EventKey) -> Option<TickTime> {
        self.pending.get(&key).map(|&(at, _)| at)
    }

    /// The priority a pending event was scheduled with.
    #[must_use]
    pub fn priority_of(&self, key: EventKey) -> Option<i32> {
        self.pending.get(&key).map(|&(_, priority)| priority)
    }

    /// Drops cancelled entries sitting at the top of the heap.
    fn skim(&mut self) {
        while let Some(Reverse(top)) = self.heap.peek() {
            if self.cancelled.remove(&top.key) {
                self.heap.pop();
            } else {
                break;
            }
        }
    }

    /// The lowest-ordered pending event, without removing it.
    pub fn peek(&mut self) -> Option<&EventEntry> {
        self.skim();
        self.heap.peek().map(|Reverse(entry)| entry)
    }

    /// Removes and returns the lowest-ordered event, advancing the clock to
    /// its time. The clock never moves backward.
    pub fn pop(&mut self) -> Option<EventEntry> {
        self.skim();
        self.heap.pop().map(|Reverse(entry)| {
            self.pending.remove(&entry.key);
            self.advance_to(entry.time);
            entry
        })
    }

    /// Moves the clock forward to `time`; requests to move backward are
    /// ignored.
    pub(crate) fn advance_to(&mut self, time: TickTime) {
        if time > self.clock.get() {
            self.clock.set(time);
        }
    }

    /// Number of pending events, cancelled entries excluded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    /// Answers whether any event is still pending.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Immutable view of the simulation clock.
///
/// Handed out to monitors and timelines so they can record the current time
/// without holding a reference to the scheduler itself.
#[derive(Clone)]
pub struct ClockRef {
    clock: Clock,
}

impl ClockRef {
    /// Current simulation time.
    #[must_use]
    pub fn time(&self) -> TickTime {
        self.clock.get()
    }
}

impl From<Clock> for ClockRef {
    fn from(clock: Clock) -> Self {
        Self { clock }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn comp(id: usize) -> ComponentKey {
        ComponentKey::from(id)
    }

    #[test]
    fn test_orders_by_time_priority_sequence() {
        let mut scheduler = Scheduler::default();
        scheduler.schedule(comp(0), TickTime::new(2.0), 0, None);
        scheduler.schedule(comp(1), TickTime::new(1.0), 0, None);
        scheduler.schedule(comp(2), TickTime::new(1.0), 5, None);
        scheduler.schedule(comp(3), TickTime::new(1.0), 5, None);

        // Higher priority first, then FIFO among equals.
        assert_eq!(scheduler.pop().unwrap().component, comp(2));
        assert_eq!(scheduler.pop().unwrap().component, comp(3));
        assert_eq!(scheduler.pop().unwrap().component, comp(1));
        assert_eq!(scheduler.now(), TickTime::new(1.0));
        assert_eq!(scheduler.pop().unwrap().component, comp(0));
        assert_eq!(scheduler.now(), TickTime::new(2.0));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_cancel_is_idempotent() {
        let mut scheduler = Scheduler::default();
        let key = scheduler.schedule(comp(0), TickTime::new(1.0), 0, None);
        scheduler.schedule(comp(1), TickTime::new(2.0), 0, None);
        scheduler.cancel(key);
        scheduler.cancel(key);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.pop().unwrap().component, comp(1));
        assert!(scheduler.pop().is_none());
    }

    #[test]
    fn test_peek_skips_cancelled() {
        let mut scheduler = Scheduler::default();
        let key = scheduler.schedule(comp(0), TickTime::new(1.0), 0, None);
        scheduler.schedule(comp(1), TickTime::new(2.0), 0, None);
        scheduler.cancel(key);
        assert_eq!(scheduler.peek().unwrap().component, comp(1));
        // Peeking must not advance the clock.
        assert_eq!(scheduler.now(), TickTime::ZERO);
    }

    #[test]
    fn test_clock_never_moves_backward() {
        let mut scheduler = Scheduler::default();
        scheduler.advance_to(TickTime::new(5.0));
        scheduler.advance_to(TickTime::new(3.0));
        assert_eq!(scheduler.now(), TickTime::new(5.0));
    }
}
