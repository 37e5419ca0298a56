use std::any::Any;
use std::fmt;
use std::marker::PhantomData;

use crate::component::ComponentKey;
use crate::scheduler::ClockRef;
use crate::timeline::CategoryTimeline;

/// A type-safe handle to a simulation state.
///
/// Keys are issued by [`Environment::add_state`](crate::Environment::add_state)
/// and are generic over the state's value type, so a key for a `State<bool>`
/// cannot read a `State<u32>`. `T` is only a marker; no values of `T` are
/// stored in the key.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct StateKey<T> {
    id: usize,
    _marker: PhantomData<T>,
}

impl<T> Clone for StateKey<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for StateKey<T> {}

impl<T> StateKey<T> {
    pub(crate) fn new(id: usize) -> Self {
        Self {
            id,
            _marker: PhantomData,
        }
    }

    pub(crate) fn id(self) -> usize {
        self.id
    }
}

struct StateCell<T> {
    value: T,
    timeline: CategoryTimeline<T>,
}

/// A component waiting on a state, in subscription order.
pub(crate) struct Waiter {
    pub(crate) comp: ComponentKey,
    pub(crate) seq: u64,
}

struct Slot {
    name: String,
    cell: Box<dyn Any>,
    waiters: Vec<Waiter>,
}

/// Arena of all states owned by an environment.
///
/// Values are stored type-erased and recovered through the typed
/// [`StateKey`]; the environment wires waiter bookkeeping around
/// assignments.
#[derive(Default)]
pub struct States {
    slots: Vec<Slot>,
    next_seq: u64,
}

impl States {
    pub(crate) fn add<T>(&mut self, name: String, initial: T, clock: ClockRef) -> StateKey<T>
    where
        T: Clone + PartialEq + fmt::Debug + 'static,
    {
        let id = self.slots.len();
        let timeline = CategoryTimeline::new(name.clone(), initial.clone(), clock);
        self.slots.push(Slot {
            name,
            cell: Box::new(StateCell {
                value: initial,
                timeline,
            }),
            waiters: Vec::new(),
        });
        StateKey::new(id)
    }

    fn cell<T: 'static>(&self, key: StateKey<T>) -> &StateCell<T> {
        self.slots[key.id]
            .cell
            .downcast_ref::<StateCell<T>>()
            .expect("state key was issued for this slot, so the type matches")
    }

    fn cell_mut<T: 'static>(&mut self, key: StateKey<T>) -> &mut StateCell<T> {
        self.slots[key.id]
            .cell
            .downcast_mut::<StateCell<T>>()
            .expect("state key was issued for this slot, so the type matches")
    }

    /// The current value of the state behind `key`.
    pub fn value<T: 'static>(&self, key: StateKey<T>) -> &T {
        &self.cell(key).value
    }

    /// The state's recorded history of values.
    pub fn timeline<T: 'static>(&self, key: StateKey<T>) -> &CategoryTimeline<T> {
        &self.cell(key).timeline
    }

    /// Writes a new value and records it; waiter re-evaluation is the
    /// caller's job.
    pub(crate) fn assign<T>(&mut self, key: StateKey<T>, value: T)
    where
        T: Clone + PartialEq + fmt::Debug + 'static,
    {
        let cell = self.cell_mut(key);
        cell.value = value.clone();
        cell.timeline.add_value(value);
    }

    pub(crate) fn name(&self, id: usize) -> &str {
        &self.slots[id].name
    }

    /// Components subscribed to the state, in subscription order.
    pub(crate) fn waiters(&self, id: usize) -> impl Iterator<Item = ComponentKey> + '_ {
        self.slots[id].waiters.iter().map(|waiter| waiter.comp)
    }

    pub(crate) fn subscribe(&mut self, id: usize, comp: ComponentKey) {
        let seq = self.next_seq;
        self.next_seq += 1;
        self.slots[id].waiters.push(Waiter { comp, seq });
        self.slots[id].waiters.sort_by_key(|waiter| waiter.seq);
    }

    pub(crate) fn unsubscribe(&mut self, id: usize, comp: ComponentKey) {
        self.slots[id].waiters.retain(|waiter| waiter.comp != comp);
    }
}
