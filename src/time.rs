use std::fmt;
use std::ops::{Add, AddAssign, Sub};

use ordered_float::OrderedFloat;
use serde::{Deserialize, Serialize};

/// A point on the simulated timeline, measured in ticks.
///
/// Ticks are continuous; the engine never assumes integer values. The clock
/// only moves forward, and the scheduler rejects negative deltas before they
/// ever reach arithmetic, so `TickTime` itself stays a thin wrapper with
/// total ordering over its `f64` value.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TickTime(OrderedFloat<f64>);

impl TickTime {
    /// The start of the simulation.
    pub const ZERO: TickTime = TickTime(OrderedFloat(0.0));

    /// Constructs a tick time from a raw tick count.
    #[must_use]
    pub fn new(ticks: f64) -> Self {
        Self(OrderedFloat(ticks))
    }

    /// The raw tick value.
    #[must_use]
    pub fn ticks(self) -> f64 {
        self.0.into_inner()
    }
}

impl From<f64> for TickTime {
    fn from(ticks: f64) -> Self {
        Self::new(ticks)
    }
}

impl From<TickTime> for f64 {
    fn from(time: TickTime) -> Self {
        time.ticks()
    }
}

impl Add<f64> for TickTime {
    type Output = TickTime;

    fn add(self, delta: f64) -> TickTime {
        TickTime::new(self.ticks() + delta)
    }
}

impl AddAssign<f64> for TickTime {
    fn add_assign(&mut self, delta: f64) {
        *self = *self + delta;
    }
}

impl Sub<TickTime> for TickTime {
    type Output = f64;

    fn sub(self, earlier: TickTime) -> f64 {
        self.ticks() - earlier.ticks()
    }
}

impl fmt::Display for TickTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ticks())
    }
}
