use std::fmt;
use std::ops::{Add, Div, Mul, Sub};

use itertools::Itertools;

use crate::error::SimError;
use crate::scheduler::ClockRef;
use crate::TickTime;

/// Time-weighted summary of a [`MetricTimeline`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimeWeightedStats {
    /// Mean of the signal, weighted by how long each value was held.
    pub mean: f64,
    /// Smallest recorded value.
    pub min: f64,
    /// Largest recorded value.
    pub max: f64,
    /// Integrated time under the signal (sum of segment areas).
    pub area: f64,
    /// Elapsed time from the first sample to now.
    pub duration: f64,
}

/// A piecewise-constant numeric signal over simulated time.
///
/// Each call to [`add_value`](MetricTimeline::add_value) appends a
/// `(now, value)` pair; the value is held until the next sample. Statistics
/// weight every value by how long it was held, extending the last segment up
/// to the current clock reading.
pub struct MetricTimeline {
    name: String,
    clock: ClockRef,
    samples: Vec<(TickTime, f64)>,
    enabled: bool,
}

impl MetricTimeline {
    /// Creates a timeline holding `initial` from the current instant on.
    #[must_use]
    pub fn new<S: Into<String>>(name: S, initial: f64, clock: ClockRef) -> Self {
        let now = clock.time();
        Self {
            name: name.into(),
            clock,
            samples: vec![(now, initial)],
            enabled: true,
        }
    }

    /// The timeline's name, used in errors and event-log records.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records `value` at the current instant. Two samples at the same
    /// instant collapse so only the latest value is exposed on read.
    /// Disabled timelines drop writes.
    pub fn add_value(&mut self, value: f64) {
        if !self.enabled {
            return;
        }
        let now = self.clock.time();
        match self.samples.last_mut() {
            Some((time, last)) if *time == now => *last = value,
            _ => self.samples.push((now, value)),
        }
    }

    /// Stops recording. Subsequent writes are dropped and reads fail.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Resumes recording.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Forgets all history and restarts from `initial` at the current
    /// instant.
    pub fn reset(&mut self, initial: f64) {
        let now = self.clock.time();
        self.samples.clear();
        self.samples.push((now, initial));
    }

    fn guard(&self) -> Result<(), SimError> {
        if self.enabled {
            Ok(())
        } else {
            Err(SimError::unavailable(format!("timeline `{}` is disabled", self.name)))
        }
    }

    /// Iterates over the recorded `(time, value)` pairs.
    pub fn iter(&self) -> Result<impl Iterator<Item = (TickTime, f64)> + '_, SimError> {
        self.guard()?;
        Ok(self.samples.iter().copied())
    }

    /// The value held at `time`. Fails for queries before the first sample;
    /// `time == now` yields the last recorded value.
    pub fn value_at(&self, time: TickTime) -> Result<f64, SimError> {
        self.guard()?;
        let first = self.samples[0].0;
        if time < first {
            return Err(SimError::early_query(time, first));
        }
        Ok(step_value(&self.samples, time))
    }

    /// The last recorded value.
    pub fn value(&self) -> Result<f64, SimError> {
        self.guard()?;
        Ok(self.samples[self.samples.len() - 1].1)
    }

    /// Time-weighted statistics from the first sample up to now.
    pub fn stats(&self) -> Result<TimeWeightedStats, SimError> {
        self.guard()?;
        let now = self.clock.time();
        let mut area = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for (i, &(time, value)) in self.samples.iter().enumerate() {
            let end = self
                .samples
                .get(i + 1)
                .map_or_else(|| now.max(time), |&(next, _)| next);
            area += value * (end - time);
            min = min.min(value);
            max = max.max(value);
        }
        let duration = now.max(self.samples[0].0) - self.samples[0].0;
        if duration <= 0.0 {
            return Err(SimError::domain(format!(
                "timeline `{}` has no elapsed time to weight by",
                self.name
            )));
        }
        Ok(TimeWeightedStats {
            mean: area / duration,
            min,
            max,
            area,
            duration,
        })
    }

    /// Segments of the signal as `(value, held-for)` pairs, the last one
    /// extended up to now. This is the raw material of merged distributions.
    fn segments(&self) -> Result<Vec<(f64, f64)>, SimError> {
        self.guard()?;
        let now = self.clock.time();
        Ok(self
            .samples
            .iter()
            .enumerate()
            .map(|(i, &(time, value))| {
                let end = self
                    .samples
                    .get(i + 1)
                    .map_or_else(|| now.max(time), |&(next, _)| next);
                (value, end - time)
            })
            .collect())
    }

    /// Applies `op` pointwise over the union of both inputs' breakpoints.
    /// The domain of the result is the intersection of the inputs' active
    /// intervals.
    fn combine(&self, other: &Self, symbol: char, op: fn(f64, f64) -> f64) -> Self {
        let start = self.samples[0].0.max(other.samples[0].0);
        let timestamps = self
            .samples
            .iter()
            .map(|&(t, _)| t)
            .merge(other.samples.iter().map(|&(t, _)| t))
            .filter(|&t| t >= start)
            .dedup();
        let mut merged = Self {
            name: format!("({} {} {})", self.name, symbol, other.name),
            clock: self.clock.clone(),
            samples: Vec::new(),
            enabled: true,
        };
        for time in timestamps {
            let value = op(step_value(&self.samples, time), step_value(&other.samples, time));
            merged.samples.push((time, value));
        }
        merged
    }
}

impl fmt::Debug for MetricTimeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricTimeline")
            .field("name", &self.name)
            .field("samples", &self.samples)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// The value a step signal holds at `time` (the latest sample at or before
/// it). Callers have checked that `time` is not earlier than the first
/// sample.
fn step_value(samples: &[(TickTime, f64)], time: TickTime) -> f64 {
    match samples.binary_search_by(|(t, _)| t.cmp(&time)) {
        Ok(index) => samples[index].1,
        Err(0) => samples[0].1,
        Err(index) => samples[index - 1].1,
    }
}

impl Add for &MetricTimeline {
    type Output = MetricTimeline;

    fn add(self, rhs: Self) -> MetricTimeline {
        self.combine(rhs, '+', |a, b| a + b)
    }
}

impl Sub for &MetricTimeline {
    type Output = MetricTimeline;

    fn sub(self, rhs: Self) -> MetricTimeline {
        self.combine(rhs, '-', |a, b| a - b)
    }
}

impl Mul for &MetricTimeline {
    type Output = MetricTimeline;

    fn mul(self, rhs: Self) -> MetricTimeline {
        self.combine(rhs, '*', |a, b| a * b)
    }
}

impl Div for &MetricTimeline {
    type Output = MetricTimeline;

    fn div(self, rhs: Self) -> MetricTimeline {
        self.combine(rhs, '/', |a, b| a / b)
    }
}

/// An empirical distribution of values weighted by how long each was held.
///
/// Produced by [`merge`](EmpiricalDistribution::merge) over a list of
/// timelines; the weights are segment durations.
#[derive(Debug, Default, Clone)]
pub struct EmpiricalDistribution {
    samples: Vec<(f64, f64)>,
}

impl EmpiricalDistribution {
    /// Merges a list of timelines into one duration-weighted distribution.
    pub fn merge<'a, I>(timelines: I) -> Result<Self, SimError>
    where
        I: IntoIterator<Item = &'a MetricTimeline>,
    {
        let mut samples = Vec::new();
        for timeline in timelines {
            samples.extend(timeline.segments()?);
        }
        Ok(Self { samples })
    }

    /// Sum of `value * weight` over all samples, i.e. the total integrated
    /// time under the merged signals.
    #[must_use]
    pub fn total(&self) -> f64 {
        self.samples.iter().map(|(value, weight)| value * weight).sum()
    }

    /// Sum of weights.
    #[must_use]
    pub fn weight(&self) -> f64 {
        self.samples.iter().map(|(_, weight)| weight).sum()
    }

    /// Duration-weighted mean value.
    pub fn mean(&self) -> Result<f64, SimError> {
        let weight = self.weight();
        if weight <= 0.0 {
            return Err(SimError::domain("empirical distribution carries no weight"));
        }
        Ok(self.total() / weight)
    }

    /// Number of weighted samples.
    #[must_use]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// Answers whether the distribution is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

/// A piecewise-constant categorical signal over simulated time.
///
/// Holds one category at a time and reports, for any category, the share of
/// elapsed time it was held.
pub struct CategoryTimeline<T> {
    name: String,
    clock: ClockRef,
    samples: Vec<(TickTime, T)>,
    enabled: bool,
}

impl<T> CategoryTimeline<T>
where
    T: Clone + PartialEq + fmt::Debug,
{
    /// Creates a timeline holding `initial` from the current instant on.
    #[must_use]
    pub fn new<S: Into<String>>(name: S, initial: T, clock: ClockRef) -> Self {
        let now = clock.time();
        Self {
            name: name.into(),
            clock,
            samples: vec![(now, initial)],
            enabled: true,
        }
    }

    /// The timeline's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    fn guard(&self) -> Result<(), SimError> {
        if self.enabled {
            Ok(())
        } else {
            Err(SimError::unavailable(format!("timeline `{}` is disabled", self.name)))
        }
    }

    /// Records `value` at the current instant, collapsing equal timestamps.
    /// Disabled timelines drop writes.
    pub fn add_value(&mut self, value: T) {
        if !self.enabled {
            return;
        }
        let now = self.clock.time();
        match self.samples.last_mut() {
            Some((time, last)) if *time == now => *last = value,
            _ => self.samples.push((now, value)),
        }
    }

    /// Stops recording.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Resumes recording.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// The currently held category.
    pub fn value(&self) -> Result<&T, SimError> {
        self.guard()?;
        Ok(&self.samples[self.samples.len() - 1].1)
    }

    /// The category held at `time`. Fails for queries before the first
    /// sample.
    pub fn value_at(&self, time: TickTime) -> Result<&T, SimError> {
        self.guard()?;
        let first = self.samples[0].0;
        if time < first {
            return Err(SimError::early_query(time, first));
        }
        let index = match self.samples.binary_search_by(|(t, _)| t.cmp(&time)) {
            Ok(index) => index,
            Err(index) => index - 1,
        };
        Ok(&self.samples[index].1)
    }

    /// Total time `category` was held, up to now.
    pub fn duration_of(&self, category: &T) -> Result<f64, SimError> {
        self.guard()?;
        let now = self.clock.time();
        Ok(self
            .samples
            .iter()
            .enumerate()
            .filter(|(_, (_, value))| value == category)
            .map(|(i, &(time, _))| {
                let end = self
                    .samples
                    .get(i + 1)
                    .map_or_else(|| now.max(time), |&(next, _)| next);
                end - time
            })
            .sum())
    }

    /// Share of elapsed time `category` was held, in `[0, 1]`.
    pub fn proportion_of(&self, category: &T) -> Result<f64, SimError> {
        let held = self.duration_of(category)?;
        let elapsed = self.clock.time().max(self.samples[0].0) - self.samples[0].0;
        if elapsed <= 0.0 {
            return Err(SimError::domain(format!(
                "timeline `{}` has no elapsed time to weight by",
                self.name
            )));
        }
        Ok(held / elapsed)
    }

    /// Iterates over the recorded `(time, category)` pairs.
    pub fn iter(&self) -> Result<impl Iterator<Item = &(TickTime, T)> + '_, SimError> {
        self.guard()?;
        Ok(self.samples.iter())
    }
}

impl<T: fmt::Debug> fmt::Debug for CategoryTimeline<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryTimeline")
            .field("name", &self.name)
            .field("samples", &self.samples)
            .field("enabled", &self.enabled)
            .finish()
    }
}
