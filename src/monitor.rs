use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use crate::error::SimError;

/// Unweighted summary of a [`NumericStatisticMonitor`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NumericStats {
    /// Number of recorded values.
    pub count: usize,
    /// Arithmetic mean.
    pub mean: f64,
    /// Sample variance (n − 1 in the denominator).
    pub variance: f64,
    /// Smallest recorded value.
    pub min: f64,
    /// Largest recorded value.
    pub max: f64,
}

/// Running unweighted statistics over a stream of numeric observations.
///
/// Uses Welford's recurrence so that the variance stays stable over long
/// runs. Every observation has the same weight regardless of when it was
/// recorded; for time-weighted signals use
/// [`MetricTimeline`](crate::MetricTimeline).
pub struct NumericStatisticMonitor {
    name: String,
    count: usize,
    mean: f64,
    m2: f64,
    min: f64,
    max: f64,
    enabled: bool,
}

impl NumericStatisticMonitor {
    /// Creates an empty monitor.
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            count: 0,
            mean: 0.0,
            m2: 0.0,
            min: f64::INFINITY,
            max: f64::NEG_INFINITY,
            enabled: true,
        }
    }

    /// The monitor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records one observation. Disabled monitors drop writes.
    pub fn add_value(&mut self, value: f64) {
        if !self.enabled {
            return;
        }
        self.count += 1;
        let delta = value - self.mean;
        self.mean += delta / self.count as f64;
        self.m2 += delta * (value - self.mean);
        self.min = self.min.min(value);
        self.max = self.max.max(value);
    }

    /// Stops recording.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Resumes recording.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Forgets all recorded observations.
    pub fn reset(&mut self) {
        self.count = 0;
        self.mean = 0.0;
        self.m2 = 0.0;
        self.min = f64::INFINITY;
        self.max = f64::NEG_INFINITY;
    }

    /// Number of recorded observations.
    pub fn count(&self) -> Result<usize, SimError> {
        self.guard()?;
        Ok(self.count)
    }

    /// Summary statistics over everything recorded so far.
    pub fn stats(&self) -> Result<NumericStats, SimError> {
        self.guard()?;
        if self.count == 0 {
            return Err(SimError::domain(format!(
                "monitor `{}` has no recorded values",
                self.name
            )));
        }
        let variance = if self.count > 1 {
            self.m2 / (self.count - 1) as f64
        } else {
            0.0
        };
        Ok(NumericStats {
            count: self.count,
            mean: self.mean,
            variance,
            min: self.min,
            max: self.max,
        })
    }

    fn guard(&self) -> Result<(), SimError> {
        if self.enabled {
            Ok(())
        } else {
            Err(SimError::unavailable(format!("monitor `{}` is disabled", self.name)))
        }
    }
}

impl fmt::Debug for NumericStatisticMonitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NumericStatisticMonitor")
            .field("name", &self.name)
            .field("count", &self.count)
            .field("enabled", &self.enabled)
            .finish()
    }
}

/// Unweighted frequency counts over categorical observations.
pub struct CategoryMonitor<T> {
    name: String,
    counts: HashMap<T, usize>,
    total: usize,
    enabled: bool,
}

impl<T> CategoryMonitor<T>
where
    T: Eq + Hash + Clone + fmt::Debug,
{
    /// Creates an empty monitor.
    #[must_use]
    pub fn new<S: Into<String>>(name: S) -> Self {
        Self {
            name: name.into(),
            counts: HashMap::new(),
            total: 0,
            enabled: true,
        }
    }

    /// The monitor's name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Records one observation of `category`. Disabled monitors drop writes.
    pub fn add_value(&mut self, category: T) {
        if !self.enabled {
            return;
        }
        *self.counts.entry(category).or_insert(0) += 1;
        self.total += 1;
    }

    /// Stops recording.
    pub fn disable(&mut self) {
        self.enabled = false;
    }

    /// Resumes recording.
    pub fn enable(&mut self) {
        self.enabled = true;
    }

    /// Times `category` was observed.
    pub fn count_of(&self, category: &T) -> Result<usize, SimError> {
        self.guard()?;
        Ok(self.counts.get(category).copied().unwrap_or(0))
    }

    /// Share of observations that were `category`, in `[0, 1]`.
    pub fn frequency_of(&self, category: &T) -> Result<f64, SimError> {
        self.guard()?;
        if self.total == 0 {
            return Err(SimError::domain(format!(
                "monitor `{}` has no recorded values",
                self.name
            )));
        }
        Ok(self.counts.get(category).copied().unwrap_or(0) as f64 / self.total as f64)
    }

    /// Total number of observations.
    pub fn total(&self) -> Result<usize, SimError> {
        self.guard()?;
        Ok(self.total)
    }

    fn guard(&self) -> Result<(), SimError> {
        if self.enabled {
            Ok(())
        } else {
            Err(SimError::unavailable(format!("monitor `{}` is disabled", self.name)))
        }
    }
}

impl<T: fmt::Debug> fmt::Debug for CategoryMonitor<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CategoryMonitor")
            .field("name", &self.name)
            .field("counts", &self.counts)
            .field("enabled", &self.enabled)
            .finish()
    }
}
