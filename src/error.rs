use crate::TickTime;

/// Any error that can be returned from an engine operation.
///
/// Errors surface synchronously at the site of the offending operation and
/// abort the current component's step. Request timeouts and failed waits are
/// *not* errors; they set the component's `failed` flag and resume it.
#[derive(Debug, thiserror::Error)]
pub enum SimError {
    /// The requested lifecycle transition is not allowed from the component's
    /// current state, e.g. activating the current component without giving it
    /// a new process, or holding for a negative duration.
    #[error("invalid transition for `{component}`: {reason}")]
    InvalidTransition {
        /// Name of the offending component.
        component: String,
        /// Why the transition was rejected.
        reason: String,
    },

    /// A value fell outside the domain of the operation, e.g. a negative
    /// quantity, or a timeline queried before its first sample.
    #[error("domain error: {0}")]
    Domain(String),

    /// The queried object is disabled or missing, e.g. reading statistics
    /// from a disabled monitor or resolving an unbound dependency.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// A `put` would raise a depletable resource's level above its capacity
    /// while the resource runs in fail mode.
    #[error("capacity violation on `{resource}`: level {level} + put {quantity} > capacity {capacity}")]
    CapacityViolation {
        /// Name of the resource.
        resource: String,
        /// Level before the put.
        level: f64,
        /// Quantity of the rejected put.
        quantity: f64,
        /// Capacity of the resource.
        capacity: f64,
    },
}

impl SimError {
    pub(crate) fn domain<S: Into<String>>(msg: S) -> Self {
        SimError::Domain(msg.into())
    }

    pub(crate) fn unavailable<S: Into<String>>(what: S) -> Self {
        SimError::Unavailable(what.into())
    }

    pub(crate) fn transition<C: Into<String>, R: Into<String>>(component: C, reason: R) -> Self {
        SimError::InvalidTransition {
            component: component.into(),
            reason: reason.into(),
        }
    }

    pub(crate) fn early_query(at: TickTime, first: TickTime) -> Self {
        Self::domain(format!(
            "timeline queried at {} before its first sample at {}",
            at, first
        ))
    }
}
