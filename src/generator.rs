use crate::environment::Context;
use crate::process::{Intent, Process};
use crate::random::Sampler;
use crate::TickTime;

/// The factory a generator invokes for each arrival. It typically registers
/// and activates a new component through the context.
pub type Factory = Box<dyn FnMut(&mut Context<'_>) -> Result<(), crate::SimError>>;

/// Injects arrivals into the simulation.
///
/// On activation the generator samples an inter-arrival time, holds for it,
/// invokes its factory, and repeats — optionally until a fixed number of
/// arrivals or an absolute end time. The first arrival happens one
/// inter-arrival draw after activation.
pub struct Generator {
    iat: Box<dyn Sampler>,
    factory: Factory,
    total: Option<usize>,
    until: Option<TickTime>,
    spawned: usize,
    armed: bool,
}

impl Generator {
    /// Creates a generator drawing inter-arrival times from `iat`.
    pub fn new<S, F>(iat: S, factory: F) -> Self
    where
        S: Sampler + 'static,
        F: FnMut(&mut Context<'_>) -> Result<(), crate::SimError> + 'static,
    {
        Self {
            iat: Box::new(iat),
            factory: Box::new(factory),
            total: None,
            until: None,
            spawned: 0,
            armed: false,
        }
    }

    /// Stops after `total` arrivals.
    #[must_use]
    pub fn total(mut self, total: usize) -> Self {
        self.total = Some(total);
        self
    }

    /// Stops producing arrivals past `until`.
    #[must_use]
    pub fn until(mut self, until: TickTime) -> Self {
        self.until = Some(until);
        self
    }
}

impl Process for Generator {
    fn resume(&mut self, ctx: &mut Context<'_>) -> Intent {
        if self.armed {
            self.armed = false;
            if self.until.map_or(false, |until| ctx.now() > until) {
                return Intent::Terminate;
            }
            if let Err(err) = (self.factory)(ctx) {
                log::error!("`{}` failed to produce an arrival: {}", ctx.name(), err);
                return Intent::Terminate;
            }
            self.spawned += 1;
        }
        if self.total.map_or(false, |total| self.spawned >= total) {
            return Intent::Terminate;
        }
        self.armed = true;
        Intent::hold(self.iat.sample())
    }
}
