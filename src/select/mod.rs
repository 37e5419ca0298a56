//! Policies that pick one of several candidate resources for a
//! quantity-bearing request.

use crate::resource::{Resource, ResourceKey, Resources};

pub mod first_available;
pub mod random_available;
pub mod round_robin;
pub mod shortest_queue;

pub use first_available::FirstAvailable;
pub use random_available::RandomAvailable;
pub use round_robin::RoundRobin;
pub use shortest_queue::ShortestQueue;

/// Read-only view of an environment's resources, handed to selection
/// policies both from outside the simulation and from inside running
/// processes.
pub struct ResourceView<'a> {
    resources: &'a Resources,
}

impl<'a> ResourceView<'a> {
    pub(crate) fn new(resources: &'a Resources) -> Self {
        Self { resources }
    }

    /// The resource behind `key`.
    #[must_use]
    pub fn get(&self, key: ResourceKey) -> &'a Resource {
        self.resources.get(key)
    }
}

/// Implementors are selection policies that pick the resource a request of
/// `quantity` units should target.
pub trait ResourceSelect {
    /// Picks one of `candidates`, or `None` when the policy finds no
    /// acceptable resource.
    fn select(
        &mut self,
        view: &ResourceView<'_>,
        candidates: &[ResourceKey],
        quantity: f64,
    ) -> Option<ResourceKey>;
}
