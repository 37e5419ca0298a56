use super::{ResourceSelect, ResourceView};
use crate::resource::ResourceKey;

/// Cycles through the candidates, one per call, regardless of availability.
#[derive(Debug, Default, Clone, Copy)]
pub struct RoundRobin {
    cursor: usize,
}

impl ResourceSelect for RoundRobin {
    fn select(
        &mut self,
        _view: &ResourceView<'_>,
        candidates: &[ResourceKey],
        _quantity: f64,
    ) -> Option<ResourceKey> {
        if candidates.is_empty() {
            return None;
        }
        let picked = candidates[self.cursor % candidates.len()];
        self.cursor = (self.cursor + 1) % candidates.len();
        Some(picked)
    }
}
