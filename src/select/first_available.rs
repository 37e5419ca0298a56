use super::{ResourceSelect, ResourceView};
use crate::resource::ResourceKey;

/// Picks the first candidate, in declaration order, that could grant the
/// requested quantity right now.
#[derive(Debug, Default, Clone, Copy)]
pub struct FirstAvailable;

impl ResourceSelect for FirstAvailable {
    fn select(
        &mut self,
        view: &ResourceView<'_>,
        candidates: &[ResourceKey],
        quantity: f64,
    ) -> Option<ResourceKey> {
        candidates
            .iter()
            .copied()
            .find(|&key| view.get(key).available() >= quantity)
    }
}
