use super::{ResourceSelect, ResourceView};
use crate::resource::ResourceKey;

/// Picks the candidate with the fewest queued requesters, breaking ties in
/// declaration order.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShortestQueue;

impl ResourceSelect for ShortestQueue {
    fn select(
        &mut self,
        view: &ResourceView<'_>,
        candidates: &[ResourceKey],
        _quantity: f64,
    ) -> Option<ResourceKey> {
        candidates
            .iter()
            .copied()
            .min_by_key(|&key| view.get(key).requester_count())
    }
}
