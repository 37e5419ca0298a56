use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;

use super::{ResourceSelect, ResourceView};
use crate::resource::ResourceKey;

/// Picks uniformly at random among the candidates that could grant the
/// requested quantity right now.
///
/// The policy owns its generator so that runs with the same seed reproduce
/// the same choices.
pub struct RandomAvailable {
    rng: ChaChaRng,
}

impl RandomAvailable {
    /// Creates a policy drawing from a deterministically seeded generator.
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self {
            rng: ChaChaRng::seed_from_u64(seed),
        }
    }
}

impl ResourceSelect for RandomAvailable {
    fn select(
        &mut self,
        view: &ResourceView<'_>,
        candidates: &[ResourceKey],
        quantity: f64,
    ) -> Option<ResourceKey> {
        let available: Vec<ResourceKey> = candidates
            .iter()
            .copied()
            .filter(|&key| view.get(key).available() >= quantity)
            .collect();
        available.choose(&mut self.rng).copied()
    }
}
