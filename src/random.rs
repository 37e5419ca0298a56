//! Adapters between the engine's opaque samplers and the `rand` ecosystem.
//!
//! The core only ever consumes `sample()`; seeding and distribution choice
//! stay with the caller, which keeps runs reproducible from the seed alone.

use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaChaRng;
use rand_distr::Distribution;

/// An opaque source of nonnegative durations or quantities.
pub trait Sampler {
    /// Draws the next value.
    fn sample(&mut self) -> f64;
}

/// A constant sampler, handy for deterministic models and tests.
impl Sampler for f64 {
    fn sample(&mut self) -> f64 {
        *self
    }
}

/// Pairs a `rand_distr` distribution with its generator.
///
/// Draws below zero are clamped to zero, since the engine rejects negative
/// durations.
pub struct DistSampler<D, R> {
    dist: D,
    rng: R,
}

impl<D, R> DistSampler<D, R>
where
    D: Distribution<f64>,
    R: Rng,
{
    /// Wraps `dist` drawing from `rng`.
    pub fn new(dist: D, rng: R) -> Self {
        Self { dist, rng }
    }
}

impl<D> DistSampler<D, ChaChaRng>
where
    D: Distribution<f64>,
{
    /// Wraps `dist` drawing from a deterministically seeded generator.
    pub fn seeded(dist: D, seed: u64) -> Self {
        Self {
            dist,
            rng: ChaChaRng::seed_from_u64(seed),
        }
    }
}

impl<D, R> Sampler for DistSampler<D, R>
where
    D: Distribution<f64>,
    R: Rng,
{
    fn sample(&mut self) -> f64 {
        self.dist.sample(&mut self.rng).max(0.0)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use rand_distr::Uniform;

    #[test]
    fn test_constant_sampler() {
        let mut sampler = 2.5;
        assert_eq!(Sampler::sample(&mut sampler), 2.5);
        assert_eq!(Sampler::sample(&mut sampler), 2.5);
    }

    #[test]
    fn test_seeded_sampler_is_reproducible() {
        let mut a = DistSampler::seeded(Uniform::new(100.0, 200.0), 17);
        let mut b = DistSampler::seeded(Uniform::new(100.0, 200.0), 17);
        for _ in 0..10 {
            let drawn = a.sample();
            assert_eq!(drawn, b.sample());
            assert!((100.0..200.0).contains(&drawn));
        }
    }

    #[test]
    fn test_negative_draws_clamp_to_zero() {
        let mut sampler = DistSampler::seeded(Uniform::new(-10.0, -1.0), 3);
        assert_eq!(sampler.sample(), 0.0);
    }
}
