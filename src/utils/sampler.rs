//! Seeded samplers
//!
//! Every draw goes through an owned `ChaCha8Rng`, so a fixed seed reproduces
//! the same sequence of samples.

use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use rand_distr::StandardNormal;

use crate::common::{ConfigurationSpace, SpaceSampler};
use crate::path_planning::NeighborSampleFn;

/// Uniform sampler over a box of limits
#[derive(Debug, Clone)]
pub struct UniformSampler {
    lower: Vec<f64>,
    upper: Vec<f64>,
    rng: ChaCha8Rng,
}

impl UniformSampler {
    pub fn new(lower: Vec<f64>, upper: Vec<f64>) -> Self {
        assert_eq!(lower.len(), upper.len());
        UniformSampler {
            lower,
            upper,
            rng: ChaCha8Rng::seed_from_u64(0),
        }
    }

    /// Sampler over the limits of a configuration space
    pub fn for_space(space: &dyn ConfigurationSpace) -> Self {
        Self::new(space.lower_limits().to_vec(), space.upper_limits().to_vec())
    }
}

impl SpaceSampler for UniformSampler {
    fn set_seed(&mut self, seed: u64) {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
    }

    fn sample_config(&mut self) -> Option<Vec<f64>> {
        let rng = &mut self.rng;
        Some(
            self.lower
                .iter()
                .zip(&self.upper)
                .map(|(&lo, &hi)| if hi > lo { rng.gen_range(lo..hi) } else { lo })
                .collect(),
        )
    }

    fn sample_u32(&mut self) -> u32 {
        self.rng.next_u32()
    }

    fn sample_real(&mut self) -> f64 {
        self.rng.gen::<f64>()
    }
}

/// Neighbour sampler drawing an isotropic Gaussian direction scaled to a
/// uniform fraction of the requested radius.
pub fn gaussian_neighbor_sampler(seed: u64) -> NeighborSampleFn {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    Box::new(move |q: &[f64], radius: f64| {
        let direction: Vec<f64> = q.iter().map(|_| rng.sample(StandardNormal)).collect();
        let norm = direction.iter().map(|d| d * d).sum::<f64>().sqrt();
        if norm <= f64::EPSILON {
            return None;
        }
        let scale = radius * rng.gen::<f64>() / norm;
        Some(q.iter().zip(&direction).map(|(x, d)| x + d * scale).collect())
    })
}
