//! Uniform random sampler drawing minimal samples without replacement.

use crate::core::Sampler;
use crate::types::DataMatrix;
use crate::utils::UniformRandomGenerator;

/// Uniform random sampler drawing minimal samples without replacement.
pub struct UniformRandomSampler {
    rng: UniformRandomGenerator<usize>,
}

impl Default for UniformRandomSampler {
    fn default() -> Self {
        Self::new()
    }
}

impl UniformRandomSampler {
    /// Construct a new sampler with an entropy seed.
    pub fn new() -> Self {
        Self {
            rng: UniformRandomGenerator::new(),
        }
    }

    /// Construct a sampler from a fixed seed, for reproducible runs.
    pub fn from_seed(seed: u64) -> Self {
        Self {
            rng: UniformRandomGenerator::from_seed(seed),
        }
    }

    /// Seeded when `seed` is given, entropy-seeded otherwise.
    pub fn with_seed(seed: Option<u64>) -> Self {
        seed.map_or_else(Self::new, Self::from_seed)
    }
}

impl Sampler for UniformRandomSampler {
    fn sample(&mut self, data: &DataMatrix, sample_size: usize, out_indices: &mut [usize]) -> bool {
        let n = data.nrows();
        if sample_size == 0 || n == 0 || sample_size > n || out_indices.len() < sample_size {
            return false;
        }

        self.rng.gen_unique(&mut out_indices[..sample_size], 0, n - 1);
        true
    }

    fn update(
        &mut self,
        _sample: &[usize],
        _sample_size: usize,
        _iteration: usize,
        _score_hint: f64,
    ) {
        // Uniform sampling keeps no adaptive state.
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::is_distinct_sample;

    #[test]
    fn draws_distinct_indices_in_range() {
        let data = DataMatrix::zeros(12, 4);
        let mut sampler = UniformRandomSampler::from_seed(3);
        let mut sample = [0usize; 7];
        for _ in 0..50 {
            assert!(sampler.sample(&data, 7, &mut sample));
            assert!(sample.iter().all(|&i| i < 12));
            assert!(is_distinct_sample(&sample, 7));
        }
    }

    #[test]
    fn refuses_oversized_samples() {
        let data = DataMatrix::zeros(3, 4);
        let mut sampler = UniformRandomSampler::from_seed(3);
        let mut sample = [0usize; 4];
        assert!(!sampler.sample(&data, 4, &mut sample));
        assert!(!sampler.sample(&DataMatrix::zeros(0, 4), 1, &mut sample));
    }

    #[test]
    fn same_seed_same_samples() {
        let data = DataMatrix::zeros(100, 4);
        let mut a = UniformRandomSampler::with_seed(Some(11));
        let mut b = UniformRandomSampler::with_seed(Some(11));
        let mut sa = [0usize; 4];
        let mut sb = [0usize; 4];
        for _ in 0..10 {
            a.sample(&data, 4, &mut sa);
            b.sample(&data, 4, &mut sb);
            assert_eq!(sa, sb);
        }
    }
}
