//! Deterministic RNG seeding: every sampler/pruner call derives its RNG state
//! from `(study seed, trial index)` so that, given the same seed and history,
//! two runs produce byte-identical proposals.

use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

/// Derive a 64-bit seed for a given study seed and trial index.
///
/// Uses a fixed-domain splitmix-style mix so nearby trial indices produce
/// uncorrelated streams even under a poor study seed.
pub fn seed_for(study_seed: u64, trial_index: usize) -> u64 {
    let mut z = study_seed
        .wrapping_add(0x9E3779B97F4A7C15)
        .wrapping_add((trial_index as u64).wrapping_mul(0xBF58476D1CE4E5B9));
    z = (z ^ (z >> 30)).wrapping_mul(0xBF58476D1CE4E5B9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94D049BB133111EB);
    z ^ (z >> 31)
}

/// Build a deterministic RNG for a given study seed and trial index.
pub fn rng_for(study_seed: u64, trial_index: usize) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed_for(study_seed, trial_index))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::RngCore;

    #[test]
    fn same_inputs_yield_same_seed() {
        assert_eq!(seed_for(42, 7), seed_for(42, 7));
    }

    #[test]
    fn different_trial_indices_yield_different_seeds() {
        assert_ne!(seed_for(42, 7), seed_for(42, 8));
    }

    #[test]
    fn rng_is_reproducible() {
        let mut a = rng_for(1, 0);
        let mut b = rng_for(1, 0);
        assert_eq!(a.next_u64(), b.next_u64());
    }
}
