//! The `Sampler` trait: a pure function of (config, history, RNG state).
//! Mirrors the `suggest`/`report`/`name` shape of a parameter-search strategy,
//! generalized to an explicit `init/next` capability set with threaded RNG
//! state instead of ambient `rand::thread_rng()`, so that two runs given the
//! same seed and history produce byte-identical proposals.

use hpo_types::{HpoResult, ParamMap, SearchSpace, Trial};
use rand_chacha::ChaCha8Rng;

/// Proposes the next parameter assignment for a study.
pub trait Sampler: Send + Sync {
    /// Given the resolved search space for this trial index and the terminal
    /// trial history so far, propose a parameter assignment. Must never
    /// return a value outside the space's bounds.
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap>;

    /// Human-readable sampler name, used in logging and the status view.
    fn name(&self) -> &'static str;
}

pub(crate) fn sample_uniform(rng: &mut ChaCha8Rng, low: f64, high: f64) -> f64 {
    use rand::Rng;
    rng.gen_range(low..=high)
}
