//! Independent random sampling across the search space, generalized from
//! `RandomSearch::sample_one` to the five `ParameterKind` variants and an
//! explicit threaded RNG instead of `rand::thread_rng()`.

use hpo_types::{HpoResult, ParamMap, ParameterKind, ParameterValue, SearchSpace, Trial};
use rand::Rng;
use rand_chacha::ChaCha8Rng;

use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy, Default)]
pub struct RandomSampler;

impl RandomSampler {
    pub fn sample_dimension(kind: &ParameterKind, rng: &mut ChaCha8Rng) -> ParameterValue {
        match kind {
            ParameterKind::Uniform { low, high } => ParameterValue::Float(rng.gen_range(*low..=*high)),
            ParameterKind::LogUniform { low, high } => {
                let log_val: f64 = rng.gen_range(low.ln()..=high.ln());
                ParameterValue::Float(log_val.exp())
            }
            ParameterKind::DiscreteUniform { low, high, step } => {
                let steps = ((high - low) / step).round() as i64;
                let k = rng.gen_range(0..=steps.max(0));
                ParameterValue::Float(low + k as f64 * step)
            }
            ParameterKind::Int { low, high } => ParameterValue::Int(rng.gen_range(*low..=*high)),
            ParameterKind::Categorical { choices } => {
                let idx = rng.gen_range(0..choices.len());
                ParameterValue::Categorical(choices[idx].clone())
            }
        }
    }
}

impl Sampler for RandomSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        _trial_index: usize,
        _history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let mut params = ParamMap::new();
        for dim in &space.parameters {
            params.insert(dim.name.clone(), Self::sample_dimension(&dim.kind, rng));
        }
        Ok(params)
    }

    fn name(&self) -> &'static str {
        "random"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::rng::rng_for;

    fn space() -> SearchSpace {
        SearchSpace::new()
            .add_int("a", 5, 15)
            .add_uniform("b", 0.0, 1.0)
            .add_log_uniform("c", 1e-4, 1.0)
            .add_categorical("d", vec![serde_json::json!("x"), serde_json::json!("y")])
    }

    #[test]
    fn respects_bounds_across_many_draws() {
        let space = space();
        let sampler = RandomSampler;
        for trial_index in 0..200 {
            let mut rng = rng_for(0, trial_index);
            let params = sampler.propose(&space, trial_index, &[], &mut rng).unwrap();
            assert!(space.contains(&params));
        }
    }

    #[test]
    fn deterministic_given_same_seed() {
        let space = space();
        let sampler = RandomSampler;
        let mut rng_a = rng_for(7, 3);
        let mut rng_b = rng_for(7, 3);
        let a = sampler.propose(&space, 3, &[], &mut rng_a).unwrap();
        let b = sampler.propose(&space, 3, &[], &mut rng_b).unwrap();
        assert_eq!(a, b);
    }
}
