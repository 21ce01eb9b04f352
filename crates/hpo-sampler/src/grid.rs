//! Exhaustive grid search, generalized from `GridSearch`'s Cartesian-product
//! combinatorics to the five `ParameterKind` variants.
//!
//! Unlike the reference's cursor-advancing iterator, proposals here are a
//! pure function of `trial_index` (`index = trial_index % grid_size`) so the
//! sampler has no internal mutable state — matching the "pure function of
//! (config, history, RNG state)" contract every sampler must satisfy. A
//! continuous-only space has no natural grid; such dimensions fall back to a
//! single midpoint value so grid search remains well-defined even when mixed
//! with continuous dimensions.

use hpo_types::{HpoResult, ParamMap, ParameterKind, ParameterValue, SamplerError, SearchSpace, Trial};
use rand_chacha::ChaCha8Rng;

use crate::sampler::Sampler;

#[derive(Debug, Clone, Copy)]
pub struct GridSampler {
    /// Number of steps used to discretize a continuous dimension that has no
    /// natural grid.
    pub float_steps: usize,
}

impl Default for GridSampler {
    fn default() -> Self {
        Self { float_steps: 5 }
    }
}

impl GridSampler {
    fn axis_values(kind: &ParameterKind, float_steps: usize) -> Vec<ParameterValue> {
        match kind {
            ParameterKind::Int { low, high } => (*low..=*high).map(ParameterValue::Int).collect(),
            ParameterKind::Categorical { choices } => choices.iter().cloned().map(ParameterValue::Categorical).collect(),
            ParameterKind::DiscreteUniform { low, high, step } => {
                let steps = ((high - low) / step).round() as i64;
                (0..=steps.max(0)).map(|k| ParameterValue::Float(low + k as f64 * step)).collect()
            }
            ParameterKind::Uniform { low, high } => {
                let steps = float_steps.max(2);
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        ParameterValue::Float(low + t * (high - low))
                    })
                    .collect()
            }
            ParameterKind::LogUniform { low, high } => {
                let steps = float_steps.max(2);
                let (log_low, log_high) = (low.ln(), high.ln());
                (0..steps)
                    .map(|i| {
                        let t = i as f64 / (steps - 1) as f64;
                        ParameterValue::Float((log_low + t * (log_high - log_low)).exp())
                    })
                    .collect()
            }
        }
    }

    fn nth_combo(&self, space: &SearchSpace, index: usize) -> ParamMap {
        let mut remaining = index;
        let mut params = ParamMap::new();
        for dim in &space.parameters {
            let axis = Self::axis_values(&dim.kind, self.float_steps);
            let width = axis.len().max(1);
            let pick = remaining % width;
            remaining /= width;
            params.insert(dim.name.clone(), axis[pick].clone());
        }
        params
    }
}

impl Sampler for GridSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        _history: &[Trial],
        _rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let total: usize = space
            .parameters
            .iter()
            .map(|dim| Self::axis_values(&dim.kind, self.float_steps).len().max(1))
            .product();
        if total == 0 {
            return Err(SamplerError::Degenerate {
                dimension: "<empty search space>".to_string(),
            }
            .into());
        }
        Ok(self.nth_combo(space, trial_index % total))
    }

    fn name(&self) -> &'static str {
        "grid"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::rng::rng_for;

    #[test]
    fn covers_full_grid_before_repeating() {
        let space = SearchSpace::new().add_int("a", 1, 3).add_int("b", 10, 11);
        let sampler = GridSampler::default();
        let mut seen = std::collections::HashSet::new();
        for trial_index in 0..6 {
            let mut rng = rng_for(0, trial_index);
            let params = sampler.propose(&space, trial_index, &[], &mut rng).unwrap();
            seen.insert(format!("{:?}", params));
        }
        assert_eq!(seen.len(), 6);

        let mut rng = rng_for(0, 6);
        let repeat = sampler.propose(&space, 6, &[], &mut rng).unwrap();
        let mut rng0 = rng_for(0, 0);
        let first = sampler.propose(&space, 0, &[], &mut rng0).unwrap();
        assert_eq!(repeat, first);
    }

    #[test]
    fn every_proposal_satisfies_bounds() {
        let space = SearchSpace::new()
            .add_int("a", 1, 3)
            .add_categorical("b", vec![serde_json::json!(true), serde_json::json!(false)]);
        let sampler = GridSampler::default();
        for trial_index in 0..10 {
            let mut rng = rng_for(0, trial_index);
            let params = sampler.propose(&space, trial_index, &[], &mut rng).unwrap();
            assert!(space.contains(&params));
        }
    }
}
