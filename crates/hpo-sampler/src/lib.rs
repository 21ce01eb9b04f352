//! Parameter-proposal strategies: Random and Grid baselines, the TPE
//! algorithmic core (univariate and Gaussian-copula multivariate), and
//! decorator samplers for priors, warm-starting, the constant-liar rule,
//! and multi-objective scalarization.

pub mod grid;
pub mod random;
pub mod sampler;
pub mod tpe;
pub mod wrappers;

pub use grid::GridSampler;
pub use random::RandomSampler;
pub use sampler::Sampler;
pub use tpe::TpeSampler;
pub use wrappers::{ConstantLiarSampler, MultiObjectiveSampler, PriorSampler, WarmStartSampler};

use hpo_types::{SamplerKind, StudyConfig};

/// Build the configured top-level sampler for a study. Decorators (priors,
/// warm-start, constant-liar, multi-objective) are applied by the caller on
/// top of the returned sampler, since they depend on data the study
/// configuration alone doesn't carry (prior trials, a warm-start history, a
/// scalarization function).
pub fn build_sampler(config: &StudyConfig) -> Box<dyn Sampler> {
    match config.sampler {
        SamplerKind::Random => Box::new(RandomSampler),
        SamplerKind::Grid => Box::new(GridSampler::default()),
        SamplerKind::Tpe => Box::new(TpeSampler::new(config.tpe.clone(), config.goal)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hpo_types::{rng::rng_for, Goal, SearchSpace};

    #[test]
    fn build_sampler_respects_configured_kind() {
        let config = StudyConfig::new("s", Goal::Minimize).with_sampler(SamplerKind::Random, Default::default());
        let sampler = build_sampler(&config);
        assert_eq!(sampler.name(), "random");

        let space = SearchSpace::new().add_uniform("x", 0.0, 1.0);
        let mut rng = rng_for(0, 0);
        let params = sampler.propose(&space, 0, &[], &mut rng).unwrap();
        assert!(space.contains(&params));
    }
}
