//! Sampler decorators: priors, warm-starting, the constant-liar rule for
//! in-flight trials, and multi-objective scalarization. Each wraps an inner
//! [`Sampler`] and transforms its `history` argument before delegating —
//! per the design note that priors and warm-starting introduce no new
//! sampler state, only a pure transform of history.

use std::sync::Arc;

use hpo_types::{Goal, HpoResult, ParamMap, SearchSpace, Trial};
use rand_chacha::ChaCha8Rng;

use crate::sampler::Sampler;

/// Prepends a fixed set of prior observations ahead of every call's history,
/// so an inner sampler treats user-supplied domain knowledge exactly like
/// earlier trials.
pub struct PriorSampler {
    inner: Box<dyn Sampler>,
    prior_trials: Vec<Trial>,
}

impl PriorSampler {
    pub fn new(inner: Box<dyn Sampler>, prior_trials: Vec<Trial>) -> Self {
        Self { inner, prior_trials }
    }
}

impl Sampler for PriorSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let mut combined = self.prior_trials.clone();
        combined.extend_from_slice(history);
        self.inner.propose(space, trial_index, &combined, rng)
    }

    fn name(&self) -> &'static str {
        "prior"
    }
}

/// Imports a completed study's terminal trials by value into a new study's
/// history. Never references the originating study after construction.
pub struct WarmStartSampler {
    inner: Box<dyn Sampler>,
    warm_start_history: Vec<Trial>,
}

impl WarmStartSampler {
    pub fn new(inner: Box<dyn Sampler>, warm_start_history: Vec<Trial>) -> Self {
        Self {
            inner,
            warm_start_history,
        }
    }
}

impl Sampler for WarmStartSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let mut combined = self.warm_start_history.clone();
        combined.extend_from_slice(history);
        self.inner.propose(space, trial_index, &combined, rng)
    }

    fn name(&self) -> &'static str {
        "warm_start"
    }
}

fn conservative_score(goal: Goal, history: &[Trial]) -> f64 {
    let scores: Vec<f64> = history.iter().filter_map(|t| t.final_score).collect();
    if scores.is_empty() {
        return 0.0;
    }
    match goal {
        Goal::Minimize => scores.into_iter().fold(f64::MIN, f64::max),
        Goal::Maximize => scores.into_iter().fold(f64::MAX, f64::min),
    }
}

fn liar_trial(in_flight: &Trial, score: f64) -> Trial {
    let mut liar = Trial::new_pending(in_flight.study_id, in_flight.trial_index, in_flight.parameters.clone());
    liar.mark_running();
    liar.mark_succeeded(score);
    liar
}

/// Surfaces in-flight trials to a multi-worker-aware density fit by
/// substituting the worst score observed so far (in the goal direction) for
/// each trial still running, so the sampler never treats an unexplored
/// region as free just because its result hasn't landed yet.
pub struct ConstantLiarSampler {
    inner: Box<dyn Sampler>,
    goal: Goal,
}

impl ConstantLiarSampler {
    pub fn new(inner: Box<dyn Sampler>, goal: Goal) -> Self {
        Self { inner, goal }
    }

    pub fn propose_with_in_flight(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        in_flight: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let liar_score = conservative_score(self.goal, history);
        let mut combined = history.to_vec();
        combined.extend(in_flight.iter().map(|t| liar_trial(t, liar_score)));
        self.inner.propose(space, trial_index, &combined, rng)
    }
}

impl Sampler for ConstantLiarSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        self.inner.propose(space, trial_index, history, rng)
    }

    fn name(&self) -> &'static str {
        "constant_liar"
    }
}

/// Scalarizes a multi-objective trial history down to a single score before
/// delegating to an inner (single-objective) sampler.
pub struct MultiObjectiveSampler {
    inner: Box<dyn Sampler>,
    scalarize: Arc<dyn Fn(&Trial) -> f64 + Send + Sync>,
}

impl MultiObjectiveSampler {
    pub fn new(inner: Box<dyn Sampler>, scalarize: Arc<dyn Fn(&Trial) -> f64 + Send + Sync>) -> Self {
        Self { inner, scalarize }
    }
}

impl Sampler for MultiObjectiveSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        let scalarized: Vec<Trial> = history
            .iter()
            .map(|t| {
                let mut clone = t.clone();
                if clone.final_score.is_some() {
                    clone.final_score = Some((self.scalarize)(t));
                }
                clone
            })
            .collect();
        self.inner.propose(space, trial_index, &scalarized, rng)
    }

    fn name(&self) -> &'static str {
        "multi_objective"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::random::RandomSampler;
    use hpo_types::{rng::rng_for, ParameterValue};
    use uuid::Uuid;

    fn space() -> SearchSpace {
        SearchSpace::new().add_uniform("x", 0.0, 1.0)
    }

    fn trial(study: uuid::Uuid, idx: usize, score: f64) -> Trial {
        let mut params = ParamMap::new();
        params.insert("x".to_string(), ParameterValue::Float(0.5));
        let mut t = Trial::new_pending(study, idx, params);
        t.mark_running();
        t.mark_succeeded(score);
        t
    }

    #[test]
    fn prior_sampler_prepends_priors() {
        let study = Uuid::new_v4();
        let priors = vec![trial(study, 0, 1.0)];
        let sampler = PriorSampler::new(Box::new(RandomSampler), priors);
        let mut rng = rng_for(0, 1);
        let params = sampler.propose(&space(), 1, &[], &mut rng).unwrap();
        assert!(space().contains(&params));
    }

    #[test]
    fn constant_liar_substitutes_worst_score_for_in_flight() {
        let study = Uuid::new_v4();
        let history = vec![trial(study, 0, 1.0), trial(study, 1, 2.0)];
        let in_flight = vec![{
            let mut t = trial(study, 2, 0.0);
            t.final_score = None;
            t.status = hpo_types::TrialStatus::Running;
            t
        }];
        let sampler = ConstantLiarSampler::new(Box::new(RandomSampler), Goal::Minimize);
        let mut rng = rng_for(0, 3);
        let params = sampler
            .propose_with_in_flight(&space(), 3, &history, &in_flight, &mut rng)
            .unwrap();
        assert!(space().contains(&params));
    }

    #[test]
    fn multi_objective_scalarizes_before_delegating() {
        let study = Uuid::new_v4();
        let history = vec![trial(study, 0, 5.0)];
        let sampler = MultiObjectiveSampler::new(Box::new(RandomSampler), Arc::new(|_t: &Trial| 0.0));
        let mut rng = rng_for(0, 1);
        let params = sampler.propose(&space(), 1, &history, &mut rng).unwrap();
        assert!(space().contains(&params));
    }
}
