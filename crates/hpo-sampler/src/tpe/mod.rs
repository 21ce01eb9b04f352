//! Tree-structured Parzen Estimator: the central algorithmic core.
//!
//! [`TpeSampler`] implements the good/bad split + KDE + Expected-Improvement
//! protocol. The KDE and EI math live in [`density`] as free functions over
//! `&[f64]`; the Gaussian-copula multivariate extension lives in [`copula`];
//! [`group`] pools history for dynamic (conditional) search spaces.

pub mod copula;
pub mod density;
pub mod group;

use std::collections::BTreeMap;

use hpo_types::{
    Goal, HpoResult, ParamMap, ParameterKind, ParameterValue, SamplerError, SearchSpace, Trial,
    TpeConfig,
};
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use rand_distr::{Distribution, Normal};

use crate::random::RandomSampler;
use crate::sampler::Sampler;
use density::{CategoricalDensity, ContinuousDensity};

const EI_EPSILON: f64 = 1e-12;

enum DimDensity {
    Continuous {
        good: ContinuousDensity,
        bad: ContinuousDensity,
    },
    Categorical {
        good: CategoricalDensity,
        bad: CategoricalDensity,
        k: usize,
    },
}

/// A parameter-wise good/bad density pair, fit once per `propose` call.
struct Fitted {
    name: String,
    density: DimDensity,
}

/// Expected-Improvement sampler over univariate (or Gaussian-copula
/// multivariate) KDE density estimates.
pub struct TpeSampler {
    config: TpeConfig,
    goal: Goal,
}

impl TpeSampler {
    pub fn new(config: TpeConfig, goal: Goal) -> Self {
        Self { config, goal }
    }

    /// Sort `scored` by goal direction (best first) and split into (good, bad).
    /// Callers are responsible for ensuring every score is finite; an empty
    /// `scored` yields two empty sets rather than indexing past the slice.
    fn good_bad_split<'a>(&self, scored: &'a [(&'a Trial, f64)]) -> (Vec<&'a Trial>, Vec<&'a Trial>) {
        let mut sorted: Vec<&(&Trial, f64)> = scored.iter().collect();
        sorted.sort_by(|a, b| match self.goal {
            Goal::Minimize => a.1.partial_cmp(&b.1).unwrap(),
            Goal::Maximize => b.1.partial_cmp(&a.1).unwrap(),
        });
        let n = sorted.len();
        if n == 0 {
            return (Vec::new(), Vec::new());
        }
        let good_count = ((self.config.gamma * n as f64).floor() as usize).clamp(1, 25.min(n));
        let good = sorted[..good_count].iter().map(|(t, _)| *t).collect();
        let bad = sorted[good_count..].iter().map(|(t, _)| *t).collect();
        (good, bad)
    }

    fn fit_dimensions(&self, space: &SearchSpace, good: &[&Trial], bad: &[&Trial]) -> Vec<Fitted> {
        space
            .parameters
            .iter()
            .map(|dim| {
                let density = match &dim.kind {
                    ParameterKind::Categorical { choices } => {
                        let k = choices.len();
                        let good_idx: Vec<usize> = good
                            .iter()
                            .filter_map(|t| t.parameters.get(&dim.name))
                            .filter_map(|v| categorical_index(&dim.kind, v))
                            .collect();
                        let bad_idx: Vec<usize> = bad
                            .iter()
                            .filter_map(|t| t.parameters.get(&dim.name))
                            .filter_map(|v| categorical_index(&dim.kind, v))
                            .collect();
                        DimDensity::Categorical {
                            good: CategoricalDensity::fit(&good_idx, k, self.config.prior_weight),
                            bad: CategoricalDensity::fit(&bad_idx, k, self.config.prior_weight),
                            k,
                        }
                    }
                    kind => {
                        let good_units: Vec<f64> = good
                            .iter()
                            .filter_map(|t| t.parameters.get(&dim.name))
                            .map(|v| kind.to_unit(v))
                            .collect();
                        let bad_units: Vec<f64> = bad
                            .iter()
                            .filter_map(|t| t.parameters.get(&dim.name))
                            .map(|v| kind.to_unit(v))
                            .collect();
                        DimDensity::Continuous {
                            good: ContinuousDensity::fit(&good_units, self.config.prior_weight),
                            bad: ContinuousDensity::fit(&bad_units, self.config.prior_weight),
                        }
                    }
                };
                Fitted {
                    name: dim.name.clone(),
                    density,
                }
            })
            .collect()
    }

    /// Draw one full-dimension candidate from the "good" densities, correlated
    /// across continuous-and-log dimensions when `multivariate` is set.
    fn draw_candidate(
        &self,
        space: &SearchSpace,
        fitted: &[Fitted],
        good: &[&Trial],
        rng: &mut ChaCha8Rng,
    ) -> ParamMap {
        let copula = if self.config.multivariate {
            build_copula(space, good)
        } else {
            None
        };

        let mut params = ParamMap::new();
        let mut correlated_draw: Option<BTreeMap<String, f64>> = None;
        if let Some(ref c) = copula {
            correlated_draw = Some(c.sample(rng));
        }

        for (dim, fit) in space.parameters.iter().zip(fitted) {
            debug_assert_eq!(dim.name, fit.name, "fitted densities must stay aligned with space.parameters order");
            let value = match &fit.density {
                DimDensity::Continuous { good, .. } => {
                    let unit = if let Some(ref draw) = correlated_draw {
                        draw.get(&dim.name).copied().unwrap_or_else(|| good.sample(rng))
                    } else {
                        good.sample(rng)
                    };
                    dim.kind.from_unit(unit.clamp(0.0, 1.0))
                }
                DimDensity::Categorical { good, .. } => {
                    let idx = good.sample(rng);
                    if let ParameterKind::Categorical { choices } = &dim.kind {
                        ParameterValue::Categorical(choices[idx.min(choices.len() - 1)].clone())
                    } else {
                        unreachable!("categorical density paired with non-categorical kind")
                    }
                }
            };
            params.insert(dim.name.clone(), value);
        }
        params
    }

    /// `ln(l(x)) - ln(g(x) + eps)`, clamped against overflow.
    fn log_ei(&self, space: &SearchSpace, fitted: &[Fitted], candidate: &ParamMap) -> f64 {
        let mut log_l = 0.0;
        let mut log_g = 0.0;
        for (dim, fit) in space.parameters.iter().zip(fitted) {
            debug_assert_eq!(dim.name, fit.name, "fitted densities must stay aligned with space.parameters order");
            let Some(value) = candidate.get(&dim.name) else {
                continue;
            };
            match &fit.density {
                DimDensity::Continuous { good, bad } => {
                    let unit = dim.kind.to_unit(value);
                    log_l += good.log_pdf(unit);
                    log_g += bad.log_pdf(unit);
                }
                DimDensity::Categorical { good, bad, .. } => {
                    if let Some(idx) = categorical_index(&dim.kind, value) {
                        log_l += good.log_pmf(idx);
                        log_g += bad.log_pmf(idx);
                    }
                }
            }
        }
        let g_linear = log_g.exp();
        let score = log_l - (g_linear + EI_EPSILON).ln();
        if score.is_finite() {
            score
        } else {
            f64::MIN
        }
    }
}

impl Sampler for TpeSampler {
    fn propose(
        &self,
        space: &SearchSpace,
        trial_index: usize,
        history: &[Trial],
        rng: &mut ChaCha8Rng,
    ) -> HpoResult<ParamMap> {
        if history.is_empty() || history.len() < self.config.min_obs {
            return RandomSampler.propose(space, trial_index, history, rng);
        }

        let active: Vec<String> = space.parameters.iter().map(|p| p.name.clone()).collect();
        let pooled = group::matching_group(history, &active);
        let scored: Vec<(&Trial, f64)> = pooled
            .into_iter()
            .filter_map(|t| {
                t.final_score
                    .or_else(|| t.latest_observation().map(|o| o.score))
                    .map(|score| (t, score))
            })
            .collect();

        if scored.is_empty() || scored.len() < self.config.min_obs {
            return RandomSampler.propose(space, trial_index, history, rng);
        }

        if let Some((_, bad_score)) = scored.iter().find(|(_, score)| !score.is_finite()) {
            return Err(SamplerError::Numerical {
                dimension: "<objective score>".to_string(),
                message: format!("non-finite score {bad_score} reported for a terminal trial"),
            }
            .into());
        }

        let (good, bad) = self.good_bad_split(&scored);
        let fitted = self.fit_dimensions(space, &good, &bad);

        let mut best: Option<(f64, ParamMap)> = None;
        for _ in 0..self.config.n_candidates.max(1) {
            let candidate = self.draw_candidate(space, &fitted, &good, rng);
            let score = self.log_ei(space, &fitted, &candidate);
            if best.as_ref().map(|(s, _)| score > *s).unwrap_or(true) {
                best = Some((score, candidate));
            }
        }

        best.map(|(_, params)| params).ok_or_else(|| {
            SamplerError::Degenerate {
                dimension: "<no candidates drawn>".to_string(),
            }
            .into()
        })
    }

    fn name(&self) -> &'static str {
        "tpe"
    }
}

fn categorical_index(kind: &ParameterKind, value: &ParameterValue) -> Option<usize> {
    if let (ParameterKind::Categorical { choices }, ParameterValue::Categorical(v)) = (kind, value)
    {
        choices.iter().position(|c| c == v)
    } else {
        None
    }
}

fn is_continuous_or_log(kind: &ParameterKind) -> bool {
    matches!(
        kind,
        ParameterKind::Uniform { .. } | ParameterKind::LogUniform { .. }
    )
}

/// The fitted Gaussian-copula correlation structure over the continuous-and-log
/// dimensions of the good set, used only to correlate candidate draws; density
/// evaluation for EI always uses the independent per-dimension product so
/// univariate and multivariate scoring agree when correlation is identity.
struct Copula {
    dims: Vec<String>,
    means: BTreeMap<String, Vec<f64>>,
    bandwidths: BTreeMap<String, f64>,
    cholesky_factor: Vec<Vec<f64>>,
}

impl Copula {
    fn sample(&self, rng: &mut ChaCha8Rng) -> BTreeMap<String, f64> {
        let d = self.dims.len();
        if d == 0 {
            return BTreeMap::new();
        }
        let independent: Vec<f64> = (0..d)
            .map(|_| {
                Normal::new(0.0, 1.0)
                    .expect("unit normal is always valid")
                    .sample(rng)
            })
            .collect();
        let correlated = copula::correlated_normals(&self.cholesky_factor, &independent);

        let row = rng.gen_range(0..self.means.values().next().map(|m| m.len()).unwrap_or(1).max(1));
        let mut result = BTreeMap::new();
        for (i, name) in self.dims.iter().enumerate() {
            let means = &self.means[name];
            let mean = means.get(row).copied().unwrap_or(0.5);
            let bandwidth = self.bandwidths[name];
            let value = mean + correlated[i] * bandwidth;
            result.insert(name.clone(), value.clamp(0.0, 1.0));
        }
        result
    }
}

fn build_copula(space: &SearchSpace, good: &[&Trial]) -> Option<Copula> {
    let dims: Vec<String> = space
        .parameters
        .iter()
        .filter(|p| is_continuous_or_log(&p.kind))
        .map(|p| p.name.clone())
        .collect();
    if dims.len() < 2 || good.is_empty() {
        return None;
    }

    let mut means = BTreeMap::new();
    let mut bandwidths = BTreeMap::new();
    let mut transformed = Vec::new();
    for name in &dims {
        let kind = &space.get(name)?.kind;
        let units: Vec<f64> = good
            .iter()
            .filter_map(|t| t.parameters.get(name))
            .map(|v| kind.to_unit(v))
            .collect();
        if units.is_empty() {
            return None;
        }
        bandwidths.insert(name.clone(), density::scott_bandwidth(&units));
        transformed.push(copula::empirical_cdf_to_normal(&units));
        means.insert(name.clone(), units);
    }

    let n = means.values().next().map(|v| v.len()).unwrap_or(0);
    let d = dims.len();
    let mut corr = copula::sample_correlation(&transformed);
    let shrinkage = copula::ledoit_wolf_shrinkage(n, d);
    copula::shrink_toward_identity(&mut corr, shrinkage);
    let cholesky_factor = copula::cholesky(&corr)?;

    Some(Copula {
        dims,
        means,
        bandwidths,
        cholesky_factor,
    })
}
