//! KDE density estimation over unit-transform space. Free functions over
//! `&[f64]` so the mixture-of-truncated-Gaussians and smoothed-multinomial
//! math are unit-testable without a `Sampler` or a `SearchSpace` in scope.

use std::f64::consts::PI;

/// Bandwidth floor in unit-transform space: below this, a KDE component
/// collapses toward a point mass and destabilizes the EI ratio.
const BANDWIDTH_FLOOR: f64 = 0.01;

/// Scott's rule: `std_dev * n^(-1/5)`, floored so a tight or degenerate
/// cluster of observations never yields a near-zero bandwidth.
pub fn scott_bandwidth(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return BANDWIDTH_FLOOR;
    }
    let mean = values.iter().sum::<f64>() / n as f64;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (n - 1) as f64;
    let std_dev = var.sqrt();
    (std_dev * (n as f64).powf(-0.2)).max(BANDWIDTH_FLOOR)
}

fn is_degenerate(values: &[f64]) -> bool {
    match (values.iter().cloned().fold(f64::INFINITY, f64::min), values.iter().cloned().fold(f64::NEG_INFINITY, f64::max)) {
        (lo, hi) => (hi - lo).abs() < 1e-12,
    }
}

fn gaussian_pdf(x: f64, mean: f64, bandwidth: f64) -> f64 {
    let z = (x - mean) / bandwidth;
    (-0.5 * z * z).exp() / (bandwidth * (2.0 * PI).sqrt())
}

/// A fitted mixture of truncated Gaussians over a single continuous
/// dimension, augmented with a uniform prior component.
#[derive(Debug, Clone)]
pub struct ContinuousDensity {
    means: Vec<f64>,
    bandwidth: f64,
    prior_weight: f64,
}

impl ContinuousDensity {
    /// Fit a density to `values` (already mapped into unit-transform space).
    /// `prior_weight` is the study's configured TPE prior weight; the
    /// effective uniform-component weight is `prior_weight / (prior_weight + n)`.
    pub fn fit(values: &[f64], prior_weight: f64) -> Self {
        let n = values.len() as f64;
        if values.is_empty() || is_degenerate(values) {
            return Self {
                means: Vec::new(),
                bandwidth: BANDWIDTH_FLOOR,
                prior_weight: 1.0,
            };
        }
        Self {
            means: values.to_vec(),
            bandwidth: scott_bandwidth(values),
            prior_weight: prior_weight / (prior_weight + n),
        }
    }

    /// Density at `x` (unit-transform space), always strictly positive.
    pub fn pdf(&self, x: f64) -> f64 {
        let uniform = 1.0;
        if self.means.is_empty() {
            return uniform;
        }
        let mixture = self
            .means
            .iter()
            .map(|&mean| gaussian_pdf(x, mean, self.bandwidth))
            .sum::<f64>()
            / self.means.len() as f64;
        self.prior_weight * uniform + (1.0 - self.prior_weight) * mixture
    }

    pub fn log_pdf(&self, x: f64) -> f64 {
        self.pdf(x).max(f64::MIN_POSITIVE).ln()
    }

    /// Draw a candidate from the mixture: pick the uniform component or one
    /// of the Gaussian kernels, weighted by `prior_weight`.
    pub fn sample(&self, rng: &mut impl rand::Rng) -> f64 {
        use rand_distr::{Distribution, Normal};
        if self.means.is_empty() || rng.gen::<f64>() < self.prior_weight {
            return rng.gen_range(0.0..=1.0);
        }
        let idx = rng.gen_range(0..self.means.len());
        let normal = Normal::new(self.means[idx], self.bandwidth).unwrap_or_else(|_| {
            Normal::new(self.means[idx], BANDWIDTH_FLOOR).expect("floor bandwidth is finite")
        });
        normal.sample(rng).clamp(0.0, 1.0)
    }
}

/// A smoothed multinomial over a categorical dimension with `k` choices.
#[derive(Debug, Clone)]
pub struct CategoricalDensity {
    probs: Vec<f64>,
}

impl CategoricalDensity {
    /// `values` are choice indices in `[0, k)`. Pseudocount `prior_weight / k`
    /// (Laplace smoothing) keeps every choice reachable even if unobserved.
    pub fn fit(values: &[usize], k: usize, prior_weight: f64) -> Self {
        let k = k.max(1);
        let mut counts = vec![0usize; k];
        for &v in values {
            if v < k {
                counts[v] += 1;
            }
        }
        let pseudocount = prior_weight / k as f64;
        let denom = values.len() as f64 + prior_weight;
        let probs = counts
            .iter()
            .map(|&c| (c as f64 + pseudocount) / denom)
            .collect();
        Self { probs }
    }

    pub fn pmf(&self, choice: usize) -> f64 {
        self.probs.get(choice).copied().unwrap_or(1.0 / self.probs.len() as f64)
    }

    pub fn log_pmf(&self, choice: usize) -> f64 {
        self.pmf(choice).max(f64::MIN_POSITIVE).ln()
    }

    pub fn sample(&self, rng: &mut impl rand::Rng) -> usize {
        let draw: f64 = rng.gen();
        let mut cumulative = 0.0;
        for (idx, p) in self.probs.iter().enumerate() {
            cumulative += p;
            if draw < cumulative {
                return idx;
            }
        }
        self.probs.len().saturating_sub(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    #[test]
    fn scott_bandwidth_shrinks_with_more_observations() {
        let tight: Vec<f64> = (0..50).map(|i| 0.5 + (i as f64) * 1e-4).collect();
        let wide: Vec<f64> = vec![0.1, 0.9, 0.2, 0.8, 0.3];
        assert!(scott_bandwidth(&tight) <= scott_bandwidth(&wide));
    }

    #[test]
    fn bandwidth_never_drops_below_floor() {
        let values = vec![0.5; 20];
        assert_eq!(scott_bandwidth(&values), BANDWIDTH_FLOOR);
    }

    #[test]
    fn continuous_density_is_always_positive() {
        let density = ContinuousDensity::fit(&[0.1, 0.5, 0.9], 1.0);
        for i in 0..=10 {
            let x = i as f64 / 10.0;
            assert!(density.pdf(x) > 0.0);
        }
    }

    #[test]
    fn degenerate_values_fall_back_to_uniform_prior() {
        let density = ContinuousDensity::fit(&[0.5, 0.5, 0.5, 0.5], 1.0);
        let a = density.pdf(0.1);
        let b = density.pdf(0.9);
        assert!((a - b).abs() < 1e-9, "uniform fallback must be flat: {a} vs {b}");
        assert!((a - 1.0).abs() < 1e-9);
    }

    #[test]
    fn density_peaks_near_observed_cluster() {
        let density = ContinuousDensity::fit(&[0.19, 0.2, 0.2, 0.21, 0.2], 0.1);
        assert!(density.pdf(0.2) > density.pdf(0.8));
    }

    #[test]
    fn categorical_smoothing_keeps_unseen_choice_reachable() {
        let density = CategoricalDensity::fit(&[0, 0, 0, 1], 3, 1.0);
        assert!(density.pmf(2) > 0.0);
        assert!(density.pmf(0) > density.pmf(2));
    }

    #[test]
    fn sampling_stays_in_bounds() {
        let density = ContinuousDensity::fit(&[0.1, 0.9], 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        for _ in 0..200 {
            let x = density.sample(&mut rng);
            assert!((0.0..=1.0).contains(&x));
        }
    }

    #[test]
    fn categorical_sample_stays_in_range() {
        let density = CategoricalDensity::fit(&[0, 1, 1, 2], 3, 1.0);
        let mut rng = ChaCha8Rng::seed_from_u64(3);
        for _ in 0..100 {
            assert!(density.sample(&mut rng) < 3);
        }
    }
}
