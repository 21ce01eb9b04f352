//! Gaussian-copula multivariate mode: marginals are transformed to
//! standard-normal via their empirical CDF, a Ledoit-Wolf-shrunk correlation
//! matrix is fit over the transformed columns, and candidates are drawn by
//! Cholesky factorization back through the marginals.
//!
//! No linear-algebra crate is in the dependency stack, so this is hand-rolled
//! over `Vec<Vec<f64>>` rather than pulling one in for a handful of small,
//! dense matrix operations.

/// Inverse standard-normal CDF (the probit function), via Acklam's rational
/// approximation. Accurate to ~1.15e-9 over `(0, 1)`.
pub fn inverse_normal_cdf(p: f64) -> f64 {
    const A: [f64; 6] = [
        -3.969_683_028_665_376e+01,
        2.209_460_984_245_205e+02,
        -2.759_285_104_469_687e+02,
        1.383_577_518_672_690e+02,
        -3.066_479_806_614_716e+01,
        2.506_628_277_459_239e+00,
    ];
    const B: [f64; 5] = [
        -5.447_609_879_822_406e+01,
        1.615_858_368_580_409e+02,
        -1.556_989_798_598_866e+02,
        6.680_131_188_771_972e+01,
        -1.328_068_155_288_572e+01,
    ];
    const C: [f64; 6] = [
        -7.784_894_002_430_293e-03,
        -3.223_964_580_411_365e-01,
        -2.400_758_277_161_838e+00,
        -2.549_732_539_343_734e+00,
        4.374_664_141_464_968e+00,
        2.938_163_982_698_783e+00,
    ];
    const D: [f64; 4] = [
        7.784_695_709_041_462e-03,
        3.224_671_290_700_398e-01,
        2.445_134_137_142_996e+00,
        3.754_408_661_907_416e+00,
    ];
    let p = p.clamp(1e-10, 1.0 - 1e-10);
    const P_LOW: f64 = 0.02425;
    let p_high = 1.0 - P_LOW;

    if p < P_LOW {
        let q = (-2.0 * p.ln()).sqrt();
        (((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    } else if p <= p_high {
        let q = p - 0.5;
        let r = q * q;
        (((((A[0] * r + A[1]) * r + A[2]) * r + A[3]) * r + A[4]) * r + A[5]) * q
            / (((((B[0] * r + B[1]) * r + B[2]) * r + B[3]) * r + B[4]) * r + 1.0)
    } else {
        let q = (-2.0 * (1.0 - p).ln()).sqrt();
        -(((((C[0] * q + C[1]) * q + C[2]) * q + C[3]) * q + C[4]) * q + C[5])
            / ((((D[0] * q + D[1]) * q + D[2]) * q + D[3]) * q + 1.0)
    }
}

/// Standard-normal CDF, via the complementary error function identity.
pub fn normal_cdf(x: f64) -> f64 {
    0.5 * (1.0 + erf(x / std::f64::consts::SQRT_2))
}

fn erf(x: f64) -> f64 {
    // Abramowitz & Stegun 7.1.26, |error| < 1.5e-7.
    let sign = if x < 0.0 { -1.0 } else { 1.0 };
    let x = x.abs();
    let a1 = 0.254_829_592;
    let a2 = -0.284_496_736;
    let a3 = 1.421_413_741;
    let a4 = -1.453_152_027;
    let a5 = 1.061_405_429;
    let p = 0.327_591_1;
    let t = 1.0 / (1.0 + p * x);
    let poly = ((((a5 * t + a4) * t + a3) * t + a2) * t + a1) * t;
    sign * (1.0 - poly * (-x * x).exp())
}

/// Map each column's values to standard-normal space via its empirical CDF:
/// rank, center the rank at `(rank - 0.5) / n`, then invert through the
/// standard normal.
pub fn empirical_cdf_to_normal(values: &[f64]) -> Vec<f64> {
    let n = values.len();
    if n == 0 {
        return Vec::new();
    }
    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| values[a].partial_cmp(&values[b]).unwrap());
    let mut ranks = vec![0usize; n];
    for (rank, &idx) in order.iter().enumerate() {
        ranks[idx] = rank;
    }
    ranks
        .into_iter()
        .map(|rank| {
            let u = (rank as f64 + 0.5) / n as f64;
            inverse_normal_cdf(u)
        })
        .collect()
}

/// Sample (empirical) Pearson correlation matrix of the columns in `data`,
/// where `data[j]` is the j-th dimension's transformed observations (all
/// columns the same length).
pub fn sample_correlation(data: &[Vec<f64>]) -> Vec<Vec<f64>> {
    let d = data.len();
    let n = data.first().map(|c| c.len()).unwrap_or(0) as f64;
    let means: Vec<f64> = data.iter().map(|c| c.iter().sum::<f64>() / n.max(1.0)).collect();
    let stds: Vec<f64> = data
        .iter()
        .zip(&means)
        .map(|(c, &mean)| {
            let var = c.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n.max(1.0);
            var.sqrt().max(1e-9)
        })
        .collect();

    let mut corr = vec![vec![0.0; d]; d];
    for i in 0..d {
        for j in 0..d {
            if i == j {
                corr[i][j] = 1.0;
                continue;
            }
            let cov = data[i]
                .iter()
                .zip(&data[j])
                .map(|(a, b)| (a - means[i]) * (b - means[j]))
                .sum::<f64>()
                / n.max(1.0);
            corr[i][j] = (cov / (stds[i] * stds[j])).clamp(-1.0, 1.0);
        }
    }
    corr
}

/// Ledoit-Wolf shrinkage toward the identity matrix: `shrinkage = max(0.1, 1 - n/(n+d^2))`.
pub fn ledoit_wolf_shrinkage(n: usize, d: usize) -> f64 {
    let n = n as f64;
    let d2 = (d * d) as f64;
    (1.0 - n / (n + d2)).max(0.1)
}

/// Shrink `corr` toward the identity matrix in place: `(1-s)*corr + s*I`.
pub fn shrink_toward_identity(corr: &mut [Vec<f64>], shrinkage: f64) {
    let d = corr.len();
    for i in 0..d {
        for j in 0..d {
            let identity = if i == j { 1.0 } else { 0.0 };
            corr[i][j] = (1.0 - shrinkage) * corr[i][j] + shrinkage * identity;
        }
    }
}

/// Lower-triangular Cholesky factor `L` such that `L L^T = matrix`, or
/// `None` if the matrix is not positive definite (rank-deficient inputs are
/// expected to have already been shrunk toward identity before reaching
/// here, which keeps this numerically well-behaved).
pub fn cholesky(matrix: &[Vec<f64>]) -> Option<Vec<Vec<f64>>> {
    let d = matrix.len();
    let mut l = vec![vec![0.0; d]; d];
    for i in 0..d {
        for j in 0..=i {
            let mut sum = matrix[i][j];
            for k in 0..j {
                sum -= l[i][k] * l[j][k];
            }
            if i == j {
                if sum <= 0.0 {
                    return None;
                }
                l[i][j] = sum.sqrt();
            } else {
                l[i][j] = sum / l[j][j];
            }
        }
    }
    Some(l)
}

/// Draw a correlated standard-normal vector `z = L @ independent`, where
/// `independent` are i.i.d. `N(0,1)` draws, one per dimension.
pub fn correlated_normals(cholesky_factor: &[Vec<f64>], independent: &[f64]) -> Vec<f64> {
    let d = cholesky_factor.len();
    (0..d)
        .map(|i| {
            (0..=i)
                .map(|k| cholesky_factor[i][k] * independent[k])
                .sum()
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inverse_normal_cdf_is_symmetric_around_median() {
        let lo = inverse_normal_cdf(0.1);
        let hi = inverse_normal_cdf(0.9);
        assert!((lo + hi).abs() < 1e-6);
    }

    #[test]
    fn inverse_normal_cdf_roundtrips_through_normal_cdf() {
        for p in [0.05, 0.25, 0.5, 0.75, 0.95] {
            let z = inverse_normal_cdf(p);
            assert!((normal_cdf(z) - p).abs() < 1e-5);
        }
    }

    #[test]
    fn empirical_cdf_preserves_rank_order() {
        let values = vec![3.0, 1.0, 2.0];
        let z = empirical_cdf_to_normal(&values);
        assert!(z[1] < z[2]);
        assert!(z[2] < z[0]);
    }

    #[test]
    fn identity_correlation_survives_shrinkage() {
        let mut corr = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        shrink_toward_identity(&mut corr, 0.5);
        assert_eq!(corr, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn shrinkage_respects_floor() {
        assert!((ledoit_wolf_shrinkage(1_000_000, 2) - 0.1).abs() < 1e-9);
        assert!(ledoit_wolf_shrinkage(1, 5) > 0.9);
    }

    #[test]
    fn cholesky_recovers_identity() {
        let identity = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let l = cholesky(&identity).unwrap();
        assert_eq!(l, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[test]
    fn cholesky_matches_known_factorization() {
        let matrix = vec![vec![4.0, 2.0], vec![2.0, 5.0]];
        let l = cholesky(&matrix).unwrap();
        // L L^T should reconstruct the original matrix.
        let rebuilt_01 = l[0][0] * l[1][0] + l[0][1] * l[1][1];
        assert!((rebuilt_01 - 2.0).abs() < 1e-9);
        let rebuilt_11 = l[1][0] * l[1][0] + l[1][1] * l[1][1];
        assert!((rebuilt_11 - 5.0).abs() < 1e-9);
    }

    #[test]
    fn correlated_normals_match_independent_when_identity() {
        let identity = vec![vec![1.0, 0.0], vec![0.0, 1.0]];
        let l = cholesky(&identity).unwrap();
        let independent = vec![0.3, -0.7];
        let correlated = correlated_normals(&l, &independent);
        assert!((correlated[0] - 0.3).abs() < 1e-9);
        assert!((correlated[1] + 0.7).abs() < 1e-9);
    }
}
