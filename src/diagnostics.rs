// =============================================================================
// Model Diagnostics
// =============================================================================
//
// The linear baseline exists only to be diagnosed: its residuals are what
// demonstrate that Gaussian assumptions fail on count data. This module
// provides:
//
// - RESIDUALS: response, Pearson and deviance flavors (statsmodels naming:
//   resid_response, resid_pearson, resid_deviance)
// - LEVERAGE: hat-matrix diagonal, for the residual-vs-leverage panel
// - BaselineDiagnostics: the coordinates of the classic four-panel chart
//   (fitted-vs-residual, normal Q-Q, scale-location, residual-vs-leverage)
// - SHAPIRO-WILK: the source relies on visual inspection alone; this test
//   is the objective normality substitute, so a caller can read a number
//   instead of squinting at a Q-Q plot
// - MODEL FIT: log-likelihood, AIC and null deviance for summaries
//
// =============================================================================

use ndarray::{Array1, Array2};
use statrs::distribution::{ContinuousCDF, Normal};
use statrs::function::gamma::ln_gamma;

use crate::error::{PopTrendError, Result};
use crate::families::Family;
use crate::inference::normal_quantiles;
use crate::model::FittedModel;

// =============================================================================
// Residuals
// =============================================================================

/// Raw residuals: y − μ.
pub fn resid_response(y: &Array1<f64>, mu: &Array1<f64>) -> Array1<f64> {
    y - mu
}

/// Pearson residuals: (y − μ) / √V(μ). Comparable across observations
/// because each is standardized by its own variance.
pub fn resid_pearson(y: &Array1<f64>, mu: &Array1<f64>, family: &dyn Family) -> Array1<f64> {
    let variance = family.variance(mu);
    y.iter()
        .zip(mu.iter())
        .zip(variance.iter())
        .map(|((&yi, &mui), &v)| (yi - mui) / v.sqrt().max(1e-10))
        .collect()
}

/// Deviance residuals: sign(y − μ) × √(unit deviance).
pub fn resid_deviance(y: &Array1<f64>, mu: &Array1<f64>, family: &dyn Family) -> Array1<f64> {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mui)| {
            let d = family.unit_deviance(yi, mui).max(0.0);
            (yi - mui).signum() * d.sqrt()
        })
        .collect()
}

/// Hat-matrix diagonal: h_i = w_i · x_i' (X'WX)⁻¹ x_i.
///
/// `unscaled_cov` is the (X'WX)⁻¹ from the fit; `weights` the final IRLS
/// weights (all ones for the Gaussian baseline).
pub fn leverage(
    x: &Array2<f64>,
    weights: &Array1<f64>,
    unscaled_cov: &Array2<f64>,
) -> Array1<f64> {
    let n = x.nrows();
    let p = x.ncols();
    let mut h = Array1::zeros(n);
    for i in 0..n {
        let mut quad = 0.0;
        for j in 0..p {
            for k in 0..p {
                quad += x[[i, j]] * unscaled_cov[[j, k]] * x[[i, k]];
            }
        }
        h[i] = weights[i] * quad;
    }
    h
}

// =============================================================================
// Baseline diagnostics bundle
// =============================================================================

/// Coordinates for the four qualitative diagnostic panels, plus the
/// Shapiro-Wilk normality test on the residuals.
///
/// No pass/fail threshold is applied anywhere: the panels are for visual
/// inspection, and the test statistic is reported for callers that want
/// an objective number.
#[derive(Debug, Clone)]
pub struct BaselineDiagnostics {
    /// Fitted values μ (x axis of panels 1 and 3).
    pub fitted: Array1<f64>,
    /// Response residuals y − μ (y axis of panel 1).
    pub residuals: Array1<f64>,
    /// Internally standardized residuals r_i / √(φ(1 − h_i)).
    pub std_residuals: Array1<f64>,
    /// Theoretical normal quantiles (x axis of the Q-Q panel), ascending.
    pub theoretical_quantiles: Vec<f64>,
    /// Standardized residuals sorted ascending (y axis of the Q-Q panel).
    pub sorted_std_residuals: Vec<f64>,
    /// √|standardized residual| (y axis of the scale-location panel).
    pub sqrt_abs_std_residuals: Array1<f64>,
    /// Hat-matrix diagonal (x axis of the leverage panel).
    pub leverage: Array1<f64>,
    /// Shapiro-Wilk test of residual normality.
    pub shapiro: ShapiroWilk,
}

impl BaselineDiagnostics {
    /// Compute the full diagnostic bundle for a fitted baseline.
    pub fn compute(model: &FittedModel, family: &dyn Family) -> Result<Self> {
        let n = model.response.len();
        let p = model.coefficients.len();

        let mut x = Array2::zeros((n, p));
        for i in 0..n {
            x[[i, 0]] = 1.0;
            x[[i, 1]] = model.scaled_years[i];
        }

        let residuals = resid_response(&model.response, &model.fitted_values);
        let pearson = resid_pearson(&model.response, &model.fitted_values, family);
        // Unscaled covariance back from the scaled one
        let dispersion = model.dispersion.max(1e-300);
        let unscaled_cov = model.covariance.mapv(|c| c / dispersion);
        let h = leverage(&x, &model.irls_weights, &unscaled_cov);

        let std_residuals: Array1<f64> = pearson
            .iter()
            .zip(h.iter())
            .map(|(&r, &hi)| r / (dispersion * (1.0 - hi).max(1e-10)).sqrt())
            .collect();

        let mut sorted_std_residuals: Vec<f64> = std_residuals.to_vec();
        sorted_std_residuals.sort_by(|a, b| a.total_cmp(b));
        let theoretical_quantiles = normal_quantiles(n);

        let sqrt_abs_std_residuals = std_residuals.mapv(|r| r.abs().sqrt());
        let residual_vec = residuals.to_vec();
        let shapiro = shapiro_wilk(&residual_vec)?;

        Ok(Self {
            fitted: model.fitted_values.clone(),
            residuals,
            std_residuals,
            theoretical_quantiles,
            sorted_std_residuals,
            sqrt_abs_std_residuals,
            leverage: h,
            shapiro,
        })
    }
}

// =============================================================================
// Shapiro-Wilk normality test
// =============================================================================

/// Result of a Shapiro-Wilk test.
///
/// `statistic` is W ∈ (0, 1]; values near 1 are consistent with
/// normality. Small `p_value` means the sample is unlikely to be normal.
#[derive(Debug, Clone, Copy)]
pub struct ShapiroWilk {
    pub statistic: f64,
    pub p_value: f64,
}

/// Shapiro-Wilk W test for normality, Royston's AS R94 approximation.
///
/// Valid for 3 ≤ n ≤ 5000.
///
/// # Errors
/// [`PopTrendError::InvalidValue`] for out-of-range n or a zero-range
/// sample.
pub fn shapiro_wilk(sample: &[f64]) -> Result<ShapiroWilk> {
    let n = sample.len();
    if !(3..=5000).contains(&n) {
        return Err(PopTrendError::InvalidValue(format!(
            "Shapiro-Wilk requires 3 <= n <= 5000, got {n}"
        )));
    }

    let mut x: Vec<f64> = sample.to_vec();
    x.sort_by(|a, b| a.total_cmp(b));
    if (x[n - 1] - x[0]).abs() < 1e-300 {
        return Err(PopTrendError::InvalidValue(
            "Shapiro-Wilk is undefined for a zero-range sample".to_string(),
        ));
    }

    // Expected normal order statistics (Blom) and the weight vector a
    let m = normal_quantiles(n);
    let ssq_m: f64 = m.iter().map(|mi| mi * mi).sum();

    let mut a = vec![0.0; n];
    if n == 3 {
        a[0] = -std::f64::consts::FRAC_1_SQRT_2;
        a[2] = std::f64::consts::FRAC_1_SQRT_2;
    } else {
        let rsn = 1.0 / (n as f64).sqrt();
        let c = |i: usize| m[i] / ssq_m.sqrt();
        let a_n = poly(&[-2.706056, 4.434685, -2.071190, -0.147981, 0.221157], rsn) + c(n - 1);
        if n <= 5 {
            let phi = (ssq_m - 2.0 * m[n - 1] * m[n - 1]) / (1.0 - 2.0 * a_n * a_n);
            a[n - 1] = a_n;
            a[0] = -a_n;
            for i in 1..n - 1 {
                a[i] = m[i] / phi.sqrt();
            }
        } else {
            let a_n1 =
                poly(&[-3.582633, 5.682633, -1.752461, -0.293762, 0.042981], rsn) + c(n - 2);
            let phi = (ssq_m - 2.0 * m[n - 1] * m[n - 1] - 2.0 * m[n - 2] * m[n - 2])
                / (1.0 - 2.0 * a_n * a_n - 2.0 * a_n1 * a_n1);
            a[n - 1] = a_n;
            a[n - 2] = a_n1;
            a[0] = -a_n;
            a[1] = -a_n1;
            for i in 2..n - 2 {
                a[i] = m[i] / phi.sqrt();
            }
        }
    }

    // W = (Σ a_i x_(i))² / Σ (x_i − x̄)²
    let mean = x.iter().sum::<f64>() / n as f64;
    let numerator: f64 = a.iter().zip(x.iter()).map(|(&ai, &xi)| ai * xi).sum::<f64>().powi(2);
    let denominator: f64 = x.iter().map(|&xi| (xi - mean).powi(2)).sum();
    let w = (numerator / denominator).min(1.0);

    let p_value = shapiro_wilk_pvalue(w, n);

    Ok(ShapiroWilk {
        statistic: w,
        p_value,
    })
}

/// Evaluate c[0]·u^5 + c[1]·u^4 + ... + c[4]·u (Royston's polynomial
/// corrections for the extreme weights).
fn poly(c: &[f64; 5], u: f64) -> f64 {
    c[0] * u.powi(5) + c[1] * u.powi(4) + c[2] * u.powi(3) + c[3] * u.powi(2) + c[4] * u
}

/// P-value for W per Royston (1995): exact arcsine form at n = 3,
/// log-normal approximations above.
fn shapiro_wilk_pvalue(w: f64, n: usize) -> f64 {
    let nf = n as f64;
    if n == 3 {
        let stqr = (0.75f64).sqrt().asin();
        let p = 6.0 / std::f64::consts::PI * ((w.sqrt()).asin() - stqr);
        return p.clamp(0.0, 1.0);
    }

    // Guard the log for essentially perfect fits
    let log1mw = (1.0 - w).max(1e-300).ln();
    let z = if n <= 11 {
        let gamma = -2.273 + 0.459 * nf;
        let mu = 0.5440 - 0.39978 * nf + 0.025054 * nf * nf - 0.0006714 * nf * nf * nf;
        let sigma = (1.3822 - 0.77857 * nf + 0.062767 * nf * nf - 0.0020322 * nf * nf * nf).exp();
        let arg = gamma - log1mw;
        if arg <= 0.0 {
            // W so close to 1 that the transform degenerates: no evidence
            // against normality
            return 1.0;
        }
        (-arg.ln() - mu) / sigma
    } else {
        let ln_n = nf.ln();
        let mu = -1.5861 - 0.31082 * ln_n - 0.083751 * ln_n * ln_n + 0.0038915 * ln_n.powi(3);
        let sigma = (-0.4803 - 0.082676 * ln_n + 0.0030302 * ln_n * ln_n).exp();
        (log1mw - mu) / sigma
    };

    let normal = Normal::new(0.0, 1.0).unwrap();
    (1.0 - normal.cdf(z)).clamp(0.0, 1.0)
}

// =============================================================================
// Model fit measures
// =============================================================================

/// Poisson log-likelihood: Σ [y ln μ − μ − ln Γ(y + 1)].
pub fn log_likelihood_poisson(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    y.iter()
        .zip(mu.iter())
        .map(|(&yi, &mui)| {
            let mui = mui.max(1e-10);
            yi * mui.ln() - mui - ln_gamma(yi + 1.0)
        })
        .sum()
}

/// Gaussian log-likelihood with the MLE variance estimate σ̂² = RSS/n.
pub fn log_likelihood_gaussian(y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
    let n = y.len() as f64;
    let rss: f64 = y
        .iter()
        .zip(mu.iter())
        .map(|(&yi, &mui)| (yi - mui).powi(2))
        .sum();
    let sigma2 = (rss / n).max(1e-300);
    -0.5 * n * ((2.0 * std::f64::consts::PI * sigma2).ln() + 1.0)
}

/// Akaike information criterion: 2k − 2·log-likelihood.
pub fn aic(log_likelihood: f64, n_parameters: usize) -> f64 {
    2.0 * n_parameters as f64 - 2.0 * log_likelihood
}

/// Deviance of the intercept-only model (μ = ȳ everywhere).
pub fn null_deviance(y: &Array1<f64>, family: &dyn Family) -> f64 {
    let y_mean = y.mean().unwrap_or(0.0);
    let mu = Array1::from_elem(y.len(), y_mean);
    family.deviance(y, &family.clamp_mu(&mu))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::Observation;
    use crate::families::{GaussianFamily, PoissonFamily};
    use crate::model::fit_baseline;
    use crate::solvers::IRLSConfig;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn response_residuals_are_raw_differences() {
        let y = array![3.0, 5.0];
        let mu = array![2.5, 6.0];
        let r = resid_response(&y, &mu);
        assert_abs_diff_eq!(r[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(r[1], -1.0, epsilon = 1e-12);
    }

    #[test]
    fn pearson_residuals_standardize_by_variance() {
        let y = array![9.0];
        let mu = array![4.0];
        // Poisson: (9 − 4)/√4 = 2.5
        let r = resid_pearson(&y, &mu, &PoissonFamily);
        assert_abs_diff_eq!(r[0], 2.5, epsilon = 1e-12);
    }

    #[test]
    fn deviance_residuals_carry_the_sign() {
        let y = array![2.0, 8.0];
        let mu = array![4.0, 4.0];
        let r = resid_deviance(&y, &mu, &PoissonFamily);
        assert!(r[0] < 0.0);
        assert!(r[1] > 0.0);
    }

    #[test]
    fn leverages_sum_to_parameter_count() {
        // Σ h_i = trace(H) = p for a weighted least-squares hat matrix.
        let obs: Vec<Observation> = [(1974, 10.0), (1976, 14.0), (1979, 20.0), (1983, 31.0)]
            .iter()
            .map(|&(y, p)| Observation::new(y, p))
            .collect();
        let model = fit_baseline(&obs, &IRLSConfig::default()).unwrap();
        let diag = BaselineDiagnostics::compute(&model, &GaussianFamily).unwrap();
        let total: f64 = diag.leverage.iter().sum();
        assert_abs_diff_eq!(total, 2.0, epsilon = 1e-6);
    }

    #[test]
    fn qq_coordinates_are_sorted_and_aligned() {
        let obs: Vec<Observation> = [
            (1974, 10.0),
            (1976, 14.0),
            (1979, 11.0),
            (1983, 31.0),
            (1985, 28.0),
        ]
        .iter()
        .map(|&(y, p)| Observation::new(y, p))
        .collect();
        let model = fit_baseline(&obs, &IRLSConfig::default()).unwrap();
        let diag = BaselineDiagnostics::compute(&model, &GaussianFamily).unwrap();

        assert_eq!(diag.theoretical_quantiles.len(), diag.sorted_std_residuals.len());
        for w in diag.sorted_std_residuals.windows(2) {
            assert!(w[0] <= w[1]);
        }
        for w in diag.theoretical_quantiles.windows(2) {
            assert!(w[0] < w[1]);
        }
    }

    #[test]
    fn shapiro_wilk_accepts_near_normal_sample() {
        // Normal order statistics themselves: as normal-looking as a
        // sample can be. W should be near 1 with a large p.
        let sample = crate::inference::normal_quantiles(20);
        let result = shapiro_wilk(&sample).unwrap();
        assert!(result.statistic > 0.95, "W = {}", result.statistic);
        assert!(result.p_value > 0.5, "p = {}", result.p_value);
    }

    #[test]
    fn shapiro_wilk_rejects_heavily_skewed_sample() {
        let sample = [1.0, 1.0, 1.0, 2.0, 2.0, 3.0, 4.0, 80.0, 150.0, 400.0];
        let result = shapiro_wilk(&sample).unwrap();
        assert!(result.statistic < 0.75, "W = {}", result.statistic);
        assert!(result.p_value < 0.01, "p = {}", result.p_value);
    }

    #[test]
    fn shapiro_wilk_statistic_stays_in_unit_interval() {
        let sample = [0.3, -1.2, 0.8, 2.1, -0.5, 0.0, 1.4];
        let result = shapiro_wilk(&sample).unwrap();
        assert!(result.statistic > 0.0 && result.statistic <= 1.0);
        assert!((0.0..=1.0).contains(&result.p_value));
    }

    #[test]
    fn shapiro_wilk_needs_three_points() {
        assert!(shapiro_wilk(&[1.0, 2.0]).is_err());
    }

    #[test]
    fn shapiro_wilk_rejects_zero_range() {
        assert!(shapiro_wilk(&[5.0, 5.0, 5.0, 5.0]).is_err());
    }

    #[test]
    fn poisson_log_likelihood_matches_hand_computation() {
        // Single observation y = 2, μ = 3: 2 ln 3 − 3 − ln 2!
        let ll = log_likelihood_poisson(&array![2.0], &array![3.0]);
        let expected = 2.0 * 3.0f64.ln() - 3.0 - 2.0f64.ln();
        assert_abs_diff_eq!(ll, expected, epsilon = 1e-10);
    }

    #[test]
    fn aic_penalizes_parameters() {
        let ll = -10.0;
        assert_abs_diff_eq!(aic(ll, 2), 24.0, epsilon = 1e-12);
        assert!(aic(ll, 3) > aic(ll, 2));
    }

    #[test]
    fn null_deviance_bounds_residual_deviance() {
        let y = array![10.0, 14.0, 20.0, 31.0];
        let null = null_deviance(&y, &GaussianFamily);
        // Null model deviance is the total sum of squares
        let mean = 18.75;
        let tss: f64 = y.iter().map(|&v| (v - mean).powi(2)).sum();
        assert_abs_diff_eq!(null, tss, epsilon = 1e-10);
    }
}
