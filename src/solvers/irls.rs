// =============================================================================
// IRLS: Iteratively Reweighted Least Squares
// =============================================================================
//
// THE BIG PICTURE
// ---------------
// We want β maximizing the likelihood of the observed counts. For GLMs
// there is no closed form, so we iterate:
//
//     Start with initial guess μ⁰ from the family
//     Repeat:
//         1. Compute working weights W from variance and link derivative
//         2. Compute working response z (linearized problem)
//         3. Solve weighted least squares: (X'WX)β = X'Wz
//         4. Update η = Xβ, μ = g⁻¹(η)
//         5. Stop when the deviance change is below tolerance
//
// WHY "REWEIGHTED"?
// -----------------
// The weights change every iteration because both the variance V(μ) and
// the link derivative g'(μ) depend on the current μ. Observations with
// higher variance get less weight. For Poisson counts this means a year
// with an expected population of 500 is allowed to miss by more than a
// year with an expected population of 20.
//
// THE WORKING RESPONSE
// --------------------
//     z = η + (y - μ) × g'(μ)
//
// is the first-order linearization of g(y) around μ. It turns the
// non-linear problem into a weighted linear regression at each step.
//
// CONVERGENCE
// -----------
// We stop when the relative deviance change drops below the tolerance.
// Running out of iterations is an error here, not a flag: the caller
// gets the iteration count and the last deviance so the failure can be
// diagnosed (bad data, degenerate design, tolerance too tight).
//
// =============================================================================

use nalgebra::{DMatrix, DVector};
use ndarray::{Array1, Array2};

use crate::error::{PopTrendError, Result};
use crate::families::Family;
use crate::links::Link;

// =============================================================================
// Configuration
// =============================================================================

/// Configuration options for the IRLS algorithm.
///
/// The defaults converge within a handful of iterations on the short,
/// well-behaved count series this pipeline handles.
#[derive(Debug, Clone)]
pub struct IRLSConfig {
    /// Maximum number of iterations before failing with
    /// [`PopTrendError::FitConvergence`]. Default: 50.
    pub max_iterations: usize,

    /// Convergence tolerance for the relative deviance change.
    /// Default: 1e-8.
    pub tolerance: f64,

    /// Lower clip for working weights, to avoid numerical blow-ups when
    /// μ gets close to the edge of its domain. Default: 1e-10.
    pub min_weight: f64,
}

impl Default for IRLSConfig {
    fn default() -> Self {
        Self {
            max_iterations: 50,
            tolerance: 1e-8,
            min_weight: 1e-10,
        }
    }
}

// =============================================================================
// Result Structure
// =============================================================================

/// Results from fitting a GLM with IRLS.
///
/// Contains everything the model layer needs for inference, prediction
/// and diagnostics. Immutable once produced.
#[derive(Debug, Clone)]
pub struct IRLSResult {
    /// The fitted coefficients β, in design-matrix column order.
    pub coefficients: Array1<f64>,

    /// Fitted values μ = g⁻¹(Xβ), one per observation.
    pub fitted_values: Array1<f64>,

    /// Linear predictor η = Xβ.
    pub linear_predictor: Array1<f64>,

    /// Final deviance.
    pub deviance: f64,

    /// Number of iterations until convergence.
    pub iterations: usize,

    /// The (X'WX)⁻¹ matrix. Scaled by the dispersion it is the
    /// coefficient covariance: Var(β̂) = φ × (X'WX)⁻¹.
    pub covariance_unscaled: Array2<f64>,

    /// Final working weights, needed for leverage diagnostics.
    pub irls_weights: Array1<f64>,
}

// =============================================================================
// Main Fitting Function
// =============================================================================

/// Fit a GLM using Iteratively Reweighted Least Squares.
///
/// # Arguments
/// * `y` - Response variable (n)
/// * `x` - Design matrix (n × p), including the intercept column
/// * `family` - Distribution family (Gaussian or Poisson)
/// * `link` - Link function (Identity or Log)
/// * `config` - Algorithm configuration
///
/// # Errors
/// * [`PopTrendError::DimensionMismatch`] / [`PopTrendError::EmptyInput`]
///   on malformed inputs
/// * [`PopTrendError::FitConvergence`] if the deviance has not settled
///   within `config.max_iterations`
/// * [`PopTrendError::LinearAlgebra`] if the weighted normal equations
///   are singular (collinear design)
pub fn fit_glm(
    y: &Array1<f64>,
    x: &Array2<f64>,
    family: &dyn Family,
    link: &dyn Link,
    config: &IRLSConfig,
) -> Result<IRLSResult> {
    let n = y.len();
    let p = x.ncols();

    if x.nrows() != n {
        return Err(PopTrendError::DimensionMismatch(format!(
            "X has {} rows but y has {} elements",
            x.nrows(),
            n
        )));
    }
    if n == 0 {
        return Err(PopTrendError::EmptyInput("y is empty".to_string()));
    }
    if p == 0 {
        return Err(PopTrendError::EmptyInput("X has no columns".to_string()));
    }
    if n < p {
        return Err(PopTrendError::InvalidValue(format!(
            "need at least {} observations to fit {} coefficients, got {}",
            p, p, n
        )));
    }

    // Starting point: μ from the family, η = g(μ)
    let mut mu = family.initialize_mu(y);
    let mut eta = link.link(&mu);
    let mut deviance = family.deviance(y, &mu);

    for iteration in 1..=config.max_iterations {
        // Working weights: w_i = 1 / (V(μ_i) × g'(μ_i)²), clipped to a
        // sane range so near-boundary μ cannot destabilize the solve.
        let variance = family.variance(&mu);
        let link_deriv = link.derivative(&mu);
        let new_weights: Array1<f64> = variance
            .iter()
            .zip(link_deriv.iter())
            .map(|(&v, &d)| (1.0 / (v * d * d)).clamp(config.min_weight, 1e10))
            .collect();

        // Working response: z_i = η_i + (y_i - μ_i) × g'(μ_i)
        let working_response: Array1<f64> = eta
            .iter()
            .zip(y.iter())
            .zip(mu.iter())
            .zip(link_deriv.iter())
            .map(|(((&e, &yi), &mui), &d)| e + (yi - mui) * d)
            .collect();

        // Solve (X'WX)β = X'Wz
        let (new_coefficients, xtwx_inv) =
            solve_weighted_least_squares(x, &working_response, &new_weights)?;

        // Update η and μ, keeping μ inside the family's domain
        eta = x.dot(&new_coefficients);
        mu = family.clamp_mu(&link.inverse(&eta));

        let deviance_old = deviance;
        deviance = family.deviance(y, &mu);

        let rel_change = if deviance_old.abs() > 1e-10 {
            (deviance_old - deviance).abs() / deviance_old.abs()
        } else {
            (deviance_old - deviance).abs()
        };

        log::debug!(
            "IRLS iteration {}: deviance = {:.6}, rel_change = {:.2e}",
            iteration,
            deviance,
            rel_change
        );

        if rel_change < config.tolerance {
            return Ok(IRLSResult {
                coefficients: new_coefficients,
                fitted_values: mu,
                linear_predictor: eta,
                deviance,
                iterations: iteration,
                covariance_unscaled: xtwx_inv,
                irls_weights: new_weights,
            });
        }
    }

    Err(PopTrendError::FitConvergence {
        iterations: config.max_iterations,
        deviance,
    })
}

// =============================================================================
// Weighted Least Squares
// =============================================================================

/// Solve weighted least squares: minimize Σ w_i (z_i - x_i'β)².
///
/// Returns `(coefficients, (X'WX)⁻¹)`. Uses Cholesky on the normal
/// equations, falling back to LU when the matrix is not numerically
/// positive definite.
fn solve_weighted_least_squares(
    x: &Array2<f64>,
    z: &Array1<f64>,
    w: &Array1<f64>,
) -> Result<(Array1<f64>, Array2<f64>)> {
    let n = x.nrows();
    let p = x.ncols();

    // Scale each row of X and each z_i by sqrt(w_i), then the plain
    // normal equations of the scaled problem are the weighted ones.
    let sqrt_w: Vec<f64> = w.iter().map(|&wi| wi.sqrt()).collect();

    let mut x_weighted = DMatrix::zeros(n, p);
    for i in 0..n {
        for j in 0..p {
            x_weighted[(i, j)] = x[[i, j]] * sqrt_w[i];
        }
    }
    let z_weighted: DVector<f64> =
        DVector::from_iterator(n, z.iter().zip(sqrt_w.iter()).map(|(&zi, &swi)| zi * swi));

    let xtx = x_weighted.transpose() * &x_weighted;
    let xtz = x_weighted.transpose() * z_weighted;

    let coefficients = match xtx.clone().cholesky() {
        Some(chol) => chol.solve(&xtz),
        None => xtx.clone().lu().solve(&xtz).ok_or_else(|| {
            PopTrendError::LinearAlgebra(
                "failed to solve weighted least squares - design matrix may be singular"
                    .to_string(),
            )
        })?,
    };

    // (X'WX)⁻¹ for standard errors
    let xtx_inv = match xtx.clone().cholesky() {
        Some(chol) => {
            let identity = DMatrix::identity(p, p);
            chol.solve(&identity)
        }
        None => xtx.try_inverse().ok_or_else(|| {
            PopTrendError::LinearAlgebra(
                "X'WX is singular; standard errors cannot be computed".to_string(),
            )
        })?,
    };

    let coef_array: Array1<f64> = coefficients.iter().copied().collect();
    let mut cov_array = Array2::zeros((p, p));
    for i in 0..p {
        for j in 0..p {
            cov_array[[i, j]] = xtx_inv[(i, j)];
        }
    }

    Ok((coef_array, cov_array))
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::families::{GaussianFamily, PoissonFamily};
    use crate::links::{IdentityLink, LogLink};
    use ndarray::array;

    fn design(xs: &[f64]) -> Array2<f64> {
        let n = xs.len();
        let mut x = Array2::zeros((n, 2));
        for (i, &xi) in xs.iter().enumerate() {
            x[[i, 0]] = 1.0;
            x[[i, 1]] = xi;
        }
        x
    }

    #[test]
    fn gaussian_identity_matches_closed_form_ols() {
        // Exact line y = 2 + 3x: OLS must recover it exactly and IRLS
        // must converge on the first deviance check.
        let x = design(&[1.0, 2.0, 3.0, 4.0, 5.0]);
        let y = array![5.0, 8.0, 11.0, 14.0, 17.0];

        let result = fit_glm(&y, &x, &GaussianFamily, &IdentityLink, &IRLSConfig::default())
            .unwrap();

        assert!((result.coefficients[0] - 2.0).abs() < 1e-8);
        assert!((result.coefficients[1] - 3.0).abs() < 1e-8);
        assert!(result.iterations <= 2);
        assert!(result.deviance < 1e-12);
    }

    #[test]
    fn poisson_log_recovers_exponential_trend() {
        // y = exp(3 - 0.1x) evaluated exactly: the MLE is the true curve.
        let xs: Vec<f64> = (0..10).map(|i| i as f64).collect();
        let x = design(&xs);
        let y: Array1<f64> = xs.iter().map(|&t| (3.0 - 0.1 * t).exp()).collect();

        let result =
            fit_glm(&y, &x, &PoissonFamily, &LogLink, &IRLSConfig::default()).unwrap();

        assert!((result.coefficients[0] - 3.0).abs() < 1e-6);
        assert!((result.coefficients[1] + 0.1).abs() < 1e-6);
        assert!(result.fitted_values.iter().all(|&m| m > 0.0));
    }

    #[test]
    fn dimension_mismatch_is_an_error() {
        let x = design(&[1.0, 2.0, 3.0]);
        let y = array![1.0, 2.0]; // wrong length

        let result = fit_glm(&y, &x, &GaussianFamily, &IdentityLink, &IRLSConfig::default());
        assert!(matches!(
            result.unwrap_err(),
            PopTrendError::DimensionMismatch(_)
        ));
    }

    #[test]
    fn too_few_observations_is_an_error() {
        let x = design(&[1.0]);
        let y = array![4.0];
        let result = fit_glm(&y, &x, &PoissonFamily, &LogLink, &IRLSConfig::default());
        assert!(matches!(result.unwrap_err(), PopTrendError::InvalidValue(_)));
    }

    #[test]
    fn exhausted_iterations_surface_convergence_error() {
        // A single iteration cannot settle a genuinely non-linear Poisson
        // fit; the error must carry the bound it hit.
        let xs: Vec<f64> = (0..8).map(|i| i as f64).collect();
        let x = design(&xs);
        let y = array![71.0, 55.0, 48.0, 40.0, 29.0, 23.0, 19.0, 15.0];

        let config = IRLSConfig {
            max_iterations: 1,
            tolerance: 1e-12,
            ..IRLSConfig::default()
        };
        let err = fit_glm(&y, &x, &PoissonFamily, &LogLink, &config).unwrap_err();
        match err {
            PopTrendError::FitConvergence { iterations, deviance } => {
                assert_eq!(iterations, 1);
                assert!(deviance.is_finite());
            }
            other => panic!("expected FitConvergence, got {other}"),
        }
    }

    #[test]
    fn singular_design_is_a_linear_algebra_error() {
        // Two identical columns make X'WX singular.
        let mut x = Array2::zeros((4, 2));
        for i in 0..4 {
            x[[i, 0]] = 1.0;
            x[[i, 1]] = 1.0;
        }
        let y = array![1.0, 2.0, 3.0, 4.0];
        let result = fit_glm(&y, &x, &GaussianFamily, &IdentityLink, &IRLSConfig::default());
        assert!(matches!(
            result.unwrap_err(),
            PopTrendError::LinearAlgebra(_)
        ));
    }
}
