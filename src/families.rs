// =============================================================================
// Distribution Families
// =============================================================================
//
// A GLM needs to know how the response is distributed around its mean.
// That choice determines the variance function V(μ) and the deviance,
// which together drive the IRLS weights and the convergence check.
//
// This pipeline only ever needs two families:
//
//   - Gaussian: for the ordinary least squares baseline. Constant variance,
//     so IRLS collapses to plain least squares.
//   - Poisson:  for count data. Variance equals the mean, which is exactly
//     the behavior population counts show (bigger populations fluctuate
//     more in absolute terms).
//
// FOR ECOLOGISTS:
// ---------------
// The reason the linear baseline fails its residual checks on count data
// is the Gaussian family's constant-variance assumption. Switching to
// Poisson does not "fix" the data; it models the variance honestly.
//
// =============================================================================

use ndarray::Array1;

/// A response distribution family.
///
/// Implementations provide the variance function and deviance that IRLS
/// needs, plus helpers for keeping the mean in the family's valid domain.
pub trait Family {
    /// Short name used in summaries and μ clamping ("Gaussian", "Poisson").
    fn name(&self) -> &'static str;

    /// Variance function V(μ): how the response variance scales with the mean.
    fn variance(&self, mu: &Array1<f64>) -> Array1<f64>;

    /// One observation's deviance contribution, 2 × (saturated − model
    /// log-likelihood). Deviance residuals are its signed square root.
    fn unit_deviance(&self, y: f64, mu: f64) -> f64;

    /// Total deviance of the fit. Lower is better; IRLS converges on its
    /// change.
    fn deviance(&self, y: &Array1<f64>, mu: &Array1<f64>) -> f64 {
        y.iter()
            .zip(mu.iter())
            .map(|(&yi, &mui)| self.unit_deviance(yi, mui))
            .sum()
    }

    /// Starting values for μ before the first IRLS iteration.
    fn initialize_mu(&self, y: &Array1<f64>) -> Array1<f64>;

    /// Clamp μ to the family's valid domain after each update.
    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64>;
}

// =============================================================================
// Gaussian
// =============================================================================

/// Gaussian (normal) family. With the identity link this is ordinary
/// least squares, used here only for the diagnostic baseline fit.
#[derive(Debug, Clone, Copy)]
pub struct GaussianFamily;

impl Family for GaussianFamily {
    fn name(&self) -> &'static str {
        "Gaussian"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        Array1::ones(mu.len())
    }

    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        // Total deviance is the residual sum of squares
        (y - mu).powi(2)
    }

    fn initialize_mu(&self, y: &Array1<f64>) -> Array1<f64> {
        y.clone()
    }

    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        // Any real value is a valid Gaussian mean
        mu.clone()
    }
}

// =============================================================================
// Poisson
// =============================================================================

/// Poisson family for non-negative count responses. V(μ) = μ.
#[derive(Debug, Clone, Copy)]
pub struct PoissonFamily;

impl Family for PoissonFamily {
    fn name(&self) -> &'static str {
        "Poisson"
    }

    fn variance(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.clone()
    }

    fn unit_deviance(&self, y: f64, mu: f64) -> f64 {
        // 2 × [y·ln(y/μ) − (y − μ)], with the y = 0 limit 2μ. The loader
        // excludes zero counts, but the limit is handled anyway so the
        // family is safe on arbitrary count vectors.
        if y > 0.0 {
            2.0 * (y * (y / mu).ln() - (y - mu))
        } else {
            2.0 * mu
        }
    }

    fn initialize_mu(&self, y: &Array1<f64>) -> Array1<f64> {
        // Shrink each observation toward the sample mean so the starting
        // point is strictly positive even if some y_i are tiny.
        let y_mean = y.mean().unwrap_or(1.0).max(0.01);
        let raw: Array1<f64> = y.mapv(|yi| (yi + y_mean) / 2.0);
        self.clamp_mu(&raw)
    }

    fn clamp_mu(&self, mu: &Array1<f64>) -> Array1<f64> {
        // μ must stay strictly positive for log() and V(μ)
        mu.mapv(|x| x.max(1e-10))
    }
}

// =============================================================================
// Tests
// =============================================================================
