// =============================================================================
// Link Functions
// =============================================================================
//
// The link function g connects the linear predictor η = Xβ to the mean of
// the response: g(μ) = η. IRLS needs three things from a link: g itself,
// its inverse, and its derivative dη/dμ (used in the working weights and
// the working response).
//
// Two links cover this pipeline:
//
//   - Identity: η = μ. Paired with Gaussian for the OLS baseline.
//   - Log:      η = ln(μ). Paired with Poisson; it keeps μ = exp(η)
//     positive for any η and makes the slope multiplicative:
//     exp(slope) is the year-over-year change factor.
//
// =============================================================================

use ndarray::Array1;

/// A link function relating the linear predictor to the response mean.
pub trait Link {
    /// Short name used in summaries ("identity", "log").
    fn name(&self) -> &'static str;

    /// Apply the link: η = g(μ).
    fn link(&self, mu: &Array1<f64>) -> Array1<f64>;

    /// Apply the inverse link: μ = g⁻¹(η).
    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64>;

    /// Derivative dη/dμ evaluated at μ.
    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64>;

    /// Inverse link applied to a single linear-predictor value.
    fn inverse_scalar(&self, eta: f64) -> f64;
}

// =============================================================================
// Identity
// =============================================================================

/// Identity link: η = μ. No transformation at all.
#[derive(Debug, Clone, Copy)]
pub struct IdentityLink;

impl Link for IdentityLink {
    fn name(&self) -> &'static str {
        "identity"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        mu.clone()
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.clone()
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        Array1::ones(mu.len())
    }

    fn inverse_scalar(&self, eta: f64) -> f64 {
        eta
    }
}

// =============================================================================
// Log
// =============================================================================

/// Log link: η = ln(μ), μ = exp(η). The canonical link for Poisson.
#[derive(Debug, Clone, Copy)]
pub struct LogLink;

impl Link for LogLink {
    fn name(&self) -> &'static str {
        "log"
    }

    fn link(&self, mu: &Array1<f64>) -> Array1<f64> {
        // μ is clamped positive by the family before this is called
        mu.mapv(|m| m.max(1e-10).ln())
    }

    fn inverse(&self, eta: &Array1<f64>) -> Array1<f64> {
        eta.mapv(f64::exp)
    }

    fn derivative(&self, mu: &Array1<f64>) -> Array1<f64> {
        // dη/dμ = 1/μ
        mu.mapv(|m| 1.0 / m.max(1e-10))
    }

    fn inverse_scalar(&self, eta: f64) -> f64 {
        eta.exp()
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn identity_is_a_no_op() {
        let mu = array![1.0, -2.0, 3.5];
        let link = IdentityLink;
        assert_abs_diff_eq!(link.link(&mu)[1], -2.0, epsilon = 1e-12);
        assert_abs_diff_eq!(link.inverse(&mu)[2], 3.5, epsilon = 1e-12);
        assert_abs_diff_eq!(link.derivative(&mu)[0], 1.0, epsilon = 1e-12);
    }

    #[test]
    fn log_link_round_trips() {
        let mu = array![0.5, 1.0, 42.0];
        let link = LogLink;
        let eta = link.link(&mu);
        let back = link.inverse(&eta);
        for (m, b) in mu.iter().zip(back.iter()) {
            assert_abs_diff_eq!(m, b, epsilon = 1e-10);
        }
    }

    #[test]
    fn log_derivative_is_reciprocal() {
        let mu = array![2.0, 4.0];
        let d = LogLink.derivative(&mu);
        assert_abs_diff_eq!(d[0], 0.5, epsilon = 1e-12);
        assert_abs_diff_eq!(d[1], 0.25, epsilon = 1e-12);
    }

    #[test]
    fn log_inverse_scalar_is_exp() {
        assert_abs_diff_eq!(LogLink.inverse_scalar(0.0), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(LogLink.inverse_scalar(1.0), std::f64::consts::E, epsilon = 1e-12);
    }
}
