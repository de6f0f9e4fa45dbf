// =============================================================================
// Statistical Inference
// =============================================================================
//
// Shared distribution helpers for the model and prediction layers:
//   - P-values: test whether a coefficient differs from zero
//   - Confidence intervals: range estimates on the link scale
//   - Critical values and normal quantiles (Q-Q panel, Shapiro-Wilk)
//
// FOR ECOLOGISTS:
// ---------------
// The slope of the Poisson trend lives in log space. Its confidence
// interval is computed here on the link scale; exponentiating the
// endpoints gives the interval for the year-over-year change factor.
//
// IMPORTANT CAVEATS:
// - Statistical significance ≠ ecological significance
// - These are Wald (z-based) intervals; with a dozen survey years they
//   are approximate, which is fine for the qualitative use they get here
//
// =============================================================================

use statrs::distribution::{ContinuousCDF, Normal};

/// Critical value z for a two-sided interval at the given confidence
/// level (e.g. 0.95 → 1.959964).
pub fn z_critical(confidence: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).unwrap();
    let alpha = 1.0 - confidence;
    normal.inverse_cdf(1.0 - alpha / 2.0)
}

/// Two-tailed p-value from a z-statistic (coefficient / standard error).
///
/// P(|Z| > |z|) under the standard normal. Returns NaN for non-finite
/// input.
pub fn pvalue_z(z: f64) -> f64 {
    if !z.is_finite() {
        return f64::NAN;
    }
    let normal = Normal::new(0.0, 1.0).unwrap();
    2.0 * (1.0 - normal.cdf(z.abs()))
}

/// Confidence interval `estimate ± z × std_error`.
///
/// For a log-link coefficient, exponentiate both endpoints to get the
/// interval on the multiplicative scale.
///
/// # Returns
/// `(lower_bound, upper_bound)`, or `(NaN, NaN)` for degenerate input.
pub fn confidence_interval_z(estimate: f64, std_error: f64, confidence: f64) -> (f64, f64) {
    if !estimate.is_finite() || !std_error.is_finite() || std_error <= 0.0 {
        return (f64::NAN, f64::NAN);
    }
    let margin = z_critical(confidence) * std_error;
    (estimate - margin, estimate + margin)
}

/// Standard normal quantile function Φ⁻¹(p).
pub fn normal_quantile(p: f64) -> f64 {
    let normal = Normal::new(0.0, 1.0).unwrap();
    normal.inverse_cdf(p)
}

/// Expected normal order statistics for a sample of size `n`, using the
/// Blom plotting positions Φ⁻¹((i − 3/8) / (n + 1/4)).
///
/// These are the theoretical quantiles of the Q-Q panel and the `m`
/// vector of the Shapiro-Wilk approximation.
pub fn normal_quantiles(n: usize) -> Vec<f64> {
    (1..=n)
        .map(|i| normal_quantile((i as f64 - 0.375) / (n as f64 + 0.25)))
        .collect()
}

/// Significance stars for a p-value, following the usual summary-table
/// convention:
/// - `***` : p < 0.001
/// - `**`  : p < 0.01
/// - `*`   : p < 0.05
/// - `.`   : p < 0.1
/// - blank otherwise
pub fn significance_stars(pvalue: f64) -> &'static str {
    if pvalue < 0.001 {
        "***"
    } else if pvalue < 0.01 {
        "**"
    } else if pvalue < 0.05 {
        "*"
    } else if pvalue < 0.1 {
        "."
    } else {
        ""
    }
}

// =============================================================================
// Tests
// =============================================================================
