// =============================================================================
// Prediction with Confidence Intervals
// =============================================================================
//
// Given a fitted model, compute the expected population and a confidence
// band over a range of scaled years. Deterministic: same model, same
// query points, same predictions.
//
// HOW THE INTERVAL IS COMPUTED (Delta Method on the Link Scale)
// -------------------------------------------------------------
// For a query point x = (1, t) the linear predictor is η = x'β with
//
//     Var(η̂) = x' Σ x = Σ₀₀ + 2t·Σ₀₁ + t²·Σ₁₁
//
// where Σ is the scaled coefficient covariance from the fit. The
// interval is built where the sampling distribution is approximately
// normal - on the link scale - and then back-transformed:
//
//     [g⁻¹(η − z·se), g⁻¹(η + z·se)]
//
// For the log link that exponentiation keeps both bounds positive and
// makes the band asymmetric around the prediction, exactly like
// ggpredict-style outputs.
//
// Var(η̂) is quadratic in t, so the band is narrowest near the weighted
// center of the observed years and widens monotonically away from it.
//
// =============================================================================

use crate::error::{PopTrendError, Result};
use crate::model::FittedModel;

/// One predicted point with its confidence bounds, all on the response
/// (population) scale.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Query point, years since the base year.
    pub scaled_year: i32,
    /// Expected population g⁻¹(intercept + slope × scaled_year).
    pub predicted: f64,
    /// Lower confidence bound.
    pub conf_low: f64,
    /// Upper confidence bound.
    pub conf_high: f64,
}

/// Predict expected population with confidence bounds at each query
/// point.
///
/// # Arguments
/// * `model` - A fitted trend model
/// * `scaled_years` - Query points (typically the observed range)
/// * `confidence` - Confidence level in (0, 1), e.g. 0.95
///
/// # Errors
/// [`PopTrendError::InvalidValue`] if `confidence` is outside (0, 1) or
/// the query range is empty.
pub fn predict(
    model: &FittedModel,
    scaled_years: impl IntoIterator<Item = i32>,
    confidence: f64,
) -> Result<Vec<Prediction>> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(PopTrendError::InvalidValue(format!(
            "confidence must be in (0, 1), got {confidence}"
        )));
    }

    let z = crate::inference::z_critical(confidence);
    let cov = &model.covariance;

    let predictions: Vec<Prediction> = scaled_years
        .into_iter()
        .map(|t| {
            let tf = f64::from(t);
            let eta = model.intercept() + model.slope() * tf;
            // x'Σx for x = (1, t)
            let var_eta = cov[[0, 0]] + 2.0 * tf * cov[[0, 1]] + tf * tf * cov[[1, 1]];
            let se = var_eta.max(0.0).sqrt();
            Prediction {
                scaled_year: t,
                predicted: model.expected_at(tf),
                conf_low: inverse_link(model, eta - z * se),
                conf_high: inverse_link(model, eta + z * se),
            }
        })
        .collect();

    if predictions.is_empty() {
        return Err(PopTrendError::EmptyInput(
            "no scaled_year query points supplied".to_string(),
        ));
    }

    Ok(predictions)
}

fn inverse_link(model: &FittedModel, eta: f64) -> f64 {
    match model.link {
        "log" => eta.exp(),
        _ => eta,
    }
}

// =============================================================================
// Tests
// =============================================================================
