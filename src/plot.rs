// =============================================================================
// Chart Rendering
// =============================================================================
//
// Two static SVG charts, both pure functions of already-computed values:
//
// - render_trend: the headline figure. Observed log(population) as
//   points, the fitted log curve as a line, and the confidence band as a
//   shaded ribbon. Axes follow the source figure: "Year of study" /
//   "log(Population)", with the x axis in calendar years.
//
// - render_baseline_diagnostics: the classic 2×2 residual panel for the
//   OLS baseline (fitted-vs-residual, normal Q-Q, scale-location,
//   residual-vs-leverage). Qualitative by design - no thresholds drawn.
//
// Everything is plotted in log space because that is where the Poisson
// trend is linear; the ribbon bounds are the log of the back-transformed
// interval, so the band remains consistent with the printed predictions.
//
// =============================================================================

use std::path::Path;

use plotters::prelude::*;

use crate::data::{Observation, BASE_YEAR};
use crate::diagnostics::BaselineDiagnostics;
use crate::error::{PopTrendError, Result};
use crate::predict::Prediction;

/// Chart dimensions and caption.
#[derive(Debug, Clone)]
pub struct PlotConfig {
    pub width: u32,
    pub height: u32,
    pub title: String,
}

impl Default for PlotConfig {
    fn default() -> Self {
        Self {
            width: 900,
            height: 600,
            title: "Population trend".to_string(),
        }
    }
}

fn plot_err<E: std::fmt::Display>(e: E) -> PopTrendError {
    PopTrendError::Plot(e.to_string())
}

/// Min/max of a value sequence, padded by 5% on each side so points
/// never sit on the frame.
fn padded_range(values: impl Iterator<Item = f64>) -> (f64, f64) {
    let mut min = f64::INFINITY;
    let mut max = f64::NEG_INFINITY;
    for v in values {
        if v.is_finite() {
            min = min.min(v);
            max = max.max(v);
        }
    }
    if !min.is_finite() || !max.is_finite() {
        return (0.0, 1.0);
    }
    let pad = ((max - min) * 0.05).max(1e-6);
    (min - pad, max + pad)
}

// =============================================================================
// Trend chart
// =============================================================================

/// Render the fitted trend over the observations as an SVG file.
///
/// # Errors
/// [`PopTrendError::EmptyInput`] if either sequence is empty;
/// [`PopTrendError::Plot`] if the backend fails.
pub fn render_trend(
    observations: &[Observation],
    predictions: &[Prediction],
    config: &PlotConfig,
    path: &Path,
) -> Result<()> {
    if observations.is_empty() {
        return Err(PopTrendError::EmptyInput("no observations to plot".to_string()));
    }
    if predictions.is_empty() {
        return Err(PopTrendError::EmptyInput("no predictions to plot".to_string()));
    }

    // Everything is drawn in (calendar year, log population) space
    let obs_points: Vec<(f64, f64)> = observations
        .iter()
        .map(|o| (f64::from(o.year), o.population.ln()))
        .collect();
    let line_points: Vec<(f64, f64)> = predictions
        .iter()
        .map(|p| (f64::from(p.scaled_year + BASE_YEAR), p.predicted.ln()))
        .collect();
    let upper: Vec<(f64, f64)> = predictions
        .iter()
        .map(|p| (f64::from(p.scaled_year + BASE_YEAR), p.conf_high.ln()))
        .collect();
    let lower: Vec<(f64, f64)> = predictions
        .iter()
        .map(|p| (f64::from(p.scaled_year + BASE_YEAR), p.conf_low.ln()))
        .collect();

    let (x_min, x_max) = padded_range(
        obs_points
            .iter()
            .chain(line_points.iter())
            .map(|&(x, _)| x),
    );
    let (y_min, y_max) = padded_range(
        obs_points
            .iter()
            .chain(upper.iter())
            .chain(lower.iter())
            .map(|&(_, y)| y),
    );

    let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;

    let mut chart = ChartBuilder::on(&root)
        .caption(&config.title, ("sans-serif", 24))
        .margin(16)
        .x_label_area_size(44)
        .y_label_area_size(56)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc("Year of study")
        .y_desc("log(Population)")
        .draw()
        .map_err(plot_err)?;

    // Ribbon: upper bound left-to-right, lower bound back
    let mut ribbon = upper.clone();
    ribbon.extend(lower.iter().rev().copied());
    chart
        .draw_series(std::iter::once(Polygon::new(ribbon, BLUE.mix(0.2))))
        .map_err(plot_err)?;

    chart
        .draw_series(LineSeries::new(line_points, BLUE.stroke_width(2)))
        .map_err(plot_err)?;

    chart
        .draw_series(
            obs_points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 3, BLACK.filled())),
        )
        .map_err(plot_err)?;

    root.present().map_err(plot_err)?;
    Ok(())
}

// =============================================================================
// Diagnostic panel
// =============================================================================

/// Render the four baseline residual panels into one SVG file.
pub fn render_baseline_diagnostics(
    diagnostics: &BaselineDiagnostics,
    config: &PlotConfig,
    path: &Path,
) -> Result<()> {
    let root = SVGBackend::new(path, (config.width, config.height)).into_drawing_area();
    root.fill(&WHITE).map_err(plot_err)?;
    let panels = root.split_evenly((2, 2));

    let fitted: Vec<f64> = diagnostics.fitted.to_vec();

    scatter_panel(
        &panels[0],
        "Residuals vs Fitted",
        "Fitted values",
        "Residuals",
        &pair(&fitted, &diagnostics.residuals.to_vec()),
        None,
    )?;

    // Q-Q panel gets the y = x reference line
    let qq = pair(
        &diagnostics.theoretical_quantiles,
        &diagnostics.sorted_std_residuals,
    );
    let q_lo = diagnostics
        .theoretical_quantiles
        .first()
        .copied()
        .unwrap_or(-1.0);
    let q_hi = diagnostics
        .theoretical_quantiles
        .last()
        .copied()
        .unwrap_or(1.0);
    scatter_panel(
        &panels[1],
        "Normal Q-Q",
        "Theoretical quantiles",
        "Standardized residuals",
        &qq,
        Some(vec![(q_lo, q_lo), (q_hi, q_hi)]),
    )?;

    scatter_panel(
        &panels[2],
        "Scale-Location",
        "Fitted values",
        "sqrt(|standardized residuals|)",
        &pair(&fitted, &diagnostics.sqrt_abs_std_residuals.to_vec()),
        None,
    )?;

    scatter_panel(
        &panels[3],
        "Residuals vs Leverage",
        "Leverage",
        "Standardized residuals",
        &pair(
            &diagnostics.leverage.to_vec(),
            &diagnostics.std_residuals.to_vec(),
        ),
        None,
    )?;

    root.present().map_err(plot_err)?;
    Ok(())
}

fn pair(xs: &[f64], ys: &[f64]) -> Vec<(f64, f64)> {
    xs.iter().copied().zip(ys.iter().copied()).collect()
}

fn scatter_panel(
    area: &DrawingArea<SVGBackend<'_>, plotters::coord::Shift>,
    title: &str,
    x_label: &str,
    y_label: &str,
    points: &[(f64, f64)],
    reference_line: Option<Vec<(f64, f64)>>,
) -> Result<()> {
    let (x_min, x_max) = padded_range(points.iter().map(|&(x, _)| x));
    let (y_min, y_max) = padded_range(points.iter().map(|&(_, y)| y));

    let mut chart = ChartBuilder::on(area)
        .caption(title, ("sans-serif", 16))
        .margin(10)
        .x_label_area_size(32)
        .y_label_area_size(40)
        .build_cartesian_2d(x_min..x_max, y_min..y_max)
        .map_err(plot_err)?;

    chart
        .configure_mesh()
        .x_desc(x_label)
        .y_desc(y_label)
        .draw()
        .map_err(plot_err)?;

    if let Some(line) = reference_line {
        chart
            .draw_series(LineSeries::new(line, RED.mix(0.6)))
            .map_err(plot_err)?;
    }

    chart
        .draw_series(
            points
                .iter()
                .map(|&(x, y)| Circle::new((x, y), 2, BLACK.filled())),
        )
        .map_err(plot_err)?;

    Ok(())
}

// =============================================================================
// Tests
// =============================================================================
