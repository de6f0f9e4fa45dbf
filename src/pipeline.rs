// =============================================================================
// Analysis Pipeline
// =============================================================================
//
// One-shot batch orchestration of the whole analysis:
//
//     load → fit baseline → baseline diagnostics → fit Poisson GLM
//          → predict over the observed range → render
//
// Strictly sequential and single-threaded: each stage fully consumes its
// input and produces an immutable output before the next begins. There
// is nothing to retry - any stage error aborts the run.
//
// The baseline fit and its diagnostics are side outputs: the Poisson
// trend never depends on them. They are carried in the report so a
// caller can show WHY the linear model was rejected.
//
// =============================================================================

use std::path::Path;

use crate::data::{load_observations, Observation, SpeciesSelector};
use crate::diagnostics::BaselineDiagnostics;
use crate::error::Result;
use crate::families::GaussianFamily;
use crate::model::{fit_baseline, fit_poisson_trend, FittedModel};
use crate::plot::{render_baseline_diagnostics, render_trend, PlotConfig};
use crate::predict::{predict, Prediction};
use crate::solvers::IRLSConfig;

/// Everything one analysis run produces, immutable once built.
#[derive(Debug, Clone)]
pub struct TrendReport {
    /// The filtered long-form observations, sorted by year.
    pub observations: Vec<Observation>,
    /// The OLS baseline (diagnostic only).
    pub baseline: FittedModel,
    /// Residual diagnostics of the baseline, including Shapiro-Wilk.
    pub diagnostics: BaselineDiagnostics,
    /// The Poisson/log trend model.
    pub model: FittedModel,
    /// Predictions with confidence bounds over the observed year range.
    pub predictions: Vec<Prediction>,
}

/// Run the full analysis for one species/country.
///
/// `confidence` is the level of the prediction band (and any coefficient
/// intervals derived from the report), typically 0.95.
pub fn analyze(
    dataset: &Path,
    selector: &SpeciesSelector,
    config: &IRLSConfig,
    confidence: f64,
) -> Result<TrendReport> {
    log::info!(
        "analyzing {} {} in {} from {}",
        selector.genus,
        selector.species,
        selector.country,
        dataset.display()
    );

    let observations = load_observations(dataset, selector)?;
    log::info!("{} usable observations", observations.len());

    let baseline = fit_baseline(&observations, config)?;
    let diagnostics = BaselineDiagnostics::compute(&baseline, &GaussianFamily)?;
    log::info!(
        "baseline residual normality: W = {:.4}, p = {:.4}",
        diagnostics.shapiro.statistic,
        diagnostics.shapiro.p_value
    );

    let model = fit_poisson_trend(&observations, config)?;
    log::info!(
        "annual change factor {:.4} (annual decline {:.2}%)",
        model.annual_change_factor(),
        model.annual_decline() * 100.0
    );

    // Predict across the observed scaled-year range, inclusive
    let first = observations.first().map(|o| o.scaled_year).unwrap_or(0);
    let last = observations.last().map(|o| o.scaled_year).unwrap_or(0);
    let predictions = predict(&model, first..=last, confidence)?;

    Ok(TrendReport {
        observations,
        baseline,
        diagnostics,
        model,
        predictions,
    })
}

/// Run [`analyze`] and render the trend chart (and, when a path is
/// given, the baseline diagnostic panel) as SVG files.
pub fn analyze_and_render(
    dataset: &Path,
    selector: &SpeciesSelector,
    config: &IRLSConfig,
    confidence: f64,
    plot_config: &PlotConfig,
    trend_svg: &Path,
    diagnostics_svg: Option<&Path>,
) -> Result<TrendReport> {
    let report = analyze(dataset, selector, config, confidence)?;

    render_trend(&report.observations, &report.predictions, plot_config, trend_svg)?;
    log::info!("trend chart written to {}", trend_svg.display());

    if let Some(path) = diagnostics_svg {
        render_baseline_diagnostics(&report.diagnostics, plot_config, path)?;
        log::info!("diagnostic panel written to {}", path.display());
    }

    Ok(report)
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PopTrendError;
    use std::io::Write;

    const DATASET: &str = "\
genus,species,country,X1974,X1977,X1980,X1984,X1987,X1990
Gorilla,beringei,Rwanda,71,60,42,38,26,18
Gorilla,beringei,Uganda,0,,300,310,,330
";

    fn write_dataset(dir: &tempfile::TempDir) -> std::path::PathBuf {
        let path = dir.path().join("surveys.csv");
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(DATASET.as_bytes()).unwrap();
        path
    }

    #[test]
    fn full_run_produces_a_declining_trend_report() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let selector = SpeciesSelector::new("Gorilla", "beringei", "Rwanda");

        let report = analyze(&dataset, &selector, &IRLSConfig::default(), 0.95).unwrap();

        assert_eq!(report.observations.len(), 6);
        assert!(report.model.slope() < 0.0);
        assert!(report.model.annual_change_factor() < 1.0);
        // Predictions cover the observed scaled-year range inclusively
        assert_eq!(report.predictions.first().unwrap().scaled_year, 0);
        assert_eq!(report.predictions.last().unwrap().scaled_year, 16);
        // Baseline is diagnostic-only but still fit
        assert_eq!(report.baseline.family, "Gaussian");
    }

    #[test]
    fn unknown_population_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let dataset = write_dataset(&dir);
        let selector = SpeciesSelector::new("Panthera", "leo", "Kenya");

        let err = analyze(&dataset, &selector, &IRLSConfig::default(), 0.95).unwrap_err();
        assert!(matches!(err, PopTrendError::DataNotFound { .. }));
    }
}
