// =============================================================================
// PopTrend Library
// =============================================================================
//
// This is the entry point for the population trend analysis library.
// It fits a Poisson-family GLM (log link) to a time series of population
// counts and renders the fitted trend with a confidence ribbon.
//
// STRUCTURE:
// ----------
// The library is organized into modules, each handling a specific concern:
//
//   - data:        Loading/filtering the wide-format survey table
//   - families:    Distribution families (Gaussian for the baseline, Poisson)
//   - links:       Link functions (Identity, Log)
//   - solvers:     Fitting algorithm (IRLS - Iteratively Reweighted Least Squares)
//   - model:       Fitted-model types and coefficient interpretation
//   - inference:   Statistical inference (p-values, confidence intervals)
//   - diagnostics: Baseline residual diagnostics and normality testing
//   - predict:     Predictions with delta-method confidence intervals
//   - plot:        SVG rendering of the trend and diagnostic charts
//   - pipeline:    One-shot batch orchestration of all stages
//   - error:       Error types used throughout the library
//
// FOR MAINTAINERS:
// ----------------
// When adding new functionality:
//   1. Add it to the appropriate module (or create a new one)
//   2. Write tests in that module (see existing tests for examples)
//   3. Re-export public items here so users can access them easily
//
// =============================================================================

// Declare our modules - each is in its own file or folder
pub mod data;
pub mod diagnostics;
pub mod error;
pub mod families;
pub mod inference;
pub mod links;
pub mod model;
pub mod pipeline;
pub mod plot;
pub mod predict;
pub mod solvers;

// Re-export commonly used items at the top level for convenience
// Users can write `use poptrend::PoissonFamily` instead of
// `use poptrend::families::PoissonFamily`
pub use data::{load_observations, Observation, SpeciesSelector, BASE_YEAR};
pub use diagnostics::{shapiro_wilk, BaselineDiagnostics, ShapiroWilk};
pub use error::{PopTrendError, Result};
pub use families::{Family, GaussianFamily, PoissonFamily};
pub use inference::{confidence_interval_z, pvalue_z, significance_stars};
pub use links::{IdentityLink, Link, LogLink};
pub use model::{fit_baseline, fit_poisson_trend, FittedModel};
pub use pipeline::{analyze, analyze_and_render, TrendReport};
pub use plot::PlotConfig;
pub use predict::{predict, Prediction};
pub use solvers::{fit_glm, IRLSConfig, IRLSResult};
