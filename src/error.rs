// =============================================================================
// Error Types
// =============================================================================
//
// All fallible operations in this library return `Result<T>` with the
// `PopTrendError` enum. The analysis is a one-shot batch run, so every
// variant is fatal to the pipeline - there is no retry logic anywhere.
//
// The two domain-specific variants:
//
//   - DataNotFound:   the species/country filter matched nothing (after the
//                     null/zero exclusion). Surfaced immediately.
//   - FitConvergence: IRLS ran out of iterations. Carries the iteration
//                     count and the last deviance so the failure can be
//                     diagnosed instead of silently returning a degenerate
//                     model.
//
// =============================================================================

use thiserror::Error;

/// Errors that can occur during a trend analysis run.
#[derive(Error, Debug)]
pub enum PopTrendError {
    /// The species/country selector matched zero usable observations.
    #[error("no observations found for {genus} {species} in {country}")]
    DataNotFound {
        genus: String,
        species: String,
        country: String,
    },

    /// IRLS did not converge within the configured iteration bound.
    #[error("GLM fit did not converge after {iterations} iterations (last deviance {deviance:.6})")]
    FitConvergence { iterations: usize, deviance: f64 },

    /// Input arrays have incompatible shapes.
    #[error("dimension mismatch: {0}")]
    DimensionMismatch(String),

    /// An input was empty where data is required.
    #[error("empty input: {0}")]
    EmptyInput(String),

    /// An input value is outside its valid domain.
    #[error("invalid value: {0}")]
    InvalidValue(String),

    /// The weighted least-squares system could not be solved.
    #[error("linear algebra error: {0}")]
    LinearAlgebra(String),

    /// Reading the dataset file failed.
    #[error("failed to read dataset: {0}")]
    Io(#[from] std::io::Error),

    /// Parsing the dataset file failed.
    #[error("failed to parse dataset: {0}")]
    Csv(#[from] csv::Error),

    /// Chart rendering failed.
    #[error("plot rendering failed: {0}")]
    Plot(String),
}

/// Convenience alias used throughout the library.
pub type Result<T> = std::result::Result<T, PopTrendError>;
