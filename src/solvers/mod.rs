// =============================================================================
// GLM Solvers
// =============================================================================
//
// This module contains the fitting algorithm for the models in this
// pipeline: IRLS (Iteratively Reweighted Least Squares).
//
// HOW GLM FITTING WORKS (High-Level Overview)
// -------------------------------------------
//
// We want coefficients β that best explain the relationship:
//
//     g(E[Y]) = Xβ
//
// where Y is the population count, X is the design matrix (intercept and
// scaled year), g is the link function and E[Y] = μ.
//
// Unlike ordinary least squares we cannot solve this directly because
// the link makes it non-linear and the variance depends on μ. IRLS
// iterates: linearize around the current estimate, solve a weighted
// least-squares problem, repeat until the deviance stops moving.
//
// For the Gaussian/identity baseline the weights are constant, so the
// very first weighted least-squares solve IS the OLS solution and the
// loop converges immediately.
//
// =============================================================================

mod irls;

pub use irls::{fit_glm, IRLSConfig, IRLSResult};
