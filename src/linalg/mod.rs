#![allow(non_snake_case)]

//! Linear algebra support for the estimators.
//!
//! Dense products, inversion and decompositions come from nalgebra; this module adds the
//! checks and factorisations the filters need on top.

pub mod jacobian;
pub mod rcond;
pub mod sqrtm;

use nalgebra::DMatrix;

use crate::error::FilterError;

/// Relative tolerance for symmetry checks of user supplied covariances.
pub const SYMMETRY_TOLERANCE: f64 = 1e-9;

/// Checks M is square and symmetric, returning its dimension.
pub fn check_covariance(M: &DMatrix<f64>, context: &str) -> Result<usize, FilterError> {
    if !M.is_square() {
        return Err(FilterError::dimension(M.nrows(), M.ncols(), format!("{} (columns)", context)));
    }
    let scale = M.amax().max(1.);
    for i in 0..M.nrows() {
        for j in 0..i {
            if (M[(i, j)] - M[(j, i)]).abs() > SYMMETRY_TOLERANCE * scale {
                return Err(FilterError::NotSymmetric {
                    context: format!("{} at ({}, {})", context, i, j),
                });
            }
        }
    }
    Ok(M.nrows())
}

/// Inverse of a symmetric positive definite matrix.
///
/// A singular (or indefinite) matrix has no Cholesky factor and is reported as singular.
pub fn inverse_spd(M: &DMatrix<f64>, context: &str) -> Result<DMatrix<f64>, FilterError> {
    let SI = M
        .clone()
        .cholesky()
        .ok_or_else(|| FilterError::SingularMatrix {
            context: context.to_string(),
        })?
        .inverse();
    if SI.iter().any(|v| !v.is_finite()) {
        return Err(FilterError::SingularMatrix {
            context: format!("{} (non-finite inverse)", context),
        });
    }
    Ok(SI)
}

/// Symmetric part of M, (M + M') / 2.
pub fn symmetrise(M: &DMatrix<f64>) -> DMatrix<f64> {
    (M + M.transpose()) * 0.5
}
