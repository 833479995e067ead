#![allow(non_snake_case)]

//! Symmetric factorisations of covariance matrices.
//!
//! Both the sigma point square root and the noise coupling are taken from the symmetric
//! eigen-decomposition M = V.diag(e).V', which also handles semi-definite matrices where
//! a Cholesky factor does not exist.

use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;

/// Eigenvalues below `-EIGEN_TOLERANCE * max(1, max|e|)` mark a matrix as not PSD.
/// Smaller negative values are rounding noise and are clamped to zero.
pub const EIGEN_TOLERANCE: f64 = 1e-9;

/// Eigen-decomposition of a PSD matrix, M = V.diag(e).V' with all e >= 0.
pub fn psd_eigen(M: &DMatrix<f64>, context: &str) -> Result<(DMatrix<f64>, DVector<f64>), FilterError> {
    if !M.is_square() {
        return Err(FilterError::dimension(M.nrows(), M.ncols(), context));
    }
    if M.iter().any(|m| !m.is_finite()) {
        return Err(FilterError::NumericalInstability {
            description: format!("{} has non-finite elements", context),
        });
    }

    let eigen = super::symmetrise(M).symmetric_eigen();

    let scale = eigen.eigenvalues.amax().max(1.);
    let min = eigen.eigenvalues.min();
    if min < -EIGEN_TOLERANCE * scale {
        return Err(FilterError::NotPositiveSemiDefinite {
            context: format!("{} (eigenvalue {:e})", context, min),
        });
    }

    let e = eigen.eigenvalues.map(|e| e.max(0.));
    Ok((eigen.eigenvectors, e))
}

/// Symmetric square root S of a PSD matrix M, S.S = M.
pub fn sqrtm(M: &DMatrix<f64>, context: &str) -> Result<DMatrix<f64>, FilterError> {
    let (V, e) = psd_eigen(M, context)?;
    let root = DMatrix::from_diagonal(&e.map(f64::sqrt));
    Ok(&V * root * V.transpose())
}
