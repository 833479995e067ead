//! Reciprocal condition numbers from diagonals.
//!
//! Cheap screening of covariance matrices before they enter a filter recursion.
//!
//! The condition number is defined from a matrix norm:
//!  choose the max diagonal element as the norm of the original matrix,
//!  assume the norm of the inverse is the min element, therefore rcond = min/max.
//!
//! Conventions:
//!  0 for a semi-definite (a zero element) or empty matrix,
//!  0 for max and min infinite,
//!  < 0 for a negative element or any NaN element.
//! By definition rcond <= 1 as min <= max.

use nalgebra::DMatrix;

use crate::error::FilterError;

/// Reciprocal condition number estimated from the diagonal of a symmetric matrix.
pub fn rcond_symmetric(sm: &DMatrix<f64>) -> f64 {
    let n = sm.nrows().min(sm.ncols());
    rcond_diagonal((0..n).map(|i| sm[(i, i)]))
}

fn rcond_diagonal(diagonal: impl Iterator<Item = f64>) -> f64 {
    let mut mind = f64::INFINITY;
    let mut maxd = f64::NEG_INFINITY;
    let mut empty = true;

    for d in diagonal {
        empty = false;
        if d.is_nan() {
            return -1.;
        }
        mind = mind.min(d);
        maxd = maxd.max(d);
    }

    if empty {
        0.
    } else {
        rcond_min_max(mind, maxd)
    }
}

fn rcond_min_max(mind: f64, maxd: f64) -> f64 {
    if mind < 0. {
        // negative matrix, mind does not represent a rcond
        mind
    } else {
        let rcond = mind / maxd;
        if rcond.is_nan() {
            // (mind == maxd) == (zero or infinity)
            0.
        } else {
            rcond
        }
    }
}

/// Checks the reciprocal condition number is >= 0.
///
/// NaN values are never >= 0.
pub fn check_non_negative(rcond: f64, context: &str) -> Result<f64, FilterError> {
    if rcond >= 0. {
        Ok(rcond)
    } else {
        Err(FilterError::NotPositiveSemiDefinite {
            context: format!("{} (rcond {})", context, rcond),
        })
    }
}
