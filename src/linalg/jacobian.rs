#![allow(non_snake_case)]

//! Numerical Jacobians.
//!
//! Central finite differences stand in for automatic differentiation. Systems that know their
//! derivatives analytically can supply them instead, see [`NonlinearSystem::with_transition_jacobian`].
//!
//! [`NonlinearSystem::with_transition_jacobian`]: ../../models/struct.NonlinearSystem.html#method.with_transition_jacobian

use nalgebra::{DMatrix, DVector};

/// Jacobian of `f` at `x` by central differences.
///
/// Each step is scaled by `cbrt(epsilon) * max(1, |x_i|)`, which balances truncation against
/// rounding error. For functions linear in `x` the result is exact up to rounding.
pub fn jacobian<F>(f: F, x: &DVector<f64>) -> DMatrix<f64>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let n = x.len();
    let step = f64::EPSILON.cbrt();

    let mut J: Option<DMatrix<f64>> = None;
    let mut xh = x.clone();
    for i in 0..n {
        let xi = x[i];
        let h = step * xi.abs().max(1.);
        xh[i] = xi + h;
        let fp = f(&xh);
        xh[i] = xi - h;
        let fm = f(&xh);
        xh[i] = xi;

        // Use the representable difference of the two evaluation points
        let width = (xi + h) - (xi - h);
        let column = (fp - fm) / width;
        J.get_or_insert_with(|| DMatrix::zeros(column.len(), n))
            .set_column(i, &column);
    }

    J.unwrap_or_else(|| DMatrix::zeros(f(x).len(), 0))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn linear_map_is_exact() {
        let A = DMatrix::from_row_slice(2, 3, &[1., 2., 3., -4., 5., 0.5]);
        let f = |x: &DVector<f64>| &A * x;
        let J = jacobian(f, &DVector::from_vec(vec![10., -3., 0.]));
        assert_relative_eq!(J, A, epsilon = 1e-8);
    }

    #[test]
    fn nonlinear_map() {
        let f = |x: &DVector<f64>| DVector::from_vec(vec![x[0].sin() * x[1], x[1] * x[1]]);
        let x = DVector::from_vec(vec![0.3, 2.]);
        let J = jacobian(f, &x);
        let expect = DMatrix::from_row_slice(2, 2, &[0.3f64.cos() * 2., 0.3f64.sin(), 0., 4.]);
        assert_relative_eq!(J, expect, epsilon = 1e-7);
    }
}
