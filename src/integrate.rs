//! Fixed step second order Runge-Kutta (Heun) integration.
//!
//! Used to simulate continuous time systems and to propagate the mean and covariance of the
//! continuous time Extended Kalman filter between observations.

use nalgebra::DVector;
use std::ops::{Add, Mul};

/// A single RK2 step of size `dt` on dx/dt = f(x).
///
/// k1 = f(x), k2 = f(x + dt.k1), x' = x + dt.(k1 + k2)/2
///
/// Generic over the state so the same step propagates vectors and covariance matrices.
pub fn rk2_step<T, F>(x: &T, f: F, dt: f64) -> T
where
    T: Clone + Add<T, Output = T> + Mul<f64, Output = T>,
    F: Fn(&T) -> T,
{
    let k1 = f(x);
    let k2 = f(&(x.clone() + k1.clone() * dt));
    x.clone() + (k1 + k2) * (dt / 2.)
}

/// Integrate dx/dt = f(x) from `x0` for `n_steps` states with step `dt`.
///
/// The history includes `x0` at index 0, so `n_steps - 1` steps are taken.
pub fn rk2<F>(x0: &DVector<f64>, f: F, n_steps: usize, dt: f64) -> Vec<DVector<f64>>
where
    F: Fn(&DVector<f64>) -> DVector<f64>,
{
    let mut simulation = Vec::with_capacity(n_steps);
    if n_steps == 0 {
        return simulation;
    }

    let mut xt = x0.clone();
    simulation.push(xt.clone());
    for _ in 1..n_steps {
        xt = rk2_step(&xt, &f, dt);
        simulation.push(xt.clone());
    }
    simulation
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use nalgebra::DMatrix;

    #[test]
    fn exponential_decay() {
        // dx/dt = -x, x(1) = e^-1
        let dt = 0.001;
        let sim = rk2(&DVector::from_element(1, 1.), |x| -x, 1001, dt);
        assert_eq!(sim.len(), 1001);
        assert_eq!(sim[0][0], 1.);
        assert_relative_eq!(sim[1000][0], (-1f64).exp(), max_relative = 1e-6);
    }

    #[test]
    fn exact_for_linear_in_time() {
        // dx/dt = 1 is integrated exactly by any Runge-Kutta method
        let sim = rk2(&DVector::from_element(2, 0.), |x| DVector::from_element(x.len(), 1.), 11, 0.1);
        assert_relative_eq!(sim[10][1], 1., epsilon = 1e-12);
    }

    #[test]
    fn zero_steps() {
        assert!(rk2(&DVector::from_element(1, 1.), |x| x.clone(), 0, 0.1).is_empty());
    }

    #[test]
    fn matrix_step() {
        let v = DMatrix::<f64>::identity(2, 2);
        let next = rk2_step(&v, |_| DMatrix::identity(2, 2), 0.5);
        assert_relative_eq!(next, DMatrix::<f64>::identity(2, 2) * 1.5);
    }
}
