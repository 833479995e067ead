//! Reference models shared by the estimator tests.
//!
//! A plain linear Kalman filter written directly from the textbook recursion is used as ground truth
//! for the nonlinear estimators applied to linear systems.

#![allow(non_snake_case, dead_code)]

use nalgebra::{DMatrix, DVector};

use nlds_estimate::models::NonlinearSystem;

/// Linear Gaussian system x' = F.x + w, z = H.x + v.
pub struct LinearSystem {
    pub F: DMatrix<f64>,
    pub H: DMatrix<f64>,
    pub Q: DMatrix<f64>,
    pub R: DMatrix<f64>,
}

impl LinearSystem {
    pub fn nonlinear(&self) -> NonlinearSystem {
        let F = self.F.clone();
        let H = self.H.clone();
        NonlinearSystem::new(
            move |x: &DVector<f64>| &F * x,
            move |x: &DVector<f64>| &H * x,
            self.Q.clone(),
            self.R.clone(),
        )
        .unwrap()
    }

    /// Kalman filter means and covariances after each observation.
    pub fn kalman_filter(
        &self,
        x0: &DVector<f64>,
        X0: &DMatrix<f64>,
        observations: &[DVector<f64>],
    ) -> Vec<(DVector<f64>, DMatrix<f64>)> {
        let n = x0.len();
        let mut x = x0.clone();
        let mut X = X0.clone();
        let mut history = Vec::new();
        for z in observations {
            x = &self.F * &x;
            X = &self.F * &X * self.F.transpose() + &self.Q;

            let S = &self.H * &X * self.H.transpose() + &self.R;
            let K = &X * self.H.transpose() * S.try_inverse().unwrap();
            x += &K * (z - &self.H * &x);
            X = (DMatrix::identity(n, n) - &K * &self.H) * &X;
            history.push((x.clone(), X.clone()));
        }
        history
    }
}

pub fn scalar_system() -> LinearSystem {
    LinearSystem {
        F: DMatrix::from_element(1, 1, 0.9),
        H: DMatrix::from_element(1, 1, 1.),
        Q: DMatrix::from_element(1, 1, 0.01),
        R: DMatrix::from_element(1, 1, 0.1),
    }
}

/// Constant velocity model observed in position.
pub fn constant_velocity() -> LinearSystem {
    let dt: f64 = 0.1;
    LinearSystem {
        F: DMatrix::from_row_slice(2, 2, &[1., dt, 0., 1.]),
        H: DMatrix::from_row_slice(1, 2, &[1., 0.]),
        Q: DMatrix::from_row_slice(2, 2, &[dt.powi(3) / 3., dt.powi(2) / 2., dt.powi(2) / 2., dt]) * 0.5,
        R: DMatrix::from_element(1, 1, 0.05),
    }
}

pub const PENDULUM_DT: f64 = 0.1;
pub const GRAVITY: f64 = 9.8;

/// Pendulum discretised by semi-implicit Euler, state [angle, angular rate], observed through sin(angle).
pub fn pendulum(q: f64, r: f64) -> NonlinearSystem {
    let dt = PENDULUM_DT;
    let Q = DMatrix::from_row_slice(2, 2, &[dt.powi(3) / 3., dt.powi(2) / 2., dt.powi(2) / 2., dt]) * q;
    NonlinearSystem::new(
        move |x: &DVector<f64>| {
            let rate = x[1] - GRAVITY * x[0].sin() * dt;
            DVector::from_vec(vec![x[0] + rate * dt, rate])
        },
        |x: &DVector<f64>| DVector::from_element(1, x[0].sin()),
        Q,
        DMatrix::from_element(1, 1, r),
    )
    .unwrap()
}

/// Asserts a covariance is symmetric and positive semi-definite.
pub fn assert_covariance(X: &DMatrix<f64>) {
    let scale = X.amax().max(1.);
    assert!((X - X.transpose()).amax() <= 1e-9 * scale, "not symmetric {}", X);
    let min = X.clone().symmetric_eigen().eigenvalues.min();
    assert!(min >= -1e-9 * scale, "not PSD {}", X);
}
