#![allow(non_snake_case)]

//! Covariance state estimation.
//!
//! Linearised predict and observe operations on the Kalman state representation [`KalmanState`].
//! The Kalman state is simply the x,X pair the dimensions of both are the dimensions of the system.
//!
//! The linear Kalman state representation is used for non-linear systems by using linearised
//! forms of the system model: the Jacobians of the transition and observation functions.
//!
//! [`KalmanState`]: ../../models/struct.KalmanState.html

use log::trace;
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::linalg;
use crate::models::KalmanState;
use crate::noise::CorrelatedNoise;

impl KalmanState {
    /// State prediction with a linearised prediction model and additive noise.
    ///
    /// `x_pred` is the predicted state, `Fx` the Jacobian of the prediction at the previous state.
    pub fn predict_linearised(&mut self, x_pred: DVector<f64>, Fx: &DMatrix<f64>, noise: &CorrelatedNoise) {
        self.x = x_pred;
        // X = Fx.X.Fx' + Q
        self.X = Fx * &self.X * Fx.transpose() + &noise.Q;
    }

    /// Observation with a linearised observation model and additive noise.
    ///
    /// `s` is the innovation z - h(x), `Hx` the Jacobian of the observation at x.
    pub fn observe_innovation(
        &mut self,
        s: &DVector<f64>,
        Hx: &DMatrix<f64>,
        noise: &CorrelatedNoise,
    ) -> Result<(), FilterError> {
        let XHt = &self.X * Hx.transpose();
        // S = Hx.X.Hx' + R
        let S = Hx * &XHt + &noise.Q;

        // Inverse innovation covariance
        let SI = linalg::inverse_spd(&S, "innovation covariance")?;
        // Kalman gain, X.Hx'.SI
        let W = &XHt * SI;
        trace!("innovation norm {:.6e}", s.norm());

        // State update
        self.x += &W * s;
        // X = (I - W.Hx).X
        let n = self.x.len();
        self.X = (DMatrix::identity(n, n) - &W * Hx) * &self.X;

        Ok(())
    }
}
