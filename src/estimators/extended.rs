#![allow(non_snake_case)]

//! Extended Kalman filter for discrete time systems.
//!
//! The transition and observation functions are linearised by their Jacobians at every step and
//! the linear Kalman recursion of [`covariance`] is applied to the linearised system.
//!
//! [`covariance`]: ../covariance/index.html

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::models::{initial_state, Estimator, FilterHistory, NonlinearSystem, Sampler, Trajectory};
use crate::random::Seed;

/// Extended Kalman filter of a nonlinear dynamical system with discrete observations.
#[derive(Debug, Clone)]
pub struct ExtendedKalmanFilter {
    system: NonlinearSystem,
}

impl ExtendedKalmanFilter {
    pub fn new<F, H>(fz: F, fx: H, Q: DMatrix<f64>, R: DMatrix<f64>) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Ok(Self::from_system(&NonlinearSystem::new(fz, fx, Q, R)?))
    }

    /// Filter an existing system. The system is shared, not copied.
    pub fn from_system(system: &NonlinearSystem) -> Self {
        ExtendedKalmanFilter { system: system.clone() }
    }
}

impl Estimator for ExtendedKalmanFilter {
    fn system(&self) -> &NonlinearSystem {
        &self.system
    }

    fn filter_with(
        &self,
        init_state: &DVector<f64>,
        observations: &[DVector<f64>],
        inputs: Option<&[DVector<f64>]>,
        init_covariance: Option<&DMatrix<f64>>,
    ) -> Result<FilterHistory, FilterError> {
        let system = &self.system;
        let Q = system.process_noise();
        let R = system.observation_noise();

        system.check_observations(observations, inputs)?;
        let input = |t: usize| inputs.map(|u| &u[t]);
        system.check_functions(init_state, if observations.is_empty() { None } else { input(0) })?;
        let initial = initial_state(system, init_state, init_covariance.unwrap_or(&Q.Q))?;
        debug!("EKF over {} observations, state_dim {}", observations.len(), system.state_dim());

        let mut state = initial.clone();
        let mut states = Vec::with_capacity(observations.len());
        for (t, z) in observations.iter().enumerate() {
            // Predict, linearised at the previous estimate
            let Gt = system.transition_jacobian(&state.x);
            let x_pred = system.transition(&state.x);
            state.predict_linearised(x_pred, &Gt, Q);

            // Update, linearised at the prediction
            let Ht = system.observation_jacobian(&state.x, input(t))?;
            let z_hat = system.observe(&state.x, input(t))?;
            state.observe_innovation(&(z - z_hat), &Ht, R)?;

            trace!("EKF step {} x {:?}", t, state.x.as_slice());
            states.push(state.clone());
        }

        Ok(FilterHistory { initial, states })
    }
}

impl Sampler for ExtendedKalmanFilter {
    fn sample(&self, seed: Seed, x0: &DVector<f64>, n_steps: usize) -> Result<Trajectory, FilterError> {
        self.system.sample(seed, x0, n_steps)
    }
}
