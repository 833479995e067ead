#![allow(non_snake_case)]

//! Extended Kalman filter for continuous time systems observed at discrete times.
//!
//! The transition function of the system is the time derivative dx/dt = f(x). Between two
//! observations the mean and the covariance are integrated with [`rk2`] over `jump_size` fine
//! steps of length `dt`; each observation then gets a discrete Extended Kalman update.
//!
//! [`rk2`]: ../../integrate/fn.rk2.html

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::integrate::{rk2, rk2_step};
use crate::models::{initial_state, FilterHistory, NonlinearSystem, Trajectory};
use crate::random::Seed;

/// Extended Kalman filter of a continuous time nonlinear system with discrete observations.
#[derive(Debug, Clone)]
pub struct ContinuousExtendedKalmanFilter {
    system: NonlinearSystem,
}

/// Largest number of fine integration steps, or of observations, a sampling grid may have.
pub const MAX_FINE_STEPS: usize = u32::MAX as usize;

/// Fine step counts for sampling `n_observations` points from `ceil(T/dt)` integration steps.
///
/// Returns `(n_steps, jump_size)`. `n_steps` is padded up so the stride `jump_size` yields exactly
/// `n_observations` samples.
pub fn sampling_grid(T: f64, dt: f64, n_observations: usize) -> Result<(usize, usize), FilterError> {
    if !(T > 0.) || !(dt > 0.) || !T.is_finite() || !dt.is_finite() {
        return Err(FilterError::config(format!(
            "integration time {} and step {} must be positive",
            T, dt
        )));
    }
    if n_observations == 0 {
        return Err(FilterError::config("at least one observation must be sampled"));
    }

    let steps = (T / dt).ceil();
    if !(steps <= MAX_FINE_STEPS as f64) || n_observations > MAX_FINE_STEPS {
        return Err(FilterError::config(format!(
            "{} integration steps for {} observations exceed the limit of {}",
            steps, n_observations, MAX_FINE_STEPS
        )));
    }

    let mut n_steps = steps as usize;
    let jump_size = ceil_div(n_steps, n_observations).max(1);
    let correction = n_observations as isize - ceil_div(n_steps, jump_size) as isize;
    n_steps = (n_steps as isize + correction * jump_size as isize).max(1) as usize;
    Ok((n_steps, jump_size))
}

fn ceil_div(a: usize, b: usize) -> usize {
    a / b + (a % b != 0) as usize
}

impl ContinuousExtendedKalmanFilter {
    /// `fz` is the time derivative of the state.
    pub fn new<F, H>(fz: F, fx: H, Q: DMatrix<f64>, R: DMatrix<f64>) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Ok(Self::from_system(&NonlinearSystem::new(fz, fx, Q, R)?))
    }

    pub fn from_system(system: &NonlinearSystem) -> Self {
        ContinuousExtendedKalmanFilter { system: system.clone() }
    }

    pub fn system(&self) -> &NonlinearSystem {
        &self.system
    }

    /// Integrate up to time `T` and take `n_observations` equally spaced points.
    ///
    /// With `noisy` the state is perturbed at every fine step by sqrt(dt) scaled process noise
    /// (Euler-Maruyama). Every sampled point gets independent observation noise.
    /// The returned trajectory has exactly `n_observations` points and carries the `jump_size`.
    pub fn sample(
        &self,
        seed: Seed,
        x0: &DVector<f64>,
        T: f64,
        n_observations: usize,
        dt: f64,
        noisy: bool,
    ) -> Result<Trajectory, FilterError> {
        let system = &self.system;
        system.check_functions(x0, None)?;
        let (n_steps, jump_size) = sampling_grid(T, dt, n_observations)?;
        debug!(
            "continuous sample: {} fine steps, jump size {}, {} observations",
            n_steps, jump_size, n_observations
        );

        let (key_state, key_obs) = seed.split();
        let simulation = if noisy {
            let state_noise = system.process_noise().sample_n(key_state, n_steps)?;
            let sqrt_dt = dt.sqrt();
            let mut xt = x0.clone();
            let mut simulation = Vec::with_capacity(n_steps);
            simulation.push(xt.clone());
            for noise in state_noise.iter().skip(1) {
                xt = rk2_step(&xt, |x| system.transition(x), dt) + noise * sqrt_dt;
                simulation.push(xt.clone());
            }
            simulation
        } else {
            rk2(x0, |x| system.transition(x), n_steps, dt)
        };

        let states: Vec<DVector<f64>> = simulation.into_iter().step_by(jump_size).collect();
        let obs_noise = system.observation_noise().sample_n(key_obs, states.len())?;
        let observations = states
            .iter()
            .zip(obs_noise.iter())
            .map(|(x, v)| system.observe(x, None).map(|z| z + v))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Trajectory {
            states,
            observations,
            jump_size: Some(jump_size),
        })
    }

    /// Continuous-discrete Extended Kalman filter over sampled observations.
    ///
    /// The filter starts at `sample_states[0]` with the observation noise R as covariance.
    /// `states[0]` of the result is this initial state; observation 0 is not used.
    pub fn estimate(
        &self,
        sample_states: &[DVector<f64>],
        sample_obs: &[DVector<f64>],
        jump_size: usize,
        dt: f64,
    ) -> Result<FilterHistory, FilterError> {
        self.estimate_with(sample_states, sample_obs, jump_size, dt, None)
    }

    /// As [`estimate`](#method.estimate) with an explicit initial covariance.
    pub fn estimate_with(
        &self,
        sample_states: &[DVector<f64>],
        sample_obs: &[DVector<f64>],
        jump_size: usize,
        dt: f64,
        init_covariance: Option<&DMatrix<f64>>,
    ) -> Result<FilterHistory, FilterError> {
        let system = &self.system;
        let Q = system.Q();
        let R = system.observation_noise();

        let init_state = sample_states
            .first()
            .ok_or_else(|| FilterError::config("no initial state sampled"))?;
        if jump_size == 0 || !(dt > 0.) {
            return Err(FilterError::config("jump size and step must be positive"));
        }
        system.check_observations(sample_obs, None)?;
        system.check_functions(init_state, None)?;
        let initial = initial_state(system, init_state, init_covariance.unwrap_or(system.R()))?;
        debug!(
            "continuous EKF over {} observations, {} fine steps each",
            sample_obs.len(),
            jump_size
        );

        let mut state = initial.clone();
        let mut states = Vec::with_capacity(sample_obs.len());
        if !sample_obs.is_empty() {
            states.push(initial.clone());
        }

        for (t, z) in sample_obs.iter().enumerate().skip(1) {
            for _ in 0..jump_size {
                state.x = rk2_step(&state.x, |x| system.transition(x), dt);

                let Gt = system.transition_jacobian(&state.x);
                let V_dot = |V: &DMatrix<f64>| &Gt * V * Gt.transpose() + Q;
                state.X = rk2_step(&state.X, V_dot, dt);
            }

            let Ht = system.observation_jacobian(&state.x, None)?;
            let z_hat = system.observe(&state.x, None)?;
            state.observe_innovation(&(z - z_hat), &Ht, R)?;

            trace!("continuous EKF step {} x {:?}", t, state.x.as_slice());
            states.push(state.clone());
        }

        Ok(FilterHistory { initial, states })
    }
}
