#![allow(non_snake_case)]

//! Scaled 'Unscented' state estimation.
//!
//! A discrete Bayesian estimator that uses the [`KalmanState`] linear representation of the system.
//! The 'Unscented' transform is used for non-linear state predictions and observation.
//!
//! The 'Unscented' transform interpolates the non-linear predict and observe functions through a
//! deterministic set of 2d+1 sigma points with the mean and covariance of the state.
//! The spread of the points is controlled by the alpha, beta and kappa parameters.
//!
//! [`KalmanState`]: ../../models/struct.KalmanState.html

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::linalg::{self, sqrtm};
use crate::models::{initial_state, Estimator, FilterHistory, KalmanState, NonlinearSystem, Sampler, Trajectory};
use crate::random::Seed;

/// Sigma point spread parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnscentedParams {
    /// Spread of the points around the mean, usually small (1e-4 <= alpha <= 1)
    pub alpha: f64,
    /// Prior knowledge of the distribution, 2 is optimal for Gaussians
    pub beta: f64,
    /// Secondary scaling, usually 0 or 3 - d
    pub kappa: f64,
}

impl Default for UnscentedParams {
    fn default() -> Self {
        UnscentedParams {
            alpha: 1e-3,
            beta: 2.,
            kappa: 0.,
        }
    }
}

/// Weights of the sigma points for a state dimension d.
#[derive(Debug, Clone, PartialEq)]
pub struct SigmaWeights {
    /// Mean weights
    pub wm: DVector<f64>,
    /// Covariance weights
    pub wc: DVector<f64>,
    /// Scale of the sigma points, sqrt(d + lambda)
    pub gamma: f64,
}

impl SigmaWeights {
    pub fn new(d: usize, params: &UnscentedParams) -> Result<Self, FilterError> {
        let UnscentedParams { alpha, beta, kappa } = *params;
        let df = d as f64;
        let lambda = alpha * alpha * (df + kappa) - df;
        let scale = df + lambda;
        if !(scale > 0.) || !scale.is_finite() {
            return Err(FilterError::config(format!(
                "unscented scaling d + lambda = {} must be positive",
                scale
            )));
        }

        let n = 2 * d + 1;
        let wm = DVector::from_fn(n, |i, _| if i == 0 { lambda / scale } else { 1. / (2. * scale) });
        let mut wc = wm.clone();
        wc[0] += 1. - alpha * alpha + beta;

        Ok(SigmaWeights {
            wm,
            wc,
            gamma: scale.sqrt(),
        })
    }

    pub fn len(&self) -> usize {
        self.wm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.wm.is_empty()
    }
}

/// Sigma points of a Kalman state: the mean, then mean + gamma.S[:,i], then mean - gamma.S[:,i],
/// where S is the symmetric square root of the covariance.
pub fn sigma_points(state: &KalmanState, gamma: f64) -> Result<Vec<DVector<f64>>, FilterError> {
    let S = sqrtm::sqrtm(&state.X, "sigma point covariance")? * gamma;
    let d = state.x.len();

    let mut points = Vec::with_capacity(2 * d + 1);
    points.push(state.x.clone());
    for c in 0..d {
        points.push(&state.x + S.column(c));
    }
    for c in 0..d {
        points.push(&state.x - S.column(c));
    }
    Ok(points)
}

/// Weighted mean of points.
fn weighted_mean(points: &[DVector<f64>], wm: &DVector<f64>) -> DVector<f64> {
    let mut mean = DVector::zeros(points[0].len());
    for (p, w) in points.iter().zip(wm.iter()) {
        mean.axpy(*w, p, 1.);
    }
    mean
}

/// Weighted cross covariance of two point sets about their means.
fn weighted_covariance(
    a: &[DVector<f64>],
    a_mean: &DVector<f64>,
    b: &[DVector<f64>],
    b_mean: &DVector<f64>,
    wc: &DVector<f64>,
) -> DMatrix<f64> {
    let mut C = DMatrix::zeros(a_mean.len(), b_mean.len());
    for ((ai, bi), w) in a.iter().zip(b.iter()).zip(wc.iter()) {
        C += (ai - a_mean) * (bi - b_mean).transpose() * *w;
    }
    C
}

/// Unscented Kalman filter for discrete time systems.
#[derive(Debug, Clone)]
pub struct UnscentedKalmanFilter {
    system: NonlinearSystem,
    params: UnscentedParams,
    weights: SigmaWeights,
}

impl UnscentedKalmanFilter {
    pub fn new<F, H>(
        fz: F,
        fx: H,
        Q: DMatrix<f64>,
        R: DMatrix<f64>,
        params: UnscentedParams,
    ) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::from_system(&NonlinearSystem::new(fz, fx, Q, R)?, params)
    }

    pub fn from_system(system: &NonlinearSystem, params: UnscentedParams) -> Result<Self, FilterError> {
        let weights = SigmaWeights::new(system.state_dim(), &params)?;
        Ok(UnscentedKalmanFilter {
            system: system.clone(),
            params,
            weights,
        })
    }

    pub fn params(&self) -> &UnscentedParams {
        &self.params
    }

    pub fn weights(&self) -> &SigmaWeights {
        &self.weights
    }

    /// Unscented prediction, returns the predicted state and its regenerated sigma points.
    fn predict(&self, state: &KalmanState) -> Result<(KalmanState, Vec<DVector<f64>>), FilterError> {
        let SigmaWeights { wm, wc, gamma } = &self.weights;

        let points = sigma_points(state, *gamma)?;
        let z_bar: Vec<DVector<f64>> = points.iter().map(|p| self.system.transition(p)).collect();
        let mu_bar = weighted_mean(&z_bar, wm);
        let Sigma_bar = weighted_covariance(&z_bar, &mu_bar, &z_bar, &mu_bar, wc) + self.system.Q();

        let predicted = KalmanState {
            x: mu_bar,
            X: Sigma_bar,
        };
        let regenerated = sigma_points(&predicted, *gamma)?;
        Ok((predicted, regenerated))
    }

    /// Unscented observation of `z` given the predicted state and its sigma points.
    fn observe(
        &self,
        predicted: KalmanState,
        points: &[DVector<f64>],
        z: &DVector<f64>,
        input: Option<&DVector<f64>>,
    ) -> Result<KalmanState, FilterError> {
        let SigmaWeights { wm, wc, .. } = &self.weights;

        let x_bar = points
            .iter()
            .map(|p| self.system.observe(p, input))
            .collect::<Result<Vec<_>, _>>()?;
        let x_hat = weighted_mean(&x_bar, wm);
        let S = weighted_covariance(&x_bar, &x_hat, &x_bar, &x_hat, wc) + self.system.R();
        let XZ = weighted_covariance(points, &predicted.x, &x_bar, &x_hat, wc);

        let SI = linalg::inverse_spd(&S, "innovation covariance")?;
        let K = XZ * SI;
        trace!("UKF innovation norm {:.6e}", (z - &x_hat).norm());

        Ok(KalmanState {
            x: &predicted.x + &K * (z - x_hat),
            X: &predicted.X - &K * S * K.transpose(),
        })
    }
}

impl Estimator for UnscentedKalmanFilter {
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
        system.check_observations(observations, inputs)?;
        let input = |t: usize| inputs.map(|u| &u[t]);
        system.check_functions(init_state, if observations.is_empty() { None } else { input(0) })?;
        let initial = initial_state(system, init_state, init_covariance.unwrap_or(system.Q()))?;
        debug!(
            "UKF over {} observations, state_dim {}, {:?}",
            observations.len(),
            system.state_dim(),
            self.params
        );

        let mut state = initial.clone();
        let mut states = Vec::with_capacity(observations.len());
        for (t, z) in observations.iter().enumerate() {
            let (predicted, points) = self.predict(&state)?;
            state = self.observe(predicted, &points, z, input(t))?;

            trace!("UKF step {} x {:?}", t, state.x.as_slice());
            states.push(state.clone());
        }

        Ok(FilterHistory { initial, states })
    }
}

impl Sampler for UnscentedKalmanFilter {
    fn sample(&self, seed: Seed, x0: &DVector<f64>, n_steps: usize) -> Result<Trajectory, FilterError> {
        self.system.sample(seed, x0, n_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn weights_sum_to_one() {
        for d in 1..5 {
            for params in &[
                UnscentedParams::default(),
                UnscentedParams { alpha: 1., beta: 0., kappa: 2. },
                UnscentedParams { alpha: 0.5, beta: 2., kappa: 1. },
            ] {
                let w = SigmaWeights::new(d, params).unwrap();
                assert_eq!(w.len(), 2 * d + 1);
                assert_relative_eq!(w.wm.sum(), 1., epsilon = 1e-6);
                assert_relative_eq!(w.wc.sum(), 2. - params.alpha * params.alpha + params.beta, epsilon = 1e-6);
            }
        }
    }

    #[test]
    fn weights_reject_degenerate_scaling() {
        // alpha^2 (d + kappa) = 0
        let params = UnscentedParams { alpha: 1., beta: 2., kappa: -1. };
        assert!(SigmaWeights::new(1, &params).is_err());
    }

    #[test]
    fn sigma_points_reproduce_moments() {
        let state = KalmanState {
            x: DVector::from_vec(vec![1., -2.]),
            X: DMatrix::from_row_slice(2, 2, &[2., 0.3, 0.3, 0.5]),
        };
        let w = SigmaWeights::new(2, &UnscentedParams { alpha: 1., beta: 0., kappa: 1. }).unwrap();
        let points = sigma_points(&state, w.gamma).unwrap();
        assert_eq!(points.len(), 5);
        assert_eq!(points[0], state.x);

        let mean = weighted_mean(&points, &w.wm);
        assert_relative_eq!(mean, state.x, epsilon = 1e-12);
        let cov = weighted_covariance(&points, &mean, &points, &mean, &w.wc);
        assert_relative_eq!(cov, state.X, epsilon = 1e-10);
    }

    #[test]
    fn indefinite_covariance_is_fatal() {
        let ukf = UnscentedKalmanFilter::new(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>| x.clone(),
            DMatrix::identity(1, 1),
            DMatrix::identity(1, 1),
            UnscentedParams::default(),
        )
        .unwrap();
        let state = KalmanState {
            x: DVector::zeros(2),
            X: DMatrix::from_row_slice(2, 2, &[1., 2., 2., 1.]),
        };
        assert!(matches!(
            sigma_points(&state, ukf.weights().gamma),
            Err(FilterError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn tracks_nonlinear_observation() {
        // Constant state observed through its square
        let ukf = UnscentedKalmanFilter::new(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>| x.map(|v| v * v),
            DMatrix::from_element(1, 1, 1e-4),
            DMatrix::from_element(1, 1, 1e-2),
            UnscentedParams { alpha: 1., beta: 2., kappa: 2. },
        )
        .unwrap();
        let obs = vec![DVector::from_element(1, 4.); 40];
        let hist = ukf
            .filter_with(&DVector::from_element(1, 1.5), &obs, None, Some(&DMatrix::from_element(1, 1, 0.5)))
            .unwrap();
        assert_relative_eq!(hist.last().unwrap().x[0], 2., epsilon = 1e-2);
    }

    #[test]
    fn exogenous_inputs_shift_observation() {
        let system = NonlinearSystem::with_inputs(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>, u: &DVector<f64>| x + u,
            DMatrix::from_element(1, 1, 0.01),
            DMatrix::from_element(1, 1, 0.01),
        )
        .unwrap();
        let ukf = UnscentedKalmanFilter::from_system(&system, UnscentedParams::default()).unwrap();
        let inputs = vec![DVector::from_element(1, 5.); 30];
        let obs = vec![DVector::from_element(1, 7.); 30];
        let hist = ukf.filter_with(&DVector::zeros(1), &obs, Some(&inputs), None).unwrap();
        assert_eq!(hist.len(), 30);
        assert_relative_eq!(hist.last().unwrap().x[0], 2., epsilon = 1e-3);

        assert!(matches!(
            ukf.filter(&DVector::zeros(1), &obs),
            Err(FilterError::Configuration { .. })
        ));
        assert!(matches!(
            ukf.filter_with(&DVector::zeros(1), &obs, Some(&inputs[..3]), None),
            Err(FilterError::DimensionMismatch { .. })
        ));
    }
}
