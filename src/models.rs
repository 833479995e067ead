#![allow(non_snake_case)]

//! Nonlinear dynamical system models.
//!
//! A [`NonlinearSystem`] holds the transition and observation functions of a system together with
//! its process and observation noise. Estimators are built from a system and share it read only.
//! State representations are modeled as structs.
//! Common estimation operations are defined as traits.

use std::fmt;
use std::sync::Arc;

use log::debug;
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::linalg::{jacobian, rcond};
use crate::noise::CorrelatedNoise;
use crate::random::Seed;

type VectorFn = Arc<dyn Fn(&DVector<f64>) -> DVector<f64> + Send + Sync>;
type VectorInputFn = Arc<dyn Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64> + Send + Sync>;
type MatrixFn = Arc<dyn Fn(&DVector<f64>) -> DMatrix<f64> + Send + Sync>;
type MatrixInputFn = Arc<dyn Fn(&DVector<f64>, &DVector<f64>) -> DMatrix<f64> + Send + Sync>;

/// Observation function, optionally taking an exogenous input each step.
#[derive(Clone)]
enum Observation {
    Plain(VectorFn),
    Exogenous(VectorInputFn),
}

#[derive(Clone)]
enum ObservationJacobian {
    Plain(MatrixFn),
    Exogenous(MatrixInputFn),
}

/// Nonlinear dynamical system with additive Gaussian noise.
///
/// x(t) = f(x(t-1)) + w, w ~ N(0, Q)
/// z(t) = h(x(t)) + v, v ~ N(0, R)
///
/// For continuous time systems f is the time derivative dx/dt.
/// The state and observation dimensions are the dimensions of Q and R.
#[derive(Clone)]
pub struct NonlinearSystem {
    fz: VectorFn,
    fx: Observation,
    Dfz: Option<MatrixFn>,
    Dfx: Option<ObservationJacobian>,
    process_noise: CorrelatedNoise,
    observation_noise: CorrelatedNoise,
}

impl NonlinearSystem {
    /// Creates a system from transition function `fz`, observation function `fx` and the
    /// process and observation noise covariances `Q` and `R`.
    pub fn new<F, H>(fz: F, fx: H, Q: DMatrix<f64>, R: DMatrix<f64>) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::build(Arc::new(fz), Observation::Plain(Arc::new(fx)), Q, R)
    }

    /// Creates a system whose observation function also takes an exogenous input, such as a
    /// control, at every step.
    pub fn with_inputs<F, H>(fz: F, fx: H, Q: DMatrix<f64>, R: DMatrix<f64>) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>, &DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::build(Arc::new(fz), Observation::Exogenous(Arc::new(fx)), Q, R)
    }

    fn build(fz: VectorFn, fx: Observation, Q: DMatrix<f64>, R: DMatrix<f64>) -> Result<Self, FilterError> {
        Ok(NonlinearSystem {
            fz,
            fx,
            Dfz: None,
            Dfx: None,
            process_noise: CorrelatedNoise::new(Q, "process noise Q")?,
            observation_noise: CorrelatedNoise::new(R, "observation noise R")?,
        })
    }

    /// Use an analytic Jacobian of the transition function instead of finite differences.
    pub fn with_transition_jacobian<J>(mut self, Dfz: J) -> Self
    where
        J: Fn(&DVector<f64>) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.Dfz = Some(Arc::new(Dfz));
        self
    }

    /// Use an analytic Jacobian of the observation function instead of finite differences.
    pub fn with_observation_jacobian<J>(mut self, Dfx: J) -> Self
    where
        J: Fn(&DVector<f64>) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.Dfx = Some(ObservationJacobian::Plain(Arc::new(Dfx)));
        self
    }

    /// Analytic Jacobian of an observation function taking exogenous inputs.
    pub fn with_exogenous_observation_jacobian<J>(mut self, Dfx: J) -> Self
    where
        J: Fn(&DVector<f64>, &DVector<f64>) -> DMatrix<f64> + Send + Sync + 'static,
    {
        self.Dfx = Some(ObservationJacobian::Exogenous(Arc::new(Dfx)));
        self
    }

    pub fn state_dim(&self) -> usize {
        self.process_noise.dim()
    }

    pub fn obs_dim(&self) -> usize {
        self.observation_noise.dim()
    }

    pub fn process_noise(&self) -> &CorrelatedNoise {
        &self.process_noise
    }

    pub fn observation_noise(&self) -> &CorrelatedNoise {
        &self.observation_noise
    }

    /// Process noise covariance
    pub fn Q(&self) -> &DMatrix<f64> {
        &self.process_noise.Q
    }

    /// Observation noise covariance
    pub fn R(&self) -> &DMatrix<f64> {
        &self.observation_noise.Q
    }

    /// Whether the observation function expects an exogenous input each step.
    pub fn takes_inputs(&self) -> bool {
        matches!(self.fx, Observation::Exogenous(_))
    }

    /// f(x)
    pub fn transition(&self, x: &DVector<f64>) -> DVector<f64> {
        (self.fz)(x)
    }

    /// df/dx at x
    pub fn transition_jacobian(&self, x: &DVector<f64>) -> DMatrix<f64> {
        match &self.Dfz {
            Some(Dfz) => Dfz(x),
            None => jacobian::jacobian(|x| (self.fz)(x), x),
        }
    }

    /// h(x), or h(x, u) for systems with exogenous inputs.
    pub fn observe(&self, x: &DVector<f64>, input: Option<&DVector<f64>>) -> Result<DVector<f64>, FilterError> {
        match (&self.fx, input) {
            (Observation::Plain(fx), None) => Ok(fx(x)),
            (Observation::Exogenous(fx), Some(u)) => Ok(fx(x, u)),
            (Observation::Plain(_), Some(_)) => Err(FilterError::config(
                "exogenous input given to an observation function without inputs",
            )),
            (Observation::Exogenous(_), None) => Err(FilterError::config(
                "observation function requires an exogenous input",
            )),
        }
    }

    /// dh/dx at x
    pub fn observation_jacobian(
        &self,
        x: &DVector<f64>,
        input: Option<&DVector<f64>>,
    ) -> Result<DMatrix<f64>, FilterError> {
        match (&self.Dfx, input) {
            (Some(ObservationJacobian::Plain(Dfx)), None) => Ok(Dfx(x)),
            (Some(ObservationJacobian::Exogenous(Dfx)), Some(u)) => Ok(Dfx(x, u)),
            (Some(_), _) => Err(FilterError::config(
                "observation Jacobian does not match the observation function inputs",
            )),
            (None, input) => {
                // Validate the input pairing once before differentiating
                self.observe(x, input)?;
                Ok(jacobian::jacobian(
                    |x| match &self.fx {
                        Observation::Plain(fx) => fx(x),
                        Observation::Exogenous(fx) => match input {
                            Some(u) => fx(x, u),
                            None => DVector::zeros(0),
                        },
                    },
                    x,
                ))
            }
        }
    }

    /// Checks a state vector has the state dimension.
    pub fn check_state(&self, x: &DVector<f64>, context: &str) -> Result<(), FilterError> {
        if x.len() != self.state_dim() {
            return Err(FilterError::dimension(self.state_dim(), x.len(), context));
        }
        Ok(())
    }

    /// Checks the observation sequence and the optional exogenous inputs aligned with it.
    pub fn check_observations(
        &self,
        observations: &[DVector<f64>],
        inputs: Option<&[DVector<f64>]>,
    ) -> Result<(), FilterError> {
        for (t, z) in observations.iter().enumerate() {
            if z.len() != self.obs_dim() {
                return Err(FilterError::dimension(self.obs_dim(), z.len(), format!("observation {}", t)));
            }
        }
        match (inputs, self.takes_inputs()) {
            (Some(inputs), true) if inputs.len() != observations.len() => Err(FilterError::dimension(
                observations.len(),
                inputs.len(),
                "number of exogenous inputs",
            )),
            (Some(_), true) | (None, false) => Ok(()),
            (Some(_), false) => Err(FilterError::config(
                "exogenous inputs given to an observation function without inputs",
            )),
            (None, true) => Err(FilterError::config(
                "observation function requires exogenous inputs",
            )),
        }
    }

    /// Evaluates both functions once at `x` and checks the dimensions of their results.
    pub fn check_functions(&self, x: &DVector<f64>, input: Option<&DVector<f64>>) -> Result<(), FilterError> {
        self.check_state(x, "initial state")?;
        let xp = self.transition(x);
        if xp.len() != self.state_dim() {
            return Err(FilterError::dimension(self.state_dim(), xp.len(), "transition function output"));
        }
        let z = self.observe(x, input)?;
        if z.len() != self.obs_dim() {
            return Err(FilterError::dimension(self.obs_dim(), z.len(), "observation function output"));
        }
        Ok(())
    }

    /// Sample a trajectory with exogenous observation inputs, one step per input.
    pub fn sample_with_inputs(
        &self,
        seed: Seed,
        x0: &DVector<f64>,
        inputs: &[DVector<f64>],
    ) -> Result<Trajectory, FilterError> {
        let inputs: Vec<Option<&DVector<f64>>> = inputs.iter().map(Some).collect();
        self.sample_inner(seed, x0, &inputs)
    }

    fn sample_inner(
        &self,
        seed: Seed,
        x0: &DVector<f64>,
        inputs: &[Option<&DVector<f64>>],
    ) -> Result<Trajectory, FilterError> {
        let n_steps = inputs.len();
        if n_steps == 0 {
            return Err(FilterError::config("at least one step must be sampled"));
        }
        self.check_functions(x0, inputs[0])?;
        debug!(
            "sampling {} steps, state_dim {}, obs_dim {}",
            n_steps,
            self.state_dim(),
            self.obs_dim()
        );

        let (key_system_noise, key_obs_noise) = seed.split();
        let state_noise = self.process_noise.sample_n(key_system_noise, n_steps)?;
        let obs_noise = self.observation_noise.sample_n(key_obs_noise, n_steps)?;

        let mut states = Vec::with_capacity(n_steps);
        let mut observations = Vec::with_capacity(n_steps);

        // The first observation is noise free
        let mut state_t = x0.clone();
        observations.push(self.observe(&state_t, inputs[0])?);
        states.push(state_t.clone());

        for t in 1..n_steps {
            state_t = self.transition(&state_t) + &state_noise[t];
            observations.push(self.observe(&state_t, inputs[t])? + &obs_noise[t]);
            states.push(state_t.clone());
        }

        Ok(Trajectory {
            states,
            observations,
            jump_size: None,
        })
    }
}

impl fmt::Debug for NonlinearSystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NonlinearSystem")
            .field("state_dim", &self.state_dim())
            .field("obs_dim", &self.obs_dim())
            .field("takes_inputs", &self.takes_inputs())
            .field("Q", &self.process_noise.Q)
            .field("R", &self.observation_noise.Q)
            .finish()
    }
}

/// Kalman State.
///
/// Linear representation as a state vector and the state covariance (symmetric positive semi-definite) matrix.
#[derive(Debug, PartialEq, Clone)]
pub struct KalmanState {
    /// State vector
    pub x: DVector<f64>,
    /// State covariance matrix (symmetric positive semi-definite)
    pub X: DMatrix<f64>,
}

impl KalmanState {
    pub fn new(x: DVector<f64>, X: DMatrix<f64>) -> Result<KalmanState, FilterError> {
        crate::linalg::check_covariance(&X, "state covariance")?;
        if X.nrows() != x.len() {
            return Err(FilterError::dimension(x.len(), X.nrows(), "state covariance"));
        }
        rcond::check_non_negative(rcond::rcond_symmetric(&X), "state covariance")?;
        Ok(KalmanState { x, X })
    }

    pub fn new_zero(d: usize) -> KalmanState {
        KalmanState {
            x: DVector::zeros(d),
            X: DMatrix::zeros(d, d),
        }
    }

    pub fn dim(&self) -> usize {
        self.x.len()
    }
}

/// The states of a filtering run, index aligned with the observations.
#[derive(Debug, Clone, PartialEq)]
pub struct FilterHistory {
    /// The initial state and covariance the run started from
    pub initial: KalmanState,
    /// One state per observation
    pub states: Vec<KalmanState>,
}

impl FilterHistory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// History of means
    pub fn means(&self) -> Vec<DVector<f64>> {
        self.states.iter().map(|s| s.x.clone()).collect()
    }

    /// History of covariances
    pub fn covariances(&self) -> Vec<DMatrix<f64>> {
        self.states.iter().map(|s| s.X.clone()).collect()
    }

    pub fn last(&self) -> Option<&KalmanState> {
        self.states.last()
    }
}

/// Sampled states and observations, index aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    pub states: Vec<DVector<f64>>,
    pub observations: Vec<DVector<f64>>,
    /// Number of fine integration steps between consecutive samples of a continuous system
    pub jump_size: Option<usize>,
}

impl Trajectory {
    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }
}

/// A state estimator that filters a sequence of observations.
pub trait Estimator {
    /// The system being estimated.
    fn system(&self) -> &NonlinearSystem;

    /// Filter `observations` starting from `init_state`.
    ///
    /// `inputs` are exogenous observation inputs aligned with the observations.
    /// `init_covariance` defaults to the process noise Q.
    fn filter_with(
        &self,
        init_state: &DVector<f64>,
        observations: &[DVector<f64>],
        inputs: Option<&[DVector<f64>]>,
        init_covariance: Option<&DMatrix<f64>>,
    ) -> Result<FilterHistory, FilterError>;

    fn filter(&self, init_state: &DVector<f64>, observations: &[DVector<f64>]) -> Result<FilterHistory, FilterError> {
        self.filter_with(init_state, observations, None, None)
    }
}

/// Something that can generate synthetic trajectories.
pub trait Sampler {
    fn sample(&self, seed: Seed, x0: &DVector<f64>, n_steps: usize) -> Result<Trajectory, FilterError>;
}

impl Sampler for NonlinearSystem {
    /// Sample `n_steps` states and observations starting at `x0`.
    ///
    /// Independent process and observation noise is drawn for every step. The first observation
    /// is h(x0) without noise.
    fn sample(&self, seed: Seed, x0: &DVector<f64>, n_steps: usize) -> Result<Trajectory, FilterError> {
        let inputs = vec![None; n_steps];
        self.sample_inner(seed, x0, &inputs)
    }
}

/// The initial state of a filtering run, checked against the system.
pub(crate) fn initial_state(
    system: &NonlinearSystem,
    init_state: &DVector<f64>,
    init_covariance: &DMatrix<f64>,
) -> Result<KalmanState, FilterError> {
    system.check_state(init_state, "initial state")?;
    KalmanState::new(init_state.clone(), init_covariance.clone())
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn linear_system(q: f64, r: f64) -> NonlinearSystem {
        NonlinearSystem::new(
            |x: &DVector<f64>| x * 0.9,
            |x: &DVector<f64>| x.clone(),
            DMatrix::from_element(1, 1, q),
            DMatrix::from_element(1, 1, r),
        )
        .unwrap()
    }

    #[test]
    fn dimensions_from_noise() {
        let system = NonlinearSystem::new(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>| DVector::from_element(1, x[0]),
            DMatrix::identity(3, 3),
            DMatrix::identity(1, 1),
        )
        .unwrap();
        assert_eq!(system.state_dim(), 3);
        assert_eq!(system.obs_dim(), 1);
    }

    #[test]
    fn rejects_asymmetric_noise() {
        let Q = DMatrix::from_row_slice(2, 2, &[1., 0.1, 0.2, 1.]);
        let res = NonlinearSystem::new(|x: &DVector<f64>| x.clone(), |x: &DVector<f64>| x.clone(), Q, DMatrix::identity(2, 2));
        assert!(matches!(res, Err(FilterError::NotSymmetric { .. })));
    }

    #[test]
    fn sample_first_observation_is_noise_free() {
        let system = linear_system(0.01, 0.1);
        let x0 = DVector::from_element(1, 2.);
        let traj = system.sample(Seed::new(0), &x0, 20).unwrap();
        assert_eq!(traj.len(), 20);
        assert_eq!(traj.observations.len(), 20);
        assert_eq!(traj.states[0], x0);
        assert_eq!(traj.observations[0], x0);
        assert!(traj.jump_size.is_none());
    }

    #[test]
    fn sample_is_reproducible() {
        let system = linear_system(0.01, 0.1);
        let x0 = DVector::from_element(1, 1.);
        assert_eq!(
            system.sample(Seed::new(5), &x0, 10).unwrap(),
            system.sample(Seed::new(5), &x0, 10).unwrap()
        );
        assert_ne!(
            system.sample(Seed::new(5), &x0, 10).unwrap(),
            system.sample(Seed::new(6), &x0, 10).unwrap()
        );
    }

    #[test]
    fn noiseless_sample_follows_dynamics() {
        let system = linear_system(0., 0.);
        let traj = system.sample(Seed::new(1), &DVector::from_element(1, 1.), 5).unwrap();
        for t in 0..5 {
            assert_relative_eq!(traj.states[t][0], 0.9f64.powi(t as i32), epsilon = 1e-12);
            assert_relative_eq!(traj.observations[t][0], traj.states[t][0], epsilon = 1e-12);
        }
    }

    #[test]
    fn sample_rejects_wrong_dimension() {
        let system = linear_system(0.01, 0.1);
        let res = system.sample(Seed::new(0), &DVector::zeros(2), 5);
        assert!(matches!(res, Err(FilterError::DimensionMismatch { expected: 1, actual: 2, .. })));
        assert!(system.sample(Seed::new(0), &DVector::zeros(1), 0).is_err());
    }

    #[test]
    fn exogenous_inputs() {
        let system = NonlinearSystem::with_inputs(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>, u: &DVector<f64>| x + u,
            DMatrix::zeros(1, 1),
            DMatrix::zeros(1, 1),
        )
        .unwrap();
        assert!(system.takes_inputs());
        let inputs = vec![DVector::from_element(1, 1.), DVector::from_element(1, 2.)];
        let traj = system.sample_with_inputs(Seed::new(0), &DVector::from_element(1, 1.), &inputs).unwrap();
        assert_relative_eq!(traj.observations[1][0], 3., epsilon = 1e-12);

        assert!(system.observe(&DVector::zeros(1), None).is_err());
        assert!(system.sample(Seed::new(0), &DVector::zeros(1), 3).is_err());

        let H = system.observation_jacobian(&DVector::zeros(1), Some(&inputs[0])).unwrap();
        assert_relative_eq!(H[(0, 0)], 1., epsilon = 1e-9);
    }

    #[test]
    fn analytic_jacobian_is_used() {
        let system = linear_system(0.01, 0.1).with_transition_jacobian(|_| DMatrix::from_element(1, 1, 42.));
        assert_eq!(system.transition_jacobian(&DVector::zeros(1))[(0, 0)], 42.);
        let numeric = linear_system(0.01, 0.1);
        assert_relative_eq!(numeric.transition_jacobian(&DVector::zeros(1))[(0, 0)], 0.9, epsilon = 1e-9);
    }

    #[test]
    fn observation_checks() {
        let system = linear_system(0.01, 0.1);
        assert!(system.check_observations(&[DVector::zeros(1)], None).is_ok());
        assert!(system.check_observations(&[DVector::zeros(2)], None).is_err());
        assert!(system.check_observations(&[DVector::zeros(1)], Some(&[DVector::zeros(1)])).is_err());
    }

    #[test]
    fn kalman_state_checks() {
        assert!(KalmanState::new(DVector::zeros(2), DMatrix::identity(2, 2)).is_ok());
        assert!(KalmanState::new(DVector::zeros(2), DMatrix::identity(3, 3)).is_err());
        assert!(KalmanState::new(DVector::zeros(1), DMatrix::from_element(1, 1, -1.)).is_err());
    }

    #[test]
    fn initial_state_is_checked_against_system() {
        let system = linear_system(0.01, 0.1);
        let state = initial_state(&system, &DVector::from_element(1, 3.), &DMatrix::from_element(1, 1, 0.5)).unwrap();
        assert_eq!(state.x[0], 3.);
        assert_eq!(state.X[(0, 0)], 0.5);

        assert!(matches!(
            initial_state(&system, &DVector::zeros(2), &DMatrix::identity(2, 2)),
            Err(FilterError::DimensionMismatch { expected: 1, actual: 2, .. })
        ));
        assert!(matches!(
            initial_state(&system, &DVector::zeros(1), &DMatrix::identity(2, 2)),
            Err(FilterError::DimensionMismatch { .. })
        ));
        assert!(matches!(
            initial_state(&system, &DVector::zeros(1), &DMatrix::from_element(1, 1, -1.)),
            Err(FilterError::NotPositiveSemiDefinite { .. })
        ));
    }

    #[test]
    fn analytic_observation_jacobians() {
        let system = linear_system(0.01, 0.1).with_observation_jacobian(|_| DMatrix::from_element(1, 1, 7.));
        assert_eq!(system.observation_jacobian(&DVector::zeros(1), None).unwrap()[(0, 0)], 7.);

        let exogenous = NonlinearSystem::with_inputs(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>, u: &DVector<f64>| x.component_mul(u),
            DMatrix::identity(1, 1),
            DMatrix::identity(1, 1),
        )
        .unwrap()
        .with_exogenous_observation_jacobian(|_, u| DMatrix::from_diagonal(u));
        let u = DVector::from_element(1, 3.);
        assert_eq!(exogenous.observation_jacobian(&DVector::zeros(1), Some(&u)).unwrap()[(0, 0)], 3.);
    }

    #[test]
    fn observation_jacobian_must_match_inputs() {
        let u = DVector::from_element(1, 1.);
        let plain = linear_system(0.01, 0.1).with_observation_jacobian(|_| DMatrix::identity(1, 1));
        assert!(matches!(
            plain.observation_jacobian(&DVector::zeros(1), Some(&u)),
            Err(FilterError::Configuration { .. })
        ));

        let mixed = linear_system(0.01, 0.1).with_exogenous_observation_jacobian(|_, u| DMatrix::from_diagonal(u));
        assert!(matches!(
            mixed.observation_jacobian(&DVector::zeros(1), None),
            Err(FilterError::Configuration { .. })
        ));
    }
}
