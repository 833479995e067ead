#![allow(non_snake_case)]

//! Bootstrap particle state estimation.
//!
//! A discrete Bayesian estimator that represents the state distribution by a set of particles.
//! Particles are propagated through the transition function with process noise and weighted by
//! the likelihood of each observation. The estimate is the weighted mean of the particles.
//!
//! Weights are recomputed from the current observation at every step and the particles are not
//! resampled.

use log::{debug, trace};
use nalgebra::{DMatrix, DVector};

use crate::error::FilterError;
use crate::models::{NonlinearSystem, Sampler, Trajectory};
use crate::noise::{CoupledNoise, GaussianLikelihood};
use crate::random::Seed;

/// Default number of particles.
pub const DEFAULT_SAMPLES: usize = 2000;

/// Covariance used to weight a particle's observation guess against the observation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationLikelihood {
    /// Weight with the process noise Q.
    ProcessNoise,
    /// Weight with the observation noise R.
    ObservationNoise,
}

impl Default for ObservationLikelihood {
    fn default() -> Self {
        ObservationLikelihood::ProcessNoise
    }
}

/// Weighted means and normalised weights of a particle filtering run, one per observation.
#[derive(Debug, Clone, PartialEq)]
pub struct ParticleHistory {
    pub means: Vec<DVector<f64>>,
    pub weights: Vec<DVector<f64>>,
}

impl ParticleHistory {
    pub fn len(&self) -> usize {
        self.means.len()
    }

    pub fn is_empty(&self) -> bool {
        self.means.is_empty()
    }
}

/// Bootstrap particle filter of a discrete time nonlinear system.
#[derive(Debug, Clone)]
pub struct BootstrapFilter {
    system: NonlinearSystem,
    n_samples: usize,
    likelihood: ObservationLikelihood,
}

impl BootstrapFilter {
    pub fn new<F, H>(
        fz: F,
        fx: H,
        Q: DMatrix<f64>,
        R: DMatrix<f64>,
        n_samples: usize,
    ) -> Result<Self, FilterError>
    where
        F: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
        H: Fn(&DVector<f64>) -> DVector<f64> + Send + Sync + 'static,
    {
        Self::from_system(&NonlinearSystem::new(fz, fx, Q, R)?, n_samples)
    }

    pub fn from_system(system: &NonlinearSystem, n_samples: usize) -> Result<Self, FilterError> {
        if n_samples == 0 {
            return Err(FilterError::config("bootstrap filter needs at least one particle"));
        }
        Ok(BootstrapFilter {
            system: system.clone(),
            n_samples,
            likelihood: ObservationLikelihood::default(),
        })
    }

    /// Choose the covariance the observation likelihood is evaluated with.
    pub fn with_likelihood(mut self, likelihood: ObservationLikelihood) -> Self {
        self.likelihood = likelihood;
        self
    }

    pub fn system(&self) -> &NonlinearSystem {
        &self.system
    }

    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    fn weighting(&self) -> Result<GaussianLikelihood, FilterError> {
        let noise = match self.likelihood {
            ObservationLikelihood::ProcessNoise => self.system.process_noise(),
            ObservationLikelihood::ObservationNoise => self.system.observation_noise(),
        };
        if noise.dim() != self.system.obs_dim() {
            return Err(FilterError::dimension(
                self.system.obs_dim(),
                noise.dim(),
                "bootstrap likelihood covariance",
            ));
        }
        noise.likelihood()
    }

    /// Filter `observations` starting from particles drawn around `init_state`.
    ///
    /// A particle propagated to a non finite state stops the run with
    /// [`FilterError::NumericalInstability`].
    pub fn filter(
        &self,
        seed: Seed,
        init_state: &DVector<f64>,
        observations: &[DVector<f64>],
    ) -> Result<ParticleHistory, FilterError> {
        let system = &self.system;
        system.check_observations(observations, None)?;
        system.check_functions(init_state, None)?;
        let likelihood = self.weighting()?;
        let state_noise = CoupledNoise::from_correlated(system.process_noise())?;
        let obs_noise = CoupledNoise::from_correlated(system.observation_noise())?;
        debug!(
            "bootstrap over {} observations with {} particles, {:?} likelihood",
            observations.len(),
            self.n_samples,
            self.likelihood
        );

        let mut particles: Vec<DVector<f64>> = vec![init_state.clone(); self.n_samples];
        let mut means = Vec::with_capacity(observations.len());
        let mut weights = Vec::with_capacity(observations.len());

        for (t, (z, key)) in observations.iter().zip(seed.split_n(observations.len())).enumerate() {
            let (key_state, key_obs) = key.split();

            let mut rng = key_state.rng();
            for p in particles.iter_mut() {
                let centre = if t == 0 { p.clone() } else { system.transition(p) };
                *p = centre + state_noise.sample(&mut rng);
            }
            if let Some(i) = particles.iter().position(|p| p.iter().any(|v| !v.is_finite())) {
                return Err(FilterError::NumericalInstability {
                    description: format!("particle {} is not finite at step {}", i, t),
                });
            }

            let mut rng = key_obs.rng();
            let log_w = particles
                .iter()
                .map(|p| -> Result<f64, FilterError> {
                    let guess = system.observe(p, None)? + obs_noise.sample(&mut rng);
                    Ok(likelihood.log_density(z, &guess))
                })
                .collect::<Result<Vec<_>, _>>()?;
            let w = normalise_log_weights(&log_w, t)?;

            let mut mean = DVector::zeros(system.state_dim());
            for (p, wi) in particles.iter().zip(w.iter()) {
                mean.axpy(*wi, p, 1.);
            }
            trace!(
                "bootstrap step {} effective samples {:.1}",
                t,
                1. / w.iter().map(|wi| wi * wi).sum::<f64>()
            );

            means.push(mean);
            weights.push(w);
        }

        Ok(ParticleHistory { means, weights })
    }
}

/// exp(log_w - max) normalised to sum 1.
fn normalise_log_weights(log_w: &[f64], t: usize) -> Result<DVector<f64>, FilterError> {
    let max = log_w
        .iter()
        .cloned()
        .filter(|l| l.is_finite())
        .fold(f64::NEG_INFINITY, f64::max);
    if !max.is_finite() {
        return Err(FilterError::NumericalInstability {
            description: format!("all particle weights vanished at step {}", t),
        });
    }
    let w = DVector::from_iterator(
        log_w.len(),
        log_w.iter().map(|l| if l.is_nan() { 0. } else { (l - max).exp() }),
    );
    let total = w.sum();
    Ok(w / total)
}

impl Sampler for BootstrapFilter {
    fn sample(&self, seed: Seed, x0: &DVector<f64>, n_steps: usize) -> Result<Trajectory, FilterError> {
        self.system.sample(seed, x0, n_steps)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn scalar(n_samples: usize) -> BootstrapFilter {
        BootstrapFilter::new(
            |x: &DVector<f64>| x * 0.9,
            |x: &DVector<f64>| x.clone(),
            DMatrix::from_element(1, 1, 0.1),
            DMatrix::from_element(1, 1, 0.1),
            n_samples,
        )
        .unwrap()
    }

    #[test]
    fn weights_are_normalised() {
        let pf = scalar(200);
        let traj = pf.sample(Seed::new(0), &DVector::from_element(1, 1.), 15).unwrap();
        let hist = pf.filter(Seed::new(1), &DVector::zeros(1), &traj.observations).unwrap();
        assert_eq!(hist.len(), 15);
        for w in &hist.weights {
            assert_eq!(w.len(), 200);
            assert_relative_eq!(w.sum(), 1., epsilon = 1e-9);
            assert!(w.iter().all(|wi| *wi >= 0.));
        }
    }

    #[test]
    fn reproducible_for_a_seed() {
        let pf = scalar(50);
        let obs = vec![DVector::from_element(1, 0.5); 5];
        assert_eq!(
            pf.filter(Seed::new(3), &DVector::zeros(1), &obs).unwrap(),
            pf.filter(Seed::new(3), &DVector::zeros(1), &obs).unwrap()
        );
    }

    #[test]
    fn vanishing_weights() {
        assert!(matches!(
            normalise_log_weights(&[f64::NEG_INFINITY, f64::NAN], 4),
            Err(FilterError::NumericalInstability { .. })
        ));
        let w = normalise_log_weights(&[-1000., -1000., f64::NEG_INFINITY], 0).unwrap();
        assert_relative_eq!(w[0], 0.5);
        assert_eq!(w[2], 0.);
    }

    #[test]
    fn process_noise_likelihood_needs_observation_dimension() {
        // Q is 2x2 but observations are scalar
        let pf = BootstrapFilter::new(
            |x: &DVector<f64>| x.clone(),
            |x: &DVector<f64>| DVector::from_element(1, x[0]),
            DMatrix::identity(2, 2),
            DMatrix::identity(1, 1),
            10,
        )
        .unwrap();
        let obs = vec![DVector::zeros(1); 3];
        assert!(matches!(
            pf.filter(Seed::new(0), &DVector::zeros(2), &obs),
            Err(FilterError::DimensionMismatch { .. })
        ));

        let pf = pf.with_likelihood(ObservationLikelihood::ObservationNoise);
        let hist = pf.filter(Seed::new(0), &DVector::zeros(2), &obs).unwrap();
        assert_eq!(hist.means[0].len(), 2);
    }

    #[test]
    fn zero_particles_rejected() {
        assert!(matches!(
            BootstrapFilter::new(
                |x: &DVector<f64>| x.clone(),
                |x: &DVector<f64>| x.clone(),
                DMatrix::identity(1, 1),
                DMatrix::identity(1, 1),
                0,
            ),
            Err(FilterError::Configuration { .. })
        ));
    }

    #[test]
    fn non_finite_particles_are_fatal() {
        // About half of the particles drawn around 0 are negative and have no square root
        let pf = BootstrapFilter::new(
            |x: &DVector<f64>| x.map(f64::sqrt),
            |x: &DVector<f64>| x.clone(),
            DMatrix::from_element(1, 1, 0.1),
            DMatrix::from_element(1, 1, 0.1),
            200,
        )
        .unwrap();
        let obs = vec![DVector::from_element(1, 1.); 3];
        assert!(matches!(
            pf.filter(Seed::new(0), &DVector::zeros(1), &obs),
            Err(FilterError::NumericalInstability { .. })
        ));
        // A single observation never propagates through the transition
        let hist = pf.filter(Seed::new(0), &DVector::zeros(1), &obs[..1]).unwrap();
        assert!(hist.means[0][0].is_finite());
    }
}
