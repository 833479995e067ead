//! Stochastic Lotka-Volterra predator prey simulation.
//!
//! The latent populations follow an Euler discretised Lotka-Volterra system perturbed by one
//! scalar Gaussian shock per step, shared by both species. Observations are the populations with
//! independent Gaussian noise.

use nalgebra::Vector2;
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use rayon::prelude::*;

use crate::error::FilterError;
use crate::random::Seed;

/// Parameters of the latent dynamics.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatentParams {
    /// Prey growth rate
    pub alpha: f64,
    /// Predation rate
    pub beta: f64,
    /// Predator growth per prey eaten
    pub delta: f64,
    /// Predator death rate
    pub gamma: f64,
    pub dt: f64,
    pub noise: f64,
}

/// Parameters of the observation noise.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ObservedParams {
    pub noise: f64,
}

/// Latent and observed populations of a simulation, one entry per step.
#[derive(Debug, Clone, PartialEq)]
pub struct LotkaVolterraRun {
    pub latent: Vec<Vector2<f64>>,
    pub observed: Vec<Vector2<f64>>,
}

impl LatentParams {
    fn check(&self) -> Result<(), FilterError> {
        if !(self.dt > 0.) || !(self.noise >= 0.) {
            return Err(FilterError::config(format!(
                "Lotka-Volterra step {} must be positive and noise {} non negative",
                self.dt, self.noise
            )));
        }
        Ok(())
    }

    /// Drift of the populations, [alpha.z1 - beta.z1.z2, delta.z1.z2 - gamma.z2]
    pub fn drift(&self, z: &Vector2<f64>) -> Vector2<f64> {
        Vector2::new(
            self.alpha * z[0] - self.beta * z[0] * z[1],
            self.delta * z[0] * z[1] - self.gamma * z[1],
        )
    }

    fn step<R: Rng>(&self, z: &Vector2<f64>, rng: &mut R) -> Vector2<f64> {
        let e: f64 = StandardNormal.sample(rng);
        z + self.drift(z) * self.dt + Vector2::repeat(e * self.noise * self.dt.sqrt())
    }
}

impl ObservedParams {
    fn observe<R: Rng>(&self, z: &Vector2<f64>, rng: &mut R) -> Vector2<f64> {
        let e: Vector2<f64> = Vector2::from_fn(|_, _| StandardNormal.sample(&mut *rng));
        z + e * self.noise
    }
}

/// Simulate `n_steps` steps from `z0` perturbed uniformly by up to 0.2 per species.
///
/// The histories hold the state after each step, not the initial state.
pub fn simulate_lotka_volterra(
    seed: Seed,
    z0: &Vector2<f64>,
    n_steps: usize,
    latent: &LatentParams,
    observed: &ObservedParams,
) -> Result<LotkaVolterraRun, FilterError> {
    latent.check()?;
    if !(observed.noise >= 0.) {
        return Err(FilterError::config(format!(
            "observation noise {} must be non negative",
            observed.noise
        )));
    }

    let (key_init, key_sample) = seed.split();
    let mut rng = key_init.rng();
    let mut z = z0 + Vector2::from_fn(|_, _| rng.gen_range(-0.2..0.2));

    let mut run = LotkaVolterraRun {
        latent: Vec::with_capacity(n_steps),
        observed: Vec::with_capacity(n_steps),
    };
    for key in key_sample.split_n(n_steps) {
        let (key_latent, key_obs) = key.split();
        z = latent.step(&z, &mut key_latent.rng());
        run.observed.push(observed.observe(&z, &mut key_obs.rng()));
        run.latent.push(z);
    }
    Ok(run)
}

/// Independent simulations, one per seed, run in parallel. Results are in seed order.
pub fn multiple_simulate_lotka_volterra(
    seeds: &[Seed],
    z0: &Vector2<f64>,
    n_steps: usize,
    latent: &LatentParams,
    observed: &ObservedParams,
) -> Result<Vec<LotkaVolterraRun>, FilterError> {
    seeds
        .par_iter()
        .map(|seed| simulate_lotka_volterra(*seed, z0, n_steps, latent, observed))
        .collect()
}
