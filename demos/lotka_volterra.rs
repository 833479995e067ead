//! Predator prey populations.
//!
//! Runs a batch of stochastic Lotka-Volterra simulations in parallel and prints the mean latent
//! populations across runs every few steps.

use nalgebra::Vector2;

use nlds_estimate::random::Seed;
use nlds_estimate::simulations::{multiple_simulate_lotka_volterra, LatentParams, ObservedParams};

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let latent = LatentParams {
        alpha: 2. / 3.,
        beta: 4. / 3.,
        delta: 1.,
        gamma: 1.,
        dt: 0.01,
        noise: 0.05,
    };
    let observed = ObservedParams { noise: 0.1 };

    let seeds = Seed::new(314).split_n(64);
    let n_steps = 1500;
    let runs = multiple_simulate_lotka_volterra(&seeds, &Vector2::new(1., 1.), n_steps, &latent, &observed)?;

    for t in (0..n_steps).step_by(100) {
        let mean = runs.iter().map(|r| r.latent[t]).sum::<Vector2<f64>>() / runs.len() as f64;
        let observed = runs.iter().map(|r| r.observed[t]).sum::<Vector2<f64>>() / runs.len() as f64;
        println!(
            "step {:4} prey {:6.3} predator {:6.3} (observed {:6.3} {:6.3})",
            t, mean[0], mean[1], observed[0], observed[1]
        );
    }

    Ok(())
}
