//! Damped pendulum tracked by the continuous time Extended Kalman filter.
//!
//! The pendulum is integrated with process noise and sampled at equally spaced points with noisy
//! observations of angle and rate, then filtered. The distance between estimate and truth is
//! printed per sample next to the distance of the raw observation.

use nalgebra::{DMatrix, DVector};

use nlds_estimate::{ContinuousExtendedKalmanFilter, Seed};

const DAMPING: f64 = 0.2;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let filter = ContinuousExtendedKalmanFilter::new(
        |x: &DVector<f64>| DVector::from_vec(vec![x[1], -x[0].sin() - DAMPING * x[1]]),
        |x: &DVector<f64>| x.clone(),
        DMatrix::identity(2, 2) * 0.01,
        DMatrix::identity(2, 2) * 0.1,
    )?;

    let (dt, t_end, n_samples) = (0.01, 20., 100);
    let x0 = DVector::from_vec(vec![2., 0.]);
    let traj = filter.sample(Seed::new(314), &x0, t_end, n_samples, dt, true)?;
    let jump_size = traj.jump_size.unwrap_or(1);
    println!("{} samples, {} integration steps apart", traj.len(), jump_size);

    let hist = filter.estimate(&traj.states, &traj.observations, jump_size, dt)?;
    for (t, ((state, x), z)) in hist
        .states
        .iter()
        .zip(traj.states.iter())
        .zip(traj.observations.iter())
        .enumerate()
    {
        println!(
            "{:3} t={:5.2} error {:7.4} observed {:7.4} trace {:8.5}",
            t,
            (t * jump_size) as f64 * dt,
            (&state.x - x).norm(),
            (z - x).norm(),
            state.X.trace()
        );
    }

    Ok(())
}
