//! Pendulum tracking with the discrete filters.
//!
//! A pendulum observed through the sine of its angle is sampled, then filtered by the Extended and
//! Unscented Kalman filters and a Bootstrap filter. The estimated phase portrait, with confidence
//! ellipses of the Extended filter, and a Hinton diagram of its final covariance are saved as SVG.

#![allow(non_snake_case)]

use nalgebra::{DMatrix, DVector, Matrix2, Vector2};
use plotters::prelude::*;

use nlds_estimate::estimators::bootstrap::{BootstrapFilter, ObservationLikelihood};
use nlds_estimate::plot::render::cartesian;
use nlds_estimate::plot::{draw_ellipse, draw_hinton, hinton_boxes, save_svg, Ellipse, FigureConfig};
use nlds_estimate::{
    Estimator, ExtendedKalmanFilter, NonlinearSystem, PlotError, Sampler, Seed, UnscentedKalmanFilter,
    UnscentedParams,
};

const DT: f64 = 0.0125;
const G: f64 = 9.8;

fn rmse(estimates: &[DVector<f64>], states: &[DVector<f64>]) -> f64 {
    let total: f64 = estimates.iter().zip(states).map(|(e, x)| (e - x).norm_squared()).sum();
    (total / states.len() as f64).sqrt()
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let q = 0.1;
    let Q = DMatrix::from_row_slice(2, 2, &[q * DT.powi(3) / 3., q * DT.powi(2) / 2., q * DT.powi(2) / 2., q * DT]);
    let R = DMatrix::from_element(1, 1, 0.1);
    let system = NonlinearSystem::new(
        |x: &DVector<f64>| DVector::from_vec(vec![x[0] + x[1] * DT, x[1] - G * x[0].sin() * DT]),
        |x: &DVector<f64>| DVector::from_element(1, x[0].sin()),
        Q,
        R,
    )?;

    let x0 = DVector::from_vec(vec![1.5, 0.]);
    let traj = system.sample(Seed::new(314), &x0, 400)?;

    let ekf = ExtendedKalmanFilter::from_system(&system);
    let ukf = UnscentedKalmanFilter::from_system(&system, UnscentedParams::default())?;
    let pf = BootstrapFilter::from_system(&system, 2000)?.with_likelihood(ObservationLikelihood::ObservationNoise);

    let init = x0.clone();
    let init_cov = DMatrix::identity(2, 2) * 0.1;
    let ekf_hist = ekf.filter_with(&init, &traj.observations, None, Some(&init_cov))?;
    let ukf_hist = ukf.filter_with(&init, &traj.observations, None, Some(&init_cov))?;
    let pf_hist = pf.filter(Seed::new(42), &init, &traj.observations)?;

    println!("EKF rmse {:.4}", rmse(&ekf_hist.means(), &traj.states));
    println!("UKF rmse {:.4}", rmse(&ukf_hist.means(), &traj.states));
    println!("Bootstrap rmse {:.4}", rmse(&pf_hist.means, &traj.states));

    let config = FigureConfig::from_env();
    let phase = |xs: &[DVector<f64>]| xs.iter().map(|x| (x[0], x[1])).collect::<Vec<_>>();
    save_svg(&config, "pendulum-phase.svg", (640, 640), |root| {
        let mut chart = cartesian(root, -2.5..2.5, -6.0..6.0)?;
        chart
            .draw_series(std::iter::once(PathElement::new(phase(&traj.states), BLACK.stroke_width(2))))
            .map_err(|e| PlotError::Render(e.to_string()))?;
        chart
            .draw_series(std::iter::once(PathElement::new(phase(&ekf_hist.means()), RED.stroke_width(1))))
            .map_err(|e| PlotError::Render(e.to_string()))?;
        chart
            .draw_series(std::iter::once(PathElement::new(phase(&ukf_hist.means()), BLUE.stroke_width(1))))
            .map_err(|e| PlotError::Render(e.to_string()))?;
        for state in ekf_hist.states.iter().step_by(40) {
            let mean = Vector2::new(state.x[0], state.x[1]);
            let cov = Matrix2::new(state.X[(0, 0)], state.X[(0, 1)], state.X[(1, 0)], state.X[(1, 1)]);
            draw_ellipse(&mut chart, &Ellipse::from_covariance(&mean, &cov, 2.)?, 64, RED.stroke_width(1))?;
        }
        Ok(())
    })?;

    let final_cov = &ekf_hist.states[ekf_hist.len() - 1].X;
    save_svg(&config, "pendulum-hinton.svg", (320, 320), |root| {
        let mut chart = cartesian(root, -1.0..2.0, -1.0..2.0)?;
        draw_hinton(&mut chart, &hinton_boxes(final_cov, None))
    })?;

    Ok(())
}
