//! Confidence ellipses of two dimensional Gaussians.
//!
//! The ellipse of a covariance is built from its Pearson correlation: a unit ellipse with radii
//! sqrt(1 + rho) and sqrt(1 - rho) is rotated by 45 degrees, scaled by the standard deviations
//! of each axis times `n_std` and translated to the mean.

use std::f64::consts::{FRAC_1_SQRT_2, PI};

use nalgebra::{Matrix2, Vector2};

use crate::error::PlotError;

/// An ellipse in the plane.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Ellipse {
    pub center: Vector2<f64>,
    /// Radii of the unit ellipse before rotation
    pub radii: (f64, f64),
    /// Axis scaling applied after the rotation
    pub scale: (f64, f64),
}

impl Ellipse {
    /// The `n_std` confidence ellipse of N(mean, cov).
    ///
    /// A zero variance on either axis gives a zero area ellipse.
    pub fn from_covariance(mean: &Vector2<f64>, cov: &Matrix2<f64>, n_std: f64) -> Result<Ellipse, PlotError> {
        if !mean.iter().chain(cov.iter()).all(|v| v.is_finite()) || !n_std.is_finite() {
            return Err(PlotError::InvalidCovariance(format!("non finite moments {:?} {:?}", mean, cov)));
        }
        let (c00, c11, c01) = (cov[(0, 0)], cov[(1, 1)], cov[(0, 1)]);
        if c00 < 0. || c11 < 0. {
            return Err(PlotError::InvalidCovariance(format!("negative variance {} {}", c00, c11)));
        }

        let pearson = if c00 > 0. && c11 > 0. {
            (c01 / (c00 * c11).sqrt()).max(-1.).min(1.)
        } else {
            0.
        };

        Ok(Ellipse {
            center: *mean,
            radii: ((1. + pearson).sqrt(), (1. - pearson).sqrt()),
            scale: (c00.sqrt() * n_std, c11.sqrt() * n_std),
        })
    }

    pub fn area(&self) -> f64 {
        PI * self.radii.0 * self.radii.1 * self.scale.0 * self.scale.1
    }

    /// `n_points` vertices of the ellipse outline, counter clockwise.
    pub fn boundary(&self, n_points: usize) -> Vec<(f64, f64)> {
        (0..n_points)
            .map(|i| {
                let theta = 2. * PI * i as f64 / n_points as f64;
                let (u, v) = (self.radii.0 * theta.cos(), self.radii.1 * theta.sin());
                // rotate 45 degrees
                let (u, v) = (FRAC_1_SQRT_2 * (u - v), FRAC_1_SQRT_2 * (u + v));
                (
                    self.center[0] + self.scale.0 * u,
                    self.center[1] + self.scale.1 * v,
                )
            })
            .collect()
    }
}

/// The `n_std` confidence ellipse of the samples `x`, `y`.
///
/// Uses the sample mean and the unbiased sample covariance.
pub fn confidence_ellipse(x: &[f64], y: &[f64], n_std: f64) -> Result<Ellipse, PlotError> {
    if x.len() != y.len() {
        return Err(PlotError::LengthMismatch { x: x.len(), y: y.len() });
    }
    let n = x.len();
    if n < 2 {
        return Err(PlotError::TooFewSamples(n));
    }

    let mean = Vector2::new(x.iter().sum::<f64>() / n as f64, y.iter().sum::<f64>() / n as f64);
    let mut cov = Matrix2::zeros();
    for (xi, yi) in x.iter().zip(y.iter()) {
        let r = Vector2::new(xi - mean[0], yi - mean[1]);
        cov += r * r.transpose();
    }
    cov /= (n - 1) as f64;

    Ellipse::from_covariance(&mean, &cov, n_std)
}
