#![allow(non_snake_case)]

//! Gaussian noise models.
//!
//! Additive zero mean normal noise is represented as structs, either as a covariance matrix or in
//! the coupled form G.diag(q).G'. The coupled form is what sampling uses; the covariance form is
//! what the filters use.

use nalgebra::{DMatrix, DVector};
use rand_core::RngCore;
use rand_distr::{Distribution, StandardNormal};

use crate::error::FilterError;
use crate::linalg::{self, sqrtm};
use crate::random::Seed;

/// Additive noise.
///
/// Noise represented as a the noise covariance matrix.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelatedNoise {
    /// Noise covariance
    pub Q: DMatrix<f64>,
}

/// Additive noise.
///
/// Noise represented as a the noise variance vector and a noise coupling matrix.
/// The noise covariance is G.q.G'.
#[derive(Debug, Clone, PartialEq)]
pub struct CoupledNoise {
    /// Noise variance
    pub q: DVector<f64>,
    /// Noise coupling
    pub G: DMatrix<f64>,
}

impl CorrelatedNoise {
    /// Creates a CorrelatedNoise, checking the covariance is square and symmetric.
    pub fn new(Q: DMatrix<f64>, context: &str) -> Result<Self, FilterError> {
        linalg::check_covariance(&Q, context)?;
        Ok(CorrelatedNoise { Q })
    }

    pub fn dim(&self) -> usize {
        self.Q.nrows()
    }

    /// Draws `n` independent samples from N(0, Q).
    pub fn sample_n(&self, seed: Seed, n: usize) -> Result<Vec<DVector<f64>>, FilterError> {
        let coupled = CoupledNoise::from_correlated(self)?;
        let mut rng = seed.rng();
        Ok((0..n).map(|_| coupled.sample(&mut rng)).collect())
    }

    /// The normal density with this covariance.
    pub fn likelihood(&self) -> Result<GaussianLikelihood, FilterError> {
        GaussianLikelihood::new(&self.Q)
    }
}

impl CoupledNoise {
    /// Creates a CoupledNoise from an CorrelatedNoise.
    /// The CorrelatedNoise must be PSD.
    /// G holds the orthonormal eigenvectors and q the (non negative) eigenvalues.
    pub fn from_correlated(correlated: &CorrelatedNoise) -> Result<Self, FilterError> {
        let (G, q) = sqrtm::psd_eigen(&correlated.Q, "noise covariance")?;
        Ok(CoupledNoise { q, G })
    }

    /// Draws a single sample from N(0, G.q.G').
    pub fn sample<R: RngCore + ?Sized>(&self, rng: &mut R) -> DVector<f64> {
        let z = DVector::from_fn(self.q.len(), |i, _| {
            let e: f64 = StandardNormal.sample(&mut *rng);
            e * self.q[i].sqrt()
        });
        &self.G * z
    }
}

/// Multivariate normal log density with a fixed covariance.
#[derive(Debug, Clone)]
pub struct GaussianLikelihood {
    /// Inverse covariance
    SI: DMatrix<f64>,
    /// log of the normalising constant, -(d.ln(2pi) + ln|S|)/2
    log_norm: f64,
}

impl GaussianLikelihood {
    /// The covariance must be positive definite.
    pub fn new(S: &DMatrix<f64>) -> Result<Self, FilterError> {
        let d = linalg::check_covariance(S, "likelihood covariance")?;
        let chol = S.clone().cholesky().ok_or_else(|| FilterError::SingularMatrix {
            context: "likelihood covariance".to_string(),
        })?;
        let log_det: f64 = 2. * chol.l().diagonal().iter().map(|l| l.ln()).sum::<f64>();
        let log_norm = -0.5 * (d as f64 * (2. * std::f64::consts::PI).ln() + log_det);
        Ok(GaussianLikelihood {
            SI: chol.inverse(),
            log_norm,
        })
    }

    pub fn dim(&self) -> usize {
        self.SI.nrows()
    }

    /// log N(x; mean, S)
    pub fn log_density(&self, x: &DVector<f64>, mean: &DVector<f64>) -> f64 {
        let r = x - mean;
        self.log_norm - 0.5 * (r.transpose() * &self.SI * &r)[(0, 0)]
    }

    /// N(x; mean, S)
    pub fn density(&self, x: &DVector<f64>, mean: &DVector<f64>) -> f64 {
        self.log_density(x, mean).exp()
    }
}
