//! NLDS Estimate, state estimation for nonlinear dynamical systems.
//!
//! A nonlinear dynamical system evolves a hidden state through a transition function and is seen only
//! through noisy observations of a second, observation function. Both are perturbed by additive Gaussian noise.
//! Filtering recovers the hidden state from the observations, step by step.
//!
//! The library implements the common approximate filters for such systems:
//! the Extended Kalman filter for discrete and for continuous time systems, which linearise the system by its Jacobians,
//! the Unscented Kalman filter, which propagates a deterministic set of sigma points,
//! and the Bootstrap particle filter, which propagates a weighted cloud of random particles.
//!
//! Systems are represented by the [`models::NonlinearSystem`] struct and shared by the estimators built from them.
//! State representations are structs; the estimation operations common to the filters are traits.
//! Randomness is always drawn from an explicit, splittable [`random::Seed`] so every run is reproducible.
//!
//! # Licensing
//!
//! The copyright notice is that of the MIT license.
//!
//! Permission is hereby granted, free of charge, to any person obtaining a copy of this software and associated documentation files (the "Software"), to deal in the Software without restriction,
//! including without limitation the rights to use, copy, modify, merge, publish, distribute, sublicense, and/or sell copies of the Software,
//! and to permit persons to whom the Software is furnished to do so, subject to the following conditions:
//!
//! The above copyright notice and this permission notice shall be included in all copies or substantial portions of the Software.
//!
//! THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF MERCHANTABILITY,
//! FITNESS FOR A PARTICULAR PURPOSE AND NON INFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY,
//! WHETHER IN AN ACTION OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

pub mod error;
pub mod models;
pub mod noise;
pub mod random;
pub mod linalg;
pub mod integrate;
pub mod estimators;
pub mod plot;
pub mod simulations;

pub use error::{FilterError, PlotError};
pub use estimators::bootstrap::{BootstrapFilter, ObservationLikelihood, ParticleHistory};
pub use estimators::continuous::ContinuousExtendedKalmanFilter;
pub use estimators::extended::ExtendedKalmanFilter;
pub use estimators::unscented::{UnscentedKalmanFilter, UnscentedParams};
pub use models::{Estimator, FilterHistory, KalmanState, NonlinearSystem, Sampler, Trajectory};
pub use random::Seed;
