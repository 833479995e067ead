//! A collection of nonlinear state estimators.

pub mod bootstrap;
pub mod continuous;
pub mod covariance;
pub mod extended;
pub mod unscented;
