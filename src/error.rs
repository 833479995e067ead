//! Error types for systems, filters and plot helpers.
//!
//! Every fallible operation returns one of these; nothing in the library panics on bad input.

use std::fmt;
use std::io;

/// Errors that can occur while sampling or filtering.
#[derive(Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Dimension mismatch between expected and actual
    DimensionMismatch {
        expected: usize,
        actual: usize,
        /// Context (e.g. "initial state", "observation 3")
        context: String,
    },

    /// A covariance matrix is not symmetric
    NotSymmetric { context: String },

    /// Matrix inversion failed (singular matrix)
    SingularMatrix { context: String },

    /// A covariance has materially negative eigenvalues, so no real square root exists
    NotPositiveSemiDefinite { context: String },

    /// Numerical instability detected (NaN, all-zero weights, ...)
    NumericalInstability { description: String },

    /// Invalid parameters
    Configuration { description: String },
}

impl FilterError {
    pub(crate) fn dimension(expected: usize, actual: usize, context: impl Into<String>) -> Self {
        FilterError::DimensionMismatch {
            expected,
            actual,
            context: context.into(),
        }
    }

    pub(crate) fn config(description: impl Into<String>) -> Self {
        FilterError::Configuration {
            description: description.into(),
        }
    }
}

impl fmt::Display for FilterError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterError::DimensionMismatch {
                expected,
                actual,
                context,
            } => write!(
                f,
                "Dimension mismatch for {}: expected {}, got {}",
                context, expected, actual
            ),
            FilterError::NotSymmetric { context } => write!(f, "Matrix not symmetric: {}", context),
            FilterError::SingularMatrix { context } => {
                write!(f, "Matrix inversion failed: {}", context)
            }
            FilterError::NotPositiveSemiDefinite { context } => {
                write!(f, "Matrix not positive semi-definite: {}", context)
            }
            FilterError::NumericalInstability { description } => {
                write!(f, "Numerical instability: {}", description)
            }
            FilterError::Configuration { description } => {
                write!(f, "Configuration error: {}", description)
            }
        }
    }
}

impl std::error::Error for FilterError {}

/// Errors of the plot helpers.
#[derive(Debug)]
pub enum PlotError {
    /// x and y samples differ in length
    LengthMismatch { x: usize, y: usize },
    /// A sample covariance needs at least two samples
    TooFewSamples(usize),
    /// Covariance or mean with non-finite entries
    InvalidCovariance(String),
    /// Figure directory could not be created
    Io(io::Error),
    /// Backend failure while drawing
    Render(String),
}

impl fmt::Display for PlotError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlotError::LengthMismatch { x, y } => {
                write!(f, "x and y must be the same size: {} != {}", x, y)
            }
            PlotError::TooFewSamples(n) => {
                write!(f, "at least 2 samples required for a covariance, got {}", n)
            }
            PlotError::InvalidCovariance(what) => write!(f, "invalid covariance: {}", what),
            PlotError::Io(e) => write!(f, "figure directory: {}", e),
            PlotError::Render(e) => write!(f, "rendering failed: {}", e),
        }
    }
}

impl std::error::Error for PlotError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            PlotError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for PlotError {
    fn from(e: io::Error) -> Self {
        PlotError::Io(e)
    }
}
