//! Crate-level error type
//!
//! Every fallible operation in the library returns [`Result`]. The variants
//! mirror the failure classes a caller has to tell apart: bad configuration is
//! rejected before any numerics run, non-physical inversions and
//! non-converging fits are surfaced with the offending wavelengths, and a
//! missing coefficient archive is distinct from any other storage failure.

use thiserror::Error;

use crate::config::ConfigError;
use crate::qssa::bspline::SmoothError;
use crate::qssa::fit::FitFailure;
use crate::qssa::store::StoreError;
use crate::readers::ReadError;

pub type Result<T> = std::result::Result<T, IopError>;

#[derive(Debug, Error)]
pub enum IopError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),

    #[error(
        "negative or undefined quadratic root at {} wavelength(s): {wavelengths:?} nm",
        wavelengths.len()
    )]
    InvalidInversion {
        indices: Vec<usize>,
        wavelengths: Vec<f64>,
    },

    #[error("coefficient fit did not converge at {} wavelength(s): {}", failures.len(), summarize(failures))]
    FitNonConvergence { failures: Vec<FitFailure> },

    #[error("no cached coefficients for {key}")]
    NotFound { key: String },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("spectrum {index}: {source}")]
    Spectrum {
        index: usize,
        #[source]
        source: Box<IopError>,
    },

    #[error(transparent)]
    Smooth(#[from] SmoothError),

    #[error(transparent)]
    Store(StoreError),

    #[error(transparent)]
    Read(#[from] ReadError),
}

impl From<StoreError> for IopError {
    fn from(err: StoreError) -> IopError {
        match err {
            StoreError::NotFound { key, .. } => IopError::NotFound { key },
            other => IopError::Store(other),
        }
    }
}

fn summarize(failures: &[FitFailure]) -> String {
    failures
        .iter()
        .map(|f| format!("{} nm ({})", f.wavelength, f.reason))
        .collect::<Vec<_>>()
        .join(", ")
}
