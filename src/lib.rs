//! Ocean-colour IOP retrieval with the quasi-single-scattering approximation
//!
//! Non-water absorption (`anw`) and backscattering (`bbnw`) are retrieved from
//! remote-sensing reflectance by inverting `rrs = c1·u + c2·u²`, where the
//! coefficients are fitted per wavelength on a reference dataset
//! ([`qssa::fit`]), smoothed with an interpolating spline ([`qssa::bspline`])
//! and cached on disk ([`qssa::store`]).

pub mod config;
pub mod error;
pub mod iop;
pub mod qssa;
pub mod readers;
pub mod sensor;

pub use config::{CorrectionMode, DatasetId, DatasetKey, ParameterConfiguration};
pub use error::{IopError, Result};
pub use iop::{InversionEngine, InversionResult, TabulatedWater, WaterProperties, invert_with};
pub use qssa::{CoefficientSource, CoefficientStore, CoefficientTable, SmoothedCoefficientCurve};
