//! Inherent Optical Properties (IOP) module
//!
//! Retrieval of the non-water absorption and backscattering coefficients from
//! remote-sensing reflectance, the water terms it depends on, and diagnostics
//! against reference truth.

pub mod constants;
pub mod diagnostics;
pub mod geometric;
pub mod inversion;
pub mod water;

pub use inversion::{InversionEngine, InversionResult, invert_rrs, invert_with};
pub use water::{TabulatedWater, WaterProperties};
