//! QSSA coefficients: fitting, smoothing and caching
//!
//! `fit` turns a reference dataset into a [`CoefficientTable`], `bspline`
//! smooths it into a [`SmoothedCoefficientCurve`] and `store` persists both.

pub mod bspline;
pub mod fit;
pub mod lm;
pub mod source;
pub mod store;
pub mod table;

pub use bspline::{SmoothError, SmoothReport, SmoothedCoefficientCurve, smooth, smooth_with_degree};
pub use fit::{FitFailure, FitOptions, FitPolicy, FitReport, fit};
pub use source::{CoefficientSource, ConstantCoefficients};
pub use store::{CoefficientArchive, CoefficientStore, StoreError};
pub use table::{CoefficientRow, CoefficientTable};
