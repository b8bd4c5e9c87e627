use crate::config::correction::CorrectionParseError;
use crate::config::dataset::DatasetParseError;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("{0}")]
    Correction(#[from] CorrectionParseError),
    #[error("{0}")]
    Dataset(#[from] DatasetParseError),
    #[error("{name} window must satisfy min < max with finite bounds, got [{min}, {max}]")]
    Window { name: &'static str, min: f64, max: f64 },
    #[error("{name} window [{min}, {max}] nm lies outside the {sensor} range [{lo}, {hi}] nm")]
    WindowOutOfRange {
        name: &'static str,
        min: f64,
        max: f64,
        sensor: String,
        lo: f64,
        hi: f64,
    },
    #[error("{name} window [{min}, {max}] nm contains no {sensor} band (closest: {closest} nm)")]
    EmptyWindow {
        name: &'static str,
        min: f64,
        max: f64,
        sensor: String,
        closest: f64,
    },
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Failed to parse JSON: {0}")]
    Json(#[from] serde_json::Error),
}
