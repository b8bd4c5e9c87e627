use serde::{Deserialize, Serialize};

use crate::error::{IopError, Result};

/// Fitted coefficients at one wavelength.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CoefficientRow {
    pub wavelength: f64,
    pub coef1: f64,
    pub coef2: f64,
    /// Relative RMS of the reconstructed vs. observed rrs.
    pub rms: f64,
    pub covariance: Option<[[f64; 2]; 2]>,
    pub iterations: usize,
}

impl CoefficientRow {
    /// One-sigma uncertainties of (coef1, coef2), when the covariance is known.
    pub fn sigma(&self) -> Option<[f64; 2]> {
        self.covariance
            .map(|cov| [cov[0][0].sqrt(), cov[1][1].sqrt()])
    }
}

/// Per-wavelength coefficient pairs on a strictly increasing grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<CoefficientRow>", into = "Vec<CoefficientRow>")]
pub struct CoefficientTable {
    rows: Vec<CoefficientRow>,
}

impl CoefficientTable {
    pub fn new(rows: Vec<CoefficientRow>) -> Result<Self> {
        if rows.is_empty() {
            return Err(IopError::InvalidInput("empty coefficient table".to_string()));
        }
        if rows.windows(2).any(|w| w[1].wavelength <= w[0].wavelength) {
            return Err(IopError::InvalidInput(
                "coefficient table wavelengths must be strictly increasing".to_string(),
            ));
        }
        if let Some(row) = rows
            .iter()
            .find(|r| !(r.wavelength.is_finite() && r.coef1.is_finite() && r.coef2.is_finite()))
        {
            return Err(IopError::InvalidInput(format!(
                "non-finite coefficients at {} nm",
                row.wavelength
            )));
        }
        // JSON has no encoding for NaN or inf, so such rows could not be reloaded.
        if let Some(row) = rows.iter().find(|r| {
            !r.rms.is_finite()
                || r.covariance
                    .is_some_and(|cov| cov.iter().flatten().any(|v| !v.is_finite()))
        }) {
            return Err(IopError::InvalidInput(format!(
                "non-finite fit statistics at {} nm",
                row.wavelength
            )));
        }
        Ok(Self { rows })
    }

    pub fn rows(&self) -> &[CoefficientRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn wavelengths(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.wavelength).collect()
    }

    pub fn coef1(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.coef1).collect()
    }

    pub fn coef2(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.coef2).collect()
    }

    pub fn rms(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.rms).collect()
    }

    /// Largest relative RMS over the table.
    pub fn worst_rms(&self) -> f64 {
        self.rows
            .iter()
            .map(|r| r.rms)
            .fold(f64::NEG_INFINITY, f64::max)
    }
}

impl TryFrom<Vec<CoefficientRow>> for CoefficientTable {
    type Error = IopError;

    fn try_from(rows: Vec<CoefficientRow>) -> Result<Self> {
        CoefficientTable::new(rows)
    }
}

impl From<CoefficientTable> for Vec<CoefficientRow> {
    fn from(table: CoefficientTable) -> Self {
        table.rows
    }
}
