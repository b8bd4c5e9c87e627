//! Pure-water optical properties
//!
//! The inversion only needs `aw(λ)` and `bbw(λ)` on the spectrum's grid. Any
//! source can be plugged in through [`WaterProperties`]; [`TabulatedWater`]
//! covers the two cases used in practice, a bundled pure-water table and the
//! water terms carried by a reference dataset.

use serde::Deserialize;

use crate::error::{IopError, Result};
use crate::iop::constants::{AW_PURE, bbw_morel};
use crate::readers::ReferenceDataset;

pub trait WaterProperties: Send + Sync {
    /// Pure-water absorption [m^-1] at each wavelength.
    fn aw(&self, wave: &[f64]) -> Result<Vec<f64>>;
    /// Pure-water backscattering [m^-1] at each wavelength.
    fn bbw(&self, wave: &[f64]) -> Result<Vec<f64>>;
}

/// Water properties tabulated on a grid and linearly interpolated.
/// Evaluating outside the table is an error, not an extrapolation.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "WaterTable")]
pub struct TabulatedWater {
    wave: Vec<f64>,
    aw: Vec<f64>,
    bbw: Vec<f64>,
}

#[derive(Deserialize)]
struct WaterTable {
    wave: Vec<f64>,
    aw: Vec<f64>,
    bbw: Vec<f64>,
}

impl TryFrom<WaterTable> for TabulatedWater {
    type Error = IopError;

    fn try_from(table: WaterTable) -> Result<Self> {
        TabulatedWater::new(table.wave, table.aw, table.bbw)
    }
}

impl TabulatedWater {
    pub fn new(wave: Vec<f64>, aw: Vec<f64>, bbw: Vec<f64>) -> Result<Self> {
        if wave.len() < 2 || aw.len() != wave.len() || bbw.len() != wave.len() {
            return Err(IopError::InvalidInput(format!(
                "water table needs at least 2 aligned rows (wave: {}, aw: {}, bbw: {})",
                wave.len(),
                aw.len(),
                bbw.len()
            )));
        }
        if wave.windows(2).any(|w| w[1] <= w[0]) {
            return Err(IopError::InvalidInput(
                "water table wavelengths must be strictly increasing".to_string(),
            ));
        }
        Ok(Self { wave, aw, bbw })
    }

    /// Bundled pure-water table (see [`AW_PURE`]) with Morel (1974) backscatter.
    pub fn pure_water() -> Self {
        let wave: Vec<f64> = AW_PURE.keys().map(|&wl| wl as f64).collect();
        let aw: Vec<f64> = AW_PURE.values().copied().collect();
        let bbw: Vec<f64> = wave.iter().map(|&wl| bbw_morel(wl)).collect();
        Self { wave, aw, bbw }
    }

    /// Water terms implied by a reference dataset: `a - anw` and `bb - bbnw`
    /// of its first sample.
    pub fn from_reference(reference: &ReferenceDataset) -> Result<Self> {
        let (Some(anw), Some(bbnw)) = (reference.anw.as_ref(), reference.bbnw.as_ref()) else {
            return Err(IopError::InvalidInput(
                "reference dataset carries no anw/bbnw to derive water terms from".to_string(),
            ));
        };

        let aw = reference.a[0]
            .iter()
            .zip(&anw[0])
            .map(|(a, anw)| a - anw)
            .collect();
        let bbw = reference.bb[0]
            .iter()
            .zip(&bbnw[0])
            .map(|(bb, bbnw)| bb - bbnw)
            .collect();

        Self::new(reference.wave.clone(), aw, bbw)
    }

    pub fn range(&self) -> (f64, f64) {
        (self.wave[0], self.wave[self.wave.len() - 1])
    }

    fn interpolate(&self, values: &[f64], wave: &[f64]) -> Result<Vec<f64>> {
        let (lo, hi) = self.range();
        wave.iter()
            .map(|&wl| {
                if !(lo..=hi).contains(&wl) {
                    return Err(IopError::InvalidInput(format!(
                        "{} nm is outside the water table range [{}, {}] nm",
                        wl, lo, hi
                    )));
                }
                let hi_idx = self.wave.partition_point(|&w| w < wl).max(1);
                let lo_idx = hi_idx - 1;
                let t = (wl - self.wave[lo_idx]) / (self.wave[hi_idx] - self.wave[lo_idx]);
                Ok(values[lo_idx] + t * (values[hi_idx] - values[lo_idx]))
            })
            .collect()
    }
}

impl WaterProperties for TabulatedWater {
    fn aw(&self, wave: &[f64]) -> Result<Vec<f64>> {
        self.interpolate(&self.aw, wave)
    }

    fn bbw(&self, wave: &[f64]) -> Result<Vec<f64>> {
        self.interpolate(&self.bbw, wave)
    }
}
