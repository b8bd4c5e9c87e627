//! Per-wavelength fit of the QSSA coefficients
//!
//! At every selected wavelength the reference samples give pairs
//! `(u, rrs)` and the quadratic `rrs = c1·u + c2·u²` is fitted by
//! Levenberg-Marquardt. Wavelengths are independent and fitted in parallel.

use log::{debug, info, warn};
use rayon::prelude::*;

use crate::error::{IopError, Result};
use crate::iop::constants::FIT_INITIAL_GUESS;
use crate::iop::geometric::rrs_below_spectrum;
use crate::qssa::lm::{LmConfig, LmError, LmModel, levenberg_marquardt};
use crate::qssa::table::{CoefficientRow, CoefficientTable};
use crate::readers::ReferenceDataset;

/// `rrs = c1·u + c2·u²`
pub fn rrs_model(u: f64, coef1: f64, coef2: f64) -> f64 {
    coef1 * u + coef2 * u * u
}

pub struct QuadraticModel;

impl LmModel<2> for QuadraticModel {
    fn evaluate(&self, u: f64, params: &[f64; 2]) -> f64 {
        rrs_model(u, params[0], params[1])
    }

    fn jacobian_row(&self, u: f64, _params: &[f64; 2]) -> [f64; 2] {
        [u, u * u]
    }
}

/// What to do with wavelengths whose fit does not converge.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum FitPolicy {
    /// Fail with every non-converged wavelength listed.
    #[default]
    Abort,
    /// Leave them out of the table and report them.
    SkipGaps,
}

#[derive(Debug, Clone, Copy)]
pub struct FitOptions {
    /// Fit every `stride`-th wavelength of the reference grid.
    pub stride: usize,
    pub policy: FitPolicy,
    pub lm: LmConfig,
}

impl Default for FitOptions {
    fn default() -> Self {
        Self {
            stride: 1,
            policy: FitPolicy::Abort,
            lm: LmConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FitFailure {
    /// Index into the reference wavelength grid.
    pub index: usize,
    pub wavelength: f64,
    pub reason: LmError,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FitReport {
    pub table: CoefficientTable,
    /// Wavelengths left out under [`FitPolicy::SkipGaps`].
    pub gaps: Vec<FitFailure>,
}

pub fn fit(reference: &ReferenceDataset, options: &FitOptions) -> Result<FitReport> {
    if options.stride == 0 {
        return Err(IopError::InvalidInput("fit stride must be at least 1".to_string()));
    }

    let indices: Vec<usize> = (0..reference.n_wavelengths())
        .step_by(options.stride)
        .collect();
    info!(
        "Fitting QSSA coefficients at {} wavelengths from {} samples",
        indices.len(),
        reference.n_samples()
    );

    let outcomes: Vec<std::result::Result<CoefficientRow, FitFailure>> = indices
        .par_iter()
        .map(|&idx| fit_wavelength(reference, idx, &options.lm))
        .collect();

    let mut rows = Vec::with_capacity(outcomes.len());
    let mut failures = Vec::new();
    for outcome in outcomes {
        match outcome {
            Ok(row) => rows.push(row),
            Err(failure) => failures.push(failure),
        }
    }

    if !failures.is_empty() {
        match options.policy {
            FitPolicy::Abort => return Err(IopError::FitNonConvergence { failures }),
            FitPolicy::SkipGaps => {
                for f in &failures {
                    warn!("Skipping {} nm: {}", f.wavelength, f.reason);
                }
            }
        }
    }

    let table = CoefficientTable::new(rows)?;
    info!(
        "Fitted {} wavelengths, worst relative RMS {:.3e}",
        table.len(),
        table.worst_rms()
    );

    Ok(FitReport {
        table,
        gaps: failures,
    })
}

/// Fit one wavelength of the reference grid.
pub fn fit_wavelength(
    reference: &ReferenceDataset,
    index: usize,
    lm: &LmConfig,
) -> std::result::Result<CoefficientRow, FitFailure> {
    let wavelength = reference.wave[index];
    let u = reference.u_column(index);
    let rrs = rrs_below_spectrum(&reference.rrs_column(index));

    let solution = levenberg_marquardt(&QuadraticModel, &u, &rrs, FIT_INITIAL_GUESS, lm)
        .map_err(|reason| FitFailure {
            index,
            wavelength,
            reason,
        })?;
    let [coef1, coef2] = solution.params;

    debug!(
        "{} nm: c1 = {:.6}, c2 = {:.6} after {} iterations",
        wavelength, coef1, coef2, solution.iterations
    );

    Ok(CoefficientRow {
        wavelength,
        coef1,
        coef2,
        rms: relative_rms(&u, &rrs, coef1, coef2),
        covariance: solution.covariance,
        iterations: solution.iterations,
    })
}

/// `sqrt(mean(((rrs - r̂rs) / r̂rs)²))` over the samples with a non-zero
/// modelled `rrs`; samples without backscattering (`u = 0`) are left out.
fn relative_rms(u: &[f64], rrs: &[f64], coef1: f64, coef2: f64) -> f64 {
    let (count, sum) = u
        .iter()
        .zip(rrs)
        .filter_map(|(&u, &observed)| {
            let modelled = rrs_model(u, coef1, coef2);
            let rel = (observed - modelled) / modelled;
            rel.is_finite().then_some(rel * rel)
        })
        .fold((0usize, 0.0), |(n, s), sq| (n + 1, s + sq));
    if count == 0 {
        return 0.0;
    }
    (sum / count as f64).sqrt()
}
