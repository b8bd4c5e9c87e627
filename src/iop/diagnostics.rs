//! Retrieval quality against reference truth
//!
//! Relative offsets are `(retrieved - true) / true`, summarised by their
//! median so a handful of near-zero truths do not dominate. The absorption
//! offset is taken strictly inside the absorption window, the backscatter
//! offset at every wavelength above the backscatter window's lower edge.

use log::{info, warn};
use rayon::prelude::*;
use serde::Serialize;

use crate::config::ParameterConfiguration;
use crate::error::{IopError, Result};
use crate::iop::geometric::rrs_below;
use crate::iop::inversion::{InversionResult, d_from_u, invert_with, retrieve_bbnw, solve_u};
use crate::iop::water::WaterProperties;
use crate::qssa::source::{CoefficientSource, ConstantCoefficients};
use crate::readers::ReferenceDataset;

/// Median of the finite values, `NaN` when there are none.
pub fn nan_median(values: impl IntoIterator<Item = f64>) -> f64 {
    let mut finite: Vec<f64> = values.into_iter().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return f64::NAN;
    }
    finite.sort_by(f64::total_cmp);
    let mid = finite.len() / 2;
    if finite.len() % 2 == 0 {
        0.5 * (finite[mid - 1] + finite[mid])
    } else {
        finite[mid]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct RelativeOffsets {
    pub anw: f64,
    pub bbnw: f64,
}

pub fn relative_offsets(
    result: &InversionResult,
    anw_true: &[f64],
    bbnw_true: &[f64],
    config: &ParameterConfiguration,
) -> RelativeOffsets {
    let absorption = config.absorption_window();
    let bbmin = config.backscatter_window().min;

    let anw = nan_median(
        result
            .wave
            .iter()
            .zip(result.anw.iter().zip(anw_true))
            .filter(|(wl, _)| **wl > absorption.min && **wl < absorption.max)
            .map(|(_, (got, truth))| (got - truth) / truth),
    );
    let bbnw = nan_median(
        result
            .wave
            .iter()
            .zip(result.bbnw.iter().zip(bbnw_true))
            .filter(|(wl, _)| **wl > bbmin)
            .map(|(_, (got, truth))| (got - truth) / truth),
    );

    RelativeOffsets { anw, bbnw }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assessment {
    /// Sample index and offsets of every inverted sample.
    pub offsets: Vec<(usize, RelativeOffsets)>,
    /// Samples whose inversion failed.
    pub failed: Vec<usize>,
}

impl Assessment {
    pub fn median_anw(&self) -> f64 {
        nan_median(self.offsets.iter().map(|(_, o)| o.anw))
    }

    pub fn median_bbnw(&self) -> f64 {
        nan_median(self.offsets.iter().map(|(_, o)| o.bbnw))
    }
}

/// Invert every sample of `reference` and compare with its truth IOPs.
///
/// A sample that cannot be inverted is recorded in [`Assessment::failed`]
/// instead of aborting the run.
pub fn assess(
    reference: &ReferenceDataset,
    source: &dyn CoefficientSource,
    water: &dyn WaterProperties,
    config: &ParameterConfiguration,
) -> Result<Assessment> {
    let (Some(anw_true), Some(bbnw_true)) = (reference.anw.as_ref(), reference.bbnw.as_ref())
    else {
        return Err(IopError::InvalidInput(
            "assessment needs truth anw and bbnw in the reference dataset".to_string(),
        ));
    };

    let outcomes: Vec<(usize, Result<RelativeOffsets>)> = (0..reference.n_samples())
        .into_par_iter()
        .map(|idx| {
            let offsets = invert_with(&reference.wave, &reference.rrs[idx], config, source, water)
                .map(|result| relative_offsets(&result, &anw_true[idx], &bbnw_true[idx], config));
            (idx, offsets)
        })
        .collect();

    let mut assessment = Assessment {
        offsets: Vec::with_capacity(outcomes.len()),
        failed: Vec::new(),
    };
    for (idx, outcome) in outcomes {
        match outcome {
            Ok(offsets) => assessment.offsets.push((idx, offsets)),
            Err(IopError::InvalidInversion { .. }) => assessment.failed.push(idx),
            Err(e) => return Err(e),
        }
    }

    if !assessment.failed.is_empty() {
        warn!(
            "{} of {} samples could not be inverted",
            assessment.failed.len(),
            reference.n_samples()
        );
    }
    info!(
        "Median relative offsets ({}): anw {:+.2}%, bbnw {:+.2}%",
        config.correction(),
        100.0 * assessment.median_anw(),
        100.0 * assessment.median_bbnw()
    );

    Ok(assessment)
}

/// Relative `bbnw` error for one perturbation of constant coefficients.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Sensitivity {
    pub delta1: f64,
    pub factor2: f64,
    pub relative_error: Vec<f64>,
}

/// How `bbnw` responds to shifting `c1` and scaling `c2`.
///
/// Each `(delta1, factor2)` pair inverts `rrs_above` with
/// `base.perturbed(delta1, factor2)` and compares with `bbnw_true`.
pub fn bbnw_sensitivity(
    wave: &[f64],
    rrs_above: &[f64],
    bbnw_true: &[f64],
    water: &dyn WaterProperties,
    base: ConstantCoefficients,
    perturbations: &[(f64, f64)],
) -> Result<Vec<Sensitivity>> {
    if rrs_above.len() != wave.len() || bbnw_true.len() != wave.len() {
        return Err(IopError::InvalidInput(
            "wavelengths, Rrs and bbnw must be aligned".to_string(),
        ));
    }

    let rrs: Vec<f64> = rrs_above.iter().map(|&v| rrs_below(v)).collect();
    let aw = water.aw(wave)?;
    let bbw = water.bbw(wave)?;

    perturbations
        .iter()
        .map(|&(delta1, factor2)| {
            let (c1, c2) = base.perturbed(delta1, factor2).coefficients(wave);
            let d = d_from_u(&solve_u(wave, &rrs, &c1, &c2)?);
            let relative_error = retrieve_bbnw(&aw, &bbw, &d)
                .iter()
                .zip(bbnw_true)
                .map(|(got, truth)| (got - truth) / truth)
                .collect();
            Ok(Sensitivity {
                delta1,
                factor2,
                relative_error,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iop::geometric::rrs_above;
    use crate::iop::water::TabulatedWater;
    use crate::qssa::fit::rrs_model;

    #[test]
    fn test_nan_median() {
        assert_eq!(nan_median([3.0, f64::NAN, 1.0, 2.0]), 2.0);
        assert_eq!(nan_median([4.0, 1.0, 2.0, 3.0]), 2.5);
        assert!(nan_median([f64::NAN]).is_nan());
    }

    /// Reference whose truth is consistent with constant coefficients and
    /// the water terms it carries.
    fn consistent_reference(n_samples: usize) -> (ReferenceDataset, TabulatedWater) {
        let wave: Vec<f64> = (0..=60).map(|i| 400.0 + 5.0 * i as f64).collect();
        let aw: Vec<f64> = wave.iter().map(|wl| 0.01 + 0.002 * (wl - 400.0)).collect();
        let bbw: Vec<f64> = wave.iter().map(|wl| 0.003 * (500.0 / wl).powf(4.32)).collect();
        let source = ConstantCoefficients::lee2002();

        let mut rrs = Vec::new();
        let mut a = Vec::new();
        let mut bb = Vec::new();
        let mut anw = Vec::new();
        let mut bbnw = Vec::new();
        for s in 0..n_samples {
            let scale = 1.0 + s as f64;
            let anw_s: Vec<f64> = wave.iter().map(|wl| 0.02 * scale * (-0.01 * (wl - 400.0)).exp()).collect();
            let bbnw_s: Vec<f64> = wave.iter().map(|wl| 0.001 * scale * 550.0 / wl).collect();
            let a_s: Vec<f64> = aw.iter().zip(&anw_s).map(|(w, n)| w + n).collect();
            let bb_s: Vec<f64> = bbw.iter().zip(&bbnw_s).map(|(w, n)| w + n).collect();
            rrs.push(
                a_s.iter()
                    .zip(&bb_s)
                    .map(|(a, bb)| rrs_above(rrs_model(bb / (a + bb), source.coef1, source.coef2)))
                    .collect(),
            );
            a.push(a_s);
            bb.push(bb_s);
            anw.push(anw_s);
            bbnw.push(bbnw_s);
        }

        let reference = ReferenceDataset::new(wave, rrs, a, bb, Some(anw), Some(bbnw)).unwrap();
        let water = TabulatedWater::from_reference(&reference).unwrap();
        (reference, water)
    }

    #[test]
    fn test_assess_reports_per_sample_offsets() {
        let (reference, water) = consistent_reference(3);
        let assessment = assess(
            &reference,
            &ConstantCoefficients::lee2002(),
            &water,
            &ParameterConfiguration::default(),
        )
        .unwrap();

        assert!(assessment.failed.is_empty());
        let indices: Vec<usize> = assessment.offsets.iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, vec![0, 1, 2]);
        for (_, offsets) in &assessment.offsets {
            assert!(offsets.anw.is_finite());
            assert!(offsets.bbnw.is_finite());
        }
    }

    #[test]
    fn test_assess_needs_truth() {
        let (mut reference, water) = consistent_reference(1);
        reference.anw = None;
        assert!(matches!(
            assess(
                &reference,
                &ConstantCoefficients::lee2002(),
                &water,
                &ParameterConfiguration::default()
            ),
            Err(IopError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_failed_samples_are_recorded() {
        let (mut reference, water) = consistent_reference(2);
        reference.rrs[1][10] = -1e-3;
        let assessment = assess(
            &reference,
            &ConstantCoefficients::lee2002(),
            &water,
            &ParameterConfiguration::default(),
        )
        .unwrap();
        assert_eq!(assessment.failed, vec![1]);
        assert_eq!(assessment.offsets.len(), 1);
    }

    #[test]
    fn test_unperturbed_sensitivity_matches_plain_inversion() {
        let (reference, water) = consistent_reference(1);
        let base = ConstantCoefficients::lee2002();
        let truth = reference.bbnw.as_ref().unwrap()[0].clone();

        let curves = bbnw_sensitivity(
            &reference.wave,
            &reference.rrs[0],
            &truth,
            &water,
            base,
            &[(0.0, 1.0), (0.002, 1.0), (0.0, 1.2)],
        )
        .unwrap();

        let plain = invert_with(
            &reference.wave,
            &reference.rrs[0],
            &ParameterConfiguration::default(),
            &base,
            &water,
        )
        .unwrap();
        for (i, err) in curves[0].relative_error.iter().enumerate() {
            let expected = (plain.bbnw[i] - truth[i]) / truth[i];
            assert!((err - expected).abs() < 1e-12);
        }
        assert_ne!(curves[1].relative_error, curves[0].relative_error);
        assert_eq!(curves[2].factor2, 1.2);
    }
}
