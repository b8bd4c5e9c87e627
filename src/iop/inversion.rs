//! QSSA inversion of remote-sensing reflectance
//!
//! ## Algorithm
//!
//! 1. Convert above-surface `Rrs` to below-surface `rrs`.
//! 2. Evaluate the QSSA coefficients `(c1, c2)` on the spectrum's grid.
//! 3. Solve `rrs = c1·u + c2·u²` for the positive root `u = bb / (a + bb)`.
//!    Any negative or undefined root aborts the inversion.
//! 4. `D = 1/u - 1`, i.e. `a / bb`.
//! 5. `bbnw = aw / D - bbw`.
//! 6. `anw = D·bbw - aw + corr·D`, where `corr` is an optional estimate of the
//!    backscatter bias derived from `bbnw` in the backscatter window:
//!    - `none`: 0
//!    - `mean`: mean `bbnw` in the window
//!    - `pow`: the window mean scaled by `(λ / λ̄)^exponent`, `λ̄` being the
//!      mean wavelength of the window
//!
//! [`invert_with`] runs the numbers for any [`CoefficientSource`] and
//! [`WaterProperties`]; [`InversionEngine`] resolves the coefficients from a
//! [`CoefficientStore`] and keeps them cached per dataset.

use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use log::{debug, info, warn};
use serde::Serialize;

use crate::config::{CorrectionMode, DatasetKey, ParameterConfiguration, Window};
use crate::error::{IopError, Result};
use crate::iop::geometric::rrs_below_spectrum;
use crate::iop::water::WaterProperties;
use crate::qssa::bspline::SmoothedCoefficientCurve;
use crate::qssa::source::CoefficientSource;
use crate::qssa::store::CoefficientStore;

/// Retrieved IOPs plus the intermediate quantities, aligned to `wave`.
///
/// A zero `rrs` gives `u = 0`, so `d` and `anw` are infinite and `bbnw = -bbw`
/// at that wavelength. Such wavelengths are logged at `warn`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct InversionResult {
    pub wave: Vec<f64>,
    /// Below-surface reflectance [sr^-1]
    pub rrs: Vec<f64>,
    /// `bb / (a + bb)`
    pub u: Vec<f64>,
    /// `a / bb`
    pub d: Vec<f64>,
    /// Non-water absorption [m^-1]
    pub anw: Vec<f64>,
    /// Non-water backscattering [m^-1]
    pub bbnw: Vec<f64>,
    /// Backscatter correction applied to `anw` (zeros for `none`)
    pub correction: Vec<f64>,
}

/// Positive root of `c2·u² + c1·u - rrs = 0`.
///
/// Written as `2·rrs / (c1 + √Δ)` when `c1 >= 0`, which is the same root
/// without cancellation and reduces to `rrs / c1` as `c2` goes to 0.
pub fn quadratic_root(rrs: f64, coef1: f64, coef2: f64) -> f64 {
    let sq = (coef1 * coef1 + 4.0 * coef2 * rrs).sqrt();
    if coef1 >= 0.0 {
        2.0 * rrs / (coef1 + sq)
    } else {
        (-coef1 + sq) / (2.0 * coef2)
    }
}

/// `u` at every wavelength, failing on any negative or non-finite root.
pub fn solve_u(wave: &[f64], rrs: &[f64], coef1: &[f64], coef2: &[f64]) -> Result<Vec<f64>> {
    let u: Vec<f64> = rrs
        .iter()
        .zip(coef1.iter().zip(coef2))
        .map(|(&r, (&c1, &c2))| quadratic_root(r, c1, c2))
        .collect();

    let indices: Vec<usize> = u
        .iter()
        .enumerate()
        .filter(|(_, u)| !u.is_finite() || **u < 0.0)
        .map(|(i, _)| i)
        .collect();
    if !indices.is_empty() {
        let wavelengths = indices.iter().map(|&i| wave[i]).collect();
        return Err(IopError::InvalidInversion {
            indices,
            wavelengths,
        });
    }

    Ok(u)
}

pub fn d_from_u(u: &[f64]) -> Vec<f64> {
    u.iter().map(|u| 1.0 / u - 1.0).collect()
}

/// `bbnw = aw / D - bbw`
pub fn retrieve_bbnw(aw: &[f64], bbw: &[f64], d: &[f64]) -> Vec<f64> {
    aw.iter()
        .zip(bbw)
        .zip(d)
        .map(|((aw, bbw), d)| aw / d - bbw)
        .collect()
}

/// `anw = D·bbw - aw + correction·D`
pub fn retrieve_anw(aw: &[f64], bbw: &[f64], d: &[f64], correction: &[f64]) -> Vec<f64> {
    aw.iter()
        .zip(bbw)
        .zip(d.iter().zip(correction))
        .map(|((aw, bbw), (d, corr))| d * (bbw + corr) - aw)
        .collect()
}

/// Mean of `values` and of the wavelengths over the samples inside `window`.
/// `None` when the window holds no sample.
pub fn window_mean(wave: &[f64], values: &[f64], window: Window) -> Option<(f64, f64)> {
    let (count, sum, sum_wave) = wave
        .iter()
        .zip(values)
        .filter(|(wl, _)| window.contains(**wl))
        .fold((0usize, 0.0, 0.0), |(n, s, sw), (wl, v)| (n + 1, s + v, sw + wl));

    (count > 0).then(|| (sum / count as f64, sum_wave / count as f64))
}

/// Correction term of `anw` at every wavelength.
pub fn correction_vector(
    mode: CorrectionMode,
    wave: &[f64],
    bbnw: &[f64],
    window: Window,
) -> Result<Vec<f64>> {
    if !mode.needs_window_mean() {
        return Ok(vec![0.0; wave.len()]);
    }

    let (mean, mean_wave) = window_mean(wave, bbnw, window).ok_or_else(|| {
        IopError::InvalidInput(format!(
            "no samples in the backscatter window [{}, {}] nm for correction '{}'",
            window.min, window.max, mode
        ))
    })?;
    debug!(
        "Window mean bbnw = {:.6e} m^-1 at {:.1} nm ({})",
        mean, mean_wave, mode
    );

    Ok(match mode {
        CorrectionMode::None => vec![0.0; wave.len()],
        CorrectionMode::Mean => vec![mean; wave.len()],
        CorrectionMode::Pow { exponent } => wave
            .iter()
            .map(|wl| mean * (wl / mean_wave).powf(exponent))
            .collect(),
    })
}

fn check_spectrum(wave: &[f64], values: &[f64]) -> Result<()> {
    if wave.is_empty() {
        return Err(IopError::InvalidInput("empty spectrum".to_string()));
    }
    if wave.len() != values.len() {
        return Err(IopError::InvalidInput(format!(
            "spectrum has {} wavelengths but {} values",
            wave.len(),
            values.len()
        )));
    }
    if wave.iter().any(|wl| !wl.is_finite()) || wave.windows(2).any(|w| w[1] <= w[0]) {
        return Err(IopError::InvalidInput(
            "spectrum wavelengths must be finite and strictly increasing".to_string(),
        ));
    }
    Ok(())
}

/// Invert one above-surface `Rrs` spectrum.
pub fn invert_with(
    wave: &[f64],
    rrs_above: &[f64],
    config: &ParameterConfiguration,
    source: &dyn CoefficientSource,
    water: &dyn WaterProperties,
) -> Result<InversionResult> {
    check_spectrum(wave, rrs_above)?;
    invert_rrs(wave, rrs_below_spectrum(rrs_above), config, source, water)
}

/// Invert a below-surface `rrs` spectrum.
pub fn invert_rrs(
    wave: &[f64],
    rrs: Vec<f64>,
    config: &ParameterConfiguration,
    source: &dyn CoefficientSource,
    water: &dyn WaterProperties,
) -> Result<InversionResult> {
    check_spectrum(wave, &rrs)?;

    let (coef1, coef2) = source.coefficients(wave);
    let u = solve_u(wave, &rrs, &coef1, &coef2)?;
    let zeros: Vec<f64> = wave
        .iter()
        .zip(&u)
        .filter(|(_, u)| **u == 0.0)
        .map(|(wl, _)| *wl)
        .collect();
    if !zeros.is_empty() {
        warn!("u = 0 at {:?} nm: anw is infinite there", zeros);
    }
    let d = d_from_u(&u);

    let aw = water.aw(wave)?;
    let bbw = water.bbw(wave)?;

    let bbnw = retrieve_bbnw(&aw, &bbw, &d);
    let correction = correction_vector(
        config.correction(),
        wave,
        &bbnw,
        config.backscatter_window(),
    )?;
    let anw = retrieve_anw(&aw, &bbw, &d, &correction);

    Ok(InversionResult {
        wave: wave.to_vec(),
        rrs,
        u,
        d,
        anw,
        bbnw,
        correction,
    })
}

/// Inverts spectra with coefficients loaded from a [`CoefficientStore`].
///
/// Curves are loaded once per dataset key and shared between calls.
pub struct InversionEngine<W: WaterProperties> {
    store: CoefficientStore,
    water: W,
    cache: RwLock<HashMap<DatasetKey, Arc<SmoothedCoefficientCurve>>>,
}

impl<W: WaterProperties> InversionEngine<W> {
    pub fn new(store: CoefficientStore, water: W) -> Self {
        Self {
            store,
            water,
            cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn store(&self) -> &CoefficientStore {
        &self.store
    }

    pub fn water(&self) -> &W {
        &self.water
    }

    /// Smoothed coefficients for `key`, from the cache or the store.
    pub fn curve(&self, key: &DatasetKey) -> Result<Arc<SmoothedCoefficientCurve>> {
        if let Some(curve) = self
            .cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
        {
            return Ok(Arc::clone(curve));
        }

        let (_, curve) = self.store.load(key)?;
        info!("Loaded QSSA coefficients for {}", key);

        let mut cache = self.cache.write().unwrap_or_else(PoisonError::into_inner);
        let curve = cache.entry(*key).or_insert_with(|| Arc::new(curve));
        Ok(Arc::clone(curve))
    }

    pub fn cached_keys(&self) -> Vec<DatasetKey> {
        self.cache
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .copied()
            .collect()
    }

    pub fn clear_cache(&self) {
        self.cache
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn invert(
        &self,
        wave: &[f64],
        rrs_above: &[f64],
        config: &ParameterConfiguration,
    ) -> Result<InversionResult> {
        let curve = self.curve(config.dataset())?;
        invert_with(wave, rrs_above, config, curve.as_ref(), &self.water)
    }

    /// Invert several spectra sharing `wave`; stops at the first failure.
    pub fn invert_batch(
        &self,
        wave: &[f64],
        spectra: &[Vec<f64>],
        config: &ParameterConfiguration,
    ) -> Result<Vec<InversionResult>> {
        let curve = self.curve(config.dataset())?;
        spectra
            .iter()
            .enumerate()
            .map(|(index, rrs_above)| {
                invert_with(wave, rrs_above, config, curve.as_ref(), &self.water).map_err(
                    |source| IopError::Spectrum {
                        index,
                        source: Box::new(source),
                    },
                )
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::iop::geometric::rrs_above;
    use crate::iop::water::TabulatedWater;
    use crate::qssa::bspline::smooth;
    use crate::qssa::fit::rrs_model;
    use crate::qssa::source::ConstantCoefficients;
    use crate::qssa::table::{CoefficientRow, CoefficientTable};
    use tempfile::tempdir;

    fn grid(start: f64, end: f64, step: f64) -> Vec<f64> {
        let n = ((end - start) / step).round() as usize + 1;
        (0..n).map(|i| start + step * i as f64).collect()
    }

    fn flat_water() -> TabulatedWater {
        TabulatedWater::new(vec![300.0, 900.0], vec![0.01, 1.0], vec![0.004, 0.0004]).unwrap()
    }

    fn spectrum(wave: &[f64]) -> Vec<f64> {
        wave.iter()
            .map(|wl| 4e-3 * (-(wl - 480.0).powi(2) / 2e4).exp() + 2e-4)
            .collect()
    }

    #[test]
    fn test_quadratic_round_trip() {
        for (c1, c2) in [(0.0949, 0.0794), (0.07, 0.2), (0.11, -0.05), (0.09, 0.0)] {
            for i in 1..100 {
                let u = i as f64 / 100.0;
                let rrs = rrs_model(u, c1, c2);
                let back = quadratic_root(rrs, c1, c2);
                assert!((back - u).abs() < 1e-12, "c1={c1} c2={c2} u={u} -> {back}");
            }
        }
    }

    #[test]
    fn test_negative_root_names_wavelengths() {
        let wave = vec![400.0, 450.0, 500.0, 550.0];
        let mut rrs = spectrum(&wave);
        rrs[2] = -1e-4;

        let err = invert_with(
            &wave,
            &rrs,
            &ParameterConfiguration::default(),
            &ConstantCoefficients::lee2002(),
            &flat_water(),
        )
        .unwrap_err();

        match err {
            IopError::InvalidInversion {
                indices,
                wavelengths,
            } => {
                assert_eq!(indices, vec![2]);
                assert_eq!(wavelengths, vec![500.0]);
            }
            other => panic!("expected InvalidInversion, got {other:?}"),
        }
    }

    #[test]
    fn test_none_mode_is_uncorrected() {
        let wave = grid(400.0, 700.0, 5.0);
        let water = flat_water();
        let result = invert_with(
            &wave,
            &spectrum(&wave),
            &ParameterConfiguration::default(),
            &ConstantCoefficients::lee2002(),
            &water,
        )
        .unwrap();

        let aw = water.aw(&wave).unwrap();
        let bbw = water.bbw(&wave).unwrap();
        for i in 0..wave.len() {
            assert_eq!(result.correction[i], 0.0);
            let expected = result.d[i] * bbw[i] - aw[i];
            assert!((result.anw[i] - expected).abs() < 1e-15);
            let bbnw = aw[i] / result.d[i] - bbw[i];
            assert!((result.bbnw[i] - bbnw).abs() < 1e-15);
        }
    }

    #[test]
    fn test_pow_equals_mean_at_window_centre() {
        let wave = grid(400.0, 700.0, 5.0);
        let rrs = spectrum(&wave);
        let source = ConstantCoefficients::lee2002();
        let water = flat_water();

        let pow = ParameterConfiguration::builder().correction("pow").build().unwrap();
        let mean = ParameterConfiguration::builder().correction("mean").build().unwrap();
        let none = ParameterConfiguration::default();

        let with_pow = invert_with(&wave, &rrs, &pow, &source, &water).unwrap();
        let with_mean = invert_with(&wave, &rrs, &mean, &source, &water).unwrap();
        let plain = invert_with(&wave, &rrs, &none, &source, &water).unwrap();

        // 600..=650 every 5 nm: mean wavelength 625 nm sits on the grid.
        let centre = wave.iter().position(|&wl| wl == 625.0).unwrap();
        let window_mean = with_mean.correction[0];
        assert!(with_mean.correction.iter().all(|&c| c == window_mean));
        assert!((with_pow.correction[centre] - window_mean).abs() < 1e-15);
        assert!(with_pow.correction[0] > with_pow.correction[wave.len() - 1]);

        for i in 0..wave.len() {
            let shift = with_pow.correction[i] * plain.d[i];
            assert!((with_pow.anw[i] - plain.anw[i] - shift).abs() < 1e-12);
        }
    }

    #[test]
    fn test_pow_exponent_scales_window_mean() {
        let wave = grid(400.0, 700.0, 5.0);
        let rrs = spectrum(&wave);
        let source = ConstantCoefficients::lee2002();
        let water = flat_water();

        let pow2 = ParameterConfiguration::builder().correction("pow-2").build().unwrap();
        let mean = ParameterConfiguration::builder().correction("mean").build().unwrap();

        let with_pow = invert_with(&wave, &rrs, &pow2, &source, &water).unwrap();
        let with_mean = invert_with(&wave, &rrs, &mean, &source, &water).unwrap();

        // Window 600..=650 nm, mean wavelength 625 nm.
        let window_mean = with_mean.correction[0];
        for (i, &wl) in wave.iter().enumerate() {
            let expected = window_mean * (625.0 / wl).powi(2);
            let got = with_pow.correction[i];
            assert!((got - expected).abs() <= 1e-12 * expected.abs(), "{wl} nm: {got} vs {expected}");
        }
        assert!(with_pow.correction[0] > with_pow.correction[wave.len() - 1]);
        assert!((with_pow.correction[0] / window_mean - (625.0_f64 / 400.0).powi(2)).abs() < 1e-12);
    }

    #[test]
    fn test_empty_backscatter_window() {
        let wave = grid(400.0, 550.0, 10.0);
        let rrs = spectrum(&wave);
        let source = ConstantCoefficients::lee2002();
        let water = flat_water();

        let mean = ParameterConfiguration::builder().correction("mean").build().unwrap();
        assert!(matches!(
            invert_with(&wave, &rrs, &mean, &source, &water),
            Err(IopError::InvalidInput(_))
        ));
        assert!(invert_with(&wave, &rrs, &ParameterConfiguration::default(), &source, &water).is_ok());
    }

    #[test]
    fn test_zero_reflectance_gives_infinite_absorption() {
        let wave = vec![400.0, 450.0, 500.0];
        let mut rrs = spectrum(&wave);
        rrs[1] = 0.0;
        let water = flat_water();

        let result = invert_with(
            &wave,
            &rrs,
            &ParameterConfiguration::default(),
            &ConstantCoefficients::lee2002(),
            &water,
        )
        .unwrap();

        let bbw = water.bbw(&wave).unwrap();
        assert_eq!(result.u[1], 0.0);
        assert_eq!(result.anw[1], f64::INFINITY);
        assert_eq!(result.bbnw[1], -bbw[1]);
        assert!(result.anw[0].is_finite() && result.anw[2].is_finite());
    }

    #[test]
    fn test_malformed_spectrum() {
        let source = ConstantCoefficients::lee2002();
        let config = ParameterConfiguration::default();
        let water = flat_water();
        assert!(matches!(
            invert_with(&[400.0, 410.0], &[1e-3], &config, &source, &water),
            Err(IopError::InvalidInput(_))
        ));
        assert!(matches!(
            invert_with(&[410.0, 400.0], &[1e-3, 1e-3], &config, &source, &water),
            Err(IopError::InvalidInput(_))
        ));
    }

    fn store_with_curve(dir: &std::path::Path, key: &DatasetKey) -> CoefficientStore {
        let rows = grid(350.0, 800.0, 10.0)
            .into_iter()
            .map(|wl| CoefficientRow {
                wavelength: wl,
                coef1: 0.0949,
                coef2: 0.0794,
                rms: 0.0,
                covariance: None,
                iterations: 1,
            })
            .collect();
        let table = CoefficientTable::new(rows).unwrap();
        let curve = smooth(&table).unwrap();
        let store = CoefficientStore::new(dir);
        store.save(key, &table, &curve).unwrap();
        store
    }

    #[test]
    fn test_engine_matches_free_function_and_caches() {
        let dir = tempdir().unwrap();
        let config = ParameterConfiguration::default();
        let store = store_with_curve(dir.path(), config.dataset());
        let engine = InversionEngine::new(store, flat_water());

        let wave = grid(400.0, 700.0, 5.0);
        let rrs = spectrum(&wave);
        let from_engine = engine.invert(&wave, &rrs, &config).unwrap();
        let direct = invert_with(
            &wave,
            &rrs,
            &config,
            &ConstantCoefficients::lee2002(),
            engine.water(),
        )
        .unwrap();

        for (a, b) in from_engine.anw.iter().zip(&direct.anw) {
            assert!((a - b).abs() < 1e-12);
        }
        assert_eq!(engine.cached_keys(), vec![*config.dataset()]);

        engine.invert(&wave, &rrs, &config).unwrap();
        assert_eq!(engine.cached_keys().len(), 1);
        engine.clear_cache();
        assert!(engine.cached_keys().is_empty());
    }

    #[test]
    fn test_engine_missing_dataset() {
        let dir = tempdir().unwrap();
        let engine = InversionEngine::new(CoefficientStore::new(dir.path()), flat_water());
        let wave = vec![400.0, 500.0];
        assert!(matches!(
            engine.invert(&wave, &spectrum(&wave), &ParameterConfiguration::default()),
            Err(IopError::NotFound { .. })
        ));
    }

    #[test]
    fn test_batch_reports_failing_spectrum() {
        let dir = tempdir().unwrap();
        let config = ParameterConfiguration::default();
        let store = store_with_curve(dir.path(), config.dataset());
        let engine = InversionEngine::new(store, flat_water());

        let wave = grid(400.0, 700.0, 10.0);
        let good = spectrum(&wave);
        let mut bad = good.clone();
        bad[3] = -5e-4;

        let results = engine
            .invert_batch(&wave, &[good.clone(), good.clone()], &config)
            .unwrap();
        assert_eq!(results.len(), 2);

        match engine.invert_batch(&wave, &[good, bad], &config) {
            Err(IopError::Spectrum { index, source }) => {
                assert_eq!(index, 1);
                assert!(matches!(*source, IopError::InvalidInversion { .. }));
            }
            other => panic!("expected Spectrum error, got {other:?}"),
        }
    }

    #[test]
    fn test_synthetic_iops_are_recovered() {
        // Forward-model a spectrum from known IOPs, then invert it.
        let wave = grid(400.0, 700.0, 5.0);
        let water = flat_water();
        let source = ConstantCoefficients::lee2002();
        let aw = water.aw(&wave).unwrap();
        let bbw = water.bbw(&wave).unwrap();
        let anw: Vec<f64> = wave.iter().map(|wl| 0.05 * (-0.015 * (wl - 440.0)).exp()).collect();
        let bbnw: Vec<f64> = wave.iter().map(|wl| 0.002 * (550.0 / wl)).collect();

        let rrs: Vec<f64> = (0..wave.len())
            .map(|i| {
                let a = aw[i] + anw[i];
                let bb = bbw[i] + bbnw[i];
                rrs_above(rrs_model(bb / (a + bb), source.coef1, source.coef2))
            })
            .collect();

        // u pins down a/bb only; anw and bbnw are not separable from it.
        let result = invert_with(&wave, &rrs, &ParameterConfiguration::default(), &source, &water)
            .unwrap();
        for i in 0..wave.len() {
            let a = aw[i] + anw[i];
            let bb = bbw[i] + bbnw[i];
            assert!((result.u[i] - bb / (a + bb)).abs() < 1e-10);
            assert!((result.d[i] - a / bb).abs() / (a / bb) < 1e-8);
        }
    }
}
