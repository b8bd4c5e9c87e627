//! Optical constants and default parameters
//!
//! This module contains the empirical constants of the reflectance model, the
//! default inversion windows and a coarse pure-water absorption table used when
//! no dataset-specific water reference is supplied.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use crate::config::Window;

/// Above- to below-surface reflectance conversion, rrs = Rrs / (A + B Rrs)
/// Lee et al. (2002)
pub const RRS_A: f64 = 0.52;
pub const RRS_B: f64 = 1.17;

/// Initial guess for the per-wavelength (coef1, coef2) fit
pub const FIT_INITIAL_GUESS: [f64; 2] = [0.1, 0.1];

/// Wavelength-independent QSSA coefficients of Lee et al. (2002),
/// rrs = g0 u + g1 u^2
pub const LEE2002_G0: f64 = 0.0949;
pub const LEE2002_G1: f64 = 0.0794;

pub const DEFAULT_ABSORPTION_WINDOW: Window = Window::new(400.0, 450.0);
pub const DEFAULT_BACKSCATTER_WINDOW: Window = Window::new(600.0, 650.0);

/// Loisel et al. (2023) run used when none is requested
pub const DEFAULT_L23_X: u32 = 1;
pub const DEFAULT_L23_Y: u32 = 0;

/// Pure seawater scattering at 500 nm (m^-1) and its spectral slope
/// Morel (1974)
pub const BW_500: f64 = 0.00288;
pub const BW_SLOPE: f64 = 4.32;

/// Pure water absorption coefficients (m^-1) on a 10 nm grid.
/// Smith and Baker (1981) below 380 nm, Pope and Fry (1997) from 380 to
/// 720 nm, Kou et al. (1993) above. Approximate; prefer a dataset-specific
/// water reference for quantitative work.
pub static AW_PURE: LazyLock<BTreeMap<u32, f64>> = LazyLock::new(|| {
    BTreeMap::from([
        (350, 0.0463),
        (360, 0.0379),
        (370, 0.0300),
        (380, 0.01137),
        (390, 0.00851),
        (400, 0.00663),
        (410, 0.00473),
        (420, 0.00454),
        (430, 0.00495),
        (440, 0.00635),
        (450, 0.00922),
        (460, 0.00979),
        (470, 0.0106),
        (480, 0.0127),
        (490, 0.0150),
        (500, 0.0204),
        (510, 0.0325),
        (520, 0.0409),
        (530, 0.0434),
        (540, 0.0474),
        (550, 0.0565),
        (560, 0.0619),
        (570, 0.0695),
        (580, 0.0896),
        (590, 0.1351),
        (600, 0.2224),
        (610, 0.2644),
        (620, 0.2755),
        (630, 0.2916),
        (640, 0.3108),
        (650, 0.3400),
        (660, 0.4100),
        (670, 0.4390),
        (680, 0.4650),
        (690, 0.5160),
        (700, 0.6240),
        (710, 0.8270),
        (720, 1.2310),
        (730, 1.7940),
        (740, 2.3890),
        (750, 2.4700),
        (760, 2.5500),
        (770, 2.5100),
        (780, 2.3600),
        (790, 2.1600),
        (800, 2.0700),
    ])
});

/// Pure seawater backscattering (m^-1), half of the Morel (1974) scattering
pub fn bbw_morel(wavelength: f64) -> f64 {
    0.5 * BW_500 * (wavelength / 500.0).powf(-BW_SLOPE)
}
