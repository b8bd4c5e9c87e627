use crate::iop::constants::{LEE2002_G0, LEE2002_G1};
use crate::qssa::bspline::SmoothedCoefficientCurve;

/// Anything that can provide `(c1, c2)` on a wavelength grid.
pub trait CoefficientSource: Send + Sync {
    fn coefficients(&self, wave: &[f64]) -> (Vec<f64>, Vec<f64>);

    /// Wavelength range the coefficients were derived on, if bounded.
    fn support(&self) -> Option<(f64, f64)> {
        None
    }
}

impl CoefficientSource for SmoothedCoefficientCurve {
    fn coefficients(&self, wave: &[f64]) -> (Vec<f64>, Vec<f64>) {
        self.evaluate(wave)
    }

    fn support(&self) -> Option<(f64, f64)> {
        Some(SmoothedCoefficientCurve::support(self))
    }
}

/// Spectrally flat coefficients.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConstantCoefficients {
    pub coef1: f64,
    pub coef2: f64,
}

impl ConstantCoefficients {
    pub fn new(coef1: f64, coef2: f64) -> Self {
        Self { coef1, coef2 }
    }

    /// Gordon-type coefficients of Lee et al. (2002).
    pub fn lee2002() -> Self {
        Self::new(LEE2002_G0, LEE2002_G1)
    }

    /// Shift `c1` by `delta1` and scale `c2` by `factor2`.
    pub fn perturbed(&self, delta1: f64, factor2: f64) -> Self {
        Self::new(self.coef1 + delta1, self.coef2 * factor2)
    }
}

impl CoefficientSource for ConstantCoefficients {
    fn coefficients(&self, wave: &[f64]) -> (Vec<f64>, Vec<f64>) {
        (vec![self.coef1; wave.len()], vec![self.coef2; wave.len()])
    }
}
