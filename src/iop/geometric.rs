//! Sea-surface geometry

use crate::iop::constants::{RRS_A, RRS_B};

/// Below-surface remote-sensing reflectance from above-surface `Rrs`.
pub fn rrs_below(rrs_above: f64) -> f64 {
    rrs_above / (RRS_A + RRS_B * rrs_above)
}

pub fn rrs_below_spectrum(rrs_above: &[f64]) -> Vec<f64> {
    rrs_above.iter().map(|&v| rrs_below(v)).collect()
}

/// Inverse of [`rrs_below`].
pub fn rrs_above(rrs_below: f64) -> f64 {
    RRS_A * rrs_below / (1.0 - RRS_B * rrs_below)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rrs_below() {
        let rrs = rrs_below(1e-3);
        assert!((rrs - 1e-3 / 0.52117).abs() < 1e-15);
        assert_eq!(rrs_below(0.0), 0.0);
    }

    #[test]
    fn test_inverse() {
        for v in [1e-4, 1e-3, 5e-3, 2e-2] {
            assert!((rrs_above(rrs_below(v)) - v).abs() < 1e-15);
        }
    }
}
