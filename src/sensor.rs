use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Instrument whose spectral coverage bounds the configuration windows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sensor {
    /// Continuous 1 nm grid of the Hydrolight reference simulations.
    #[default]
    Hyperspectral,
    SeaWiFS,
    Modis,
}

impl Sensor {
    /// Visible bands. `None` for a continuous spectrum.
    pub fn bands(&self) -> Option<&'static [f64]> {
        match self {
            Sensor::Hyperspectral => None,
            // Bands 1 to 6
            Sensor::SeaWiFS => Some(&[412.0, 443.0, 490.0, 510.0, 555.0, 670.0]),
            // Bands 8 to 14 plus the 469/555/645 land bands
            Sensor::Modis => Some(&[
                412.0, 443.0, 469.0, 488.0, 531.0, 547.0, 555.0, 645.0, 667.0, 678.0,
            ]),
        }
    }

    /// Inclusive spectral range in nm.
    pub fn spectral_range(&self) -> (f64, f64) {
        match self.bands() {
            Some(bands) => (bands[0], bands[bands.len() - 1]),
            None => (350.0, 750.0),
        }
    }

    /// Whether `[min, max]` contains at least one sample of the sensor.
    pub fn covers_window(&self, min: f64, max: f64) -> bool {
        match self.bands() {
            Some(bands) => bands.iter().any(|b| (min..=max).contains(b)),
            None => {
                let (lo, hi) = self.spectral_range();
                min >= lo && max <= hi && min <= max
            }
        }
    }

    pub fn closest_band(&self, target: f64) -> f64 {
        match self.bands() {
            Some(bands) => bands
                .iter()
                .copied()
                .min_by(|a, b| (a - target).abs().total_cmp(&(b - target).abs()))
                .unwrap_or(target),
            None => {
                let (lo, hi) = self.spectral_range();
                target.round().clamp(lo, hi)
            }
        }
    }
}

impl Display for Sensor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Sensor::Hyperspectral => write!(f, "hyperspectral"),
            Sensor::SeaWiFS => write!(f, "SeaWiFS"),
            Sensor::Modis => write!(f, "MODIS"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spectral_ranges() {
        assert_eq!(Sensor::Hyperspectral.spectral_range(), (350.0, 750.0));
        assert_eq!(Sensor::SeaWiFS.spectral_range(), (412.0, 670.0));
        assert_eq!(Sensor::Modis.spectral_range(), (412.0, 678.0));
    }

    #[test]
    fn test_covers_window() {
        assert!(Sensor::Hyperspectral.covers_window(600.0, 650.0));
        assert!(Sensor::Modis.covers_window(600.0, 650.0));
        assert!(!Sensor::SeaWiFS.covers_window(600.0, 650.0));
        assert!(Sensor::SeaWiFS.covers_window(400.0, 450.0));
    }

    #[test]
    fn test_closest_band() {
        assert_eq!(Sensor::SeaWiFS.closest_band(625.0), 670.0);
        assert_eq!(Sensor::Modis.closest_band(490.0), 488.0);
        assert_eq!(Sensor::Hyperspectral.closest_band(900.0), 750.0);
    }
}
