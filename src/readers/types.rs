use serde::Deserialize;
use std::fmt;
use thiserror::Error;

pub trait DataReader {
    fn read_reference(&self) -> Result<ReferenceDataset, ReadError>;
    fn read_spectra(&self) -> Result<Spectra, ReadError>;
}

#[derive(Debug, Error)]
pub enum ReadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse {path}: {source}")]
    Json {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("unsupported file type: {0}")]
    UnknownFileType(String),
    #[error("invalid data: {0}")]
    Invalid(String),
}

pub enum FileType {
    Json,
}

/// Paired reflectance and IOP spectra of a reference simulation.
///
/// Every per-sample array is indexed `[sample][wavelength]` and aligned to
/// `wave`. `anw`/`bbnw` are only needed for diagnostics and water terms.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "ReferenceHelper")]
pub struct ReferenceDataset {
    pub wave: Vec<f64>,
    pub rrs: Vec<Vec<f64>>,
    pub a: Vec<Vec<f64>>,
    pub bb: Vec<Vec<f64>>,
    pub anw: Option<Vec<Vec<f64>>>,
    pub bbnw: Option<Vec<Vec<f64>>>,
}

#[derive(Deserialize)]
struct ReferenceHelper {
    wave: Vec<f64>,
    #[serde(rename = "Rrs")]
    rrs: Vec<Vec<f64>>,
    a: Vec<Vec<f64>>,
    bb: Vec<Vec<f64>>,
    anw: Option<Vec<Vec<f64>>>,
    bbnw: Option<Vec<Vec<f64>>>,
}

impl TryFrom<ReferenceHelper> for ReferenceDataset {
    type Error = ReadError;

    fn try_from(h: ReferenceHelper) -> Result<Self, Self::Error> {
        ReferenceDataset::new(h.wave, h.rrs, h.a, h.bb, h.anw, h.bbnw)
    }
}

impl ReferenceDataset {
    pub fn new(
        wave: Vec<f64>,
        rrs: Vec<Vec<f64>>,
        a: Vec<Vec<f64>>,
        bb: Vec<Vec<f64>>,
        anw: Option<Vec<Vec<f64>>>,
        bbnw: Option<Vec<Vec<f64>>>,
    ) -> Result<Self, ReadError> {
        check_grid(&wave)?;
        if rrs.is_empty() {
            return Err(ReadError::Invalid("reference dataset has no samples".into()));
        }

        let n_samples = rrs.len();
        let arrays = [
            ("Rrs", Some(&rrs)),
            ("a", Some(&a)),
            ("bb", Some(&bb)),
            ("anw", anw.as_ref()),
            ("bbnw", bbnw.as_ref()),
        ];
        for (name, array) in arrays {
            let Some(array) = array else { continue };
            check_shape(name, array, n_samples, wave.len())?;
        }

        Ok(Self {
            wave,
            rrs,
            a,
            bb,
            anw,
            bbnw,
        })
    }

    pub fn n_samples(&self) -> usize {
        self.rrs.len()
    }

    pub fn n_wavelengths(&self) -> usize {
        self.wave.len()
    }

    /// `Rrs` of every sample at wavelength index `idx`.
    pub fn rrs_column(&self, idx: usize) -> Vec<f64> {
        self.rrs.iter().map(|row| row[idx]).collect()
    }

    /// Single-scattering ratio `bb / (a + bb)` of every sample at `idx`.
    pub fn u_column(&self, idx: usize) -> Vec<f64> {
        self.a
            .iter()
            .zip(&self.bb)
            .map(|(a, bb)| bb[idx] / (a[idx] + bb[idx]))
            .collect()
    }
}

/// One or more `Rrs` spectra sharing a wavelength grid.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(try_from = "SpectraHelper")]
pub struct Spectra {
    pub wave: Vec<f64>,
    pub rrs: Vec<Vec<f64>>,
}

#[derive(Deserialize)]
struct SpectraHelper {
    wave: Vec<f64>,
    #[serde(rename = "Rrs")]
    rrs: Vec<Vec<f64>>,
}

impl TryFrom<SpectraHelper> for Spectra {
    type Error = ReadError;

    fn try_from(h: SpectraHelper) -> Result<Self, Self::Error> {
        check_grid(&h.wave)?;
        if h.rrs.is_empty() {
            return Err(ReadError::Invalid("no Rrs spectra".into()));
        }
        check_shape("Rrs", &h.rrs, h.rrs.len(), h.wave.len())?;
        Ok(Spectra {
            wave: h.wave,
            rrs: h.rrs,
        })
    }
}

fn check_grid(wave: &[f64]) -> Result<(), ReadError> {
    if wave.is_empty() {
        return Err(ReadError::Invalid("empty wavelength grid".into()));
    }
    if wave.windows(2).any(|w| w[1] <= w[0]) {
        return Err(ReadError::Invalid(
            "wavelengths must be strictly increasing".into(),
        ));
    }
    Ok(())
}

fn check_shape(
    name: &str,
    array: &[Vec<f64>],
    n_samples: usize,
    n_wave: usize,
) -> Result<(), ReadError> {
    if array.len() != n_samples {
        return Err(ReadError::Invalid(format!(
            "{} has {} samples, expected {}",
            name,
            array.len(),
            n_samples
        )));
    }
    if let Some((idx, row)) = array.iter().enumerate().find(|(_, r)| r.len() != n_wave) {
        return Err(ReadError::Invalid(format!(
            "{} sample {} has {} values for {} wavelengths",
            name,
            idx,
            row.len(),
            n_wave
        )));
    }
    Ok(())
}

impl fmt::Display for ReferenceDataset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (min_value, max_value) = self
            .rrs
            .iter()
            .flatten()
            .filter(|x| !x.is_nan())
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &x| {
                (lo.min(x), hi.max(x))
            });

        write!(
            f,
            "Samples: {}\nWavelengths: {} ({} - {} nm)\nMin Rrs: {}\nMax Rrs: {}\nTruth IOPs: {}",
            self.n_samples(),
            self.n_wavelengths(),
            self.wave[0],
            self.wave[self.wave.len() - 1],
            min_value,
            max_value,
            self.anw.is_some() && self.bbnw.is_some(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tiny() -> ReferenceDataset {
        ReferenceDataset::new(
            vec![400.0, 500.0],
            vec![vec![1e-3, 2e-3], vec![3e-3, 4e-3]],
            vec![vec![0.1, 0.2], vec![0.3, 0.4]],
            vec![vec![0.1, 0.2], vec![0.1, 0.1]],
            None,
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_columns() {
        let ds = tiny();
        assert_eq!(ds.rrs_column(1), vec![2e-3, 4e-3]);
        assert_eq!(ds.u_column(0), vec![0.5, 0.25]);
    }

    #[test]
    fn test_shape_checks() {
        let bad = ReferenceDataset::new(
            vec![400.0, 500.0],
            vec![vec![1e-3, 2e-3]],
            vec![vec![0.1]],
            vec![vec![0.1, 0.2]],
            None,
            None,
        );
        assert!(matches!(bad, Err(ReadError::Invalid(_))));

        let unsorted = ReferenceDataset::new(
            vec![500.0, 400.0],
            vec![vec![1e-3, 2e-3]],
            vec![vec![0.1, 0.2]],
            vec![vec![0.1, 0.2]],
            None,
            None,
        );
        assert!(unsorted.is_err());
    }

    #[test]
    fn test_deserialize_spectra() {
        let spectra: Spectra =
            serde_json::from_str(r#"{"wave": [400, 401], "Rrs": [[0.001, 0.002]]}"#).unwrap();
        assert_eq!(spectra.rrs.len(), 1);

        let ragged =
            serde_json::from_str::<Spectra>(r#"{"wave": [400, 401], "Rrs": [[0.001]]}"#);
        assert!(ragged.is_err());
    }
}
