//! Reference datasets the coefficients can be derived from
//!
//! A [`DatasetKey`] identifies one fitted coefficient set: the dataset plus
//! any sub-indices that select a particular simulation run. It is resolved
//! once when a configuration is validated and then used as the store key.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Prefix shared by every coefficient archive stem.
const STEM_PREFIX: &str = "qssa_";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetId {
    /// Loisel et al. (2023) Hydrolight simulations, indexed by (X, Y).
    Loisel23,
    /// NASA Ocean Biogeochemical Model output.
    Nobm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetParseError(pub String);

impl fmt::Display for DatasetParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "unknown dataset {:?} (expected loisel23 or nobm)", self.0)
    }
}

impl std::error::Error for DatasetParseError {}

impl DatasetId {
    pub fn name(&self) -> &'static str {
        match self {
            DatasetId::Loisel23 => "loisel23",
            DatasetId::Nobm => "nobm",
        }
    }

    /// Whether the dataset is split into runs selected by (X, Y).
    pub fn has_sub_indices(&self) -> bool {
        matches!(self, DatasetId::Loisel23)
    }
}

impl FromStr for DatasetId {
    type Err = DatasetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "loisel23" => Ok(DatasetId::Loisel23),
            "nobm" => Ok(DatasetId::Nobm),
            other => Err(DatasetParseError(other.to_string())),
        }
    }
}

impl fmt::Display for DatasetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Dataset plus sub-indices. Sub-indices are dropped for datasets that have
/// none, so two keys for `nobm` always compare equal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetKey {
    dataset: DatasetId,
    sub_index: Option<(u32, u32)>,
}

impl DatasetKey {
    pub fn new(dataset: DatasetId, x: u32, y: u32) -> Self {
        let sub_index = dataset.has_sub_indices().then_some((x, y));
        Self { dataset, sub_index }
    }

    pub fn loisel23(x: u32, y: u32) -> Self {
        Self::new(DatasetId::Loisel23, x, y)
    }

    pub fn dataset(&self) -> DatasetId {
        self.dataset
    }

    pub fn sub_index(&self) -> Option<(u32, u32)> {
        self.sub_index
    }

    /// File stem of the coefficient archive, e.g. `qssa_loisel23_X1Y0`.
    pub fn file_stem(&self) -> String {
        match self.sub_index {
            Some((x, y)) => format!("{}{}_X{}Y{}", STEM_PREFIX, self.dataset, x, y),
            None => format!("{}{}", STEM_PREFIX, self.dataset),
        }
    }

    /// Inverse of [`DatasetKey::file_stem`]. Returns `None` for foreign files.
    pub fn from_file_stem(stem: &str) -> Option<Self> {
        let rest = stem.strip_prefix(STEM_PREFIX)?;
        let (name, extras) = match rest.split_once('_') {
            Some((name, extras)) => (name, Some(extras)),
            None => (rest, None),
        };
        let dataset: DatasetId = name.parse().ok()?;

        match (dataset.has_sub_indices(), extras) {
            (true, Some(extras)) => {
                let (x, y) = extras.strip_prefix('X')?.split_once('Y')?;
                Some(Self::new(dataset, x.parse().ok()?, y.parse().ok()?))
            }
            (false, None) => Some(Self::new(dataset, 0, 0)),
            _ => None,
        }
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.sub_index {
            Some((x, y)) => write!(f, "{} (X={}, Y={})", self.dataset, x, y),
            None => write!(f, "{}", self.dataset),
        }
    }
}
