use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Exponent used by `pow` when no suffix is given.
pub const DEFAULT_POW_EXPONENT: f64 = -1.0;

/// Backscatter bias-correction applied to the absorption retrieval.
///
/// The correction term is built from the mean of the retrieved `bbnw` over the
/// backscatter window and added to `anw` as `correction · D`.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum CorrectionMode {
    /// No correction.
    #[default]
    None,
    /// Window mean of `bbnw`, broadcast over all wavelengths.
    Mean,
    /// Window mean scaled by `(λ / mean λ_window)^exponent`.
    Pow { exponent: f64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CorrectionParseError(pub String);

impl fmt::Display for CorrectionParseError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(
            f,
            "invalid correction mode {:?} (expected none, mean, pow or pow-<exponent>)",
            self.0
        )
    }
}

impl std::error::Error for CorrectionParseError {}

impl CorrectionMode {
    pub fn needs_window_mean(&self) -> bool {
        !matches!(self, CorrectionMode::None)
    }
}

impl FromStr for CorrectionMode {
    type Err = CorrectionParseError;

    // The text after "pow" is a signed float, so "pow-2" is an exponent of -2.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(CorrectionMode::None),
            "mean" => Ok(CorrectionMode::Mean),
            "pow" => Ok(CorrectionMode::Pow {
                exponent: DEFAULT_POW_EXPONENT,
            }),
            other => other
                .strip_prefix("pow")
                .filter(|suffix| suffix.starts_with(['-', '+']))
                .and_then(|suffix| suffix.parse::<f64>().ok())
                .filter(|exponent| exponent.is_finite())
                .map(|exponent| CorrectionMode::Pow { exponent })
                .ok_or_else(|| CorrectionParseError(other.to_string())),
        }
    }
}

impl TryFrom<String> for CorrectionMode {
    type Error = CorrectionParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<CorrectionMode> for String {
    fn from(mode: CorrectionMode) -> String {
        mode.to_string()
    }
}

impl fmt::Display for CorrectionMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorrectionMode::None => write!(f, "none"),
            CorrectionMode::Mean => write!(f, "mean"),
            CorrectionMode::Pow { exponent } if *exponent == DEFAULT_POW_EXPONENT => {
                write!(f, "pow")
            }
            CorrectionMode::Pow { exponent } if *exponent < 0.0 => write!(f, "pow{}", exponent),
            CorrectionMode::Pow { exponent } => write!(f, "pow+{}", exponent),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_modes() {
        assert_eq!("none".parse::<CorrectionMode>(), Ok(CorrectionMode::None));
        assert_eq!("mean".parse::<CorrectionMode>(), Ok(CorrectionMode::Mean));
        assert_eq!(
            "pow".parse::<CorrectionMode>(),
            Ok(CorrectionMode::Pow { exponent: -1.0 })
        );
        assert_eq!(
            "pow-2.5".parse::<CorrectionMode>(),
            Ok(CorrectionMode::Pow { exponent: -2.5 })
        );
        assert_eq!(
            "pow+1".parse::<CorrectionMode>(),
            Ok(CorrectionMode::Pow { exponent: 1.0 })
        );
    }

    #[test]
    fn test_parse_rejects_unknown_modes() {
        for bad in ["bogus", "", "Mean", "pow-", "pow2", "pow-abc", "pow-inf"] {
            assert!(bad.parse::<CorrectionMode>().is_err(), "{bad} accepted");
        }
    }

    #[test]
    fn test_display_round_trips() {
        for mode in ["none", "mean", "pow", "pow-2", "pow+0.5"] {
            let parsed: CorrectionMode = mode.parse().unwrap();
            assert_eq!(parsed.to_string().parse::<CorrectionMode>(), Ok(parsed));
        }
    }

    #[test]
    fn test_deserialize_from_json_string() {
        let mode: CorrectionMode = serde_json::from_str("\"pow-1\"").unwrap();
        assert_eq!(mode, CorrectionMode::Pow { exponent: -1.0 });

        let err = serde_json::from_str::<CorrectionMode>("\"bogus\"");
        assert!(err.is_err());
    }
}
