use serde::de::Error;
use serde::{Deserialize, Deserializer, Serialize};

use std::fs::File;
use std::io::BufReader;
use std::path::Path;

use crate::iop::constants;
use crate::sensor::Sensor;

pub mod error;
pub use error::ConfigError;

pub mod correction;
pub use correction::CorrectionMode;

pub mod dataset;
pub use dataset::{DatasetId, DatasetKey};

/// Closed wavelength interval `[min, max]` in nm.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "[f64; 2]", into = "[f64; 2]")]
pub struct Window {
    pub min: f64,
    pub max: f64,
}

impl Window {
    pub const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, wavelength: f64) -> bool {
        (self.min..=self.max).contains(&wavelength)
    }

    fn validate(&self, name: &'static str, sensor: Sensor) -> Result<(), ConfigError> {
        if !(self.min.is_finite() && self.max.is_finite() && self.min < self.max) {
            return Err(ConfigError::Window {
                name,
                min: self.min,
                max: self.max,
            });
        }

        let (lo, hi) = sensor.spectral_range();
        if self.min < lo || self.max > hi {
            return Err(ConfigError::WindowOutOfRange {
                name,
                min: self.min,
                max: self.max,
                sensor: sensor.to_string(),
                lo,
                hi,
            });
        }

        if !sensor.covers_window(self.min, self.max) {
            return Err(ConfigError::EmptyWindow {
                name,
                min: self.min,
                max: self.max,
                sensor: sensor.to_string(),
                closest: sensor.closest_band(0.5 * (self.min + self.max)),
            });
        }

        Ok(())
    }
}

impl From<[f64; 2]> for Window {
    fn from([min, max]: [f64; 2]) -> Self {
        Window::new(min, max)
    }
}

impl From<Window> for [f64; 2] {
    fn from(window: Window) -> Self {
        [window.min, window.max]
    }
}

/// Validated knobs of one inversion.
///
/// Instances only exist in a valid state: every constructor (builder, JSON,
/// `Default`) runs the same checks, so the inversion path never re-validates.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterConfiguration {
    dataset: DatasetKey,
    sensor: Sensor,
    absorption_window: Window,
    backscatter_window: Window,
    correction: CorrectionMode,
}

impl Default for ParameterConfiguration {
    fn default() -> Self {
        Self {
            dataset: DatasetKey::loisel23(constants::DEFAULT_L23_X, constants::DEFAULT_L23_Y),
            sensor: Sensor::default(),
            absorption_window: constants::DEFAULT_ABSORPTION_WINDOW,
            backscatter_window: constants::DEFAULT_BACKSCATTER_WINDOW,
            correction: CorrectionMode::default(),
        }
    }
}

// Deserializes a configuration from its JSON surface, filling defaults for
// missing fields and running the same validation as the builder.
impl<'de> Deserialize<'de> for ParameterConfiguration {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        #[derive(Deserialize)]
        #[serde(deny_unknown_fields)]
        struct ConfigHelper {
            dataset: Option<String>,
            x: Option<u32>,
            y: Option<u32>,
            sensor: Option<Sensor>,
            absorption_window: Option<Window>,
            backscatter_window: Option<Window>,
            correction: Option<String>,
        }

        let helper = ConfigHelper::deserialize(deserializer)?;

        let mut builder = ParameterConfiguration::builder();
        if let Some(dataset) = helper.dataset {
            builder = builder.dataset(dataset);
        }
        if let Some(x) = helper.x {
            builder = builder.x(x);
        }
        if let Some(y) = helper.y {
            builder = builder.y(y);
        }
        if let Some(sensor) = helper.sensor {
            builder = builder.sensor(sensor);
        }
        if let Some(window) = helper.absorption_window {
            builder = builder.absorption_window(window.min, window.max);
        }
        if let Some(window) = helper.backscatter_window {
            builder = builder.backscatter_window(window.min, window.max);
        }
        if let Some(correction) = helper.correction {
            builder = builder.correction(correction);
        }

        builder.build().map_err(D::Error::custom)
    }
}

impl ParameterConfiguration {
    pub fn builder() -> ParameterConfigurationBuilder {
        ParameterConfigurationBuilder::default()
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<ParameterConfiguration, ConfigError> {
        let file = File::open(path)?;
        let reader = BufReader::new(file);

        let config: ParameterConfiguration = serde_json::from_reader(reader)?;

        Ok(config)
    }

    pub fn dataset(&self) -> &DatasetKey {
        &self.dataset
    }

    pub fn sensor(&self) -> Sensor {
        self.sensor
    }

    pub fn absorption_window(&self) -> Window {
        self.absorption_window
    }

    pub fn backscatter_window(&self) -> Window {
        self.backscatter_window
    }

    pub fn correction(&self) -> CorrectionMode {
        self.correction
    }
}

/// Collects raw options; nothing is checked until [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ParameterConfigurationBuilder {
    dataset: String,
    x: u32,
    y: u32,
    sensor: Sensor,
    absorption_window: Window,
    backscatter_window: Window,
    correction: String,
}

impl Default for ParameterConfigurationBuilder {
    fn default() -> Self {
        Self {
            dataset: DatasetId::Loisel23.to_string(),
            x: constants::DEFAULT_L23_X,
            y: constants::DEFAULT_L23_Y,
            sensor: Sensor::default(),
            absorption_window: constants::DEFAULT_ABSORPTION_WINDOW,
            backscatter_window: constants::DEFAULT_BACKSCATTER_WINDOW,
            correction: CorrectionMode::default().to_string(),
        }
    }
}

impl ParameterConfigurationBuilder {
    pub fn dataset(mut self, dataset: impl Into<String>) -> Self {
        self.dataset = dataset.into();
        self
    }

    pub fn x(mut self, x: u32) -> Self {
        self.x = x;
        self
    }

    pub fn y(mut self, y: u32) -> Self {
        self.y = y;
        self
    }

    pub fn sensor(mut self, sensor: Sensor) -> Self {
        self.sensor = sensor;
        self
    }

    pub fn absorption_window(mut self, min: f64, max: f64) -> Self {
        self.absorption_window = Window::new(min, max);
        self
    }

    pub fn backscatter_window(mut self, min: f64, max: f64) -> Self {
        self.backscatter_window = Window::new(min, max);
        self
    }

    pub fn correction(mut self, correction: impl Into<String>) -> Self {
        self.correction = correction.into();
        self
    }

    pub fn build(self) -> Result<ParameterConfiguration, ConfigError> {
        let correction: CorrectionMode = self.correction.parse()?;
        let dataset: DatasetId = self.dataset.parse()?;

        self.absorption_window.validate("absorption", self.sensor)?;
        self.backscatter_window.validate("backscatter", self.sensor)?;

        Ok(ParameterConfiguration {
            dataset: DatasetKey::new(dataset, self.x, self.y),
            sensor: self.sensor,
            absorption_window: self.absorption_window,
            backscatter_window: self.backscatter_window,
            correction,
        })
    }
}
