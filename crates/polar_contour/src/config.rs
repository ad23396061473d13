use std::{fs, path::Path};

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString, IntoStaticStr};

use crate::error::{ContourError, Result};

/// How the refinement pass derives its per-row thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, EnumString, IntoStaticStr)]
#[strum(serialize_all = "snake_case")]
pub enum ThresholdMode {
    /// One threshold per row from the eroded intensity band around the contour.
    PerRow,
    /// A single threshold from the darkest contour average, shared by all rows.
    Global,
}

/// Tuning knobs of the two-pass tracer.
///
/// Key names match the configuration files (`margin1`, `th1`, `W`, ...), so
/// `key=value` overrides use the same spelling as the files.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq)]
#[serde(default)]
pub struct ContourConfig {
    /// Edge band width (columns) for the near/far means, and inner sweep of the band finder
    pub margin1: usize,
    /// Outer sweep of the band finder
    pub margin2: usize,
    /// Threshold fraction for pass 1
    pub th1: f32,
    /// Threshold fraction for pass 2
    pub th2: f32,
    /// Distance penalty weight for pass 1
    pub smooth1: f32,
    /// Distance penalty weight for pass 2
    pub smooth2: f32,
    /// Max column shift between adjacent rows
    pub gap: usize,
    /// Extra columns added to the refinement bound (may be negative)
    pub extra: i32,
    /// Lower backoff of the refinement range
    pub minus: usize,
    /// Tolerance of the variance plateau
    pub eth: f32,
    /// Run the refinement pass
    pub extend: bool,
    /// Discount applied to below-threshold cost in pass 2
    pub ndisc: f32,
    /// Coverage fraction of the bright contour average
    pub wctrpct: f32,
    /// Coverage fraction of the dark contour average
    pub ctrpct: f32,
    /// Erosion kernel size
    pub mink: usize,
    /// Gradient window half-width
    #[serde(rename = "W")]
    pub window: usize,
    /// Step cost for pass 2
    pub scost2: f32,
    /// Use a single global threshold for pass 2
    pub gth2: bool,
}

impl Default for ContourConfig {
    fn default() -> Self {
        Self {
            margin1: 5,
            margin2: 30,
            th1: 0.7,
            th2: 0.04,
            smooth1: 10.0,
            smooth2: 30.0,
            gap: 7,
            extra: 0,
            minus: 0,
            eth: 0.0,
            extend: true,
            ndisc: 0.4,
            wctrpct: 0.9,
            ctrpct: 0.8,
            mink: 3,
            window: 2,
            scost2: 0.0,
            gth2: false,
        }
    }
}

impl ContourConfig {
    pub fn threshold_mode(&self) -> ThresholdMode {
        if self.gth2 {
            ThresholdMode::Global
        } else {
            ThresholdMode::PerRow
        }
    }

    /// Get the JSON schema of the configuration
    pub fn schema() -> schemars::schema::RootSchema {
        schemars::schema_for!(ContourConfig)
    }

    /// Load configuration from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: ContourConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from JSON string
    pub fn from_json(content: &str) -> Result<Self> {
        let config: ContourConfig = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Auto-detect file format and load configuration
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("toml") => Self::from_toml(&content),
            Some("json") => Self::from_json(&content),
            _ => Err(ContourError::UnsupportedFileFormat),
        }
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Apply `key=value` overrides on top of the current values.
    ///
    /// Boolean keys also accept integers (non-zero is true).
    pub fn with_overrides<S: AsRef<str>>(self, overrides: &[S]) -> Result<Self> {
        let mut value = serde_json::to_value(&self)?;
        let map = value
            .as_object_mut()
            .ok_or_else(|| ContourError::invalid("config", "expected an object"))?;
        for item in overrides {
            let item = item.as_ref();
            let (key, raw) = item
                .split_once('=')
                .ok_or_else(|| ContourError::InvalidOverride(item.to_string()))?;
            let key = key.trim();
            let raw = raw.trim();
            let slot = map
                .get_mut(key)
                .ok_or_else(|| ContourError::UnknownConfigKey(key.to_string()))?;
            let parsed: Value = serde_json::from_str(raw)
                .map_err(|_| ContourError::InvalidOverride(item.to_string()))?;
            *slot = match (&*slot, parsed) {
                (Value::Bool(_), Value::Number(n)) => Value::Bool(n.as_f64() != Some(0.0)),
                (_, parsed) => parsed,
            };
        }
        let config: ContourConfig = serde_json::from_value(value)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.margin1 == 0 {
            return Err(ContourError::invalid("margin1", "must be at least 1"));
        }
        if self.mink == 0 {
            return Err(ContourError::invalid("mink", "must be at least 1"));
        }
        for (name, pct) in [("wctrpct", self.wctrpct), ("ctrpct", self.ctrpct)] {
            if !(pct > 0.5 && pct <= 1.0) {
                return Err(ContourError::invalid(name, format!("{pct} is outside (0.5, 1]")));
            }
        }
        for (name, v) in [
            ("th1", self.th1),
            ("th2", self.th2),
            ("smooth1", self.smooth1),
            ("smooth2", self.smooth2),
            ("eth", self.eth),
            ("ndisc", self.ndisc),
            ("scost2", self.scost2),
        ] {
            if !v.is_finite() {
                return Err(ContourError::invalid(name, "must be finite"));
            }
        }
        Ok(())
    }
}
