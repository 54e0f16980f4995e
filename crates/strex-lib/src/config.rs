use crate::{
    detectors::{accel::ActivityConfig, ecg::CardiacConfig, rip::RespirationConfig},
    error::{Result as StrexResult, StrexError},
    metrics::sqi::AmplitudeBandQuality,
};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::{fs, path::Path};

/// Sampling rates of the reference chest band hardware.
pub const DEFAULT_ECG_HZ: f64 = 64.0;
pub const DEFAULT_RIP_HZ: f64 = 64.0 / 3.0;
pub const DEFAULT_ACCEL_HZ: f64 = 64.0 / 6.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QualityConfig {
    /// Fraction of good samples a window must exceed.
    pub threshold: f64,
    pub amplitude: AmplitudeBandQuality,
}

impl Default for QualityConfig {
    fn default() -> Self {
        Self {
            threshold: 0.67,
            amplitude: AmplitudeBandQuality::default(),
        }
    }
}

/// Session-wide configuration. Every field has a default, so a TOML file only
/// needs the values it changes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Window length in milliseconds.
    pub window_ms: i64,
    pub ecg_hz: f64,
    pub rip_hz: f64,
    pub accel_hz: f64,
    /// Keep the last input sample of each channel across windows.
    pub preserve_last_sample: bool,
    pub cardiac: CardiacConfig,
    pub respiration: RespirationConfig,
    pub activity: ActivityConfig,
    pub quality: QualityConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            window_ms: 60_000,
            ecg_hz: DEFAULT_ECG_HZ,
            rip_hz: DEFAULT_RIP_HZ,
            accel_hz: DEFAULT_ACCEL_HZ,
            preserve_last_sample: false,
            cardiac: CardiacConfig::default(),
            respiration: RespirationConfig::default(),
            activity: ActivityConfig::default(),
            quality: QualityConfig::default(),
        }
    }
}

impl PipelineConfig {
    pub fn validate(&self) -> StrexResult<()> {
        if self.window_ms <= 0 {
            return Err(StrexError::InvalidConfig("window_ms must be positive".into()));
        }
        for (name, hz) in [("ecg_hz", self.ecg_hz), ("rip_hz", self.rip_hz), ("accel_hz", self.accel_hz)] {
            if !(hz.is_finite() && hz > 0.0) {
                return Err(StrexError::InvalidConfig(format!("{name} must be positive, got {hz}")));
            }
        }
        if !(0.0..=1.0).contains(&self.quality.threshold) {
            return Err(StrexError::InvalidConfig(
                "quality.threshold must lie in [0, 1]".into(),
            ));
        }
        self.cardiac.validate()?;
        self.respiration.validate()?;
        self.activity.validate()
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let cfg: Self = toml::from_str(text).context("parsing pipeline configuration")?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_toml_str(&contents).with_context(|| format!("in {}", path.display()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).context("serializing pipeline configuration")
    }
}
