//! Simulation parameters and engine configuration.
//!
//! Parameters are read fresh every tick; only `num_particles` forces a
//! reallocation. They load from JSON with every field optional:
//!
//! ```json
//! { "fadeOpacity": 0.96, "speedFactor": 0.5, "numParticles": 262144 }
//! ```

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::ramp::Palette;

/// Per-tick simulation parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SimParams {
    /// How much of the previous frame survives each tick, in `(0, 1)`.
    pub fade_opacity: f32,
    /// Multiplier on particle displacement, `> 0`.
    pub speed_factor: f32,
    /// Base probability per tick of reseeding a particle, in `[0, 1]`.
    pub drop_rate: f32,
    /// Extra reseed probability at maximum speed, `>= 0`.
    pub drop_rate_bump: f32,
    /// Requested particle count; the engine rounds up to a square.
    pub num_particles: u32,
    /// Stretch eastward motion by `1 / cos(latitude)`.
    pub latitude_correction: bool,
}

impl Default for SimParams {
    fn default() -> Self {
        Self {
            fade_opacity: 0.76,
            speed_factor: 0.25,
            drop_rate: 0.045,
            drop_rate_bump: 0.01,
            num_particles: 65536,
            latitude_correction: false,
        }
    }
}

impl SimParams {
    /// Check every field against its documented range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_fade_opacity(self.fade_opacity)?;
        check_speed_factor(self.speed_factor)?;
        check_drop_rate(self.drop_rate)?;
        check_drop_rate_bump(self.drop_rate_bump)?;
        if self.num_particles == 0 {
            return Err(ConfigError::ZeroParticles);
        }
        Ok(())
    }

    /// Parse and validate parameters from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let params: Self = serde_json::from_str(json)?;
        params.validate()?;
        Ok(params)
    }

    pub fn with_fade_opacity(mut self, value: f32) -> Result<Self, ConfigError> {
        self.fade_opacity = check_fade_opacity(value)?;
        Ok(self)
    }

    pub fn with_speed_factor(mut self, value: f32) -> Result<Self, ConfigError> {
        self.speed_factor = check_speed_factor(value)?;
        Ok(self)
    }

    pub fn with_drop_rate(mut self, value: f32) -> Result<Self, ConfigError> {
        self.drop_rate = check_drop_rate(value)?;
        Ok(self)
    }

    pub fn with_drop_rate_bump(mut self, value: f32) -> Result<Self, ConfigError> {
        self.drop_rate_bump = check_drop_rate_bump(value)?;
        Ok(self)
    }

    pub fn with_num_particles(mut self, value: u32) -> Self {
        self.num_particles = value;
        self
    }

    pub fn with_latitude_correction(mut self, enabled: bool) -> Self {
        self.latitude_correction = enabled;
        self
    }
}

pub(crate) fn check_fade_opacity(value: f32) -> Result<f32, ConfigError> {
    if value > 0.0 && value < 1.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name: "fadeOpacity",
            value,
            range: "(0, 1)",
        })
    }
}

pub(crate) fn check_speed_factor(value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value > 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name: "speedFactor",
            value,
            range: "(0, inf)",
        })
    }
}

pub(crate) fn check_drop_rate(value: f32) -> Result<f32, ConfigError> {
    if (0.0..=1.0).contains(&value) {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name: "dropRate",
            value,
            range: "[0, 1]",
        })
    }
}

pub(crate) fn check_drop_rate_bump(value: f32) -> Result<f32, ConfigError> {
    if value.is_finite() && value >= 0.0 {
        Ok(value)
    } else {
        Err(ConfigError::OutOfRange {
            name: "dropRateBump",
            value,
            range: "[0, inf)",
        })
    }
}

/// Everything needed to construct an engine.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub params: SimParams,
    /// Color ramp used to tint particles by speed.
    pub palette: Palette,
    /// Color the visible surface is cleared to before compositing.
    /// `None` keeps whatever the host drew underneath (e.g. a basemap).
    pub background: Option<[f64; 4]>,
}

impl EngineConfig {
    /// Parse and validate a configuration from JSON text.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.params.validate()?;
        Ok(config)
    }

    /// Load a configuration file.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let json = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let params = SimParams::default();
        assert!(params.validate().is_ok());
        assert_eq!(params.num_particles, 65536);
        assert!(!params.latitude_correction);
    }

    #[test]
    fn test_partial_json_fills_defaults() {
        let params = SimParams::from_json_str(r#"{"speedFactor": 0.5, "numParticles": 1024}"#).unwrap();
        assert_eq!(params.speed_factor, 0.5);
        assert_eq!(params.num_particles, 1024);
        assert_eq!(params.fade_opacity, SimParams::default().fade_opacity);
    }

    #[test]
    fn test_out_of_range_json_is_rejected() {
        let err = SimParams::from_json_str(r#"{"fadeOpacity": 1.5}"#).unwrap_err();
        assert!(matches!(err, ConfigError::OutOfRange { name: "fadeOpacity", .. }));
        let err = SimParams::from_json_str(r#"{"numParticles": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::ZeroParticles));
    }

    #[test]
    fn test_builders_validate() {
        assert!(SimParams::default().with_fade_opacity(0.0).is_err());
        assert!(SimParams::default().with_fade_opacity(f32::NAN).is_err());
        assert!(SimParams::default().with_speed_factor(-1.0).is_err());
        assert!(SimParams::default().with_speed_factor(f32::INFINITY).is_err());
        assert!(SimParams::default().with_drop_rate(1.0).is_ok());
        assert!(SimParams::default().with_drop_rate(1.01).is_err());
        assert!(SimParams::default().with_drop_rate_bump(-0.1).is_err());

        let params = SimParams::default()
            .with_fade_opacity(0.996)
            .and_then(|p| p.with_drop_rate(0.003))
            .unwrap();
        assert_eq!(params.fade_opacity, 0.996);
        assert_eq!(params.drop_rate, 0.003);
    }

    #[test]
    fn test_engine_config_json() {
        let config = EngineConfig::from_json_str(
            r#"{"params": {"dropRate": 0.01}, "palette": "viridis", "background": [0.0, 0.0, 0.1, 1.0]}"#,
        )
        .unwrap();
        assert_eq!(config.params.drop_rate, 0.01);
        assert_eq!(config.palette, Palette::Viridis);
        assert_eq!(config.background, Some([0.0, 0.0, 0.1, 1.0]));

        let empty = EngineConfig::from_json_str("{}").unwrap();
        assert_eq!(empty, EngineConfig::default());
    }

    #[test]
    fn test_engine_config_missing_file() {
        let err = EngineConfig::from_json_file("/nonexistent/params.json").unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
