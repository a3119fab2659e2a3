//! Aggregator configuration.
//!
//! Every field has a default matching the sensor firmware, so a JSON file only
//! needs the keys it overrides.

use crate::algo::{DEFAULT_CUSUM_THRESHOLD, DEFAULT_WINDOW_CAPACITY};
use crate::error::TelemetryError;
use crate::protocol::{Channel, ProtocolVariant};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Samples per cycle before a summary record is expected.
pub const DEFAULT_CYCLE_LENGTH: usize = 10;
pub const DEFAULT_SATURATION_LIMIT: u32 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistogramSpec {
    pub domain_min: f64,
    pub domain_max: f64,
    pub bucket_width: f64,
    pub saturation_limit: u32,
}

impl HistogramSpec {
    /// 8-bit colour channels.
    pub const fn color() -> Self {
        Self {
            domain_min: 0.0,
            domain_max: 255.0,
            bucket_width: 20.0,
            saturation_limit: DEFAULT_SATURATION_LIMIT,
        }
    }

    /// 10-bit light sensor.
    pub const fn light() -> Self {
        Self {
            domain_min: 0.0,
            domain_max: 1024.0,
            bucket_width: 100.0,
            saturation_limit: DEFAULT_SATURATION_LIMIT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AggregatorConfig {
    pub variant: ProtocolVariant,
    pub cycle_length: usize,
    pub window_capacity: usize,
    pub cusum_threshold: f64,
    pub color_histogram: HistogramSpec,
    pub light_histogram: HistogramSpec,
}

impl Default for AggregatorConfig {
    fn default() -> Self {
        Self {
            variant: ProtocolVariant::default(),
            cycle_length: DEFAULT_CYCLE_LENGTH,
            window_capacity: DEFAULT_WINDOW_CAPACITY,
            cusum_threshold: DEFAULT_CUSUM_THRESHOLD,
            color_histogram: HistogramSpec::color(),
            light_histogram: HistogramSpec::light(),
        }
    }
}

impl AggregatorConfig {
    pub fn for_variant(variant: ProtocolVariant) -> Self {
        Self {
            variant,
            ..Self::default()
        }
    }

    pub fn histogram_spec(&self, channel: Channel) -> HistogramSpec {
        match channel {
            Channel::Light => self.light_histogram,
            _ => self.color_histogram,
        }
    }

    pub fn from_json_str(json: &str) -> Result<Self, TelemetryError> {
        let config: Self =
            serde_json::from_str(json).map_err(|e| TelemetryError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, TelemetryError> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|e| TelemetryError::ConfigUnreadable {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json_str(&json)
    }

    pub fn validate(&self) -> Result<(), TelemetryError> {
        if self.cycle_length == 0 {
            return Err(TelemetryError::InvalidConfig(
                "cycle_length must be at least 1".to_string(),
            ));
        }
        if self.window_capacity == 0 {
            return Err(TelemetryError::InvalidConfig(
                "window_capacity must be at least 1".to_string(),
            ));
        }
        if !self.cusum_threshold.is_finite() || self.cusum_threshold < 0.0 {
            return Err(TelemetryError::InvalidConfig(format!(
                "cusum_threshold must be a non-negative number, got {}",
                self.cusum_threshold
            )));
        }
        for spec in [self.color_histogram, self.light_histogram] {
            crate::algo::RangeHistogram::from_spec(&spec)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_firmware() {
        let config = AggregatorConfig::default();
        assert_eq!(config.variant, ProtocolVariant::Filtered);
        assert_eq!(config.cycle_length, 10);
        assert_eq!(config.window_capacity, 10);
        assert_eq!(config.cusum_threshold, 2.0);
        assert_eq!(config.histogram_spec(Channel::Light).domain_max, 1024.0);
        assert_eq!(config.histogram_spec(Channel::Green).bucket_width, 20.0);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_json_overrides() {
        let config =
            AggregatorConfig::from_json_str(r#"{"variant": "basic", "cusum_threshold": 3.5}"#)
                .unwrap();
        assert_eq!(config.variant, ProtocolVariant::Basic);
        assert_eq!(config.cusum_threshold, 3.5);
        assert_eq!(config.cycle_length, DEFAULT_CYCLE_LENGTH);
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(matches!(
            AggregatorConfig::from_json_str(r#"{"cycle_length": 0}"#),
            Err(TelemetryError::InvalidConfig(_))
        ));
        let light = |max: f64, width: f64| {
            serde_json::json!({
                "light_histogram": {
                    "domain_min": 0.0,
                    "domain_max": max,
                    "bucket_width": width,
                    "saturation_limit": 100
                }
            })
            .to_string()
        };
        assert!(AggregatorConfig::from_json_str(&light(1024.0, -1.0)).is_err());
        // 1e300 buckets would otherwise be allocated up front
        assert!(matches!(
            AggregatorConfig::from_json_str(&light(1e300, 1.0)),
            Err(TelemetryError::InvalidConfig(_))
        ));
        assert!(AggregatorConfig::from_json_str("{not json").is_err());
    }

    #[test]
    fn test_missing_file() {
        let err = AggregatorConfig::from_file("/nonexistent/telemetry.json").unwrap_err();
        assert!(matches!(err, TelemetryError::ConfigUnreadable { .. }));
    }
}
