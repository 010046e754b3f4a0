use serde::Deserialize;

use crate::error::{CycleMapError, Result};

/// Sampling policy handed to the location provider.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SamplingPolicy {
    /// Minimum time between fixes (default: 1000)
    #[serde(default = "default_min_interval_millis")]
    pub min_interval_millis: u64,

    /// Minimum movement between fixes (default: 0, every fix)
    #[serde(default)]
    pub min_displacement_meters: f64,
}

impl SamplingPolicy {
    pub fn new(min_interval_millis: u64, min_displacement_meters: f64) -> Self {
        Self {
            min_interval_millis,
            min_displacement_meters,
        }
    }
}

impl Default for SamplingPolicy {
    fn default() -> Self {
        Self {
            min_interval_millis: default_min_interval_millis(),
            min_displacement_meters: 0.0,
        }
    }
}

/// Top-level configuration for the core.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CoreConfig {
    #[serde(default)]
    pub sampling: SamplingPolicy,

    /// Fixes buffered between the provider callback and the track buffer
    /// before new ones are dropped (default: 256)
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,

    /// Key of the persisted favourites slot (default: "favourites")
    #[serde(default = "default_favourites_key")]
    pub favourites_key: String,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            sampling: SamplingPolicy::default(),
            channel_capacity: default_channel_capacity(),
            favourites_key: default_favourites_key(),
        }
    }
}

impl CoreConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json).map_err(|e| CycleMapError::Config {
            message: e.to_string(),
        })?;
        if config.channel_capacity == 0 {
            return Err(CycleMapError::Config {
                message: "channelCapacity must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}

/// Options for GeoJSON export of tracks, routes and favourites.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConvertOptions {
    /// Include elevation as the 3rd coordinate value (default: true)
    #[serde(default = "default_true")]
    pub include_elevation: bool,

    /// Include timestamps in coordinateProperties.times (default: true)
    #[serde(default = "default_true")]
    pub include_time: bool,

    /// Join track segments into a single MultiLineString (default: false)
    #[serde(default)]
    pub join_track_segments: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        Self {
            include_elevation: true,
            include_time: true,
            join_track_segments: false,
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_min_interval_millis() -> u64 {
    1000
}

fn default_channel_capacity() -> usize {
    256
}

fn default_favourites_key() -> String {
    "favourites".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_from_empty_object() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.sampling.min_interval_millis, 1000);
        assert_eq!(config.favourites_key, "favourites");
    }

    #[test]
    fn test_partial_override() {
        let config = CoreConfig::from_json_str(
            r#"{"sampling": {"minDisplacementMeters": 5.0}, "channelCapacity": 8}"#,
        )
        .unwrap();
        assert_eq!(config.sampling.min_interval_millis, 1000);
        assert_eq!(config.sampling.min_displacement_meters, 5.0);
        assert_eq!(config.channel_capacity, 8);
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = CoreConfig::from_json_str(r#"{"channelCapacity": 0}"#).unwrap_err();
        assert!(matches!(err, CycleMapError::Config { .. }));
    }

    #[test]
    fn test_convert_options_defaults() {
        let opts: ConvertOptions = serde_json::from_str("{}").unwrap();
        assert!(opts.include_elevation);
        assert!(opts.include_time);
        assert!(!opts.join_track_segments);
    }
}
