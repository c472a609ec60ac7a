//! Volume configuration

use crate::error::{Result, VolumeError};
use crate::layout::CubeSize;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Directory holding the channel tiles
pub const DEFAULT_CHANNEL_DIR: &str = "images/channel";

/// Directory holding the segmentation tiles
pub const DEFAULT_SEGMENTATION_DIR: &str = "images/segmentation";

/// How failed tile downloads are retried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Attempts per tile including the first one
    pub max_attempts: u32,

    /// Fixed wait between attempts, in milliseconds
    pub delay_ms: u64,
}

impl RetryPolicy {
    /// Retry `max_attempts` times with a fixed `delay` in between
    pub fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay_ms: delay.as_millis() as u64,
        }
    }

    /// Wait between two attempts
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            delay_ms: 1000,
        }
    }
}

/// Construction parameters of a volume
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeConfig {
    /// Edge length of the cube on every axis
    pub edge: usize,

    /// Tile directory of the channel store
    pub channel_dir: String,

    /// Tile directory of the segmentation store
    pub segmentation_dir: String,

    /// Retry behaviour for tile downloads
    pub retry: RetryPolicy,
}

impl VolumeConfig {
    /// Default configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the cube edge length
    pub fn with_edge(mut self, edge: usize) -> Self {
        self.edge = edge;
        self
    }

    /// Set the tile directories
    pub fn with_directories(
        mut self,
        channel_dir: impl Into<String>,
        segmentation_dir: impl Into<String>,
    ) -> Self {
        self.channel_dir = channel_dir.into();
        self.segmentation_dir = segmentation_dir.into();
        self
    }

    /// Set the retry policy
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Size of the cubes described by this configuration
    pub fn cube_size(&self) -> Result<CubeSize> {
        CubeSize::cube(self.edge)
    }

    /// Check that the configuration describes a usable volume
    pub fn validate(&self) -> Result<()> {
        self.cube_size()?;

        if self.retry.max_attempts == 0 {
            return Err(VolumeError::Configuration(
                "Retry policy needs at least one attempt".to_string(),
            ));
        }

        if self.channel_dir.is_empty() || self.segmentation_dir.is_empty() {
            return Err(VolumeError::Configuration(
                "Tile directories must not be empty".to_string(),
            ));
        }

        if self.channel_dir == self.segmentation_dir {
            return Err(VolumeError::Configuration(format!(
                "Channel and segmentation share the tile directory {}",
                self.channel_dir
            )));
        }

        Ok(())
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Serialize to pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for VolumeConfig {
    fn default() -> Self {
        Self {
            edge: CubeSize::DEFAULT_EDGE,
            channel_dir: DEFAULT_CHANNEL_DIR.to_string(),
            segmentation_dir: DEFAULT_SEGMENTATION_DIR.to_string(),
            retry: RetryPolicy::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = VolumeConfig::default();
        assert_eq!(config.edge, 256);
        assert_eq!(config.channel_dir, "images/channel");
        assert_eq!(config.segmentation_dir, "images/segmentation");
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.delay(), Duration::from_secs(1));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_json_round_trip() {
        let config = VolumeConfig::new()
            .with_edge(64)
            .with_directories("tiles/em", "tiles/labels")
            .with_retry_policy(RetryPolicy::new(5, Duration::from_millis(250)));

        let json = config.to_json().unwrap();
        let parsed = VolumeConfig::from_json(&json).unwrap();
        assert_eq!(parsed, config);
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let parsed = VolumeConfig::from_json(r#"{ "edge": 32, "retry": { "delay_ms": 5 } }"#).unwrap();
        assert_eq!(parsed.edge, 32);
        assert_eq!(parsed.channel_dir, DEFAULT_CHANNEL_DIR);
        assert_eq!(parsed.retry.max_attempts, 3);
        assert_eq!(parsed.retry.delay_ms, 5);
    }

    #[test]
    fn test_validation() {
        assert!(VolumeConfig::new().with_edge(0).validate().is_err());
        assert!(VolumeConfig::new()
            .with_retry_policy(RetryPolicy::new(0, Duration::ZERO))
            .validate()
            .is_err());
        assert!(VolumeConfig::new()
            .with_directories("same", "same")
            .validate()
            .is_err());
        assert!(matches!(
            VolumeConfig::from_json("{ not json"),
            Err(VolumeError::Serialization(_))
        ));
    }

    #[test]
    fn test_oversized_edge_is_rejected() {
        assert!(matches!(
            VolumeConfig::from_json(r#"{ "edge": 4294967296 }"#),
            Err(VolumeError::Configuration(_))
        ));
        assert!(VolumeConfig::new().with_edge(1 << 32).validate().is_err());
    }
}
