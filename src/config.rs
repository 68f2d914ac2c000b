//! File configuration.
//!
//! Every section is optional in the TOML file; missing values take the
//! defaults below. Command-line flags are applied on top by the binary.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

/// Smallest accepted frame delta.
pub const MIN_FRAME_DELTA: i64 = 1;
/// Largest accepted motion threshold.
pub const MAX_MOTION_THRESHOLD: i64 = 255;
/// Upper bound on the pause/sleep poll slice, which bounds stop latency.
pub const MAX_POLL_INTERVAL_MS: u64 = 50;

/// Configuration validation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("frame delta must be positive, got {0}")]
    InvalidFrameDelta(i64),
    #[error("motion threshold must be between 0 and 255, got {0}")]
    InvalidThreshold(i64),
    #[error("poll interval must be 1-50 ms, got {0}")]
    InvalidPollInterval(u64),
    #[error("stop timeouts must be non-zero")]
    InvalidTimeout,
    #[error("failed to read config file: {0}")]
    FileReadError(String),
    #[error("failed to parse config file: {0}")]
    ParseError(String),
}

/// Validates a requested frame delta.
pub fn validate_frame_delta(delta: i64) -> Result<u32, ConfigError> {
    if delta < MIN_FRAME_DELTA || delta > i64::from(u32::MAX) {
        return Err(ConfigError::InvalidFrameDelta(delta));
    }
    Ok(delta as u32)
}

/// Validates a requested motion threshold.
pub fn validate_threshold(threshold: i64) -> Result<u8, ConfigError> {
    if !(0..=MAX_MOTION_THRESHOLD).contains(&threshold) {
        return Err(ConfigError::InvalidThreshold(threshold));
    }
    Ok(threshold as u8)
}

/// Engine defaults and timing.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineSettings {
    /// Initial temporal offset between compared frames.
    pub frame_delta: u32,
    /// Initial binarization threshold.
    pub motion_threshold: u8,
    /// Frame rate used when the container reports none.
    pub default_fps: f64,
    /// Slice length for the pause poll and pacing sleep.
    pub poll_interval_ms: u64,
    /// Wait for the worker on an explicit stop.
    pub stop_timeout_ms: u64,
    /// Wait for the worker when a new file is loaded mid-run.
    pub reload_timeout_ms: u64,
    /// Extra wait after interrupting an unresponsive decoder.
    pub force_grace_ms: u64,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            frame_delta: 3,
            motion_threshold: 30,
            default_fps: 30.0,
            poll_interval_ms: 50,
            stop_timeout_ms: 2000,
            reload_timeout_ms: 1000,
            force_grace_ms: 250,
        }
    }
}

impl EngineSettings {
    /// Validates the settings.
    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_frame_delta(i64::from(self.frame_delta))?;
        if self.poll_interval_ms == 0 || self.poll_interval_ms > MAX_POLL_INTERVAL_MS {
            return Err(ConfigError::InvalidPollInterval(self.poll_interval_ms));
        }
        if self.stop_timeout_ms == 0 || self.reload_timeout_ms == 0 {
            return Err(ConfigError::InvalidTimeout);
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn stop_timeout(&self) -> Duration {
        Duration::from_millis(self.stop_timeout_ms)
    }

    pub fn reload_timeout(&self) -> Duration {
        Duration::from_millis(self.reload_timeout_ms)
    }

    pub fn force_grace(&self) -> Duration {
        Duration::from_millis(self.force_grace_ms)
    }
}

/// External decoder executables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DecoderConfig {
    pub ffmpeg_path: String,
    pub ffprobe_path: String,
}

impl Default for DecoderConfig {
    fn default() -> Self {
        Self {
            ffmpeg_path: "ffmpeg".into(),
            ffprobe_path: "ffprobe".into(),
        }
    }
}

/// Metrics exporter configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Metrics server port (0 to disable).
    pub port: u16,
}

/// Full configuration file format.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub engine: EngineSettings,
    #[serde(default)]
    pub decoder: DecoderConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl FileConfig {
    /// Loads configuration from a TOML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileReadError(e.to_string()))?;
        Self::from_toml(&content)
    }

    /// Parses and validates configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: FileConfig =
            toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
        config.engine.validate()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_valid() {
        assert!(EngineSettings::default().validate().is_ok());
    }

    #[test]
    fn test_frame_delta_validation() {
        assert_eq!(validate_frame_delta(1), Ok(1));
        assert_eq!(validate_frame_delta(0), Err(ConfigError::InvalidFrameDelta(0)));
        assert_eq!(validate_frame_delta(-4), Err(ConfigError::InvalidFrameDelta(-4)));
    }

    #[test]
    fn test_threshold_validation() {
        assert_eq!(validate_threshold(0), Ok(0));
        assert_eq!(validate_threshold(255), Ok(255));
        assert_eq!(validate_threshold(-1), Err(ConfigError::InvalidThreshold(-1)));
        assert_eq!(validate_threshold(256), Err(ConfigError::InvalidThreshold(256)));
    }

    #[test]
    fn test_poll_interval_bounded() {
        let settings = EngineSettings {
            poll_interval_ms: 200,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::InvalidPollInterval(200))
        ));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config = FileConfig::from_toml(
            r#"
            [engine]
            frame_delta = 5

            [decoder]
            ffmpeg_path = "/opt/ffmpeg/bin/ffmpeg"
            "#,
        )
        .unwrap();

        assert_eq!(config.engine.frame_delta, 5);
        assert_eq!(config.engine.motion_threshold, 30);
        assert_eq!(config.decoder.ffmpeg_path, "/opt/ffmpeg/bin/ffmpeg");
        assert_eq!(config.decoder.ffprobe_path, "ffprobe");
        assert_eq!(config.metrics.port, 0);
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(matches!(
            FileConfig::from_toml("[engine]\nframe_delta = 0\n"),
            Err(ConfigError::InvalidFrameDelta(0))
        ));
        assert!(matches!(
            FileConfig::from_toml("engine = 3"),
            Err(ConfigError::ParseError(_))
        ));
    }
}
