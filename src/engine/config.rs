//! Live engine configuration.
//!
//! Delta and threshold can change at any moment from the caller's thread.
//! Both are packed into one atomic word so the worker reads a
//! self-consistent pair with a single load per iteration.

use crate::config::{validate_frame_delta, validate_threshold, ConfigError, EngineSettings};
use std::sync::atomic::{AtomicU64, Ordering};

/// Snapshot of the tunable detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineConfig {
    /// Temporal offset, in frames, between compared frames (>= 1).
    pub frame_delta: u32,
    /// Binarization threshold (difference must exceed it).
    pub motion_threshold: u8,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&EngineSettings::default())
    }
}

impl From<&EngineSettings> for EngineConfig {
    fn from(settings: &EngineSettings) -> Self {
        Self {
            frame_delta: settings.frame_delta.max(1),
            motion_threshold: settings.motion_threshold,
        }
    }
}

impl EngineConfig {
    fn pack(self) -> u64 {
        (u64::from(self.frame_delta) << 8) | u64::from(self.motion_threshold)
    }

    fn unpack(word: u64) -> Self {
        Self {
            frame_delta: (word >> 8) as u32,
            motion_threshold: (word & 0xFF) as u8,
        }
    }
}

/// Lock-free cell holding the current [`EngineConfig`].
#[derive(Debug)]
pub(crate) struct SharedConfig(AtomicU64);

impl SharedConfig {
    pub(crate) fn new(config: EngineConfig) -> Self {
        Self(AtomicU64::new(config.pack()))
    }

    pub(crate) fn snapshot(&self) -> EngineConfig {
        EngineConfig::unpack(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set_frame_delta(&self, delta: i64) -> Result<u32, ConfigError> {
        let delta = validate_frame_delta(delta)?;
        self.update(|config| config.frame_delta = delta);
        Ok(delta)
    }

    pub(crate) fn set_motion_threshold(&self, threshold: i64) -> Result<u8, ConfigError> {
        let threshold = validate_threshold(threshold)?;
        self.update(|config| config.motion_threshold = threshold);
        Ok(threshold)
    }

    fn update(&self, mut f: impl FnMut(&mut EngineConfig)) {
        let _ = self
            .0
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |word| {
                let mut config = EngineConfig::unpack(word);
                f(&mut config);
                Some(config.pack())
            });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_settings() {
        let config = EngineConfig::default();
        assert_eq!(config.frame_delta, 3);
        assert_eq!(config.motion_threshold, 30);
    }

    #[test]
    fn test_pack_round_trip_extremes() {
        let config = EngineConfig {
            frame_delta: u32::MAX,
            motion_threshold: 255,
        };
        assert_eq!(EngineConfig::unpack(config.pack()), config);
    }

    #[test]
    fn test_updates_keep_other_field() {
        let shared = SharedConfig::new(EngineConfig::default());

        shared.set_frame_delta(7).unwrap();
        shared.set_motion_threshold(12).unwrap();

        assert_eq!(
            shared.snapshot(),
            EngineConfig {
                frame_delta: 7,
                motion_threshold: 12
            }
        );
    }

    #[test]
    fn test_rejected_values_leave_config_unchanged() {
        let shared = SharedConfig::new(EngineConfig::default());

        assert!(shared.set_frame_delta(0).is_err());
        assert!(shared.set_motion_threshold(-1).is_err());
        assert!(shared.set_motion_threshold(300).is_err());

        assert_eq!(shared.snapshot(), EngineConfig::default());
    }
}
