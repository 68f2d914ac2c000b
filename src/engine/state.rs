//! Engine lifecycle states.

use std::fmt;

/// Lifecycle state of a [`ProcessingEngine`](super::ProcessingEngine).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineState {
    /// No run active. A previously loaded file may still be startable.
    Idle,
    /// Probing a file.
    Loading,
    /// A file is loaded and ready to start.
    Ready,
    /// The worker is decoding and emitting frames.
    Running,
    /// The worker is parked on the pause poll.
    Paused,
    /// The last run reached the end of the stream.
    Finished,
    /// The worker could not open the loaded file.
    Failed,
}

impl EngineState {
    /// True while a run owns a decode session.
    pub fn is_active(self) -> bool {
        matches!(self, EngineState::Running | EngineState::Paused)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            EngineState::Idle => "idle",
            EngineState::Loading => "loading",
            EngineState::Ready => "ready",
            EngineState::Running => "running",
            EngineState::Paused => "paused",
            EngineState::Finished => "finished",
            EngineState::Failed => "failed",
        }
    }

    /// Numeric code used by the state gauge.
    pub fn code(self) -> i64 {
        match self {
            EngineState::Idle => 0,
            EngineState::Loading => 1,
            EngineState::Ready => 2,
            EngineState::Running => 3,
            EngineState::Paused => 4,
            EngineState::Finished => 5,
            EngineState::Failed => 6,
        }
    }

    /// Inverse of [`code`](Self::code).
    pub fn from_code(code: i64) -> Option<Self> {
        Some(match code {
            0 => EngineState::Idle,
            1 => EngineState::Loading,
            2 => EngineState::Ready,
            3 => EngineState::Running,
            4 => EngineState::Paused,
            5 => EngineState::Finished,
            6 => EngineState::Failed,
            _ => return None,
        })
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_active_states() {
        assert!(EngineState::Running.is_active());
        assert!(EngineState::Paused.is_active());
        assert!(!EngineState::Finished.is_active());
        assert!(!EngineState::Idle.is_active());
    }

    #[test]
    fn test_code_round_trip() {
        for state in [
            EngineState::Idle,
            EngineState::Loading,
            EngineState::Ready,
            EngineState::Running,
            EngineState::Paused,
            EngineState::Finished,
            EngineState::Failed,
        ] {
            assert_eq!(EngineState::from_code(state.code()), Some(state));
        }
        assert_eq!(EngineState::from_code(42), None);
    }

    #[test]
    fn test_display() {
        assert_eq!(EngineState::Paused.to_string(), "paused");
    }
}
