//! Engine-to-consumer notifications.
//!
//! The engine never talks to a presentation layer directly; it pushes
//! results through an [`EventSink`] supplied at construction. Worker events
//! arrive on the worker thread, load results on the caller's thread.

use crate::capture::{Frame, VideoInfo};
use crate::detection::MotionMask;
use crossbeam_channel::{unbounded, Receiver, Sender};

/// Consumer of engine output.
///
/// Implementations must return promptly and must not call back into the
/// engine's lifecycle commands from `frames_ready`, which runs on the
/// worker thread.
pub trait EventSink: Send + Sync {
    /// Stream metadata after a successful load.
    fn video_info_ready(&self, info: VideoInfo);

    /// One processed frame and its mask, in capture order.
    fn frames_ready(&self, original: Frame, mask: MotionMask);

    /// The run reached the end of the stream.
    fn processing_finished(&self);

    /// A load failed or a command was misused.
    fn error_occurred(&self, message: &str);
}

/// Owned form of the [`EventSink`] callbacks.
#[derive(Debug, Clone)]
pub enum EngineEvent {
    VideoInfoReady(VideoInfo),
    FramesReady { original: Frame, mask: MotionMask },
    ProcessingFinished,
    Error(String),
}

/// Sink forwarding every event into a channel.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx }
    }

    /// Creates a sink with an unbounded channel, so the worker never blocks
    /// on a slow consumer.
    pub fn unbounded() -> (Self, Receiver<EngineEvent>) {
        let (tx, rx) = unbounded();
        (Self::new(tx), rx)
    }

    fn send(&self, event: EngineEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("Event receiver dropped");
        }
    }
}

impl EventSink for ChannelSink {
    fn video_info_ready(&self, info: VideoInfo) {
        self.send(EngineEvent::VideoInfoReady(info));
    }

    fn frames_ready(&self, original: Frame, mask: MotionMask) {
        self.send(EngineEvent::FramesReady { original, mask });
    }

    fn processing_finished(&self) {
        self.send(EngineEvent::ProcessingFinished);
    }

    fn error_occurred(&self, message: &str) {
        self.send(EngineEvent::Error(message.to_string()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_forwards_in_order() {
        let (sink, rx) = ChannelSink::unbounded();
        let info = VideoInfo {
            fps: 24.0,
            width: 2,
            height: 2,
        };

        sink.video_info_ready(info);
        sink.error_occurred("boom");
        sink.processing_finished();

        assert!(matches!(rx.try_recv(), Ok(EngineEvent::VideoInfoReady(i)) if i == info));
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::Error(m)) if m == "boom"));
        assert!(matches!(rx.try_recv(), Ok(EngineEvent::ProcessingFinished)));
    }

    #[test]
    fn test_dropped_receiver_is_ignored() {
        let (sink, rx) = ChannelSink::unbounded();
        drop(rx);
        sink.processing_finished();
    }
}
