//! FFmpeg command-line backend.
//!
//! Metadata comes from `ffprobe` JSON output; frames are decoded by an
//! `ffmpeg` child process writing packed RGB24 to a pipe. Killing the child
//! closes the pipe, which is how a blocked read is interrupted.

use super::{Frame, FrameSource, Interrupter, SourceError, VideoBackend, VideoInfo};
use crate::config::DecoderConfig;
use serde::Deserialize;
use std::io::{BufReader, ErrorKind, Read};
use std::path::Path;
use std::process::{Child, ChildStdout, Command, Stdio};
use std::sync::{Arc, Mutex, PoisonError, TryLockError};

const BYTES_PER_PIXEL: usize = 3;

/// Backend that shells out to `ffprobe`/`ffmpeg`.
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    config: DecoderConfig,
}

impl FfmpegBackend {
    pub fn new(config: DecoderConfig) -> Self {
        Self { config }
    }
}

impl VideoBackend for FfmpegBackend {
    fn probe(&self, path: &Path) -> Result<VideoInfo, SourceError> {
        if !path.is_file() {
            return Err(SourceError::cannot_open(path, "file not found"));
        }

        let output = Command::new(&self.config.ffprobe_path)
            .args([
                "-v",
                "error",
                "-select_streams",
                "v:0",
                "-show_streams",
                "-of",
                "json",
            ])
            .arg(path)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| {
                SourceError::cannot_open(
                    path,
                    format!("failed to run {}: {}", self.config.ffprobe_path, e),
                )
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(SourceError::cannot_open(path, stderr.trim()));
        }

        parse_probe_output(&output.stdout)
    }

    fn open(&self, path: &Path) -> Result<Box<dyn FrameSource>, SourceError> {
        let info = self.probe(path)?;

        let mut child = Command::new(&self.config.ffmpeg_path)
            .args(["-hide_banner", "-loglevel", "error", "-nostdin", "-i"])
            .arg(path)
            .args(["-an", "-f", "rawvideo", "-pix_fmt", "rgb24", "-"])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => {
                let _ = child.kill();
                let _ = child.wait();
                return Err(SourceError::cannot_open(path, "decoder stdout unavailable"));
            }
        };

        tracing::debug!(path = %path.display(), pid = child.id(), "ffmpeg decoder spawned");

        Ok(Box::new(FfmpegSource {
            info,
            frame_bytes: info.width as usize * info.height as usize * BYTES_PER_PIXEL,
            stdout: BufReader::new(stdout),
            child: Arc::new(Mutex::new(child)),
            sequence: 0,
        }))
    }
}

/// A running `ffmpeg` decode session.
struct FfmpegSource {
    info: VideoInfo,
    frame_bytes: usize,
    stdout: BufReader<ChildStdout>,
    child: Arc<Mutex<Child>>,
    sequence: u64,
}

impl FrameSource for FfmpegSource {
    fn info(&self) -> VideoInfo {
        self.info
    }

    fn read_next(&mut self) -> Result<Option<Frame>, SourceError> {
        let mut buffer = vec![0u8; self.frame_bytes];
        let filled = read_full(&mut self.stdout, &mut buffer)
            .map_err(|e| SourceError::Decode(e.to_string()))?;

        if filled == 0 {
            let status = self
                .child
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .wait()
                .map_err(|e| SourceError::Decode(e.to_string()))?;
            if !status.success() {
                return Err(SourceError::Decode(format!("decoder exited with {status}")));
            }
            return Ok(None);
        }
        if filled < self.frame_bytes {
            return Err(SourceError::Decode(format!(
                "truncated frame: {} of {} bytes",
                filled, self.frame_bytes
            )));
        }

        self.sequence += 1;
        Frame::from_rgb(self.info.width, self.info.height, buffer, self.sequence)
            .map(Some)
            .ok_or_else(|| SourceError::Decode("frame buffer size mismatch".into()))
    }

    fn interrupter(&self) -> Option<Interrupter> {
        let child = Arc::clone(&self.child);
        Some(Interrupter::new(move || {
            // A busy lock means the worker is already reaping the process.
            let mut child = match child.try_lock() {
                Ok(child) => child,
                Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
                Err(TryLockError::WouldBlock) => return,
            };
            let _ = child.kill();
        }))
    }
}

impl Drop for FfmpegSource {
    fn drop(&mut self) {
        let mut child = self.child.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = child.kill();
        let _ = child.wait();
        tracing::debug!("ffmpeg decoder released");
    }
}

/// Reads until `buf` is full or the stream ends. Returns the bytes read.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

#[derive(Debug, Deserialize)]
struct ProbeOutput {
    #[serde(default)]
    streams: Vec<ProbeStream>,
}

#[derive(Debug, Deserialize)]
struct ProbeStream {
    width: Option<u32>,
    height: Option<u32>,
    avg_frame_rate: Option<String>,
    r_frame_rate: Option<String>,
    #[serde(default)]
    tags: ProbeTags,
    #[serde(default)]
    side_data_list: Vec<ProbeSideData>,
}

#[derive(Debug, Default, Deserialize)]
struct ProbeTags {
    rotate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ProbeSideData {
    rotation: Option<f64>,
}

impl ProbeStream {
    /// Display rotation in degrees. Side data wins over the legacy tag.
    fn rotation(&self) -> i64 {
        self.side_data_list
            .iter()
            .find_map(|side| side.rotation)
            .or_else(|| self.tags.rotate.as_deref().and_then(|r| r.trim().parse().ok()))
            .map(|degrees: f64| degrees.round() as i64)
            .unwrap_or(0)
    }
}

fn parse_probe_output(json: &[u8]) -> Result<VideoInfo, SourceError> {
    let output: ProbeOutput =
        serde_json::from_slice(json).map_err(|e| SourceError::Probe(e.to_string()))?;
    let stream = output
        .streams
        .into_iter()
        .next()
        .ok_or_else(|| SourceError::Probe("no video stream".into()))?;

    let width = stream.width.filter(|&w| w > 0);
    let height = stream.height.filter(|&h| h > 0);
    let (Some(width), Some(height)) = (width, height) else {
        return Err(SourceError::Probe("missing frame dimensions".into()));
    };

    // ffmpeg applies the display rotation while decoding, so quarter turns
    // arrive with width and height exchanged.
    let (width, height) = if stream.rotation().rem_euclid(180) == 90 {
        (height, width)
    } else {
        (width, height)
    };

    // Unreliable rate metadata is reported as 0 and defaulted by the engine.
    let fps = stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_rate)
        .or_else(|| stream.r_frame_rate.as_deref().and_then(parse_rate))
        .unwrap_or(0.0);

    Ok(VideoInfo { fps, width, height })
}

/// Parses an ffprobe rational such as `30000/1001`.
fn parse_rate(rate: &str) -> Option<f64> {
    let (num, den) = match rate.split_once('/') {
        Some((num, den)) => (num.trim().parse::<f64>().ok()?, den.trim().parse::<f64>().ok()?),
        None => (rate.trim().parse::<f64>().ok()?, 1.0),
    };
    if den == 0.0 {
        return None;
    }
    let fps = num / den;
    (fps.is_finite() && fps > 0.0).then_some(fps)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_rate() {
        assert_eq!(parse_rate("30/1"), Some(30.0));
        assert_eq!(parse_rate("25"), Some(25.0));
        assert!((parse_rate("30000/1001").unwrap() - 29.97).abs() < 0.01);
        assert_eq!(parse_rate("0/0"), None);
        assert_eq!(parse_rate("garbage"), None);
    }

    #[test]
    fn test_parse_probe_output() {
        let json = br#"{"streams":[{"width":640,"height":360,"avg_frame_rate":"0/0","r_frame_rate":"24/1"}]}"#;
        let info = parse_probe_output(json).unwrap();

        assert_eq!(info.width, 640);
        assert_eq!(info.height, 360);
        assert_eq!(info.fps, 24.0);
    }

    #[test]
    fn test_probe_output_without_rate_reports_zero() {
        let json = br#"{"streams":[{"width":8,"height":8}]}"#;
        let info = parse_probe_output(json).unwrap();

        assert_eq!(info.fps, 0.0);
        assert!(!info.has_valid_fps());
    }

    #[test]
    fn test_rotated_stream_reports_display_dimensions() {
        let json = br#"{"streams":[{"width":1920,"height":1080,"avg_frame_rate":"30/1",
            "side_data_list":[{"side_data_type":"Display Matrix","rotation":-90}]}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));

        let json = br#"{"streams":[{"width":1920,"height":1080,"tags":{"rotate":"270"}}]}"#;
        let info = parse_probe_output(json).unwrap();
        assert_eq!((info.width, info.height), (1080, 1920));
    }

    #[test]
    fn test_half_turn_keeps_dimensions() {
        let json = br#"{"streams":[{"width":1920,"height":1080,
            "side_data_list":[{"side_data_type":"Display Matrix","rotation":180}]}]}"#;
        let info = parse_probe_output(json).unwrap();

        assert_eq!((info.width, info.height), (1920, 1080));
    }

    #[test]
    fn test_probe_output_without_stream() {
        assert!(matches!(
            parse_probe_output(br#"{"streams":[]}"#),
            Err(SourceError::Probe(_))
        ));
        assert!(matches!(
            parse_probe_output(br#"{"streams":[{"width":0,"height":10}]}"#),
            Err(SourceError::Probe(_))
        ));
    }

    #[test]
    fn test_probe_missing_file() {
        let backend = FfmpegBackend::default();
        let result = backend.probe(Path::new("/nonexistent/clip.mp4"));

        assert!(matches!(result, Err(SourceError::CannotOpen { .. })));
    }

    #[test]
    fn test_read_full_short_stream() {
        let mut data: &[u8] = &[1, 2, 3];
        let mut buf = [0u8; 5];

        assert_eq!(read_full(&mut data, &mut buf).unwrap(), 3);
        assert_eq!(&buf[..3], &[1, 2, 3]);
    }
}
