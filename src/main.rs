//! Motion Player CLI
//!
//! Headless player: decodes a video, runs motion detection at real-time
//! pace and logs per-frame motion until the file ends or Ctrl-C.

use clap::Parser;
use crossbeam_channel::{bounded, select};
use motion_player::{
    capture::{FfmpegBackend, SyntheticBackend, SyntheticConfig, VideoBackend},
    config::FileConfig,
    engine::{EngineEvent, EngineState, ProcessingEngine},
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// Play a video with frame-delta motion detection.
#[derive(Debug, Parser)]
#[command(name = "motion-player", version, about)]
struct Args {
    /// Video file to play.
    path: PathBuf,

    /// TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Frames between the compared pair (overrides the config file).
    #[arg(short, long)]
    delta: Option<i64>,

    /// Luminance difference threshold, 0-255 (overrides the config file).
    #[arg(short, long)]
    threshold: Option<i64>,

    /// Play a generated stream instead of decoding the file.
    #[arg(long)]
    synthetic: bool,

    /// Serve Prometheus metrics on this port (0 disables).
    #[arg(long)]
    metrics_port: Option<u16>,
}

fn main() -> ExitCode {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();
    info!("Motion Player v{}", motion_player::VERSION);

    let file_config = match &args.config {
        Some(path) => match FileConfig::from_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Failed to load config {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        },
        None => FileConfig::default(),
    };

    let backend: Arc<dyn VideoBackend> = if args.synthetic {
        info!("Using synthetic video source");
        Arc::new(SyntheticBackend::new(SyntheticConfig {
            width: 320,
            height: 240,
            ..Default::default()
        }))
    } else {
        Arc::new(FfmpegBackend::new(file_config.decoder.clone()))
    };

    let (engine, events) = ProcessingEngine::with_channel(backend, file_config.engine.clone());
    let engine = Arc::new(engine);

    if let Some(delta) = args.delta {
        if let Err(e) = engine.set_frame_delta(delta) {
            eprintln!("Invalid --delta: {}", e);
            return ExitCode::FAILURE;
        }
    }
    if let Some(threshold) = args.threshold {
        if let Err(e) = engine.set_motion_threshold(threshold) {
            eprintln!("Invalid --threshold: {}", e);
            return ExitCode::FAILURE;
        }
    }

    let metrics_port = args.metrics_port.unwrap_or(file_config.metrics.port);
    if metrics_port != 0 {
        start_metrics(&engine, metrics_port);
    }

    let (interrupt_tx, interrupted) = bounded::<()>(1);
    if let Err(e) = ctrlc::set_handler(move || {
        let _ = interrupt_tx.try_send(());
    }) {
        warn!("Failed to install Ctrl-C handler: {}", e);
    }

    engine.load(&args.path);
    if engine.state() != EngineState::Ready {
        for event in events.try_iter() {
            if let EngineEvent::Error(message) = event {
                error!("{}", message);
            }
        }
        return ExitCode::FAILURE;
    }
    engine.start();

    let mut succeeded = true;
    loop {
        select! {
            recv(events) -> event => match event {
                Ok(EngineEvent::VideoInfoReady(info)) => {
                    info!(fps = info.fps, width = info.width, height = info.height, "Video info");
                }
                Ok(EngineEvent::FramesReady { original, mask }) => {
                    if mask.is_empty() {
                        debug!(sequence = original.sequence(), "Filling history");
                    } else {
                        debug!(
                            sequence = original.sequence(),
                            motion_pixels = mask.motion_pixels(),
                            motion_ratio = mask.motion_ratio(),
                            "Frame"
                        );
                    }
                }
                Ok(EngineEvent::ProcessingFinished) => {
                    info!("Playback finished");
                    break;
                }
                Ok(EngineEvent::Error(message)) => {
                    error!("{}", message);
                    if !engine.state().is_active() {
                        succeeded = false;
                        break;
                    }
                }
                Err(_) => break,
            },
            recv(interrupted) -> _ => {
                info!("Interrupted, stopping playback");
                engine.stop();
                break;
            }
        }
    }

    engine.stop();

    let stats = engine.stats();
    info!(
        frames = stats.frames_emitted,
        masks = stats.masks_computed,
        motion_pixels = stats.motion_pixels,
        pacing_overruns = stats.pacing_overruns,
        read_errors = stats.read_errors,
        forced_terminations = stats.forced_terminations,
        "Run summary"
    );

    if succeeded {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

#[cfg(feature = "metrics")]
fn start_metrics(engine: &Arc<ProcessingEngine>, port: u16) {
    use motion_player::metrics::{MetricsRegistry, MetricsServer, MetricsServerConfig};

    let registry = match MetricsRegistry::new() {
        Ok(registry) => registry,
        Err(e) => {
            warn!("Metrics disabled: {}", e);
            return;
        }
    };
    let engine = Arc::clone(engine);

    let spawned = std::thread::Builder::new()
        .name("metrics".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_multi_thread()
                .worker_threads(1)
                .enable_all()
                .build()
            {
                Ok(runtime) => runtime,
                Err(e) => {
                    warn!("Metrics runtime failed to start: {}", e);
                    return;
                }
            };

            let server = MetricsServer::new(MetricsServerConfig::with_port(port), registry);
            if let Err(e) = runtime.block_on(server.run(engine)) {
                warn!("Metrics server stopped: {}", e);
            }
        });

    if let Err(e) = spawned {
        warn!("Failed to spawn metrics thread: {}", e);
    }
}

#[cfg(not(feature = "metrics"))]
fn start_metrics(_engine: &Arc<ProcessingEngine>, port: u16) {
    warn!(port, "Built without the `metrics` feature, exporter disabled");
}
