//! Flight Motion - replay driver
//!
//! Plays a recorded JSON-lines observation session through the motion engine
//! in real time, logging flight-phase transitions and engine statistics.
//! Rendered frames can be written to stdout as JSON lines.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::time::MissedTickBehavior;
use tokio_stream::wrappers::LinesStream;
use tokio_stream::StreamExt;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use flight_motion::{
    ingest_channel, parse_line, AirportDatabase, EngineConfig, MotionEngine, NoGeoContext,
    ObservationSender, RunwayProvider, SourceTag, TerrainProvider,
};

/// Observations buffered between the replay reader and the tick loop
const INGEST_QUEUE_CAPACITY: usize = 4096;

/// Driver settings, read from the environment
#[derive(Debug, Clone)]
struct DriverConfig {
    replay_path: PathBuf,
    runways_path: Option<PathBuf>,
    frame_rate_hz: f64,
    stats_interval: Duration,
    emit_frames: bool,
}

impl DriverConfig {
    fn from_env() -> Result<Self> {
        let replay_path = std::env::var("REPLAY_PATH")
            .map(PathBuf::from)
            .context("REPLAY_PATH must point to a JSON-lines observation file")?;

        Ok(Self {
            replay_path,
            runways_path: std::env::var("RUNWAYS_PATH").ok().map(PathBuf::from),
            frame_rate_hz: std::env::var("FRAME_RATE_HZ")
                .ok()
                .and_then(|s| s.parse::<f64>().ok())
                .filter(|hz| hz.is_finite() && *hz > 0.0)
                .unwrap_or(30.0),
            stats_interval: Duration::from_secs(
                std::env::var("STATS_INTERVAL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            emit_frames: std::env::var("EMIT_FRAMES")
                .map(|s| matches!(s.as_str(), "1" | "true" | "yes"))
                .unwrap_or(false),
        })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so stdout carries only frames
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("flight_motion=info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("===========================================");
    info!("   Flight Motion - replay driver");
    info!("===========================================");

    let driver = DriverConfig::from_env()?;
    let config = EngineConfig::from_env();

    info!("Configuration:");
    info!("  Replay file: {}", driver.replay_path.display());
    info!("  Frame rate: {} Hz", driver.frame_rate_hz);
    info!("  Aircraft timeout: {} ms", config.timeline.eviction_timeout_ms);

    let airports = match &driver.runways_path {
        Some(path) => Some(
            AirportDatabase::from_path(path)
                .with_context(|| format!("loading runway database {}", path.display()))?,
        ),
        None => {
            info!("  No RUNWAYS_PATH set, classifying without runway context");
            None
        }
    };
    let terrain: &dyn TerrainProvider = match &airports {
        Some(db) => db,
        None => &NoGeoContext,
    };
    let runways: &dyn RunwayProvider = match &airports {
        Some(db) => db,
        None => &NoGeoContext,
    };

    let (sender, receiver) = ingest_channel(INGEST_QUEUE_CAPACITY);
    let reader = tokio::spawn(replay(driver.replay_path.clone(), sender));

    let mut engine = MotionEngine::new(config);
    for source in SourceTag::ALL {
        info!("  Display delay {}: {} ms", source, engine.source_delays().get(source));
    }
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / driver.frame_rate_hz));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    info!("Starting replay. Press Ctrl+C to stop.");

    let mut frames_rendered = 0u64;
    let mut last_stats_report = Instant::now();

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            _ = &mut ctrl_c => {
                info!("Interrupted");
                break;
            }
        }

        let now_ms = chrono::Utc::now().timestamp_millis();
        engine.drain(&receiver);

        for frame in engine.tick(now_ms, terrain, runways) {
            let Some(rendered) = frame.rendered() else {
                continue;
            };
            frames_rendered += 1;
            if driver.emit_frames {
                println!("{}", serde_json::to_string(rendered)?);
            }
        }

        engine.prune(now_ms);

        // Periodic engine statistics
        if last_stats_report.elapsed() >= driver.stats_interval {
            info!("[Engine] {}", engine.stats());
            let dropped = receiver.dropped();
            if dropped > 0 {
                warn!("[Engine] {} observations dropped on a full queue", dropped);
            }
            last_stats_report = Instant::now();
        }

        if reader.is_finished() && receiver.is_empty() && engine.is_empty() {
            info!("Replay finished and all aircraft evicted");
            break;
        }
    }

    if reader.is_finished() {
        let replayed = reader.await.context("replay task panicked")??;
        info!("Replayed {} observations", replayed);
    } else {
        reader.abort();
    }

    info!("[Engine] {}", engine.stats());
    info!("Shutdown complete. Frames rendered: {}", frames_rendered);
    Ok(())
}

/// Read the recording and queue each observation at its original spacing.
///
/// Timestamps are shifted onto the local clock so the first record is
/// received "now"; the gap between source and receive time is kept.
async fn replay(path: PathBuf, sender: ObservationSender) -> Result<u64> {
    let file = File::open(&path)
        .await
        .with_context(|| format!("opening replay file {}", path.display()))?;
    let mut lines = LinesStream::new(BufReader::new(file).lines());

    let mut origin: Option<(i64, i64)> = None;
    let mut line_no = 0usize;
    let mut queued = 0u64;

    while let Some(line) = lines.next().await {
        line_no += 1;
        let line = line.with_context(|| format!("reading {}", path.display()))?;
        let mut observation = match parse_line(&line) {
            Ok(Some(observation)) => observation,
            Ok(None) => continue,
            Err(e) => {
                warn!(line = line_no, error = %e, "Skipping replay record");
                continue;
            }
        };

        let (recorded_start, local_start) = *origin.get_or_insert_with(|| {
            (observation.received_at_ms, chrono::Utc::now().timestamp_millis())
        });
        let due_ms = local_start + (observation.received_at_ms - recorded_start);
        let wait_ms = due_ms - chrono::Utc::now().timestamp_millis();
        if wait_ms > 0 {
            tokio::time::sleep(Duration::from_millis(wait_ms as u64)).await;
        }

        let shift = local_start - recorded_start;
        observation.received_at_ms += shift;
        observation.observed_at_ms += shift;
        if sender.send(observation) {
            queued += 1;
        }
    }

    Ok(queued)
}
