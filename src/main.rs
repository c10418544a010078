//! proximity-replay - replay a recorded GPS track against an event location
//!
//! Reads a JSON track file (target plus timed samples), runs it through a
//! proximity tracker and prints every published state.

use clap::{Parser, ValueEnum};
use proximity::api::{
    CsvFormatter, JoinEligibility, JsonFormatter, ProximityFormatter, SampleOutcome, StopReason,
    TextFormatter,
};
use proximity::core::{Coordinate, PositionSample, ProximityState, TargetLocation};
use proximity::utils::init_logging;
use proximity::{
    ConfigError, LocationError, MockLocationSource, ProximityTracker, TrackerConfig, TrackerError,
    TrackingSession,
};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;
use tracing::{error, info};

#[derive(Debug, Parser)]
#[command(name = "proximity-replay", version, about = "Replay a GPS track against an event location")]
struct Args {
    /// JSON track file with a target and timed samples
    track: PathBuf,

    /// Tracker configuration file (JSON)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,

    /// Time to keep the session open after the last sample (ms)
    #[arg(long, default_value_t = 0)]
    tail_ms: u64,

    /// Replay in wall-clock time through a live session instead of a virtual clock
    #[arg(long)]
    realtime: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Csv,
}

#[derive(Debug, Error)]
enum ReplayError {
    #[error("cannot read track file '{path}': {message}")]
    TrackIo { path: String, message: String },
    #[error("invalid track file '{path}': {message}")]
    TrackParse { path: String, message: String },
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Tracker(#[from] TrackerError),
    #[error("failed to start runtime: {0}")]
    Runtime(String),
}

#[derive(Debug, Deserialize)]
struct TrackFile {
    target: TargetLocation,
    samples: Vec<TrackPoint>,
}

#[derive(Debug, Clone, Deserialize)]
struct TrackPoint {
    /// Arrival time relative to the start of the replay (ms)
    at_ms: u64,
    latitude: f64,
    longitude: f64,
    accuracy_m: f64,
    /// Device capture timestamp; defaults to `at_ms`
    #[serde(default)]
    captured_at_ms: Option<u64>,
}

impl TrackPoint {
    fn sample(&self) -> PositionSample {
        PositionSample::new(
            Coordinate {
                latitude: self.latitude,
                longitude: self.longitude,
            },
            self.accuracy_m,
            self.captured_at_ms.unwrap_or(self.at_ms),
        )
    }
}

fn main() -> ExitCode {
    let args = Args::parse();
    init_logging(args.verbose);

    match run(&args) {
        Ok(reason) => {
            info!(?reason, "Replay finished");
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("{}", e);
            eprintln!("error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: &Args) -> Result<StopReason, ReplayError> {
    let track = load_track(&args.track)?;
    let config = match &args.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    let tracker = ProximityTracker::new(track.target, config)?;
    if let OutputFormat::Csv = args.format {
        println!("{}", CsvFormatter::new().header());
    }
    let format = args.format;
    let handle = tracker.downgrade();
    tracker.subscribe(move |state| {
        let error = handle.upgrade().and_then(|tracker| tracker.last_error());
        print_state(format, state, error.as_ref());
    });

    if args.realtime {
        replay_realtime(tracker, &track.samples, args.tail_ms)
    } else {
        Ok(replay_virtual(&tracker, &track.samples, args.tail_ms))
    }
}

fn load_track(path: &Path) -> Result<TrackFile, ReplayError> {
    let path_str = path.to_string_lossy().to_string();
    let content = std::fs::read_to_string(path).map_err(|e| ReplayError::TrackIo {
        path: path_str.clone(),
        message: e.to_string(),
    })?;
    serde_json::from_str(&content).map_err(|e| ReplayError::TrackParse {
        path: path_str,
        message: e.to_string(),
    })
}

/// Publish a pending staleness transition that falls due at or before `now`
fn expire_until(tracker: &ProximityTracker, now: Instant) {
    if let Some(deadline) = tracker.staleness_deadline() {
        if deadline <= now {
            tracker.refresh_staleness_at(deadline);
        }
    }
}

/// Replay on a virtual clock: arrival times come from the track, so the run is instant
fn replay_virtual(tracker: &ProximityTracker, samples: &[TrackPoint], tail_ms: u64) -> StopReason {
    let origin = Instant::now();
    let mut last_at_ms = 0;

    for point in samples {
        let now = origin + Duration::from_millis(point.at_ms);
        expire_until(tracker, now);

        if let SampleOutcome::Rejected(reason) = tracker.on_sample_at(point.sample(), now) {
            info!(at_ms = point.at_ms, ?reason, "Sample rejected");
        }
        last_at_ms = point.at_ms;
        if tracker.is_stopped() {
            break;
        }
    }

    expire_until(
        tracker,
        origin + Duration::from_millis(last_at_ms.saturating_add(tail_ms)),
    );
    tracker.stop();
    tracker.stop_reason().unwrap_or(StopReason::Requested)
}

/// Replay in wall-clock time through a mock location source and a live session
fn replay_realtime(
    tracker: ProximityTracker,
    samples: &[TrackPoint],
    tail_ms: u64,
) -> Result<StopReason, ReplayError> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| ReplayError::Runtime(e.to_string()))?;

    runtime.block_on(async move {
        let source = MockLocationSource::new();
        let mut session = TrackingSession::start_tracker(&source, tracker).await?;
        let origin = Instant::now();

        for point in samples {
            tokio::time::sleep_until(origin + Duration::from_millis(point.at_ms)).await;
            if session.is_stopped() {
                break;
            }
            source.push_sample(point.sample());
        }

        tokio::time::sleep(Duration::from_millis(tail_ms)).await;
        session.stop();
        Ok::<_, ReplayError>(session.wait().await)
    })
}

fn print_state(format: OutputFormat, state: &ProximityState, error: Option<&LocationError>) {
    let formatted = ProximityFormatter::new().format_with_error(state, error);
    match format {
        OutputFormat::Text => {
            let join = match JoinEligibility::from_state(state) {
                JoinEligibility::Eligible => "can join",
                JoinEligibility::NotNearby { .. } => "not nearby",
                JoinEligibility::Unconfirmed(_) => "unconfirmed",
            };
            println!("{} | {}", TextFormatter::compact().format_text(&formatted), join);
        }
        OutputFormat::Json => match JsonFormatter::new().format_json(&formatted) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize state: {}", e),
        },
        OutputFormat::Csv => println!("{}", CsvFormatter::new().format_csv(&formatted)),
    }
}
