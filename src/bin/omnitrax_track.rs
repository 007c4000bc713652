//! Track animals through a clip from per-frame detections.
//!
//! ```text
//! omnitrax-track --detections detections.json --config tracker.toml \
//!     --output tracks.json --save-state state.json
//! ```

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use omnitrax::sequence::{track_sequence, DetectionSequence};
use omnitrax::{DistanceFunction, KalmanParams, PriorState, Tracker, TrackerConfig};

#[derive(Parser, Debug)]
#[command(name = "omnitrax-track", version, about = "Multi-animal centroid tracker")]
struct Cli {
    /// JSON file with the detections of every frame
    #[arg(short, long)]
    detections: PathBuf,

    /// Tracker configuration (.toml or .json)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Where to write the tracking result (stdout when omitted)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Tracker state from an earlier run to resume from
    #[arg(long)]
    prior_state: Option<PathBuf>,

    /// Where to write the tracker state after the last frame
    #[arg(long)]
    save_state: Option<PathBuf>,

    /// Override the match distance threshold
    #[arg(long)]
    distance_threshold: Option<f64>,

    /// Override the number of frames a lost track is buffered
    #[arg(long)]
    max_frames_to_skip: Option<usize>,

    /// Use the Kalman filter (default parameters unless set in the config)
    #[arg(long)]
    kalman: bool,

    /// Override the distance function (euclidean, squared_euclidean, manhattan)
    #[arg(long)]
    distance_function: Option<DistanceFunction>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn init_logger(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omnitrax=debug,info"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("omnitrax=warn,omnitrax_track=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr)
                .compact(),
        )
        .init();
}

fn load_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::from_file(path)
            .with_context(|| format!("Failed to load config {}", path.display()))?,
        None => TrackerConfig::default(),
    };

    if let Some(threshold) = cli.distance_threshold {
        config.distance_threshold = threshold;
    }
    if let Some(frames) = cli.max_frames_to_skip {
        config.max_frames_to_skip = frames;
    }
    if let Some(distance) = cli.distance_function {
        config.distance_function = distance;
    }
    if cli.kalman && !config.use_kalman_filter {
        config = config.with_kalman(KalmanParams::default());
    }

    config.validate()?;
    Ok(config)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logger(cli.verbose);

    let config = load_config(&cli)?;
    tracing::debug!("Tracker config: {:?}", config);

    let mut tracker = Tracker::new(config)?;

    if let Some(path) = &cli.prior_state {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read prior state {}", path.display()))?;
        let prior: Vec<PriorState> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse prior state {}", path.display()))?;
        for state in &prior {
            tracker.initialise_from_prior_state(state)?;
        }
        tracing::info!("Resumed {} tracks from {}", prior.len(), path.display());
    }

    let content = fs::read_to_string(&cli.detections)
        .with_context(|| format!("Failed to read detections {}", cli.detections.display()))?;
    let sequence = DetectionSequence::from_json_str(&content)
        .with_context(|| format!("Failed to parse detections {}", cli.detections.display()))?;
    tracing::info!("Tracking {} frames", sequence.frames.len());

    let result = track_sequence(&mut tracker, &sequence)?;
    let json = serde_json::to_string_pretty(&result)?;

    match &cli.output {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            tracing::info!("Wrote {} tracks to {}", result.track_ids().len(), path.display());
        }
        None => println!("{}", json),
    }

    if let Some(path) = &cli.save_state {
        let state = serde_json::to_string_pretty(&tracker.export_state())?;
        fs::write(path, state).with_context(|| format!("Failed to write {}", path.display()))?;
        tracing::info!("Saved tracker state to {}", path.display());
    }

    Ok(())
}
