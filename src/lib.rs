//! # OmniTrax - Multi-Animal Tracking
//!
//! Centroid tracker for following many animals across video frames.
//!
//! Each frame's detections are matched to the existing tracks with the
//! Hungarian algorithm. Tracks that lose their detection are kept alive for a
//! number of frames ("buffered") and can be recovered when the animal shows up
//! again. Positions are either taken straight from the matched detections or
//! smoothed and predicted with a constant-velocity Kalman filter.
//!
//! ## Features
//!
//! - Optimal detection-to-track assignment with a per-track "no match" option
//! - Kalman filter or pure matching motion models
//! - Class label history with majority vote, bounding box history
//! - Resuming from a previously exported tracker state
//!
//! ## Example
//!
//! ```rust
//! use omnitrax::{Detection, Tracker, TrackerConfig};
//!
//! let config = TrackerConfig::new(50.0, 10, 20);
//! let mut tracker = Tracker::new(config).unwrap();
//!
//! let detections = vec![Detection::new(100.0, 100.0).unwrap()];
//! let report = tracker.update(&detections).unwrap();
//! assert_eq!(report.started, vec![0]);
//! ```

// Internal modules (ports of scipy)
pub(crate) mod internal;

// Public modules
pub mod config;
pub mod detection;
pub mod distances;
pub mod filter;
pub mod sequence;
pub mod track;
pub mod tracker;

// Re-exports for convenience
pub use detection::{BoundingBox, Detection};
pub use distances::{distance_function_by_name, DistanceFunction};
pub use filter::{Filter, FilterFactory, KalmanParams};
pub use track::{PriorState, Track, TrackId};
pub use tracker::{Match, Tracker, TrackerConfig, UpdateReport};

// Error types
pub use crate::error::{Error, Result};

mod error {
    use thiserror::Error;

    /// Errors that can occur in the omnitrax library
    #[derive(Error, Debug)]
    pub enum Error {
        #[error("Invalid configuration: {0}")]
        InvalidConfig(String),

        #[error("Invalid detection: {0}")]
        InvalidDetection(String),

        #[error("Unknown distance function: {0}")]
        UnknownDistance(String),

        #[error("Assignment error: {0}")]
        AssignmentError(String),

        #[error("Filter error: {0}")]
        FilterError(String),

        #[error("Track {0} already exists")]
        DuplicateTrack(u64),

        #[error("No track ids left after {0}")]
        TrackIdOverflow(u64),

        #[error("IO error: {0}")]
        IoError(#[from] std::io::Error),

        #[error("JSON error: {0}")]
        JsonError(#[from] serde_json::Error),

        #[error("TOML error: {0}")]
        TomlError(#[from] toml::de::Error),
    }

    /// Result type for omnitrax operations
    pub type Result<T> = std::result::Result<T, Error>;
}
