//! Main tracker implementation.

use nalgebra::DMatrix;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, trace};

use crate::distances::DistanceFunction;
use crate::filter::{FilterFactoryEnum, KalmanFilterFactory, KalmanParams, NoFilterFactory};
use crate::internal::scipy::linear_sum_assignment;
use crate::{Detection, Error, PriorState, Result, Track, TrackId};

/// Configuration for the tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Maximum distance between a track and a detection for them to be matched.
    pub distance_threshold: f64,

    /// Frames a track is buffered without detections before it is terminated.
    pub max_frames_to_skip: usize,

    /// Number of recent positions kept per track.
    pub max_trace_length: usize,

    /// Id given to the first track.
    pub initial_track_id: TrackId,

    /// Use the Kalman filter instead of pure matching.
    pub use_kalman_filter: bool,

    /// Kalman filter parameters (used when `use_kalman_filter` is set).
    pub kalman: KalmanParams,

    /// Distance function for matching detections to tracks.
    pub distance_function: DistanceFunction,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            distance_threshold: 150.0,
            max_frames_to_skip: 10,
            max_trace_length: 50,
            initial_track_id: 0,
            use_kalman_filter: false,
            kalman: KalmanParams::default(),
            distance_function: DistanceFunction::default(),
        }
    }
}

impl TrackerConfig {
    /// Create a new tracker configuration.
    ///
    /// # Arguments
    /// * `distance_threshold` - Maximum match distance
    /// * `max_frames_to_skip` - Frames to buffer a lost track before termination
    /// * `max_trace_length` - Recent positions kept per track
    pub fn new(distance_threshold: f64, max_frames_to_skip: usize, max_trace_length: usize) -> Self {
        Self {
            distance_threshold,
            max_frames_to_skip,
            max_trace_length,
            ..Self::default()
        }
    }

    /// Enable Kalman filtering with the given parameters.
    pub fn with_kalman(mut self, params: KalmanParams) -> Self {
        self.use_kalman_filter = true;
        self.kalman = params;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.distance_threshold.is_finite() || self.distance_threshold <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "distance_threshold must be positive and finite, got {}",
                self.distance_threshold
            )));
        }
        if self.max_trace_length == 0 {
            return Err(Error::InvalidConfig(
                "max_trace_length must be at least 1".to_string(),
            ));
        }
        if self.use_kalman_filter {
            self.kalman.validate()?;
        }
        Ok(())
    }

    /// Filter factory matching the configured motion model.
    pub fn filter_factory(&self) -> FilterFactoryEnum {
        if self.use_kalman_filter {
            FilterFactoryEnum::Kalman(KalmanFilterFactory::new(self.kalman))
        } else {
            FilterFactoryEnum::None(NoFilterFactory)
        }
    }
}

/// A detection matched to a track in one update.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Match {
    pub track_id: TrackId,
    pub detection_index: usize,
    pub distance: f64,
}

/// Outcome of one tracker update.
#[derive(Debug, Clone, Default)]
pub struct UpdateReport {
    /// Tracks matched to a detection.
    pub matches: Vec<Match>,
    /// Tracks without a detection this frame that are still buffered.
    pub buffering: Vec<TrackId>,
    /// Tracks started from unmatched detections.
    pub started: Vec<TrackId>,
    /// Tracks removed after too many frames without a detection.
    pub terminated: Vec<Track>,
}

/// Multi-object tracker.
///
/// Matches each frame's detections to the existing tracks with the Hungarian
/// algorithm, buffers tracks that lose their detection and starts new tracks
/// from detections nobody claims.
pub struct Tracker {
    /// Tracker configuration.
    config: TrackerConfig,

    /// Factory for per-track filters.
    filter_factory: FilterFactoryEnum,

    /// Live tracks, in creation order.
    tracks: Vec<Track>,

    /// Id for the next started track.
    next_track_id: TrackId,
}

impl Tracker {
    /// Create a new tracker with the given configuration.
    pub fn new(config: TrackerConfig) -> Result<Self> {
        config.validate()?;

        Ok(Self {
            filter_factory: config.filter_factory(),
            next_track_id: config.initial_track_id,
            tracks: Vec::new(),
            config,
        })
    }

    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Live tracks, in creation order.
    pub fn tracks(&self) -> &[Track] {
        &self.tracks
    }

    pub fn track(&self, id: TrackId) -> Option<&Track> {
        self.tracks.iter().find(|t| t.id == id)
    }

    /// Id the next started track will get.
    pub fn next_track_id(&self) -> TrackId {
        self.next_track_id
    }

    /// Continue counting track ids after `latest_track_id`.
    ///
    /// Useful when resuming from a prior run so new tracks do not reuse
    /// earlier ids.
    ///
    /// # Errors
    /// Returns `TrackIdOverflow` if `latest_track_id` is the largest id.
    pub fn set_track_id_count(&mut self, latest_track_id: TrackId) -> Result<()> {
        self.next_track_id = latest_track_id
            .checked_add(1)
            .ok_or(Error::TrackIdOverflow(latest_track_id))?;
        Ok(())
    }

    /// Recreate a track from an earlier run, keeping its id.
    ///
    /// The id counter is moved past the restored id.
    ///
    /// # Errors
    /// Returns an error if a live track already uses the id, the id is the
    /// largest one, or the position is not finite.
    pub fn initialise_from_prior_state(&mut self, prior: &PriorState) -> Result<()> {
        if self.track(prior.id).is_some() {
            return Err(Error::DuplicateTrack(prior.id));
        }
        let after_prior = prior
            .id
            .checked_add(1)
            .ok_or(Error::TrackIdOverflow(prior.id))?;
        Detection {
            centroid: prior.position,
            label: None,
            bbox: prior.bbox,
        }
        .validate()?;

        let track = Track::from_prior_state(prior, &self.filter_factory, self.config.max_trace_length);
        debug!(track_id = prior.id, "Restored track from prior state");
        self.next_track_id = self.next_track_id.max(after_prior);
        self.tracks.push(track);
        Ok(())
    }

    /// Drop all tracks, keeping the settings and the id counter.
    pub fn clear_tracks(&mut self) {
        self.tracks.clear();
    }

    /// Last known state of every live track.
    pub fn export_state(&self) -> Vec<PriorState> {
        self.tracks.iter().map(Track::to_prior_state).collect()
    }

    /// Update the tracker with the detections of a new frame.
    ///
    /// Steps:
    /// 1. Match detections to tracks, allowing every track a "no match" option
    ///    that costs `distance_threshold`
    /// 2. Count a skipped frame for every unmatched track and terminate tracks
    ///    that skipped more than `max_frames_to_skip` frames
    /// 3. Advance the remaining tracks' filters and histories
    /// 4. Start new tracks from unmatched detections
    ///
    /// On error the tracker is left as it was before the call.
    pub fn update(&mut self, detections: &[Detection]) -> Result<UpdateReport> {
        for detection in detections {
            detection.validate()?;
        }

        let (assignment, distances) = self.assign(detections)?;

        let mut detection_claimed = vec![false; detections.len()];
        for &(j, _) in assignment.iter().flatten() {
            detection_claimed[j] = true;
        }
        let new_tracks = detection_claimed.iter().filter(|claimed| !**claimed).count() as u64;
        let next_track_id = self
            .next_track_id
            .checked_add(new_tracks)
            .ok_or(Error::TrackIdOverflow(self.next_track_id))?;

        // Advance copies of the filters first; `None` marks a track that
        // terminates this frame
        let max_frames_to_skip = self.config.max_frames_to_skip;
        let steps = self
            .tracks
            .iter()
            .zip(assignment.iter().copied())
            .map(|(track, assigned)| match assigned {
                Some((j, _)) => track.step(Some(&detections[j].centroid)).map(Some),
                None if track.skipped_frames >= max_frames_to_skip => Ok(None),
                None => track.step(None).map(Some),
            })
            .collect::<Result<Vec<_>>>()?;

        let mut report = UpdateReport::default();
        let mut tracks = Vec::with_capacity(self.tracks.len() + new_tracks as usize);

        for ((mut track, assigned), step) in std::mem::take(&mut self.tracks)
            .into_iter()
            .zip(assignment)
            .zip(steps)
        {
            match (assigned, step) {
                (Some((j, distance_row)), Some(step)) => {
                    report.matches.push(Match {
                        track_id: track.id,
                        detection_index: j,
                        distance: distances[(distance_row, j)],
                    });
                    track.hit(&detections[j], step);
                }
                (None, Some(step)) => {
                    track.skipped_frames += 1;
                    debug!(
                        track_id = track.id,
                        skipped_frames = track.skipped_frames,
                        "Track has no detection"
                    );
                    report.buffering.push(track.id);
                    track.miss(step);
                }
                (_, None) => {
                    track.skipped_frames += 1;
                    info!(track_id = track.id, class = ?track.majority_class(), "Terminated track");
                    report.terminated.push(track);
                    continue;
                }
            }
            tracks.push(track);
        }

        // Start new tracks
        let mut id = self.next_track_id;
        for (detection, _) in detections
            .iter()
            .zip(&detection_claimed)
            .filter(|(_, claimed)| !**claimed)
        {
            tracks.push(Track::new(
                id,
                detection,
                &self.filter_factory,
                self.config.max_trace_length,
            ));
            info!(track_id = id, x = detection.centroid.x, y = detection.centroid.y, "Started new track");
            report.started.push(id);
            id += 1;
        }

        self.tracks = tracks;
        self.next_track_id = next_track_id;

        debug!(
            detections = detections.len(),
            tracks = self.tracks.len(),
            matched = report.matches.len(),
            buffering = report.buffering.len(),
            started = report.started.len(),
            terminated = report.terminated.len(),
            "Tracker updated"
        );

        Ok(report)
    }

    /// Solve the detection-to-track assignment.
    ///
    /// # Returns
    /// For every track, the assigned detection index and the track's row in
    /// the returned distance matrix (tracks x detections).
    #[allow(clippy::type_complexity)]
    fn assign(&self, detections: &[Detection]) -> Result<(Vec<Option<(usize, usize)>>, DMatrix<f64>)> {
        let n_tracks = self.tracks.len();
        let n_detections = detections.len();

        let distances = self
            .config
            .distance_function
            .get_distances(&self.tracks, detections);

        if n_tracks == 0 || n_detections == 0 {
            return Ok((vec![None; n_tracks], distances));
        }

        // One placeholder column per track at the threshold cost: a track
        // farther than the threshold from every detection takes its
        // placeholder instead of being forced onto a wrong detection
        let cost = DMatrix::from_fn(n_tracks, n_detections + n_tracks, |i, j| {
            if j < n_detections {
                distances[(i, j)]
            } else {
                self.config.distance_threshold
            }
        });
        trace!(rows = cost.nrows(), cols = cost.ncols(), "Solving assignment");

        let result = linear_sum_assignment(&cost)?;
        let assignment = (0..n_tracks)
            .map(|i| match result.col_for_row(i) {
                Some(j) if j < n_detections => Some((j, i)),
                _ => None,
            })
            .collect();

        Ok((assignment, distances))
    }
}
