//! Running the tracker over a whole sequence of frames.
//!
//! Input is a list of frames with their detections, as produced by running a
//! detector over a video clip. Output holds, for every frame, the position of
//! every live track plus which tracks started or ended in that frame.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::{BoundingBox, Detection, Result, Track, TrackId, Tracker};

/// Detections of one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameDetections {
    pub frame: u64,
    #[serde(default)]
    pub detections: Vec<Detection>,
}

/// Detections of a clip, in frame order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSequence {
    pub frames: Vec<FrameDetections>,
}

impl DetectionSequence {
    pub fn from_json_str(content: &str) -> Result<Self> {
        Ok(serde_json::from_str(content)?)
    }
}

/// State of one live track in one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSnapshot {
    pub track_id: TrackId,
    pub position: Vector2<f64>,
    pub skipped_frames: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl From<&Track> for TrackSnapshot {
    fn from(track: &Track) -> Self {
        Self {
            track_id: track.id,
            position: track.prediction,
            skipped_frames: track.skipped_frames,
            label: track.last_label().map(str::to_string),
            bbox: track.last_bbox().copied(),
        }
    }
}

/// Summary of a finished track.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrackSummary {
    pub track_id: TrackId,
    /// Majority vote over the classes seen for this track.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,
    pub frames_tracked: usize,
    pub frames_detected: usize,
    pub last_position: Vector2<f64>,
}

impl From<&Track> for TrackSummary {
    fn from(track: &Track) -> Self {
        Self {
            track_id: track.id,
            class: track.majority_class().map(str::to_string),
            frames_tracked: track.age + 1,
            frames_detected: track.detected_frames(),
            last_position: track.prediction,
        }
    }
}

/// Tracking result for one frame.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FrameResult {
    pub frame: u64,
    pub tracks: Vec<TrackSnapshot>,
    pub started: Vec<TrackId>,
    pub terminated: Vec<TrackSummary>,
}

/// Tracking result for a whole sequence.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SequenceResult {
    pub frames: Vec<FrameResult>,
    /// Tracks still alive after the last frame.
    pub active: Vec<TrackSummary>,
}

impl SequenceResult {
    /// Every track id seen in the sequence, sorted.
    pub fn track_ids(&self) -> Vec<TrackId> {
        let mut ids: Vec<TrackId> = self
            .frames
            .iter()
            .flat_map(|f| f.tracks.iter().map(|t| t.track_id))
            .chain(self.active.iter().map(|s| s.track_id))
            .collect();
        ids.sort_unstable();
        ids.dedup();
        ids
    }
}

/// Run the tracker over every frame of a sequence.
pub fn track_sequence(tracker: &mut Tracker, sequence: &DetectionSequence) -> Result<SequenceResult> {
    let mut result = SequenceResult::default();

    for frame in &sequence.frames {
        let report = tracker.update(&frame.detections)?;
        result.frames.push(FrameResult {
            frame: frame.frame,
            tracks: tracker.tracks().iter().map(TrackSnapshot::from).collect(),
            started: report.started,
            terminated: report.terminated.iter().map(TrackSummary::from).collect(),
        });
    }

    result.active = tracker.tracks().iter().map(TrackSummary::from).collect();

    info!(
        frames = result.frames.len(),
        tracks = result.track_ids().len(),
        active = result.active.len(),
        "Tracked sequence"
    );

    Ok(result)
}
