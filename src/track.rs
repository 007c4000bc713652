//! Track struct for the animals followed by the tracker.

use std::collections::VecDeque;

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::filter::{Filter, FilterEnum, FilterFactoryEnum};
use crate::{BoundingBox, Detection, Result};

/// Identifier of a track, unique among the live tracks of a tracker.
pub type TrackId = u64;

/// Last known state of a track, used to resume tracking in a later run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriorState {
    pub id: TrackId,
    /// Last position `[x, y]`.
    pub position: Vector2<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

/// A track maintained by the tracker.
///
/// Holds the motion filter of one animal together with the history needed
/// to draw and classify it: recent positions, bounding boxes and the class
/// predicted in every frame.
#[derive(Clone, Debug)]
pub struct Track {
    /// Track identifier.
    pub id: TrackId,

    /// Current position estimate, used for matching in the next frame.
    pub prediction: Vector2<f64>,

    /// Consecutive frames without a matching detection.
    pub skipped_frames: usize,

    /// Frames since the track was started.
    pub age: usize,

    pub(crate) filter: FilterEnum,

    /// Most recent positions, oldest first.
    trace: VecDeque<Vector2<f64>>,
    max_trace_length: usize,

    /// One box per frame once a box has been seen.
    bbox_trace: Vec<BoundingBox>,

    /// Predicted class per frame (`None` for frames without a detection).
    class_history: Vec<Option<String>>,

    detected_frames: usize,
}

/// Motion filter advanced by one frame, not yet applied to its track.
#[derive(Clone, Debug)]
pub(crate) struct FilterStep {
    filter: FilterEnum,
    prediction: Vector2<f64>,
}

impl Track {
    /// Start a new track from a detection.
    ///
    /// `max_trace_length` is clamped to at least one position.
    pub fn new(
        id: TrackId,
        detection: &Detection,
        filter_factory: &FilterFactoryEnum,
        max_trace_length: usize,
    ) -> Self {
        let max_trace_length = max_trace_length.max(1);
        let mut trace = VecDeque::with_capacity(max_trace_length);
        trace.push_back(detection.centroid);

        Self {
            id,
            prediction: detection.centroid,
            skipped_frames: 0,
            age: 0,
            filter: filter_factory.create(&detection.centroid),
            trace,
            max_trace_length,
            bbox_trace: detection.bbox.into_iter().collect(),
            class_history: vec![detection.label.clone()],
            detected_frames: 1,
        }
    }

    /// Recreate a track from its exported state, keeping its id.
    pub fn from_prior_state(
        prior: &PriorState,
        filter_factory: &FilterFactoryEnum,
        max_trace_length: usize,
    ) -> Self {
        let detection = Detection {
            centroid: prior.position,
            label: prior.label.clone(),
            bbox: prior.bbox,
        };
        Self::new(prior.id, &detection, filter_factory, max_trace_length)
    }

    /// Advance a copy of the motion filter by one frame.
    ///
    /// `measurement` is the matched detection's centroid, or `None` when the
    /// track was not detected. Without a detection the filter keeps
    /// predicting; once the track is past its first frame the prediction is
    /// corrected against the last known result. The track itself is left
    /// untouched until the step is applied with [`Track::hit`] or
    /// [`Track::miss`].
    pub(crate) fn step(&self, measurement: Option<&Vector2<f64>>) -> Result<FilterStep> {
        let mut filter = self.filter.clone();
        filter.predict();

        let prediction = match measurement {
            Some(z) => filter.update(Some(z))?,
            None if self.age > 0 => filter.update(None)?,
            None => self.prediction,
        };
        Ok(FilterStep { filter, prediction })
    }

    /// Apply a step for a frame with a matched detection.
    pub(crate) fn hit(&mut self, detection: &Detection, step: FilterStep) {
        self.apply(step);
        self.skipped_frames = 0;
        self.detected_frames += 1;

        self.class_history.push(detection.label.clone());
        match detection.bbox {
            Some(bbox) => self.bbox_trace.push(bbox),
            None => self.repeat_last_bbox(),
        }
        self.advance();
    }

    /// Apply a step for a frame without a detection.
    pub(crate) fn miss(&mut self, step: FilterStep) {
        self.apply(step);
        self.class_history.push(None);
        self.repeat_last_bbox();
        self.advance();
    }

    fn apply(&mut self, step: FilterStep) {
        self.filter = step.filter;
        self.prediction = step.prediction;
    }

    fn repeat_last_bbox(&mut self) {
        if let Some(&last) = self.bbox_trace.last() {
            self.bbox_trace.push(last);
        }
    }

    fn advance(&mut self) {
        self.trace.push_back(self.prediction);
        while self.trace.len() > self.max_trace_length {
            self.trace.pop_front();
        }
        self.age += 1;
    }

    /// Recent positions, oldest first.
    pub fn trace(&self) -> &VecDeque<Vector2<f64>> {
        &self.trace
    }

    pub fn bbox_trace(&self) -> &[BoundingBox] {
        &self.bbox_trace
    }

    pub fn last_bbox(&self) -> Option<&BoundingBox> {
        self.bbox_trace.last()
    }

    pub fn class_history(&self) -> &[Option<String>] {
        &self.class_history
    }

    /// Most recently seen class.
    pub fn last_label(&self) -> Option<&str> {
        self.class_history.iter().rev().flatten().next().map(String::as_str)
    }

    /// Most frequent class over the track's lifetime.
    ///
    /// Frames without a detection are ignored. On a tie the class seen first
    /// wins.
    pub fn majority_class(&self) -> Option<&str> {
        let mut counts: Vec<(&str, usize)> = Vec::new();
        for label in self.class_history.iter().flatten() {
            match counts.iter_mut().find(|(l, _)| *l == label.as_str()) {
                Some((_, count)) => *count += 1,
                None => counts.push((label.as_str(), 1)),
            }
        }

        let mut best: Option<(&str, usize)> = None;
        for (label, count) in counts {
            if best.map_or(true, |(_, c)| count > c) {
                best = Some((label, count));
            }
        }
        best.map(|(label, _)| label)
    }

    /// Velocity estimate from the motion filter.
    pub fn velocity(&self) -> Vector2<f64> {
        self.filter.velocity()
    }

    /// Whether the track missed its detection in the last frame.
    pub fn is_buffering(&self) -> bool {
        self.skipped_frames > 0
    }

    /// Number of frames in which the track was matched to a detection,
    /// counting the frame that started it.
    pub fn detected_frames(&self) -> usize {
        self.detected_frames
    }

    pub fn to_prior_state(&self) -> PriorState {
        PriorState {
            id: self.id,
            position: self.prediction,
            label: self.majority_class().map(str::to_string),
            bbox: self.last_bbox().copied(),
        }
    }
}
