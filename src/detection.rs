//! Detection struct for input to the tracker.

use nalgebra::Vector2;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Axis-aligned bounding box of a detection, in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl BoundingBox {
    /// Create a bounding box from its corners.
    ///
    /// # Errors
    /// Returns an error if a coordinate is not finite or a min exceeds its max.
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self> {
        let bbox = Self { x_min, y_min, x_max, y_max };
        bbox.validate()?;
        Ok(bbox)
    }

    /// Check the box is finite and not inverted.
    pub fn validate(&self) -> Result<()> {
        let coords = [self.x_min, self.y_min, self.x_max, self.y_max];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err(Error::InvalidDetection(format!(
                "bounding box has non-finite coordinates: {:?}",
                coords
            )));
        }
        if self.x_min > self.x_max || self.y_min > self.y_max {
            return Err(Error::InvalidDetection(format!(
                "bounding box is inverted: {:?}",
                coords
            )));
        }
        Ok(())
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    /// Centre point of the box.
    pub fn centre(&self) -> Vector2<f64> {
        Vector2::new(
            (self.x_min + self.x_max) / 2.0,
            (self.y_min + self.y_max) / 2.0,
        )
    }
}

/// A detection to be tracked.
///
/// Represents one detected animal in a frame: its centroid and, optionally,
/// the class predicted by the detector and its bounding box.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Detection centre `[x, y]`.
    pub centroid: Vector2<f64>,

    /// Optional predicted class.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,

    /// Optional bounding box.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bbox: Option<BoundingBox>,
}

impl Detection {
    /// Create a new detection at `(x, y)`.
    pub fn new(x: f64, y: f64) -> Result<Self> {
        let detection = Self {
            centroid: Vector2::new(x, y),
            label: None,
            bbox: None,
        };
        detection.validate()?;
        Ok(detection)
    }

    /// Create a detection centred on a bounding box.
    pub fn from_bbox(bbox: BoundingBox) -> Result<Self> {
        bbox.validate()?;
        Ok(Self {
            centroid: bbox.centre(),
            label: None,
            bbox: Some(bbox),
        })
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_bbox(mut self, bbox: BoundingBox) -> Self {
        self.bbox = Some(bbox);
        self
    }

    /// Check the centroid (and box, if any) hold usable values.
    ///
    /// Detections built through `serde` skip the constructors, so the tracker
    /// calls this on every input.
    pub fn validate(&self) -> Result<()> {
        if !self.centroid.iter().all(|c| c.is_finite()) {
            return Err(Error::InvalidDetection(format!(
                "centroid has non-finite coordinates: [{}, {}]",
                self.centroid.x, self.centroid.y
            )));
        }
        if let Some(bbox) = &self.bbox {
            bbox.validate()?;
        }
        Ok(())
    }
}
