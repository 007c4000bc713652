//! Filter traits for the tracking system.

use nalgebra::Vector2;

use crate::Result;

/// Trait for track motion filters.
///
/// A filter owns the motion state of one track. Positions are `[x, y]` in
/// pixel coordinates.
pub trait Filter: Send + Sync {
    /// Advance the state by one frame.
    ///
    /// # Returns
    /// The predicted position.
    fn predict(&mut self) -> Vector2<f64>;

    /// Correct the state with a measurement.
    ///
    /// # Arguments
    /// * `measurement` - Detected position, or `None` when the track was not
    ///   detected this frame
    ///
    /// # Returns
    /// The corrected position.
    fn update(&mut self, measurement: Option<&Vector2<f64>>) -> Result<Vector2<f64>>;

    /// Current position estimate.
    fn position(&self) -> Vector2<f64>;

    /// Current velocity estimate (pixels per frame period).
    fn velocity(&self) -> Vector2<f64>;
}

/// Factory for creating filter instances.
///
/// This allows trackers to create a new filter for each track without
/// knowing the specific filter implementation.
pub trait FilterFactory: Send + Sync {
    /// Create a new filter at the given position with zero velocity.
    fn create_filter(&self, initial_position: &Vector2<f64>) -> Box<dyn Filter>;
}
