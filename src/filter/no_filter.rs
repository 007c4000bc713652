//! No-op filter for pure detection matching.
//!
//! Matched tracks jump to their detection; unmatched tracks keep the
//! position they had in the previous frame.

use nalgebra::Vector2;

use super::traits::{Filter, FilterFactory};
use crate::Result;

/// Filter that stores the last measurement.
///
/// This filter does not perform any prediction or smoothing. Velocity is the
/// displacement between the last two measurements.
#[derive(Clone, Debug)]
pub struct NoFilter {
    position: Vector2<f64>,
    velocity: Vector2<f64>,
}

impl NoFilter {
    pub fn new(initial_position: &Vector2<f64>) -> Self {
        Self {
            position: *initial_position,
            velocity: Vector2::zeros(),
        }
    }
}

impl Filter for NoFilter {
    fn predict(&mut self) -> Vector2<f64> {
        self.position
    }

    fn update(&mut self, measurement: Option<&Vector2<f64>>) -> Result<Vector2<f64>> {
        if let Some(z) = measurement {
            self.velocity = z - self.position;
            self.position = *z;
        }
        Ok(self.position)
    }

    fn position(&self) -> Vector2<f64> {
        self.position
    }

    fn velocity(&self) -> Vector2<f64> {
        self.velocity
    }
}

/// Factory for creating NoFilter instances.
#[derive(Clone, Debug, Default)]
pub struct NoFilterFactory;

impl NoFilterFactory {
    pub fn new() -> Self {
        Self
    }
}

impl FilterFactory for NoFilterFactory {
    fn create_filter(&self, initial_position: &Vector2<f64>) -> Box<dyn Filter> {
        Box::new(NoFilter::new(initial_position))
    }
}
