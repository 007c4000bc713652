//! Enum-based filter dispatch for static (non-virtual) function calls.
//!
//! This module provides `FilterEnum` and `FilterFactoryEnum` that wrap the
//! supported filter types and dispatch without vtable lookups on the
//! per-frame path.

use nalgebra::Vector2;

use super::kalman::{KalmanFilter, KalmanFilterFactory};
use super::no_filter::{NoFilter, NoFilterFactory};
use super::traits::{Filter, FilterFactory};
use crate::Result;

/// Enum-based filter for static dispatch.
#[derive(Clone, Debug)]
pub enum FilterEnum {
    Kalman(KalmanFilter),
    None(NoFilter),
}

impl Filter for FilterEnum {
    #[inline(always)]
    fn predict(&mut self) -> Vector2<f64> {
        match self {
            FilterEnum::Kalman(f) => f.predict(),
            FilterEnum::None(f) => f.predict(),
        }
    }

    #[inline(always)]
    fn update(&mut self, measurement: Option<&Vector2<f64>>) -> Result<Vector2<f64>> {
        match self {
            FilterEnum::Kalman(f) => f.update(measurement),
            FilterEnum::None(f) => f.update(measurement),
        }
    }

    #[inline(always)]
    fn position(&self) -> Vector2<f64> {
        match self {
            FilterEnum::Kalman(f) => f.position(),
            FilterEnum::None(f) => f.position(),
        }
    }

    #[inline(always)]
    fn velocity(&self) -> Vector2<f64> {
        match self {
            FilterEnum::Kalman(f) => f.velocity(),
            FilterEnum::None(f) => f.velocity(),
        }
    }
}

/// Enum-based filter factory for static dispatch.
#[derive(Clone, Debug)]
pub enum FilterFactoryEnum {
    Kalman(KalmanFilterFactory),
    None(NoFilterFactory),
}

impl Default for FilterFactoryEnum {
    fn default() -> Self {
        FilterFactoryEnum::None(NoFilterFactory)
    }
}

impl FilterFactoryEnum {
    /// Create a new filter with static dispatch.
    #[inline(always)]
    pub fn create(&self, initial_position: &Vector2<f64>) -> FilterEnum {
        match self {
            FilterFactoryEnum::Kalman(f) => FilterEnum::Kalman(f.create(initial_position)),
            FilterFactoryEnum::None(_) => FilterEnum::None(NoFilter::new(initial_position)),
        }
    }

    pub fn is_kalman(&self) -> bool {
        matches!(self, FilterFactoryEnum::Kalman(_))
    }
}

impl FilterFactory for FilterFactoryEnum {
    fn create_filter(&self, initial_position: &Vector2<f64>) -> Box<dyn Filter> {
        Box::new(self.create(initial_position))
    }
}
