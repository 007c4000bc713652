//! Motion filters for tracks.
//!
//! This module provides two filter implementations:
//! - `KalmanFilter` - Constant-velocity Kalman filter with buffering of lost tracks
//! - `NoFilter` - Pure matching, positions taken straight from detections

mod dispatch;
mod kalman;
mod no_filter;
mod traits;

pub use dispatch::{FilterEnum, FilterFactoryEnum};
pub use kalman::{KalmanFilter, KalmanFilterFactory, KalmanParams};
pub use no_filter::{NoFilter, NoFilterFactory};
pub use traits::{Filter, FilterFactory};
