//! Distance functions for matching detections to tracks.
//!
//! Distances are measured between a track's current prediction and a
//! detection centroid. The tracker compares them against its
//! `distance_threshold`, so the threshold is expressed in the same metric.

use std::fmt;
use std::str::FromStr;

use nalgebra::{DMatrix, Vector2};
use serde::{Deserialize, Serialize};

use crate::{Detection, Error, Result, Track};

/// Enum-based distance function for static dispatch.
///
/// Use `distance_function_by_name()` to create instances from strings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceFunction {
    /// Straight-line pixel distance.
    #[default]
    Euclidean,
    /// Squared straight-line distance.
    SquaredEuclidean,
    /// Sum of absolute coordinate differences.
    Manhattan,
}

impl DistanceFunction {
    /// Distance between two points.
    #[inline(always)]
    pub fn distance(&self, a: &Vector2<f64>, b: &Vector2<f64>) -> f64 {
        let diff = a - b;
        match self {
            DistanceFunction::Euclidean => diff.norm(),
            DistanceFunction::SquaredEuclidean => diff.norm_squared(),
            DistanceFunction::Manhattan => diff.x.abs() + diff.y.abs(),
        }
    }

    /// Get distances between tracks and detections.
    ///
    /// # Returns
    /// Matrix of shape (n_tracks, n_detections).
    pub fn get_distances(&self, tracks: &[Track], detections: &[Detection]) -> DMatrix<f64> {
        DMatrix::from_fn(tracks.len(), detections.len(), |i, j| {
            self.distance(&tracks[i].prediction, &detections[j].centroid)
        })
    }

    pub fn name(&self) -> &'static str {
        match self {
            DistanceFunction::Euclidean => "euclidean",
            DistanceFunction::SquaredEuclidean => "squared_euclidean",
            DistanceFunction::Manhattan => "manhattan",
        }
    }
}

impl fmt::Display for DistanceFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for DistanceFunction {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        distance_function_by_name(s)
    }
}

/// Look up a distance function by name.
///
/// Accepted names: `euclidean`, `squared_euclidean` (or `sqeuclidean`),
/// `manhattan` (or `cityblock`).
pub fn distance_function_by_name(name: &str) -> Result<DistanceFunction> {
    match name {
        "euclidean" => Ok(DistanceFunction::Euclidean),
        "squared_euclidean" | "sqeuclidean" => Ok(DistanceFunction::SquaredEuclidean),
        "manhattan" | "cityblock" => Ok(DistanceFunction::Manhattan),
        _ => Err(Error::UnknownDistance(name.to_string())),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::{FilterFactoryEnum, NoFilterFactory};
    use approx::assert_relative_eq;

    #[test]
    fn test_point_distances() {
        let a = Vector2::new(0.0, 0.0);
        let b = Vector2::new(3.0, 4.0);

        assert_relative_eq!(DistanceFunction::Euclidean.distance(&a, &b), 5.0);
        assert_relative_eq!(DistanceFunction::SquaredEuclidean.distance(&a, &b), 25.0);
        assert_relative_eq!(DistanceFunction::Manhattan.distance(&a, &b), 7.0);
    }

    #[test]
    fn test_distance_by_name() {
        assert_eq!(distance_function_by_name("euclidean").unwrap(), DistanceFunction::Euclidean);
        assert_eq!(
            distance_function_by_name("sqeuclidean").unwrap(),
            DistanceFunction::SquaredEuclidean
        );
        assert_eq!("cityblock".parse::<DistanceFunction>().unwrap(), DistanceFunction::Manhattan);
    }

    #[test]
    fn test_distance_by_name_unknown() {
        let err = distance_function_by_name("_bad_distance").unwrap_err();
        assert!(err.to_string().contains("Unknown distance function"));
    }

    #[test]
    fn test_distance_name_roundtrip() {
        for f in [
            DistanceFunction::Euclidean,
            DistanceFunction::SquaredEuclidean,
            DistanceFunction::Manhattan,
        ] {
            assert_eq!(distance_function_by_name(f.name()).unwrap(), f);
        }
    }

    #[test]
    fn test_get_distances_shape() {
        let factory = FilterFactoryEnum::None(NoFilterFactory);
        let tracks = vec![
            Track::new(0, &Detection::new(0.0, 0.0).unwrap(), &factory, 10),
            Track::new(1, &Detection::new(10.0, 0.0).unwrap(), &factory, 10),
        ];
        let detections = vec![
            Detection::new(0.0, 1.0).unwrap(),
            Detection::new(10.0, 2.0).unwrap(),
            Detection::new(6.0, 8.0).unwrap(),
        ];

        let d = DistanceFunction::Euclidean.get_distances(&tracks, &detections);

        assert_eq!(d.shape(), (2, 3));
        assert_relative_eq!(d[(0, 0)], 1.0);
        assert_relative_eq!(d[(1, 1)], 2.0);
        assert_relative_eq!(d[(0, 2)], 10.0);
    }

    #[test]
    fn test_serde_names() {
        let f: DistanceFunction = serde_json::from_str("\"squared_euclidean\"").unwrap();
        assert_eq!(f, DistanceFunction::SquaredEuclidean);
    }
}
