//! Constant-velocity Kalman filter for 2D centroid tracking.
//!
//! State is `[x, y, vx, vy]`, measurements are `[x, y]`. Known accelerations
//! `u_x`, `u_y` enter as a control input, unknown accelerations as process
//! noise of magnitude `std_acc`.
//!
//! ```text
//! A = | 1 0 dt  0 |    B = | dt²/2     0 |    H = | 1 0 0 0 |
//!     | 0 1  0 dt |        |     0 dt²/2 |        | 0 1 0 0 |
//!     | 0 0  1  0 |        |    dt     0 |
//!     | 0 0  0  1 |        |     0    dt |
//!
//! Q = std_acc² * | dt⁴/4     0 dt³/2     0 |    R = | x_std²      0 |
//!                |     0 dt⁴/4     0 dt³/2 |        |      0 y_std² |
//!                | dt³/2     0   dt²     0 |
//!                |     0 dt³/2     0   dt² |
//! ```

use nalgebra::{Matrix2, Matrix2x4, Matrix4, Matrix4x2, Vector2, Vector4};
use serde::{Deserialize, Serialize};

use super::traits::{Filter, FilterFactory};
use crate::{Error, Result};

/// Kalman filter parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KalmanParams {
    /// Time between two consecutive updates (seconds).
    pub dt: f64,
    /// Known acceleration in x.
    pub u_x: f64,
    /// Known acceleration in y.
    pub u_y: f64,
    /// Process noise magnitude.
    pub std_acc: f64,
    /// Measurement standard deviation in x.
    pub x_std_meas: f64,
    /// Measurement standard deviation in y.
    pub y_std_meas: f64,
}

impl Default for KalmanParams {
    fn default() -> Self {
        Self {
            dt: 0.033,
            u_x: 0.0,
            u_y: 0.0,
            std_acc: 5.0,
            x_std_meas: 0.1,
            y_std_meas: 0.1,
        }
    }
}

impl KalmanParams {
    pub fn validate(&self) -> Result<()> {
        let all = [self.dt, self.u_x, self.u_y, self.std_acc, self.x_std_meas, self.y_std_meas];
        if all.iter().any(|v| !v.is_finite()) {
            return Err(Error::InvalidConfig(
                "kalman parameters must be finite".to_string(),
            ));
        }
        if self.dt <= 0.0 {
            return Err(Error::InvalidConfig(format!("kalman dt must be positive, got {}", self.dt)));
        }
        if self.std_acc < 0.0 {
            return Err(Error::InvalidConfig(format!(
                "kalman std_acc must be non-negative, got {}",
                self.std_acc
            )));
        }
        if self.x_std_meas <= 0.0 || self.y_std_meas <= 0.0 {
            return Err(Error::InvalidConfig(
                "kalman measurement standard deviations must be positive".to_string(),
            ));
        }

        // The inputs can be finite while the model built from them is not
        if !all_finite(self.control_matrix().iter()) || !all_finite(self.process_noise().iter()) {
            return Err(Error::InvalidConfig(format!(
                "kalman model overflows for dt = {} and std_acc = {}",
                self.dt, self.std_acc
            )));
        }
        let r = self.measurement_noise();
        if !all_finite(r.iter()) || r[(0, 0)] <= 0.0 || r[(1, 1)] <= 0.0 {
            return Err(Error::InvalidConfig(format!(
                "kalman measurement noise out of range for x_std_meas = {} and y_std_meas = {}",
                self.x_std_meas, self.y_std_meas
            )));
        }
        Ok(())
    }

    /// Control input matrix `B`.
    #[rustfmt::skip]
    fn control_matrix(&self) -> Matrix4x2<f64> {
        let dt = self.dt;
        let dt2 = dt * dt;
        Matrix4x2::new(
            dt2 / 2.0, 0.0,
            0.0,       dt2 / 2.0,
            dt,        0.0,
            0.0,       dt,
        )
    }

    /// Process noise covariance `Q`.
    #[rustfmt::skip]
    fn process_noise(&self) -> Matrix4<f64> {
        let dt = self.dt;
        let dt2 = dt * dt;
        let dt3 = dt2 * dt;
        let dt4 = dt3 * dt;
        Matrix4::new(
            dt4 / 4.0, 0.0,       dt3 / 2.0, 0.0,
            0.0,       dt4 / 4.0, 0.0,       dt3 / 2.0,
            dt3 / 2.0, 0.0,       dt2,       0.0,
            0.0,       dt3 / 2.0, 0.0,       dt2,
        ) * self.std_acc.powi(2)
    }

    /// Measurement noise covariance `R`.
    fn measurement_noise(&self) -> Matrix2<f64> {
        Matrix2::new(self.x_std_meas.powi(2), 0.0, 0.0, self.y_std_meas.powi(2))
    }
}

fn all_finite<'a>(mut values: impl Iterator<Item = &'a f64>) -> bool {
    values.all(|v| v.is_finite())
}

/// Constant-velocity Kalman filter.
#[derive(Clone, Debug)]
pub struct KalmanFilter {
    /// State vector [x, y, vx, vy]
    x: Vector4<f64>,
    /// State covariance
    p: Matrix4<f64>,
    /// State transition
    a: Matrix4<f64>,
    /// Control input matrix
    b: Matrix4x2<f64>,
    /// Control input [u_x, u_y]
    u: Vector2<f64>,
    /// Measurement matrix
    h: Matrix2x4<f64>,
    /// Process noise covariance
    q: Matrix4<f64>,
    /// Measurement noise covariance
    r: Matrix2<f64>,
    /// Position returned by the last update, re-measured when no detection
    /// is available
    last_result: Vector2<f64>,
}

impl KalmanFilter {
    /// Create a new filter at `initial_position` with zero velocity.
    pub fn new(params: &KalmanParams, initial_position: &Vector2<f64>) -> Self {
        let dt = params.dt;

        #[rustfmt::skip]
        let a = Matrix4::new(
            1.0, 0.0, dt,  0.0,
            0.0, 1.0, 0.0, dt,
            0.0, 0.0, 1.0, 0.0,
            0.0, 0.0, 0.0, 1.0,
        );

        #[rustfmt::skip]
        let h = Matrix2x4::new(
            1.0, 0.0, 0.0, 0.0,
            0.0, 1.0, 0.0, 0.0,
        );

        Self {
            x: Vector4::new(initial_position.x, initial_position.y, 0.0, 0.0),
            p: Matrix4::identity(),
            a,
            b: params.control_matrix(),
            u: Vector2::new(params.u_x, params.u_y),
            h,
            q: params.process_noise(),
            r: params.measurement_noise(),
            last_result: *initial_position,
        }
    }

    /// Full state vector [x, y, vx, vy].
    pub fn state(&self) -> &Vector4<f64> {
        &self.x
    }

    /// State covariance.
    pub fn covariance(&self) -> &Matrix4<f64> {
        &self.p
    }
}

impl Filter for KalmanFilter {
    fn predict(&mut self) -> Vector2<f64> {
        // x = A @ x + B @ u
        self.x = self.a * self.x + self.b * self.u;
        // P = A @ P @ A.T + Q
        self.p = self.a * self.p * self.a.transpose() + self.q;
        self.position()
    }

    fn update(&mut self, measurement: Option<&Vector2<f64>>) -> Result<Vector2<f64>> {
        let z = measurement.copied().unwrap_or(self.last_result);

        // S = H @ P @ H.T + R
        let s = self.h * self.p * self.h.transpose() + self.r;
        let s_inv = s.try_inverse().ok_or_else(|| {
            Error::FilterError("innovation covariance is singular".to_string())
        })?;

        // K = P @ H.T @ S^-1
        let k = self.p * self.h.transpose() * s_inv;

        // x = x + K @ (z - H @ x)
        let x = self.x + k * (z - self.h * self.x);

        // P = (I - K @ H) @ P
        let p = (Matrix4::identity() - k * self.h) * self.p;

        if !all_finite(x.iter()) || !all_finite(p.iter()) {
            return Err(Error::FilterError(
                "state is no longer finite".to_string(),
            ));
        }
        self.x = x;
        self.p = p;

        self.last_result = self.position();
        Ok(self.last_result)
    }

    fn position(&self) -> Vector2<f64> {
        Vector2::new(self.x[0], self.x[1])
    }

    fn velocity(&self) -> Vector2<f64> {
        Vector2::new(self.x[2], self.x[3])
    }
}

/// Factory for creating KalmanFilter instances.
#[derive(Clone, Debug, Default)]
pub struct KalmanFilterFactory {
    params: KalmanParams,
}

impl KalmanFilterFactory {
    pub fn new(params: KalmanParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &KalmanParams {
        &self.params
    }

    pub fn create(&self, initial_position: &Vector2<f64>) -> KalmanFilter {
        KalmanFilter::new(&self.params, initial_position)
    }
}

impl FilterFactory for KalmanFilterFactory {
    fn create_filter(&self, initial_position: &Vector2<f64>) -> Box<dyn Filter> {
        Box::new(self.create(initial_position))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn unit_dt_params() -> KalmanParams {
        KalmanParams {
            dt: 1.0,
            ..KalmanParams::default()
        }
    }

    #[test]
    fn test_kalman_filter_create() {
        let kf = KalmanFilter::new(&KalmanParams::default(), &Vector2::new(3.0, 4.0));

        assert_relative_eq!(kf.state()[0], 3.0);
        assert_relative_eq!(kf.state()[1], 4.0);
        assert_relative_eq!(kf.state()[2], 0.0);
        assert_relative_eq!(kf.state()[3], 0.0);
        assert_eq!(kf.covariance(), &Matrix4::identity());
    }

    #[test]
    fn test_kalman_predict_static() {
        // No velocity, no control input: prediction stays put
        let mut kf = KalmanFilter::new(&unit_dt_params(), &Vector2::new(1.0, 2.0));
        let predicted = kf.predict();

        assert_relative_eq!(predicted.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(predicted.y, 2.0, epsilon = 1e-12);
        // Uncertainty grows
        assert!(kf.covariance()[(0, 0)] > 1.0);
    }

    #[test]
    fn test_kalman_predict_control_input() {
        let params = KalmanParams {
            dt: 1.0,
            u_x: 1.0,
            ..KalmanParams::default()
        };
        let mut kf = KalmanFilter::new(&params, &Vector2::new(0.0, 0.0));
        let predicted = kf.predict();

        // x = dt²/2 * u_x, vx = dt * u_x
        assert_relative_eq!(predicted.x, 0.5, epsilon = 1e-12);
        assert_relative_eq!(predicted.y, 0.0, epsilon = 1e-12);
        assert_relative_eq!(kf.velocity().x, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kalman_update_moves_towards_measurement() {
        let mut kf = KalmanFilter::new(&unit_dt_params(), &Vector2::new(0.0, 0.0));
        kf.predict();
        let corrected = kf.update(Some(&Vector2::new(10.0, 0.0))).unwrap();

        // Measurement noise is small compared to P, so the estimate lands
        // close to the measurement without passing it
        assert!(corrected.x > 9.0 && corrected.x < 10.0, "got {}", corrected.x);
        assert_relative_eq!(corrected.y, 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_kalman_update_without_measurement_pulls_back() {
        let params = KalmanParams {
            dt: 1.0,
            u_x: 1.0,
            ..KalmanParams::default()
        };
        let mut kf = KalmanFilter::new(&params, &Vector2::new(0.0, 0.0));
        let predicted = kf.predict();
        let corrected = kf.update(None).unwrap();

        // Re-measures the last result (0, 0)
        assert!(corrected.x > 0.0 && corrected.x < predicted.x, "got {}", corrected.x);
    }

    #[test]
    fn test_kalman_tracks_constant_velocity() {
        let mut kf = KalmanFilter::new(&unit_dt_params(), &Vector2::new(0.0, 0.0));

        for t in 1..=20 {
            kf.predict();
            kf.update(Some(&Vector2::new(t as f64, 0.0))).unwrap();
        }

        assert_relative_eq!(kf.position().x, 20.0, epsilon = 0.05);
        assert_relative_eq!(kf.velocity().x, 1.0, epsilon = 0.5);
        assert_relative_eq!(kf.velocity().y, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_kalman_params_validate() {
        assert!(KalmanParams::default().validate().is_ok());

        let bad_dt = KalmanParams { dt: 0.0, ..KalmanParams::default() };
        assert!(bad_dt.validate().is_err());

        let bad_meas = KalmanParams { x_std_meas: 0.0, ..KalmanParams::default() };
        assert!(bad_meas.validate().is_err());

        let bad_acc = KalmanParams { std_acc: -1.0, ..KalmanParams::default() };
        assert!(bad_acc.validate().is_err());

        let nan = KalmanParams { u_y: f64::NAN, ..KalmanParams::default() };
        assert!(nan.validate().is_err());
    }

    #[test]
    fn test_kalman_factory_boxed() {
        let factory = KalmanFilterFactory::new(unit_dt_params());
        let mut filter = factory.create_filter(&Vector2::new(5.0, 5.0));

        filter.predict();
        let p = filter.update(Some(&Vector2::new(5.0, 5.0))).unwrap();
        assert_relative_eq!(p.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(p.y, 5.0, epsilon = 1e-9);
    }

    #[test]
    fn test_kalman_params_validate_derived_model() {
        assert!(KalmanParams::default().validate().is_ok());

        let huge_acc = KalmanParams { std_acc: 1e200, ..KalmanParams::default() };
        assert!(matches!(huge_acc.validate(), Err(Error::InvalidConfig(_))));

        let huge_dt = KalmanParams { dt: 1e200, ..KalmanParams::default() };
        assert!(matches!(huge_dt.validate(), Err(Error::InvalidConfig(_))));

        // Squares to zero
        let tiny_meas = KalmanParams { x_std_meas: 1e-200, ..KalmanParams::default() };
        assert!(matches!(tiny_meas.validate(), Err(Error::InvalidConfig(_))));

        let huge_meas = KalmanParams { y_std_meas: 1e200, ..KalmanParams::default() };
        assert!(matches!(huge_meas.validate(), Err(Error::InvalidConfig(_))));
    }

    #[test]
    fn test_kalman_update_rejects_non_finite_state() {
        let params = KalmanParams { std_acc: 1e200, ..KalmanParams::default() };
        let mut filter = KalmanFilter::new(&params, &Vector2::new(1.0, 2.0));

        filter.predict();
        let before = *filter.state();

        assert!(matches!(
            filter.update(Some(&Vector2::new(1.5, 2.0))),
            Err(Error::FilterError(_))
        ));
        assert_eq!(filter.state(), &before);
        assert_relative_eq!(filter.position().x, 1.0);
    }
}
