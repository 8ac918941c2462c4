use std::ops::{Add, AddAssign};

use nalgebra::{Point2, Vector2};
use serde::Deserialize;

use crate::math::normalize_angle;

/// The pose of a robot in the 2D plane.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize)]
pub struct Pose {
    /// The x position of the robot
    pub x: f64,

    /// The y position of the robot
    pub y: f64,

    /// The rotation of the robot, measured in radians counter-clockwise from the positive x-axis.
    pub theta: f64,
}

impl Pose {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    pub fn xy(&self) -> Point2<f64> {
        Point2::new(self.x, self.y)
    }

    /// Transforms a point given in the robot frame into the world frame.
    pub fn transform(&self, local: Point2<f64>) -> Point2<f64> {
        let (sin, cos) = self.theta.sin_cos();
        Point2::new(
            self.x + cos * local.x - sin * local.y,
            self.y + sin * local.x + cos * local.y,
        )
    }

    /// The correction that takes `self` to `other`, expressed in the world frame.
    pub fn delta_to(&self, other: &Pose) -> PoseDelta {
        PoseDelta {
            x: other.x - self.x,
            y: other.y - self.y,
            theta: normalize_angle(other.theta - self.theta),
        }
    }
}

impl From<Pose> for (f64, f64) {
    fn from(val: Pose) -> Self {
        (val.x, val.y)
    }
}

impl Add<PoseDelta> for Pose {
    type Output = Pose;

    fn add(self, rhs: PoseDelta) -> Self::Output {
        Pose {
            x: self.x + rhs.x,
            y: self.y + rhs.y,
            theta: normalize_angle(self.theta + rhs.theta),
        }
    }
}

impl AddAssign<PoseDelta> for Pose {
    fn add_assign(&mut self, rhs: PoseDelta) {
        *self = *self + rhs;
    }
}

/// A relative pose correction: a translation in the world frame followed by a rotation.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize)]
pub struct PoseDelta {
    pub x: f64,
    pub y: f64,
    pub theta: f64,
}

impl PoseDelta {
    pub fn new(x: f64, y: f64, theta: f64) -> Self {
        Self { x, y, theta }
    }

    /// Component-wise absolute value, used to accumulate travelled distance.
    pub fn abs(&self) -> PoseDelta {
        PoseDelta {
            x: self.x.abs(),
            y: self.y.abs(),
            theta: self.theta.abs(),
        }
    }

    pub fn sq_dist(&self) -> f64 {
        Vector2::new(self.x, self.y).norm_squared()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.theta == 0.0
    }
}

impl AddAssign<PoseDelta> for PoseDelta {
    fn add_assign(&mut self, rhs: PoseDelta) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.theta += rhs.theta;
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// The angle this measurement was acquired at (relative to the sensor zero) in radians.
    pub angle: f64,

    /// The distance measured in meters.
    pub distance: f64,

    /// The strength of the measurement (if applicable)
    pub strength: f64,

    /// If this measurement is valid (information provided by the sensor itself). An invalid
    /// measurement still tells that the beam travelled `distance` without hitting anything.
    pub valid: bool,
}

impl Measurement {
    pub fn hit(angle: f64, distance: f64) -> Self {
        Self {
            angle,
            distance,
            strength: 1.0,
            valid: true,
        }
    }

    pub fn miss(angle: f64, distance: f64) -> Self {
        Self {
            angle,
            distance,
            strength: 0.0,
            valid: false,
        }
    }

    /// The point in the world where the beam ends when taken from `origin`.
    pub fn endpoint(&self, origin: Pose) -> Point2<f64> {
        let (sin, cos) = self.angle.sin_cos();
        origin.transform(Point2::new(cos * self.distance, sin * self.distance))
    }
}

/// A complete lidar scan together with the motion of the robot since the previous scan.
/// Readings are expressed relative to the robot and the delta is already in the map frame.
#[derive(Debug, Clone, Default)]
pub struct TransformedLaserScan {
    pub id: usize,
    pub pose_delta: PoseDelta,
    pub measurements: Vec<Measurement>,

    /// Confidence in this scan in [0, 1]; scales the map update.
    pub quality: f64,
}

impl TransformedLaserScan {
    pub fn new(id: usize, pose_delta: PoseDelta, measurements: Vec<Measurement>) -> Self {
        Self {
            id,
            pose_delta,
            measurements,
            quality: 1.0,
        }
    }
}

/// A Command to move the robot by setting the desired left and right wheel speed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct Command {
    /// The target speed in meters/second that the left wheel of the robot should move.
    pub speed_left: f64,

    /// The target speed in meters/second that the right wheel of the robot should move.
    pub speed_right: f64,
}
