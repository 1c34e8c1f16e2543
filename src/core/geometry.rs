// core/geometry.rs

// Planar and spatial pose primitives shared by every FieldPose component.
// Field coordinates: origin at the blue alliance corner, x along the field
// length, y along the width, heading counter-clockwise from +x.

// Dependencies
use nalgebra::{Isometry3, Translation3, UnitComplex, UnitQuaternion, Vector2, Vector3};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use std::ops::{Add, Mul, Neg, Sub};

/// Wraps an angle into (-pi, pi].
pub fn normalize_angle(radians: f64) -> f64 {
    let wrapped = radians.rem_euclid(2.0 * PI);
    if wrapped > PI { wrapped - 2.0 * PI } else { wrapped }
}

// Translation2d: planar offset in meters
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Translation2d {
    pub x: f64,
    pub y: f64,
}

impl Translation2d {
    pub const fn new(x: f64, y: f64) -> Self {
        Translation2d { x, y }
    }

    /// Euclidean length of the offset.
    pub fn norm(&self) -> f64 {
        Vector2::new(self.x, self.y).norm()
    }

    pub fn distance(&self, other: &Translation2d) -> f64 {
        (*self - *other).norm()
    }

    /// Rotates the offset counter-clockwise about the origin.
    pub fn rotate_by(&self, rotation: Rotation2d) -> Translation2d {
        let rotated = UnitComplex::new(rotation.radians()) * Vector2::new(self.x, self.y);
        Translation2d::new(rotated.x, rotated.y)
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

impl Add for Translation2d {
    type Output = Translation2d;
    fn add(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Translation2d {
    type Output = Translation2d;
    fn sub(self, rhs: Translation2d) -> Translation2d {
        Translation2d::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Neg for Translation2d {
    type Output = Translation2d;
    fn neg(self) -> Translation2d {
        Translation2d::new(-self.x, -self.y)
    }
}

impl Mul<f64> for Translation2d {
    type Output = Translation2d;
    fn mul(self, scale: f64) -> Translation2d {
        Translation2d::new(self.x * scale, self.y * scale)
    }
}

// Rotation2d: heading, always stored normalized to (-pi, pi]
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "f64", into = "f64")]
pub struct Rotation2d {
    radians: f64,
}

impl Rotation2d {
    pub fn from_radians(radians: f64) -> Self {
        Rotation2d { radians: normalize_angle(radians) }
    }

    pub fn from_degrees(degrees: f64) -> Self {
        Self::from_radians(degrees.to_radians())
    }

    pub fn radians(&self) -> f64 {
        self.radians
    }

    pub fn degrees(&self) -> f64 {
        self.radians.to_degrees()
    }

    pub fn cos(&self) -> f64 {
        self.radians.cos()
    }

    pub fn sin(&self) -> f64 {
        self.radians.sin()
    }

    pub fn rotate_by(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians + other.radians)
    }

    pub fn inverse(&self) -> Rotation2d {
        Rotation2d::from_radians(-self.radians)
    }

    /// Signed shortest angular difference `self - other`.
    pub fn minus(&self, other: Rotation2d) -> Rotation2d {
        Rotation2d::from_radians(self.radians - other.radians)
    }
}

impl From<f64> for Rotation2d {
    fn from(radians: f64) -> Self {
        Rotation2d::from_radians(radians)
    }
}

impl From<Rotation2d> for f64 {
    fn from(rotation: Rotation2d) -> f64 {
        rotation.radians
    }
}

// Twist2d: constant-curvature displacement in the robot frame
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Twist2d {
    pub dx: f64,
    pub dy: f64,
    pub dtheta: f64,
}

impl Twist2d {
    pub const fn new(dx: f64, dy: f64, dtheta: f64) -> Self {
        Twist2d { dx, dy, dtheta }
    }
}

// Pose2d: robot pose in field coordinates
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Pose2d {
    pub translation: Translation2d,
    pub rotation: Rotation2d,
}

impl Pose2d {
    pub fn new(x: f64, y: f64, heading: f64) -> Self {
        Pose2d {
            translation: Translation2d::new(x, y),
            rotation: Rotation2d::from_radians(heading),
        }
    }

    pub fn from_parts(translation: Translation2d, rotation: Rotation2d) -> Self {
        Pose2d { translation, rotation }
    }

    pub fn x(&self) -> f64 {
        self.translation.x
    }

    pub fn y(&self) -> f64 {
        self.translation.y
    }

    pub fn heading(&self) -> f64 {
        self.rotation.radians()
    }

    /// Applies `other`, expressed in this pose's frame, on top of this pose.
    pub fn compose(&self, other: &Pose2d) -> Pose2d {
        Pose2d {
            translation: self.translation + other.translation.rotate_by(self.rotation),
            rotation: self.rotation.rotate_by(other.rotation),
        }
    }

    pub fn inverse(&self) -> Pose2d {
        let rotation = self.rotation.inverse();
        Pose2d {
            translation: (-self.translation).rotate_by(rotation),
            rotation,
        }
    }

    /// Expresses this pose in the frame of `origin`.
    pub fn relative_to(&self, origin: &Pose2d) -> Pose2d {
        origin.inverse().compose(self)
    }

    /// Planar distance between the two positions, ignoring heading.
    pub fn distance(&self, other: &Pose2d) -> f64 {
        self.translation.distance(&other.translation)
    }

    pub fn is_finite(&self) -> bool {
        self.translation.is_finite() && self.rotation.radians().is_finite()
    }

    /// Integrates a constant-curvature twist starting from this pose.
    pub fn exp(&self, twist: &Twist2d) -> Pose2d {
        let (sin_theta, cos_theta) = twist.dtheta.sin_cos();
        let (s, c) = if twist.dtheta.abs() < 1e-9 {
            (1.0 - twist.dtheta * twist.dtheta / 6.0, 0.5 * twist.dtheta)
        } else {
            (sin_theta / twist.dtheta, (1.0 - cos_theta) / twist.dtheta)
        };
        let delta = Pose2d {
            translation: Translation2d::new(twist.dx * s - twist.dy * c, twist.dx * c + twist.dy * s),
            rotation: Rotation2d::from_radians(twist.dtheta),
        };
        self.compose(&delta)
    }

    /// Twist that carries this pose onto `end`; inverse of [`Pose2d::exp`].
    pub fn log(&self, end: &Pose2d) -> Twist2d {
        let transform = end.relative_to(self);
        let dtheta = transform.heading();
        let half_dtheta = dtheta / 2.0;
        let cos_minus_one = dtheta.cos() - 1.0;

        let half_theta_by_tan = if cos_minus_one.abs() < 1e-9 {
            1.0 - dtheta * dtheta / 12.0
        } else {
            -(half_dtheta * dtheta.sin()) / cos_minus_one
        };

        let scale = half_theta_by_tan.hypot(half_dtheta);
        let translation = transform
            .translation
            .rotate_by(Rotation2d::from_radians((-half_dtheta).atan2(half_theta_by_tan)))
            * scale;

        Twist2d::new(translation.x, translation.y, dtheta)
    }

    /// Linear interpolation along the twist between two poses, `t` in [0, 1].
    pub fn interpolate(&self, end: &Pose2d, t: f64) -> Pose2d {
        if t <= 0.0 {
            return *self;
        }
        if t >= 1.0 {
            return *end;
        }
        let twist = self.log(end);
        self.exp(&Twist2d::new(twist.dx * t, twist.dy * t, twist.dtheta * t))
    }

    /// Mirrors the pose to the other alliance's origin.
    pub fn flipped(&self, field: &FieldDimensions) -> Pose2d {
        Pose2d {
            translation: Translation2d::new(field.length - self.x(), field.width - self.y()),
            rotation: self.rotation.rotate_by(Rotation2d::from_radians(PI)),
        }
    }
}

// Field rectangle used for bounds checks and alliance flipping
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldDimensions {
    pub length: f64, // meters along x
    pub width: f64,  // meters along y
}

impl Default for FieldDimensions {
    fn default() -> Self {
        FieldDimensions {
            length: 17.548,
            width: 8.052,
        }
    }
}

impl FieldDimensions {
    /// True when (x, y) lies inside [0, length] x [0, width].
    pub fn contains(&self, x: f64, y: f64) -> bool {
        (0.0..=self.length).contains(&x) && (0.0..=self.width).contains(&y)
    }
}

// Alliance whose driver station defines the operator's perspective
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Alliance {
    Blue,
    Red,
}

// Pose3d: rigid transform in 3-D, used for landmarks and camera geometry
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Pose3d {
    isometry: Isometry3<f64>,
}

impl Default for Pose3d {
    fn default() -> Self {
        Pose3d { isometry: Isometry3::identity() }
    }
}

impl Pose3d {
    /// Builds a pose from a translation and intrinsic roll/pitch/yaw in radians.
    pub fn new(x: f64, y: f64, z: f64, roll: f64, pitch: f64, yaw: f64) -> Self {
        Pose3d {
            isometry: Isometry3::from_parts(
                Translation3::new(x, y, z),
                UnitQuaternion::from_euler_angles(roll, pitch, yaw),
            ),
        }
    }

    pub fn translation(&self) -> Vector3<f64> {
        self.isometry.translation.vector
    }

    pub fn x(&self) -> f64 {
        self.isometry.translation.vector.x
    }

    pub fn y(&self) -> f64 {
        self.isometry.translation.vector.y
    }

    pub fn z(&self) -> f64 {
        self.isometry.translation.vector.z
    }

    /// Heading about the vertical axis.
    pub fn yaw(&self) -> f64 {
        self.isometry.rotation.euler_angles().2
    }

    pub fn compose(&self, other: &Pose3d) -> Pose3d {
        Pose3d { isometry: self.isometry * other.isometry }
    }

    pub fn inverse(&self) -> Pose3d {
        Pose3d { isometry: self.isometry.inverse() }
    }

    /// Drops height, roll and pitch.
    pub fn to_pose2d(&self) -> Pose2d {
        Pose2d::new(self.x(), self.y(), self.yaw())
    }

    pub fn is_finite(&self) -> bool {
        self.translation().iter().all(|v| v.is_finite())
            && self.isometry.rotation.coords.iter().all(|v| v.is_finite())
    }
}

// Serialized 3-D pose: meters and degrees, as written in YAML configs
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PoseConfig {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    #[serde(default)]
    pub roll_deg: f64,
    #[serde(default)]
    pub pitch_deg: f64,
    #[serde(default)]
    pub yaw_deg: f64,
}

impl From<PoseConfig> for Pose3d {
    fn from(config: PoseConfig) -> Self {
        Pose3d::new(
            config.x,
            config.y,
            config.z,
            config.roll_deg.to_radians(),
            config.pitch_deg.to_radians(),
            config.yaw_deg.to_radians(),
        )
    }
}
