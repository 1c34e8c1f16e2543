//! Drive kinematics for FieldPose
//!
//! This module converts chassis velocity commands into per-wheel targets and
//! wheel telemetry back into chassis displacement for the estimator.

pub mod controller;
pub mod kinematics;

use serde::{Deserialize, Serialize};

pub use controller::{DriveController, DriveRequest};
pub use kinematics::{ChassisSpeeds, KinematicsError, SwerveKinematics, WheelPosition, WheelState, desaturate};

use crate::ConfigError;
use crate::core::geometry::Translation2d;

/// Drivetrain geometry
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DriveConfig {
    /// Module positions relative to the center of rotation, meters
    pub modules: Vec<Translation2d>,
    /// Physical wheel speed limit, m/s
    pub max_wheel_speed: f64,
}

impl Default for DriveConfig {
    fn default() -> Self {
        let half = 0.2667; // 21 in wheelbase and track width
        DriveConfig {
            modules: vec![
                Translation2d::new(half, half),
                Translation2d::new(half, -half),
                Translation2d::new(-half, half),
                Translation2d::new(-half, -half),
            ],
            max_wheel_speed: 4.5,
        }
    }
}

impl DriveConfig {
    /// Builds the kinematics, failing on unusable geometry.
    pub fn kinematics(&self) -> Result<SwerveKinematics, ConfigError> {
        if !self.max_wheel_speed.is_finite() || self.max_wheel_speed <= 0.0 {
            return Err(ConfigError::Invalid("drive.max_wheel_speed must be positive".into()));
        }
        SwerveKinematics::new(self.modules.clone()).map_err(|e| ConfigError::Invalid(format!("drive.modules: {}", e)))
    }
}
