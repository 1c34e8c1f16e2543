// src/perception/config.rs
// Vision pipeline parameters: rejection thresholds and camera mounts.

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::ConfigError;
use crate::core::geometry::PoseConfig;

/// One camera and where it sits on the robot.
/// - `mount`: robot-to-camera transform, camera looking along its +x axis.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CameraConfig {
    pub name: String,
    pub mount: PoseConfig,
}

/// Parameters shared by every camera's observation filter.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VisionConfig {
    /// Landmarks with a higher ambiguity score are discarded.
    pub max_ambiguity: f64,
    /// Largest |z| of a solved robot pose before it is rejected, meters.
    pub height_tolerance: f64,
    /// Dispersion reported when fewer than two landmarks contributed.
    pub single_landmark_std_dev: f64,
    /// Largest allowed jump from the last estimate, meters. Disabled when unset.
    pub max_pose_jump: Option<f64>,
    pub cameras: Vec<CameraConfig>,
}

impl Default for VisionConfig {
    fn default() -> Self {
        VisionConfig {
            max_ambiguity: 0.2,
            height_tolerance: 0.25,
            single_landmark_std_dev: 1.0,
            max_pose_jump: None,
            cameras: Vec::new(),
        }
    }
}

impl VisionConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=1.0).contains(&self.max_ambiguity) {
            return Err(ConfigError::Invalid(format!(
                "vision.max_ambiguity must be within [0, 1], got {}",
                self.max_ambiguity
            )));
        }
        if !self.height_tolerance.is_finite() || self.height_tolerance < 0.0 {
            return Err(ConfigError::Invalid("vision.height_tolerance must be non-negative".into()));
        }
        if !self.single_landmark_std_dev.is_finite() || self.single_landmark_std_dev <= 0.0 {
            return Err(ConfigError::Invalid("vision.single_landmark_std_dev must be positive".into()));
        }
        if let Some(jump) = self.max_pose_jump {
            if !jump.is_finite() || jump <= 0.0 {
                return Err(ConfigError::Invalid("vision.max_pose_jump must be positive".into()));
            }
        }
        if self.cameras.is_empty() {
            return Err(ConfigError::Missing("vision.cameras".into()));
        }

        let mut names = HashSet::new();
        for camera in &self.cameras {
            if !names.insert(camera.name.as_str()) {
                return Err(ConfigError::Invalid(format!("duplicate camera name '{}'", camera.name)));
            }
            let m = &camera.mount;
            let values = [m.x, m.y, m.z, m.roll_deg, m.pitch_deg, m.yaw_deg];
            if values.iter().any(|v| !v.is_finite()) {
                return Err(ConfigError::Invalid(format!("camera '{}' has a non-finite mount", camera.name)));
            }
        }
        Ok(())
    }
}
