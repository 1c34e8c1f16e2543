// src/perception/solver.rs
// Robot pose from landmark detections. The solver is a pluggable capability:
// a coprocessor-side multi-landmark PnP can stand in for the default one.

use crate::core::geometry::{Pose3d, normalize_angle};

/// A detection whose landmark was found in the map.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ResolvedLandmark {
    pub id: u32,
    pub field_pose: Pose3d,
    pub camera_to_landmark: Pose3d,
}

/// Solves the robot's field pose from resolved landmarks.
pub trait PoseSolver: Send + Sync {
    /// Returns `None` when no consistent pose can be produced.
    fn solve(&self, landmarks: &[ResolvedLandmark], robot_to_camera: &Pose3d) -> Option<Pose3d>;
}

/// Per-landmark back-projection averaged over all landmarks: translations
/// are averaged, yaw uses the circular mean.
#[derive(Clone, Copy, Debug, Default)]
pub struct AveragingSolver;

impl AveragingSolver {
    /// Field pose of the robot implied by a single landmark.
    pub fn robot_pose_from(landmark: &ResolvedLandmark, robot_to_camera: &Pose3d) -> Pose3d {
        landmark
            .field_pose
            .compose(&landmark.camera_to_landmark.inverse())
            .compose(&robot_to_camera.inverse())
    }
}

impl PoseSolver for AveragingSolver {
    fn solve(&self, landmarks: &[ResolvedLandmark], robot_to_camera: &Pose3d) -> Option<Pose3d> {
        if landmarks.is_empty() {
            return None;
        }

        let n = landmarks.len() as f64;
        let (mut x, mut y, mut z, mut sin, mut cos) = (0.0, 0.0, 0.0, 0.0, 0.0);
        for landmark in landmarks {
            let pose = Self::robot_pose_from(landmark, robot_to_camera);
            x += pose.x();
            y += pose.y();
            z += pose.z();
            sin += pose.yaw().sin();
            cos += pose.yaw().cos();
        }

        let yaw = normalize_angle(sin.atan2(cos));
        let solved = Pose3d::new(x / n, y / n, z / n, 0.0, 0.0, yaw);
        solved.is_finite().then_some(solved)
    }
}
