// src/perception/filter.rs
// Per-camera observation filter. Turns one frame of landmark detections into
// zero or one admissible pose observation.

use log::debug;

use super::config::VisionConfig;
use super::landmarks::LandmarkMap;
use super::solver::{PoseSolver, ResolvedLandmark};
use crate::core::geometry::{Pose2d, Pose3d, PoseConfig};
use crate::core::state::PoseObservation;

/// One landmark as reported by the detector.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LandmarkObservation {
    pub id: u32,
    pub camera_to_landmark: Pose3d,
    /// Solver ambiguity in [0, 1]; higher means less trustworthy.
    pub ambiguity: f64,
}

/// The detector's latest completed result for one camera.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DetectionFrame {
    pub timestamp: f64,
    pub landmarks: Vec<LandmarkObservation>,
}

/// Why a frame with detections produced no observation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum RejectReason {
    /// Every detection exceeded the ambiguity threshold.
    AllAmbiguous { discarded: usize },
    /// Every unambiguous detection referred to a landmark missing from the map.
    UnknownLandmarks { discarded: usize },
    /// Detections carried non-finite transforms or scores.
    Malformed { discarded: usize },
    SolverFailed,
    OutOfBounds { x: f64, y: f64 },
    HeightResidual { z: f64 },
    ImplausibleJump { distance: f64 },
}

/// Filter result. Absence and rejection are both "no observation" but are
/// kept apart for diagnostics.
#[derive(Clone, Debug, PartialEq)]
pub enum FilterOutcome {
    Accepted(PoseObservation),
    NoLandmarks,
    Rejected(RejectReason),
}

impl FilterOutcome {
    pub fn observation(self) -> Option<PoseObservation> {
        match self {
            FilterOutcome::Accepted(observation) => Some(observation),
            _ => None,
        }
    }
}

/// Population standard deviation of the distances; `None` below two samples.
pub fn distance_dispersion(distances: &[f64]) -> Option<f64> {
    if distances.len() < 2 {
        return None;
    }
    let n = distances.len() as f64;
    let mean = distances.iter().sum::<f64>() / n;
    let sum_of_squares: f64 = distances.iter().map(|d| (d - mean).powi(2)).sum();
    Some((sum_of_squares / n).sqrt())
}

// Thresholds copied out of VisionConfig so each filter is self-contained
#[derive(Clone, Copy, Debug, PartialEq)]
struct Thresholds {
    max_ambiguity: f64,
    height_tolerance: f64,
    single_landmark_std_dev: f64,
    max_pose_jump: Option<f64>,
}

/// Stateless filter bound to one camera's mount.
#[derive(Clone, Debug)]
pub struct ObservationFilter {
    camera: String,
    robot_to_camera: Pose3d,
    thresholds: Thresholds,
}

impl ObservationFilter {
    pub fn new(camera: impl Into<String>, mount: PoseConfig, config: &VisionConfig) -> Self {
        ObservationFilter {
            camera: camera.into(),
            robot_to_camera: Pose3d::from(mount),
            thresholds: Thresholds {
                max_ambiguity: config.max_ambiguity,
                height_tolerance: config.height_tolerance,
                single_landmark_std_dev: config.single_landmark_std_dev,
                max_pose_jump: config.max_pose_jump,
            },
        }
    }

    pub fn camera(&self) -> &str {
        &self.camera
    }

    /// Runs the filter over one frame. `reference` is the estimator's last
    /// pose, used only for the optional jump check.
    pub fn filter(
        &self,
        frame: &DetectionFrame,
        map: &LandmarkMap,
        solver: &dyn PoseSolver,
        reference: Option<&Pose2d>,
    ) -> FilterOutcome {
        if frame.landmarks.is_empty() {
            return FilterOutcome::NoLandmarks;
        }
        if !frame.timestamp.is_finite() {
            return FilterOutcome::Rejected(RejectReason::Malformed { discarded: frame.landmarks.len() });
        }

        let (mut ambiguous, mut unknown, mut malformed) = (0, 0, 0);
        let mut resolved = Vec::with_capacity(frame.landmarks.len());
        for detection in &frame.landmarks {
            if !detection.ambiguity.is_finite()
                || !(0.0..=1.0).contains(&detection.ambiguity)
                || !detection.camera_to_landmark.is_finite()
            {
                malformed += 1;
                continue;
            }
            if detection.ambiguity > self.thresholds.max_ambiguity {
                ambiguous += 1;
                continue;
            }
            match map.get(detection.id) {
                Some(field_pose) => resolved.push(ResolvedLandmark {
                    id: detection.id,
                    field_pose: *field_pose,
                    camera_to_landmark: detection.camera_to_landmark,
                }),
                None => unknown += 1,
            }
        }

        if resolved.is_empty() {
            let reason = if ambiguous > 0 {
                RejectReason::AllAmbiguous { discarded: ambiguous }
            } else if unknown > 0 {
                RejectReason::UnknownLandmarks { discarded: unknown }
            } else {
                RejectReason::Malformed { discarded: malformed }
            };
            return self.reject(reason);
        }

        let Some(solved) = solver.solve(&resolved, &self.robot_to_camera) else {
            return self.reject(RejectReason::SolverFailed);
        };
        if !map.field().contains(solved.x(), solved.y()) {
            return self.reject(RejectReason::OutOfBounds { x: solved.x(), y: solved.y() });
        }
        if solved.z().abs() > self.thresholds.height_tolerance {
            return self.reject(RejectReason::HeightResidual { z: solved.z() });
        }

        let pose = solved.to_pose2d();
        if let (Some(max_jump), Some(reference)) = (self.thresholds.max_pose_jump, reference) {
            // A reference that is itself off the field cannot vouch for anything.
            let distance = reference.distance(&pose);
            if map.field().contains(reference.x(), reference.y()) && distance > max_jump {
                return self.reject(RejectReason::ImplausibleJump { distance });
            }
        }

        let distances: Vec<f64> = resolved
            .iter()
            .map(|landmark| {
                let t = landmark.camera_to_landmark.translation();
                t.x.hypot(t.y)
            })
            .collect();
        let std_dev = distance_dispersion(&distances).unwrap_or(self.thresholds.single_landmark_std_dev);

        debug!(
            "{} pose estimate: x={:.3}, y={:.3}, heading={:.1} deg from {} landmarks (std dev {:.3})",
            self.camera,
            pose.x(),
            pose.y(),
            pose.rotation.degrees(),
            resolved.len(),
            std_dev
        );

        FilterOutcome::Accepted(PoseObservation {
            pose,
            timestamp: frame.timestamp,
            std_dev,
            camera: self.camera.clone(),
            landmark_count: resolved.len(),
        })
    }

    fn reject(&self, reason: RejectReason) -> FilterOutcome {
        debug!("{} rejected frame: {:?}", self.camera, reason);
        FilterOutcome::Rejected(reason)
    }
}
