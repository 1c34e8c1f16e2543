// core/api.rs

// Exposes a clean interface for external consumers (motion control,
// telemetry, operator commands) to read the estimate and re-seed tracking.

// Dependencies
use log::info;
use super::geometry::{Alliance, FieldDimensions, Pose2d, Rotation2d};
use super::state::{Diagnostics, EstimatorSnapshot};
use super::Core;

// API struct: Wraps Core for external access
#[derive(Clone)]
pub struct Api {
    core: Core,
    field: FieldDimensions,
}

impl Api {
    pub fn new(core: Core, field: FieldDimensions) -> Self {
        Api { core, field }
    }

    /// Re-seeds tracking at `pose`, keeping the estimator's current timestamp.
    pub fn reset(&self, pose: Pose2d) {
        let timestamp = self.core.get_pose().timestamp();
        self.reset_at(pose, timestamp);
    }

    /// Re-seeds tracking at `pose` as of `timestamp`.
    pub fn reset_at(&self, pose: Pose2d, timestamp: f64) {
        info!("Operator reset to x={:.3}, y={:.3}, heading={:.3}", pose.x(), pose.y(), pose.heading());
        self.core.reset(pose, timestamp);
    }

    /// Re-seeds tracking from a pose given in the alliance's own frame
    /// (origin at that alliance's driver station corner).
    pub fn reset_for_alliance(&self, pose: Pose2d, alliance: Alliance) {
        let field_pose = match alliance {
            Alliance::Blue => pose,
            Alliance::Red => pose.flipped(&self.field),
        };
        self.reset(field_pose);
    }

    /// Re-seeds only the heading, keeping the estimated translation.
    pub fn set_heading(&self, heading: Rotation2d) {
        let current = self.pose();
        self.reset(Pose2d::from_parts(current.translation, heading));
    }

    /// Operator re-zero: the robot currently faces along field +x.
    pub fn zero_heading(&self) {
        self.set_heading(Rotation2d::default());
    }

    /// Returns current pose, timestamp and uncertainty
    pub fn snapshot(&self) -> EstimatorSnapshot {
        self.core.get_pose()
    }

    pub fn pose(&self) -> Pose2d {
        self.snapshot().pose()
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.snapshot().diagnostics
    }
}
