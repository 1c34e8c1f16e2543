// core/mod.rs

// Declares and exposes the estimation core: geometry primitives, the fusion
// estimator and its state, the cycle scheduler and the external command API.
// The estimator lives behind one lock; the control loop is its only writer.

pub mod api;
pub mod geometry;
pub mod localization;
pub mod memory;
pub mod scheduler;
pub mod state;

// Re-export key types for a unified API
pub use api::Api;
pub use geometry::{Alliance, FieldDimensions, Pose2d, Pose3d, PoseConfig, Rotation2d, Translation2d, Twist2d};
pub use localization::{CorrectionOutcome, DropReason, EstimatorConfig, PoseEstimator};
pub use scheduler::{ControlLoop, CycleReport, CycleStats, SchedulerConfig};
pub use state::{Diagnostics, EstimatorSnapshot, EstimatorState, Mode, PoseObservation, Uncertainty};

// Imports for internal use
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use crate::perception::CycleObservations;

// Core: shared handle to the single estimator instance
#[derive(Clone)]
pub struct Core {
    estimator: Arc<Mutex<PoseEstimator>>,
}

impl Core {
    pub fn new(estimator: PoseEstimator) -> Self {
        Core {
            estimator: Arc::new(Mutex::new(estimator)),
        }
    }

    // State is plain data, consistent between calls, so a poisoned lock is still usable.
    fn lock(&self) -> MutexGuard<'_, PoseEstimator> {
        self.estimator.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Runs one odometry prediction step.
    pub fn predict(&self, displacement: Twist2d, gyro: Rotation2d, now: f64) {
        self.lock().predict(displacement, gyro, now);
    }

    /// Applies a cycle's observations in capture order under a single lock.
    pub fn correct_all(&self, observations: CycleObservations) -> Vec<CorrectionOutcome> {
        observations.apply_to(&mut self.lock())
    }

    pub fn correct(&self, observation: &PoseObservation) -> CorrectionOutcome {
        self.lock().correct(observation)
    }

    pub fn reset(&self, pose: Pose2d, timestamp: f64) {
        self.lock().reset(pose, timestamp);
    }

    /// Returns a value copy of the current estimate
    pub fn get_pose(&self) -> EstimatorSnapshot {
        self.lock().snapshot()
    }
}

// Current Functionality:
// - One estimator per robot, shared through Arc<Mutex>, written only by the control loop.
// - Readers receive EstimatorSnapshot values, never a live reference.
// - Corrections for a cycle are applied under one lock acquisition, in capture order.
