// core/state.rs

// Estimator state types: the single owned pose belief, its uncertainty, the
// tracking mode, and the read-only snapshot handed to every consumer.

// Dependencies
use serde::{Deserialize, Serialize};
use super::geometry::Pose2d;

// Estimator lifecycle
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Mode {
    Uninitialized, // No predict or reset yet
    Tracking,      // Pose belief is being maintained
}

// Standard deviations of the pose belief per axis
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Uncertainty {
    pub x: f64,       // meters
    pub y: f64,       // meters
    pub heading: f64, // radians
}

impl Uncertainty {
    pub const fn new(x: f64, y: f64, heading: f64) -> Self {
        Uncertainty { x, y, heading }
    }

    pub fn as_array(&self) -> [f64; 3] {
        [self.x, self.y, self.heading]
    }

    /// Element-wise maximum with `floor`.
    pub fn at_least(&self, floor: &Uncertainty) -> Uncertainty {
        Uncertainty::new(
            self.x.max(floor.x),
            self.y.max(floor.y),
            self.heading.max(floor.heading),
        )
    }

    /// True when every axis is at least as large as in `other`.
    pub fn dominates(&self, other: &Uncertainty) -> bool {
        self.x >= other.x && self.y >= other.y && self.heading >= other.heading
    }

    pub fn is_valid(&self) -> bool {
        self.as_array().iter().all(|v| v.is_finite() && *v > 0.0)
    }
}

/// The pose belief. Exactly one exists per estimator; only the estimator
/// mutates it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorState {
    pub pose: Pose2d,
    pub timestamp: f64, // seconds, monotonic robot clock
    pub uncertainty: Uncertainty,
    pub mode: Mode,
}

impl EstimatorState {
    pub fn new(pose: Pose2d, uncertainty: Uncertainty) -> Self {
        EstimatorState {
            pose,
            timestamp: 0.0,
            uncertainty,
            mode: Mode::Uninitialized,
        }
    }
}

/// An admissible vision-derived pose, consumed once by the estimator.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct PoseObservation {
    pub pose: Pose2d,
    pub timestamp: f64, // frame capture time, same clock as the estimator
    /// Dispersion of the landmark distances behind this pose in meters;
    /// smaller means more trusted.
    pub std_dev: f64,
    pub camera: String,
    pub landmark_count: usize,
}

/// Counters kept beside the state; updating them never touches the belief.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub predictions: u64,
    pub applied_corrections: u64,
    pub dropped_corrections: u64,
    pub resets: u64,
}

/// Value copy of the estimator handed to consumers each cycle.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EstimatorSnapshot {
    pub state: EstimatorState,
    pub diagnostics: Diagnostics,
}

impl EstimatorSnapshot {
    pub fn pose(&self) -> Pose2d {
        self.state.pose
    }

    pub fn timestamp(&self) -> f64 {
        self.state.timestamp
    }

    pub fn uncertainty(&self) -> Uncertainty {
        self.state.uncertainty
    }

    pub fn is_tracking(&self) -> bool {
        self.state.mode == Mode::Tracking
    }
}

// Current Functionality:
// - Two-state lifecycle (Uninitialized -> Tracking), no terminal state.
// - Per-axis standard deviations with floor clamping helpers.
// - Diagnostics live outside EstimatorState so rejected corrections leave it untouched.
