// core/localization.rs

// Pose fusion estimator. Dead reckons from chassis displacement with the gyro
// as the authority on heading, and folds in delayed vision observations at
// their capture time using per-axis Kalman-style gains.

// Dependencies
use log::{debug, info, trace, warn};
use serde::{Deserialize, Serialize};
use super::geometry::{Pose2d, Rotation2d, Twist2d};
use super::memory::PoseHistory;
use super::state::{Diagnostics, EstimatorSnapshot, EstimatorState, Mode, PoseObservation, Uncertainty};
use crate::ConfigError;

// Estimator tuning, loaded from the `estimator` section of the YAML config
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EstimatorConfig {
    /// Initial uncertainty after start or reset; also the floor corrections
    /// can never go below.
    pub state_std_devs: Uncertainty,
    /// Base measurement noise of a vision pose before its own dispersion is added.
    pub vision_std_devs: Uncertainty,
    /// Translation std dev added per meter of wheel travel.
    pub drift_per_meter: f64,
    /// Heading std dev added per radian of gyro rotation.
    pub heading_drift_per_radian: f64,
    /// Seconds of pose history kept for late observations.
    pub history_window: f64,
}

impl Default for EstimatorConfig {
    fn default() -> Self {
        EstimatorConfig {
            state_std_devs: Uncertainty::new(0.1, 0.1, 0.1),
            vision_std_devs: Uncertainty::new(0.45, 0.45, 6.0),
            drift_per_meter: 0.05,
            heading_drift_per_radian: 0.01,
            history_window: 1.5,
        }
    }
}

impl EstimatorConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.state_std_devs.is_valid() {
            return Err(ConfigError::Invalid("estimator.state_std_devs must be positive".into()));
        }
        if !self.vision_std_devs.is_valid() {
            return Err(ConfigError::Invalid("estimator.vision_std_devs must be positive".into()));
        }
        let rates = [self.drift_per_meter, self.heading_drift_per_radian];
        if rates.iter().any(|r| !r.is_finite() || *r < 0.0) {
            return Err(ConfigError::Invalid("estimator drift rates must be non-negative".into()));
        }
        if !self.history_window.is_finite() || self.history_window <= 0.0 {
            return Err(ConfigError::Invalid("estimator.history_window must be positive".into()));
        }
        Ok(())
    }
}

/// Why a correction was not applied.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum DropReason {
    /// No predict or reset has happened yet.
    NotTracking,
    /// Earlier than a correction that was already applied.
    OlderThanLastCorrection { timestamp: f64, last: f64 },
    /// Earlier than the oldest pose still held in history.
    OutsideHistory { timestamp: f64, oldest: f64 },
    /// Non-finite pose, timestamp or dispersion.
    Invalid,
}

/// Result of offering one observation to the estimator.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CorrectionOutcome {
    /// Per-axis gains (x, y, heading) in [0, 1] that were applied.
    Applied { gain: [f64; 3] },
    Dropped(DropReason),
}

impl CorrectionOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, CorrectionOutcome::Applied { .. })
    }
}

// PoseEstimator: sole owner and writer of the EstimatorState
#[derive(Clone, Debug)]
pub struct PoseEstimator {
    config: EstimatorConfig,
    state: EstimatorState,
    history: PoseHistory,
    heading_offset: Option<f64>, // field heading minus gyro heading
    last_gyro: Option<Rotation2d>,
    last_correction: Option<f64>,
    diagnostics: Diagnostics,
}

impl PoseEstimator {
    /// Creates an estimator holding `initial_pose`, not yet tracking.
    pub fn new(config: EstimatorConfig, initial_pose: Pose2d) -> Self {
        let state = EstimatorState::new(initial_pose, config.state_std_devs);
        let history = PoseHistory::new(config.history_window);
        PoseEstimator {
            config,
            state,
            history,
            heading_offset: None,
            last_gyro: None,
            last_correction: None,
            diagnostics: Diagnostics::default(),
        }
    }

    pub fn state(&self) -> &EstimatorState {
        &self.state
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn snapshot(&self) -> EstimatorSnapshot {
        EstimatorSnapshot {
            state: self.state,
            diagnostics: self.diagnostics,
        }
    }

    /// Advances the belief by one odometry step. `displacement` is the chassis
    /// motion in the robot frame since the previous call; its `dtheta` is
    /// ignored in favour of the gyro.
    pub fn predict(&mut self, displacement: Twist2d, gyro: Rotation2d, now: f64) {
        if !now.is_finite() || !gyro.radians().is_finite() {
            warn!("Ignoring predict with non-finite input: now={}, gyro={}", now, gyro.radians());
            return;
        }

        let (dx, dy) = if displacement.dx.is_finite() && displacement.dy.is_finite() {
            (displacement.dx, displacement.dy)
        } else {
            warn!("Non-finite wheel displacement, holding position this cycle");
            (0.0, 0.0)
        };

        let now = if now < self.state.timestamp && self.state.mode == Mode::Tracking {
            warn!("Clock moved backwards ({} < {}), holding timestamp", now, self.state.timestamp);
            self.state.timestamp
        } else {
            now
        };

        let offset = *self
            .heading_offset
            .get_or_insert(self.state.pose.heading() - gyro.radians());
        let heading = Rotation2d::from_radians(gyro.radians() + offset);
        let dtheta = heading.minus(self.state.pose.rotation).radians();

        let mut pose = self.state.pose.exp(&Twist2d::new(dx, dy, dtheta));
        pose.rotation = heading;

        let travelled = dx.hypot(dy);
        let grow = |std: f64, added: f64| std.hypot(added);
        let u = self.state.uncertainty;
        self.state.uncertainty = Uncertainty::new(
            grow(u.x, self.config.drift_per_meter * travelled),
            grow(u.y, self.config.drift_per_meter * travelled),
            grow(u.heading, self.config.heading_drift_per_radian * dtheta.abs()),
        );

        self.state.pose = pose;
        self.state.timestamp = now;
        if self.state.mode == Mode::Uninitialized {
            info!("Estimator tracking from x={:.3}, y={:.3}, heading={:.3}", pose.x(), pose.y(), pose.heading());
            self.state.mode = Mode::Tracking;
        }
        self.history.record(now, pose);
        self.last_gyro = Some(gyro);
        self.diagnostics.predictions += 1;

        trace!("Predicted pose: x={:.3}, y={:.3}, heading={:.3}", pose.x(), pose.y(), pose.heading());
    }

    /// Folds one vision observation into the belief at its capture time.
    pub fn correct(&mut self, observation: &PoseObservation) -> CorrectionOutcome {
        match self.try_correct(observation) {
            Ok(gain) => {
                self.diagnostics.applied_corrections += 1;
                debug!(
                    "Applied {} correction at t={:.3} (gain x={:.3}, y={:.3}, heading={:.3})",
                    observation.camera, observation.timestamp, gain[0], gain[1], gain[2]
                );
                CorrectionOutcome::Applied { gain }
            }
            Err(reason) => {
                self.diagnostics.dropped_corrections += 1;
                warn!("Dropped {} correction at t={:.3}: {:?}", observation.camera, observation.timestamp, reason);
                CorrectionOutcome::Dropped(reason)
            }
        }
    }

    fn try_correct(&mut self, observation: &PoseObservation) -> Result<[f64; 3], DropReason> {
        if self.state.mode != Mode::Tracking {
            return Err(DropReason::NotTracking);
        }
        if !observation.pose.is_finite()
            || !observation.timestamp.is_finite()
            || !observation.std_dev.is_finite()
            || observation.std_dev < 0.0
        {
            return Err(DropReason::Invalid);
        }
        if let Some(last) = self.last_correction {
            if observation.timestamp < last {
                return Err(DropReason::OlderThanLastCorrection {
                    timestamp: observation.timestamp,
                    last,
                });
            }
        }

        // Observations stamped after the newest prediction apply to the present.
        let timestamp = observation.timestamp.min(self.state.timestamp);
        let oldest = self.history.oldest_timestamp().unwrap_or(self.state.timestamp);
        let outside = DropReason::OutsideHistory { timestamp, oldest };
        if timestamp < oldest {
            return Err(outside);
        }
        let sample = self.history.sample(timestamp).ok_or(outside)?;

        let gain = self.gain(observation.std_dev);
        let residual = sample.log(&observation.pose);
        let corrected = sample.exp(&Twist2d::new(
            residual.dx * gain[0],
            residual.dy * gain[1],
            residual.dtheta * gain[2],
        ));
        let shift = |pose: &Pose2d| corrected.compose(&pose.relative_to(&sample));

        let previous = self.state.pose;
        let pose = shift(&previous);
        self.history.apply_from(timestamp, shift);
        if let Some(offset) = self.heading_offset.as_mut() {
            *offset += pose.rotation.minus(previous.rotation).radians();
        }

        let shrink = |std: f64, k: f64| std * (1.0 - k).max(0.0).sqrt();
        let u = self.state.uncertainty;
        self.state.uncertainty = Uncertainty::new(
            shrink(u.x, gain[0]),
            shrink(u.y, gain[1]),
            shrink(u.heading, gain[2]),
        )
        .at_least(&self.config.state_std_devs);
        self.state.pose = pose;
        // Ordering is kept against the time the correction was applied at.
        self.last_correction = Some(timestamp);

        Ok(gain)
    }

    /// Per-axis gain for an observation with the given dispersion: the
    /// estimator variance over the sum of estimator and measurement variance.
    pub fn gain(&self, std_dev: f64) -> [f64; 3] {
        let prior = self.state.uncertainty.as_array();
        let base = self.config.vision_std_devs.as_array();
        let mut gain = [0.0; 3];
        for axis in 0..3 {
            let p = prior[axis] * prior[axis];
            let r = (base[axis] + std_dev).powi(2);
            gain[axis] = if p + r > 0.0 { p / (p + r) } else { 1.0 };
        }
        gain
    }

    /// Re-seeds tracking at `pose`. Only called on an explicit external command.
    pub fn reset(&mut self, pose: Pose2d, timestamp: f64) {
        self.state = EstimatorState {
            pose,
            timestamp,
            uncertainty: self.config.state_std_devs,
            mode: Mode::Tracking,
        };
        self.history.clear();
        self.history.record(timestamp, pose);
        self.last_correction = None;
        // Without a gyro reading yet, the offset is latched on the next predict.
        self.heading_offset = self.last_gyro.map(|gyro| pose.heading() - gyro.radians());
        self.diagnostics.resets += 1;

        info!("Estimator reset to x={:.3}, y={:.3}, heading={:.3}", pose.x(), pose.y(), pose.heading());
    }
}
