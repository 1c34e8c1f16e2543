// core/scheduler.rs

// Fixed-period control loop. Each cycle reads the gyro and wheel encoders,
// runs one prediction, takes the latest frame from every camera, filters
// them through the vision aggregator and applies the admissible corrections
// in capture order. Per-cycle failures are logged and absorbed here.

// Dependencies
use log::{debug, warn};
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::{Duration, Instant};
use super::Core;
use crate::interface::{Sensors, SnapshotPublisher};
use crate::navigation::{SwerveKinematics, WheelPosition};
use crate::perception::{CameraReport, VisionAggregator};
use crate::ConfigError;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Target cycle period in milliseconds.
    pub period_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig { period_ms: 20 }
    }
}

impl SchedulerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.period_ms == 0 {
            return Err(ConfigError::Invalid("scheduler.period_ms must be positive".into()));
        }
        Ok(())
    }

    pub fn period(&self) -> Duration {
        Duration::from_millis(self.period_ms)
    }
}

/// What one cycle did.
#[derive(Clone, Debug, PartialEq)]
pub struct CycleReport {
    pub cycle: u64,
    /// False when a sensor read failed and the cycle ran on vision alone.
    pub predicted: bool,
    pub observations: usize,
    pub applied: usize,
    pub dropped: usize,
    pub cameras: Vec<CameraReport>,
    pub duration: Duration,
}

/// Running totals since the loop was created.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct CycleStats {
    pub cycles: u64,
    pub overruns: u64,
    pub worst: Duration,
    pub sensor_failures: u64,
}

pub struct ControlLoop {
    core: Core,
    kinematics: SwerveKinematics,
    aggregator: VisionAggregator,
    sensors: Sensors,
    publisher: Option<Box<dyn SnapshotPublisher>>,
    previous_positions: Option<Vec<WheelPosition>>,
    period: Duration,
    stats: CycleStats,
}

impl ControlLoop {
    /// Wires the loop together. The camera feeds must line up one-to-one
    /// with the aggregator's configured cameras.
    pub fn new(
        core: Core,
        kinematics: SwerveKinematics,
        aggregator: VisionAggregator,
        sensors: Sensors,
        config: &SchedulerConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        if sensors.cameras.len() != aggregator.camera_count() {
            return Err(ConfigError::Invalid(format!(
                "{} camera feeds supplied for {} configured cameras",
                sensors.cameras.len(),
                aggregator.camera_count()
            )));
        }
        Ok(ControlLoop {
            core,
            kinematics,
            aggregator,
            sensors,
            publisher: None,
            previous_positions: None,
            period: config.period(),
            stats: CycleStats::default(),
        })
    }

    pub fn with_publisher(mut self, publisher: Box<dyn SnapshotPublisher>) -> Self {
        self.publisher = Some(publisher);
        self
    }

    pub fn core(&self) -> &Core {
        &self.core
    }

    pub fn stats(&self) -> CycleStats {
        self.stats
    }

    pub fn period(&self) -> Duration {
        self.period
    }

    /// Runs a single cycle without waiting for the period to elapse.
    pub fn run_cycle(&mut self) -> CycleReport {
        let started = Instant::now();
        self.stats.cycles += 1;
        let cycle = self.stats.cycles;

        let predicted = self.predict_step();

        let frames = self
            .sensors
            .cameras
            .iter_mut()
            .map(|camera| camera.latest_frame())
            .collect();
        let current = self.core.get_pose();
        let reference = current.is_tracking().then(|| current.pose());
        let vision = self.aggregator.process(frames, reference);
        let cameras = vision.reports.clone();
        let observations = vision.observations.len();

        let outcomes = self.core.correct_all(vision);
        let applied = outcomes.iter().filter(|o| o.is_applied()).count();

        let duration = started.elapsed();
        self.stats.worst = self.stats.worst.max(duration);
        if duration > self.period {
            self.stats.overruns += 1;
            warn!("Cycle {} overran its period: {:?} > {:?}", cycle, duration, self.period);
        }

        let report = CycleReport {
            cycle,
            predicted,
            observations,
            applied,
            dropped: observations - applied,
            cameras,
            duration,
        };
        debug!(
            "Cycle {}: predicted={}, {} observations, {} applied in {:?}",
            cycle, predicted, observations, applied, duration
        );

        if let Some(publisher) = self.publisher.as_mut() {
            publisher.publish(&self.core.get_pose(), &report);
        }
        report
    }

    // Reads odometry sensors and predicts. Returns false if the step was skipped.
    fn predict_step(&mut self) -> bool {
        let reading = match self.sensors.gyro.read() {
            Ok(reading) => reading,
            Err(e) => {
                self.stats.sensor_failures += 1;
                warn!("Gyro read failed, skipping prediction: {}", e);
                return false;
            }
        };
        let positions = match self.sensors.encoders.read() {
            Ok(positions) => positions,
            Err(e) => {
                self.stats.sensor_failures += 1;
                warn!("Encoder read failed, skipping prediction: {}", e);
                return false;
            }
        };

        // The first reading has nothing to difference against and yields zero motion.
        let previous = self.previous_positions.as_deref().unwrap_or(&positions);
        let displacement = match self.kinematics.to_twist(previous, &positions) {
            Ok(twist) => twist,
            Err(e) => {
                self.stats.sensor_failures += 1;
                warn!("Unusable encoder reading, skipping prediction: {}", e);
                return false;
            }
        };
        self.previous_positions = Some(positions);
        self.core.predict(displacement, reading.heading, reading.timestamp);
        true
    }

    /// Runs cycles at the configured period, forever or until `max_cycles`
    /// have run. Overrunning cycles start the next one immediately.
    pub fn run(&mut self, max_cycles: Option<u64>) -> CycleStats {
        let mut remaining = max_cycles;
        while remaining != Some(0) {
            let started = Instant::now();
            self.run_cycle();
            if let Some(left) = remaining.as_mut() {
                *left -= 1;
            }
            if let Some(rest) = self.period.checked_sub(started.elapsed()) {
                thread::sleep(rest);
            }
        }
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_period_is_rejected() {
        let config = SchedulerConfig { period_ms: 0 };
        assert!(config.validate().is_err());
        assert_eq!(SchedulerConfig::default().period(), Duration::from_millis(20));
    }
}

// Current Functionality:
// - One predict and one vision pass per cycle; corrections applied sequentially.
// - Sensor failures skip prediction for that cycle and are counted.
// - Overruns are logged and counted, never aborted.
