//! FieldPose - Field pose estimation for competition robots
//!
//! This library keeps a continuous estimate of a robot's planar pose on a
//! fixed field by fusing wheel odometry and gyro heading with landmark
//! detections from several cameras, and exposes that estimate to motion
//! control and telemetry.

#![warn(unused_extern_crates)]

pub mod core;
pub mod interface;
pub mod navigation;
pub mod perception;
pub mod sim;

use log::info;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

// Re-export commonly used items for easier access
pub use crate::core::{Api, ControlLoop, Core, CycleReport, CycleStats, EstimatorSnapshot, Pose2d, PoseEstimator};
pub use interface::{LogPublisher, Sensors, SnapshotPublisher};
pub use navigation::{DriveController, SwerveKinematics};
pub use perception::{LandmarkMap, VisionAggregator};

use crate::core::{EstimatorConfig, FieldDimensions, SchedulerConfig};
use navigation::DriveConfig;
use perception::{AveragingSolver, LandmarkConfig, VisionConfig};

/// Static configuration problem. Fatal at startup.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Invalid(String),
    #[error("missing configuration: {0}")]
    Missing(String),
}

/// FieldPose error types
#[derive(Debug, Error)]
pub enum FieldPoseError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Yaml(#[from] serde_yaml::Error),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("system not initialized")]
    NotInitialized,
}

/// Main configuration structure for FieldPose
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldPoseConfig {
    #[serde(default)]
    pub field: FieldDimensions,
    pub landmarks: Vec<LandmarkConfig>,
    pub vision: VisionConfig,
    #[serde(default)]
    pub estimator: EstimatorConfig,
    #[serde(default)]
    pub drive: DriveConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// Pose the estimator starts from before the first operator reset.
    #[serde(default)]
    pub initial_pose: Option<Pose2d>,
}

impl FieldPoseConfig {
    /// Reads and validates a YAML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, FieldPoseError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| FieldPoseError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_yaml_str(&text)
    }

    pub fn from_yaml_str(text: &str) -> Result<Self, FieldPoseError> {
        let config: FieldPoseConfig = serde_yaml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        LandmarkMap::from_config(&self.landmarks, self.field)?;
        self.vision.validate()?;
        self.estimator.validate()?;
        self.drive.kinematics()?;
        self.scheduler.validate()?;
        if let Some(pose) = self.initial_pose {
            if !pose.is_finite() {
                return Err(ConfigError::Invalid("initial_pose must be finite".into()));
            }
        }
        Ok(())
    }
}

/// Primary entry point for FieldPose
pub struct FieldPose {
    api: Api,
    control: ControlLoop,
    landmarks: usize,
    is_initialized: bool,
}

impl FieldPose {
    /// Builds every component from `config` and wires in the sensors.
    pub fn new(config: &FieldPoseConfig, sensors: Sensors) -> Result<Self, FieldPoseError> {
        config.validate()?;
        let map = Arc::new(LandmarkMap::from_config(&config.landmarks, config.field)?);
        let landmarks = map.len();

        let estimator = PoseEstimator::new(config.estimator.clone(), config.initial_pose.unwrap_or_default());
        let core = Core::new(estimator);
        let aggregator = VisionAggregator::new(&config.vision, map, Arc::new(AveragingSolver));
        let kinematics = config.drive.kinematics()?;
        let control = ControlLoop::new(core.clone(), kinematics, aggregator, sensors, &config.scheduler)?;

        Ok(FieldPose {
            api: Api::new(core, config.field),
            control,
            landmarks,
            is_initialized: false,
        })
    }

    /// Attaches a telemetry sink fed after every cycle.
    pub fn with_publisher(mut self, publisher: Box<dyn SnapshotPublisher>) -> Self {
        self.control = self.control.with_publisher(publisher);
        self
    }

    /// Marks the system ready to run cycles.
    pub fn initialize(&mut self) {
        info!(
            "Initializing FieldPose: {} landmarks, cycle period {:?}",
            self.landmarks,
            self.control.period()
        );
        self.is_initialized = true;
    }

    pub fn api(&self) -> &Api {
        &self.api
    }

    /// Runs a single control cycle immediately.
    pub fn run_cycle(&mut self) -> Result<CycleReport, FieldPoseError> {
        if !self.is_initialized {
            return Err(FieldPoseError::NotInitialized);
        }
        Ok(self.control.run_cycle())
    }

    /// Runs the fixed-period loop, forever when `max_cycles` is `None`.
    pub fn run(&mut self, max_cycles: Option<u64>) -> Result<CycleStats, FieldPoseError> {
        if !self.is_initialized {
            return Err(FieldPoseError::NotInitialized);
        }
        Ok(self.control.run(max_cycles))
    }

    /// Get current system status
    pub fn get_status(&self) -> SystemStatus {
        SystemStatus {
            estimate: self.api.snapshot(),
            cycles: self.control.stats(),
            operational: self.is_initialized,
        }
    }
}

/// Combined system status
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SystemStatus {
    pub estimate: EstimatorSnapshot,
    pub cycles: CycleStats,
    pub operational: bool,
}
