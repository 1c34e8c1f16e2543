//! Collaborator interface for FieldPose
//!
//! This module defines the narrow contracts through which the control loop
//! talks to the outside world:
//! - Reading the gyro and the wheel encoders
//! - Taking the latest detection frame from each camera
//! - Publishing estimator snapshots to telemetry consumers

mod publisher;
mod subscriber;

use thiserror::Error;

pub use publisher::*;
pub use subscriber::*;

use crate::core::geometry::Rotation2d;
use crate::navigation::WheelPosition;
use crate::perception::DetectionFrame;

/// Sensor read failure. Absorbed by the control loop for that cycle.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum SensorError {
    #[error("{0} is disconnected")]
    Disconnected(String),
    #[error("{0} returned an invalid reading")]
    InvalidReading(String),
}

/// Gyro heading with the monotonic time it was sampled at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GyroReading {
    pub heading: Rotation2d,
    pub timestamp: f64,
}

/// Gyro driver. Authoritative for robot orientation.
pub trait GyroSource: Send {
    fn read(&mut self) -> Result<GyroReading, SensorError>;
}

/// Wheel encoder driver: one cumulative position per module, in module order.
pub trait WheelEncoders: Send {
    fn read(&mut self) -> Result<Vec<WheelPosition>, SensorError>;
}

/// Camera pipeline. Returns the latest completed frame without waiting.
pub trait CameraFeed: Send {
    fn latest_frame(&mut self) -> Option<DetectionFrame>;
}

/// External collaborators handed to the control loop.
pub struct Sensors {
    pub gyro: Box<dyn GyroSource>,
    pub encoders: Box<dyn WheelEncoders>,
    /// Indexed like the configured cameras.
    pub cameras: Vec<Box<dyn CameraFeed>>,
}
