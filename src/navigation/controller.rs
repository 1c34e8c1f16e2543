// src/navigation/controller.rs
// Turns chassis-level drive requests into desaturated per-wheel targets.
// Motor control itself belongs to the drivetrain; this stops at the targets.

use log::trace;
use std::f64::consts::PI;

use super::kinematics::{ChassisSpeeds, SwerveKinematics, WheelState, desaturate};
use crate::core::geometry::{Alliance, Rotation2d, Translation2d};

/// Operator or autonomous drive request.
/// - `translation`: m/s, field axes when `field_relative`, robot axes otherwise.
/// - `rotation`: rad/s counter-clockwise.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct DriveRequest {
    pub translation: Translation2d,
    pub rotation: f64,
    pub field_relative: bool,
}

// DriveController: owns the module geometry and the wheel speed limit
pub struct DriveController {
    kinematics: SwerveKinematics,
    max_wheel_speed: f64,
}

impl DriveController {
    pub fn new(kinematics: SwerveKinematics, max_wheel_speed: f64) -> Self {
        DriveController {
            kinematics,
            max_wheel_speed,
        }
    }

    /// Wheel targets for a request. Field-relative requests are taken from
    /// the driver's perspective, which faces the other way on the red side.
    pub fn command(&self, request: &DriveRequest, heading: Rotation2d, alliance: Alliance) -> Vec<WheelState> {
        let speeds = if request.field_relative {
            let perspective = match alliance {
                Alliance::Blue => heading,
                Alliance::Red => heading.rotate_by(Rotation2d::from_radians(PI)),
            };
            ChassisSpeeds::from_field_relative(request.translation.x, request.translation.y, request.rotation, perspective)
        } else {
            ChassisSpeeds::new(request.translation.x, request.translation.y, request.rotation)
        };
        self.follow(&speeds)
    }

    /// Wheel targets for robot-relative speeds.
    pub fn follow(&self, speeds: &ChassisSpeeds) -> Vec<WheelState> {
        let mut states = self.kinematics.to_wheel_states(speeds);
        desaturate(&mut states, self.max_wheel_speed);
        trace!("Wheel targets for {:?}: {:?}", speeds, states);
        states
    }
}
