// src/navigation/kinematics.rs
// Swerve drive kinematics: chassis velocity to per-wheel targets and wheel
// telemetry back to chassis displacement, through the same module matrix.

use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::geometry::{Rotation2d, Translation2d, Twist2d};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum KinematicsError {
    #[error("expected {expected} wheel entries, got {found}")]
    ModuleCount { expected: usize, found: usize },
    #[error("module layout needs at least two distinct, finite positions")]
    DegenerateGeometry,
}

/// Chassis velocity in the robot frame.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChassisSpeeds {
    pub vx: f64,    // m/s forward
    pub vy: f64,    // m/s left
    pub omega: f64, // rad/s counter-clockwise
}

impl ChassisSpeeds {
    pub const fn new(vx: f64, vy: f64, omega: f64) -> Self {
        ChassisSpeeds { vx, vy, omega }
    }

    /// Converts a field-relative request into the robot frame.
    pub fn from_field_relative(vx: f64, vy: f64, omega: f64, robot_heading: Rotation2d) -> Self {
        let robot = Translation2d::new(vx, vy).rotate_by(robot_heading.inverse());
        ChassisSpeeds::new(robot.x, robot.y, omega)
    }

    /// Displacement after holding these speeds for `dt` seconds.
    pub fn to_twist(&self, dt: f64) -> Twist2d {
        Twist2d::new(self.vx * dt, self.vy * dt, self.omega * dt)
    }
}

/// Target for one steer+drive unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelState {
    pub speed: f64, // m/s
    pub angle: Rotation2d,
}

/// Telemetry from one steer+drive unit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WheelPosition {
    pub distance: f64, // cumulative meters
    pub angle: Rotation2d,
}

/// Module geometry plus the precomputed inverse/forward matrices.
#[derive(Clone, Debug)]
pub struct SwerveKinematics {
    modules: Vec<Translation2d>,
    inverse: DMatrix<f64>, // 2N x 3: chassis -> wheel velocity components
    forward: DMatrix<f64>, // 3 x 2N: least-squares pseudo-inverse
}

impl SwerveKinematics {
    /// Builds kinematics for modules placed at `modules` relative to the
    /// robot's center of rotation.
    pub fn new(modules: Vec<Translation2d>) -> Result<Self, KinematicsError> {
        if modules.len() < 2 || modules.iter().any(|m| !m.is_finite()) {
            return Err(KinematicsError::DegenerateGeometry);
        }

        let mut inverse = DMatrix::zeros(modules.len() * 2, 3);
        for (i, module) in modules.iter().enumerate() {
            inverse[(2 * i, 0)] = 1.0;
            inverse[(2 * i, 2)] = -module.y;
            inverse[(2 * i + 1, 1)] = 1.0;
            inverse[(2 * i + 1, 2)] = module.x;
        }

        if inverse.clone().svd(false, false).rank(1e-9) < 3 {
            return Err(KinematicsError::DegenerateGeometry);
        }
        let forward = inverse
            .clone()
            .pseudo_inverse(1e-9)
            .map_err(|_| KinematicsError::DegenerateGeometry)?;

        Ok(SwerveKinematics {
            modules,
            inverse,
            forward,
        })
    }

    pub fn module_count(&self) -> usize {
        self.modules.len()
    }

    pub fn modules(&self) -> &[Translation2d] {
        &self.modules
    }

    /// Per-wheel targets for a chassis velocity. Stationary wheels point forward.
    pub fn to_wheel_states(&self, speeds: &ChassisSpeeds) -> Vec<WheelState> {
        let components = &self.inverse * DVector::from_row_slice(&[speeds.vx, speeds.vy, speeds.omega]);
        (0..self.modules.len())
            .map(|i| {
                let (vx, vy) = (components[2 * i], components[2 * i + 1]);
                let speed = vx.hypot(vy);
                let angle = if speed > 1e-9 {
                    Rotation2d::from_radians(vy.atan2(vx))
                } else {
                    Rotation2d::default()
                };
                WheelState { speed, angle }
            })
            .collect()
    }

    /// Least-squares chassis velocity that best explains the wheel states.
    pub fn to_chassis_speeds(&self, states: &[WheelState]) -> Result<ChassisSpeeds, KinematicsError> {
        self.check_count(states.len())?;
        let components = DVector::from_iterator(
            states.len() * 2,
            states
                .iter()
                .flat_map(|s| [s.speed * s.angle.cos(), s.speed * s.angle.sin()]),
        );
        let chassis = &self.forward * components;
        Ok(ChassisSpeeds::new(chassis[0], chassis[1], chassis[2]))
    }

    /// Chassis displacement between two telemetry snapshots. Each wheel is
    /// assumed to have travelled along its final angle.
    pub fn to_twist(&self, start: &[WheelPosition], end: &[WheelPosition]) -> Result<Twist2d, KinematicsError> {
        self.check_count(start.len())?;
        self.check_count(end.len())?;
        let components = DVector::from_iterator(
            end.len() * 2,
            start.iter().zip(end).flat_map(|(before, after)| {
                let delta = after.distance - before.distance;
                [delta * after.angle.cos(), delta * after.angle.sin()]
            }),
        );
        let chassis = &self.forward * components;
        Ok(Twist2d::new(chassis[0], chassis[1], chassis[2]))
    }

    fn check_count(&self, found: usize) -> Result<(), KinematicsError> {
        if found != self.modules.len() {
            return Err(KinematicsError::ModuleCount {
                expected: self.modules.len(),
                found,
            });
        }
        Ok(())
    }
}

/// Scales every wheel speed down uniformly so none exceeds `max_speed`,
/// preserving the commanded direction of travel.
pub fn desaturate(states: &mut [WheelState], max_speed: f64) {
    let fastest = states.iter().map(|s| s.speed.abs()).fold(0.0, f64::max);
    if fastest > max_speed && fastest > 0.0 {
        let scale = max_speed / fastest;
        for state in states.iter_mut() {
            state.speed *= scale;
        }
    }
}
