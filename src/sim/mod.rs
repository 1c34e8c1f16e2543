//! Simulated drivetrain for FieldPose
//!
//! A deterministic stand-in for the robot hardware: a ground-truth pose
//! driven by wheel targets, a gyro and wheel encoders that report on it, and
//! cameras that see whichever landmarks are in front of them. Used by the
//! binary and by the integration tests to run the real control loop.

mod camera;

pub use camera::SimCamera;

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::core::geometry::{Pose2d, Rotation2d};
use crate::interface::{CameraFeed, GyroReading, GyroSource, SensorError, Sensors, WheelEncoders};
use crate::navigation::{KinematicsError, SwerveKinematics, WheelPosition, WheelState};
use crate::perception::{LandmarkMap, VisionConfig};

/// World state shared between the simulated sensors.
pub type SharedWorld = Arc<Mutex<SimWorld>>;

pub fn lock_world(world: &SharedWorld) -> MutexGuard<'_, SimWorld> {
    world.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Ground truth for one simulated robot.
#[derive(Clone, Debug)]
pub struct SimWorld {
    truth: Pose2d,
    time: f64,
    kinematics: SwerveKinematics,
    wheels: Vec<WheelPosition>,
    boot_heading: f64,
    wheel_scale: f64, // reported distance per meter actually rolled
}

impl SimWorld {
    pub fn new(kinematics: SwerveKinematics, start: Pose2d) -> Self {
        let wheels = vec![WheelPosition::default(); kinematics.module_count()];
        SimWorld {
            truth: start,
            time: 0.0,
            kinematics,
            wheels,
            boot_heading: start.heading(),
            wheel_scale: 1.0,
        }
    }

    /// Makes the encoders over- or under-report travel, e.g. 1.03 for worn tread.
    pub fn with_wheel_scale(mut self, scale: f64) -> Self {
        self.wheel_scale = scale;
        self
    }

    pub fn shared(self) -> SharedWorld {
        Arc::new(Mutex::new(self))
    }

    pub fn truth(&self) -> Pose2d {
        self.truth
    }

    pub fn time(&self) -> f64 {
        self.time
    }

    /// Drives the wheels at `targets` for `dt` seconds.
    pub fn step(&mut self, targets: &[WheelState], dt: f64) -> Result<(), KinematicsError> {
        let speeds = self.kinematics.to_chassis_speeds(targets)?;
        self.truth = self.truth.exp(&speeds.to_twist(dt));
        for (wheel, target) in self.wheels.iter_mut().zip(targets) {
            wheel.distance += target.speed * dt * self.wheel_scale;
            wheel.angle = target.angle;
        }
        self.time += dt;
        Ok(())
    }

    /// Moves the robot without the wheels noticing, as when it is bumped.
    pub fn teleport(&mut self, pose: Pose2d) {
        self.truth = pose;
    }

    /// Advances the clock with the robot standing still.
    pub fn wait(&mut self, dt: f64) {
        self.time += dt;
    }
}

/// Gyro that zeroes at the heading the robot booted with.
pub struct SimGyro {
    world: SharedWorld,
}

impl SimGyro {
    pub fn new(world: SharedWorld) -> Self {
        SimGyro { world }
    }
}

impl GyroSource for SimGyro {
    fn read(&mut self) -> Result<GyroReading, SensorError> {
        let world = lock_world(&self.world);
        Ok(GyroReading {
            heading: Rotation2d::from_radians(world.truth.heading() - world.boot_heading),
            timestamp: world.time,
        })
    }
}

pub struct SimEncoders {
    world: SharedWorld,
}

impl SimEncoders {
    pub fn new(world: SharedWorld) -> Self {
        SimEncoders { world }
    }
}

impl WheelEncoders for SimEncoders {
    fn read(&mut self) -> Result<Vec<WheelPosition>, SensorError> {
        Ok(lock_world(&self.world).wheels.clone())
    }
}

/// Builds a full sensor set for `world`, one camera per entry in `vision`.
pub fn sensors(world: &SharedWorld, vision: &VisionConfig, map: Arc<LandmarkMap>) -> Sensors {
    let cameras = vision
        .cameras
        .iter()
        .map(|camera| {
            Box::new(SimCamera::new(world.clone(), camera.mount.into(), map.clone())) as Box<dyn CameraFeed>
        })
        .collect();
    Sensors {
        gyro: Box::new(SimGyro::new(world.clone())),
        encoders: Box::new(SimEncoders::new(world.clone())),
        cameras,
    }
}
