// src/main.rs
// Entry point for FieldPose: runs a simulated match through the real control
// loop and reports how far the estimate strays from ground truth.

// Imports dependencies and FieldPose modules.
// - env_logger: Logging, configured through RUST_LOG.
// - FieldPose modules: configuration, facade, drive controller and simulator.
use fieldpose::core::{Alliance, Pose2d, Translation2d};
use fieldpose::navigation::{DriveController, DriveRequest};
use fieldpose::perception::LandmarkMap;
use fieldpose::sim::{self, SimWorld};
use fieldpose::{FieldPose, FieldPoseConfig, LogPublisher};
use log::{error, info};
use std::error::Error;
use std::sync::Arc;

const DEFAULT_CONFIG: &str = "config/fieldpose.yaml";
const MATCH_CYCLES: u64 = 750; // 15 s autonomous period at 50 Hz

/// Main function to load the configuration and drive the simulated robot.
fn main() -> Result<(), Box<dyn Error>> {
    env_logger::init();
    info!("Starting FieldPose...");

    let path = std::env::args().nth(1).unwrap_or_else(|| DEFAULT_CONFIG.to_string());
    let config = FieldPoseConfig::load(&path).inspect_err(|e| error!("Cannot start: {}", e))?;
    info!("Loaded configuration from {}", path);

    let start = config.initial_pose.unwrap_or(Pose2d::new(2.5, 4.0, 0.0));
    let kinematics = config.drive.kinematics()?;
    let world = SimWorld::new(kinematics.clone(), start).with_wheel_scale(1.03).shared();
    let map = Arc::new(LandmarkMap::from_config(&config.landmarks, config.field)?);
    let sensors = sim::sensors(&world, &config.vision, map);

    let mut fieldpose = FieldPose::new(&config, sensors)?.with_publisher(Box::new(LogPublisher::new(50)));
    fieldpose.initialize();
    fieldpose.api().reset_at(start, 0.0);

    let controller = DriveController::new(kinematics, config.drive.max_wheel_speed);
    let dt = config.scheduler.period_ms as f64 / 1000.0;

    for cycle in 0..MATCH_CYCLES {
        // Circle the blue reef at 2 m radius while spinning.
        let t = cycle as f64 * dt;
        let request = DriveRequest {
            translation: Translation2d::new(0.8 * (0.4 * t).sin(), -0.8 * (0.4 * t).cos()),
            rotation: 0.6,
            field_relative: true,
        };
        let heading = fieldpose.api().pose().rotation;
        let targets = controller.command(&request, heading, Alliance::Blue);
        sim::lock_world(&world).step(&targets, dt)?;

        let report = fieldpose.run_cycle()?;
        if report.cycle % 150 == 0 {
            let truth = sim::lock_world(&world).truth();
            let estimate = fieldpose.api().pose();
            info!(
                "t={:.2}s truth=({:.3}, {:.3}, {:.1} deg) estimate=({:.3}, {:.3}, {:.1} deg) error={:.3} m",
                t + dt,
                truth.x(),
                truth.y(),
                truth.rotation.degrees(),
                estimate.x(),
                estimate.y(),
                estimate.rotation.degrees(),
                truth.distance(&estimate)
            );
        }
    }

    let status = fieldpose.get_status();
    let truth = sim::lock_world(&world).truth();
    info!(
        "FieldPose demo completed: {} cycles, {} overruns, {} corrections applied, {} dropped, final error {:.3} m",
        status.cycles.cycles,
        status.cycles.overruns,
        status.estimate.diagnostics.applied_corrections,
        status.estimate.diagnostics.dropped_corrections,
        truth.distance(&status.estimate.pose())
    );
    Ok(())
}
