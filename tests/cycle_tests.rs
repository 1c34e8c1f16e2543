use approx::assert_relative_eq;
use fieldpose::core::{
    Alliance, Core, CycleReport, EstimatorConfig, EstimatorSnapshot, Pose2d, PoseConfig, PoseEstimator, Rotation2d,
    SchedulerConfig,
};
use fieldpose::interface::{
    CameraFeed, FrameSlot, GyroReading, GyroSource, SensorError, Sensors, SnapshotPublisher, WheelEncoders,
};
use fieldpose::navigation::{DriveConfig, WheelPosition};
use fieldpose::perception::{
    AveragingSolver, CameraConfig, CameraStatus, DetectionFrame, LandmarkConfig, LandmarkMap, LandmarkObservation,
    VisionAggregator, VisionConfig,
};
use fieldpose::sim::{self, SimWorld};
use fieldpose::{ControlLoop, FieldPose, FieldPoseConfig, FieldPoseError};
use mockall::mock;
use std::sync::Arc;

mock! {
    pub Gyro {}
    impl GyroSource for Gyro {
        fn read(&mut self) -> Result<GyroReading, SensorError>;
    }
}

mock! {
    pub Encoders {}
    impl WheelEncoders for Encoders {
        fn read(&mut self) -> Result<Vec<WheelPosition>, SensorError>;
    }
}

mock! {
    pub Camera {}
    impl CameraFeed for Camera {
        fn latest_frame(&mut self) -> Option<DetectionFrame>;
    }
}

mock! {
    pub Publisher {}
    impl SnapshotPublisher for Publisher {
        fn publish(&mut self, snapshot: &EstimatorSnapshot, report: &CycleReport);
    }
}

const CONFIG_PATH: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/config/fieldpose.yaml");

// Gyro at a fixed heading, ticking 20 ms per read
fn ticking_gyro() -> MockGyro {
    let mut gyro = MockGyro::new();
    let mut now = 0.0;
    gyro.expect_read().returning(move || {
        let reading = GyroReading {
            heading: Rotation2d::default(),
            timestamp: now,
        };
        now += 0.02;
        Ok(reading)
    });
    gyro
}

// Four wheels pointing forward, each advancing `step` meters per read
fn rolling_encoders(step: f64) -> MockEncoders {
    let mut encoders = MockEncoders::new();
    let mut distance = 0.0;
    encoders.expect_read().returning(move || {
        let positions = vec![
            WheelPosition {
                distance,
                angle: Rotation2d::default(),
            };
            4
        ];
        distance += step;
        Ok(positions)
    });
    encoders
}

fn landmark_map() -> Arc<LandmarkMap> {
    let entry = LandmarkConfig {
        id: 7,
        pose: PoseConfig {
            x: 5.0,
            y: 4.0,
            z: 0.5,
            yaw_deg: 180.0,
            ..PoseConfig::default()
        },
    };
    Arc::new(LandmarkMap::from_config(&[entry], Default::default()).unwrap())
}

fn one_camera() -> VisionConfig {
    VisionConfig {
        cameras: vec![CameraConfig {
            name: "front".to_string(),
            mount: PoseConfig::default(),
        }],
        ..VisionConfig::default()
    }
}

fn control_loop(sensors: Sensors, start: Pose2d) -> ControlLoop {
    let core = Core::new(PoseEstimator::new(EstimatorConfig::default(), start));
    let kinematics = DriveConfig::default().kinematics().unwrap();
    let aggregator = VisionAggregator::new(&one_camera(), landmark_map(), Arc::new(AveragingSolver));
    ControlLoop::new(core, kinematics, aggregator, sensors, &SchedulerConfig::default()).unwrap()
}

fn idle_camera() -> Box<dyn CameraFeed> {
    let mut camera = MockCamera::new();
    camera.expect_latest_frame().returning(|| None);
    Box::new(camera)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Wheel travel turns into forward motion; the first read only sets the baseline
    #[test]
    fn test_cycles_integrate_wheel_travel() {
        let sensors = Sensors {
            gyro: Box::new(ticking_gyro()),
            encoders: Box::new(rolling_encoders(0.1)),
            cameras: vec![idle_camera()],
        };
        let mut control = control_loop(sensors, Pose2d::new(1.0, 1.0, 0.0));

        for _ in 0..4 {
            let report = control.run_cycle();
            assert!(report.predicted);
            assert_eq!(report.observations, 0);
            assert_eq!(report.cameras[0].status, CameraStatus::NoNewFrame);
        }

        let snapshot = control.core().get_pose();
        assert!(snapshot.is_tracking());
        assert_relative_eq!(snapshot.pose().x(), 1.3, epsilon = 1e-9);
        assert_relative_eq!(snapshot.pose().y(), 1.0, epsilon = 1e-9);
        assert_relative_eq!(snapshot.timestamp(), 0.06, epsilon = 1e-12);
        assert_eq!(control.stats().cycles, 4);
    }

    // A dead gyro skips prediction but keeps the loop alive
    #[test]
    fn test_gyro_failure_skips_prediction() {
        let mut gyro = MockGyro::new();
        gyro.expect_read()
            .returning(|| Err(SensorError::Disconnected("gyro".to_string())));
        let mut encoders = MockEncoders::new();
        encoders.expect_read().never();

        let sensors = Sensors {
            gyro: Box::new(gyro),
            encoders: Box::new(encoders),
            cameras: vec![idle_camera()],
        };
        let mut control = control_loop(sensors, Pose2d::new(1.0, 1.0, 0.0));

        let report = control.run_cycle();
        assert!(!report.predicted);
        control.run_cycle();
        assert_eq!(control.stats().sensor_failures, 2);
        assert!(!control.core().get_pose().is_tracking());
    }

    #[test]
    fn test_wrong_wheel_count_is_absorbed() {
        let mut encoders = MockEncoders::new();
        encoders
            .expect_read()
            .returning(|| Ok(vec![WheelPosition::default(); 3]));

        let sensors = Sensors {
            gyro: Box::new(ticking_gyro()),
            encoders: Box::new(encoders),
            cameras: vec![idle_camera()],
        };
        let mut control = control_loop(sensors, Pose2d::default());

        assert!(!control.run_cycle().predicted);
        assert_eq!(control.stats().sensor_failures, 1);
    }

    // Frames posted to a slot reach the estimator exactly once
    #[test]
    fn test_posted_frame_corrects_estimate_once() {
        let slot = FrameSlot::new();
        let sensors = Sensors {
            gyro: Box::new(ticking_gyro()),
            encoders: Box::new(rolling_encoders(0.0)),
            cameras: vec![Box::new(slot.clone())],
        };
        // The estimate starts half a meter off in y from where the camera sees it.
        let mut control = control_loop(sensors, Pose2d::new(3.0, 3.5, 0.0));
        control.run_cycle();

        let map = landmark_map();
        let seen = LandmarkObservation {
            id: 7,
            camera_to_landmark: fieldpose::core::Pose3d::new(3.0, 4.0, 0.0, 0.0, 0.0, 0.0)
                .inverse()
                .compose(map.get(7).unwrap()),
            ambiguity: 0.05,
        };
        slot.post(DetectionFrame {
            timestamp: 0.01,
            landmarks: vec![seen],
        });
        let before = control.core().get_pose().pose().y();

        let report = control.run_cycle();
        assert_eq!(report.observations, 1);
        assert_eq!(report.applied, 1);
        let after = control.core().get_pose().pose().y();
        assert!(after > before);

        let report = control.run_cycle();
        assert_eq!(report.observations, 0);
        assert_eq!(control.core().get_pose().diagnostics.applied_corrections, 1);
    }

    #[test]
    fn test_publisher_sees_every_cycle() {
        let mut publisher = MockPublisher::new();
        publisher
            .expect_publish()
            .withf(|snapshot, report| snapshot.is_tracking() && report.predicted)
            .times(3)
            .return_const(());

        let sensors = Sensors {
            gyro: Box::new(ticking_gyro()),
            encoders: Box::new(rolling_encoders(0.05)),
            cameras: vec![idle_camera()],
        };
        let mut control = control_loop(sensors, Pose2d::default()).with_publisher(Box::new(publisher));
        let stats = control.run(Some(3));
        assert_eq!(stats.cycles, 3);
    }

    #[test]
    fn test_camera_count_must_match_config() {
        let sensors = Sensors {
            gyro: Box::new(ticking_gyro()),
            encoders: Box::new(rolling_encoders(0.0)),
            cameras: vec![idle_camera(), idle_camera()],
        };
        let core = Core::new(PoseEstimator::new(EstimatorConfig::default(), Pose2d::default()));
        let kinematics = DriveConfig::default().kinematics().unwrap();
        let aggregator = VisionAggregator::new(&one_camera(), landmark_map(), Arc::new(AveragingSolver));
        let result = ControlLoop::new(core, kinematics, aggregator, sensors, &SchedulerConfig::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_reference_config_loads() {
        let config = FieldPoseConfig::load(CONFIG_PATH).unwrap();
        assert_eq!(config.landmarks.len(), 22);
        assert_eq!(config.vision.cameras.len(), 3);
        assert_eq!(config.scheduler.period_ms, 20);
        assert_relative_eq!(config.vision.max_ambiguity, 0.2);
        assert_eq!(config.vision.max_pose_jump, None);

        let map = LandmarkMap::from_config(&config.landmarks, config.field).unwrap();
        assert!(!map.is_empty());
        assert_eq!(map.len(), 22);
    }

    #[test]
    fn test_bad_configs_are_fatal() {
        let missing = FieldPoseConfig::load("/nonexistent/fieldpose.yaml");
        assert!(matches!(missing, Err(FieldPoseError::Io { .. })));

        let malformed = FieldPoseConfig::from_yaml_str("landmarks: [");
        assert!(matches!(malformed, Err(FieldPoseError::Yaml(_))));

        let no_cameras = "landmarks:\n  - { id: 1, pose: { x: 1.0, y: 1.0, z: 0.5 } }\nvision:\n  cameras: []\n";
        assert!(matches!(FieldPoseConfig::from_yaml_str(no_cameras), Err(FieldPoseError::Config(_))));

        let duplicate = "landmarks:\n  - { id: 1, pose: { x: 1.0, y: 1.0, z: 0.5 } }\n  - { id: 1, pose: { x: 2.0, y: 1.0, z: 0.5 } }\nvision:\n  cameras:\n    - { name: front, mount: { x: 0.0, y: 0.0, z: 0.5 } }\n";
        assert!(matches!(FieldPoseConfig::from_yaml_str(duplicate), Err(FieldPoseError::Config(_))));
    }

    fn simulated(world: &sim::SharedWorld, config: &FieldPoseConfig) -> FieldPose {
        let map = Arc::new(LandmarkMap::from_config(&config.landmarks, config.field).unwrap());
        FieldPose::new(config, sim::sensors(world, &config.vision, map)).unwrap()
    }

    #[test]
    fn test_cycle_requires_initialize() {
        let config = FieldPoseConfig::load(CONFIG_PATH).unwrap();
        let kinematics = config.drive.kinematics().unwrap();
        let world = SimWorld::new(kinematics, Pose2d::new(2.5, 4.0, 0.0)).shared();
        let mut fieldpose = simulated(&world, &config);

        assert!(matches!(fieldpose.run_cycle(), Err(FieldPoseError::NotInitialized)));
        assert!(!fieldpose.get_status().operational);
        fieldpose.initialize();
        assert!(fieldpose.run_cycle().is_ok());
        assert!(fieldpose.get_status().operational);
    }

    // A bumped robot is pulled back to the truth by the cameras alone
    #[test]
    fn test_vision_recovers_from_bump() {
        let config = FieldPoseConfig::load(CONFIG_PATH).unwrap();
        let kinematics = config.drive.kinematics().unwrap();
        let start = Pose2d::new(2.5, 4.0, 0.0);
        let world = SimWorld::new(kinematics, start).shared();
        let mut fieldpose = simulated(&world, &config);
        fieldpose.initialize();

        for _ in 0..25 {
            sim::lock_world(&world).wait(0.02);
            fieldpose.run_cycle().unwrap();
        }
        assert!(fieldpose.api().pose().distance(&start) < 1e-6);

        let bumped = Pose2d::new(2.5, 4.5, 0.0);
        sim::lock_world(&world).teleport(bumped);
        for _ in 0..500 {
            sim::lock_world(&world).wait(0.02);
            fieldpose.run_cycle().unwrap();
        }

        let status = fieldpose.get_status();
        assert!(status.estimate.diagnostics.applied_corrections > 0);
        assert!(status.estimate.pose().distance(&bumped) < 0.25);
        assert_relative_eq!(status.estimate.pose().heading(), 0.0, epsilon = 1e-6);
    }

    // Resetting from the red driver station mirrors the pose across the field
    #[test]
    fn test_red_alliance_reset_is_mirrored() {
        let config = FieldPoseConfig::load(CONFIG_PATH).unwrap();
        let kinematics = config.drive.kinematics().unwrap();
        let world = SimWorld::new(kinematics, Pose2d::default()).shared();
        let fieldpose = simulated(&world, &config);

        fieldpose.api().reset_for_alliance(Pose2d::new(1.0, 2.0, 0.0), Alliance::Red);
        let pose = fieldpose.api().pose();
        assert_relative_eq!(pose.x(), config.field.length - 1.0, epsilon = 1e-9);
        assert_relative_eq!(pose.y(), config.field.width - 2.0, epsilon = 1e-9);
        assert_relative_eq!(pose.heading().abs(), std::f64::consts::PI, epsilon = 1e-9);
        assert_eq!(fieldpose.api().diagnostics().resets, 1);
    }

    // Re-zeroing the heading keeps the estimated translation and survives the next predict
    #[test]
    fn test_heading_rezero_keeps_translation() {
        let config = FieldPoseConfig::load(CONFIG_PATH).unwrap();
        let kinematics = config.drive.kinematics().unwrap();
        let world = SimWorld::new(kinematics, Pose2d::new(2.5, 4.0, 0.0)).shared();
        let mut fieldpose = simulated(&world, &config);
        fieldpose.initialize();
        fieldpose.run_cycle().unwrap();
        let before = fieldpose.api().pose();

        fieldpose.api().set_heading(Rotation2d::from_radians(0.5));
        let pose = fieldpose.api().pose();
        assert_eq!(pose.translation, before.translation);
        assert_relative_eq!(pose.heading(), 0.5, epsilon = 1e-12);

        fieldpose.run_cycle().unwrap();
        assert_relative_eq!(fieldpose.api().pose().heading(), 0.5, epsilon = 0.01);

        fieldpose.api().zero_heading();
        let pose = fieldpose.api().pose();
        assert_relative_eq!(pose.heading(), 0.0, epsilon = 1e-12);
        assert_relative_eq!(pose.x(), before.x(), epsilon = 0.05);
        assert_eq!(fieldpose.api().diagnostics().resets, 2);
    }
}
