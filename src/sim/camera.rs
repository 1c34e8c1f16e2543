// src/sim/camera.rs
// Simulated landmark camera. Reports every mapped landmark in range, inside
// the field of view and facing the lens, with the true camera-to-landmark
// transform. Frames are delivered `latency` seconds after capture.

use std::collections::VecDeque;
use std::sync::Arc;

use super::{SharedWorld, lock_world};
use crate::core::geometry::Pose3d;
use crate::interface::CameraFeed;
use crate::perception::{DetectionFrame, LandmarkMap, LandmarkObservation};

pub struct SimCamera {
    world: SharedWorld,
    mount: Pose3d,
    map: Arc<LandmarkMap>,
    range: f64,
    half_fov: f64,
    latency: f64,
    ambiguity: f64,
    in_flight: VecDeque<DetectionFrame>,
    delivered: Option<DetectionFrame>,
}

impl SimCamera {
    pub fn new(world: SharedWorld, mount: Pose3d, map: Arc<LandmarkMap>) -> Self {
        SimCamera {
            world,
            mount,
            map,
            range: 6.0,
            half_fov: 35f64.to_radians(),
            latency: 0.0,
            ambiguity: 0.05,
            in_flight: VecDeque::new(),
            delivered: None,
        }
    }

    pub fn with_latency(mut self, seconds: f64) -> Self {
        self.latency = seconds;
        self
    }

    /// Ambiguity score reported for every detection.
    pub fn with_ambiguity(mut self, ambiguity: f64) -> Self {
        self.ambiguity = ambiguity;
        self
    }

    pub fn with_range(mut self, meters: f64) -> Self {
        self.range = meters;
        self
    }

    /// Landmarks visible from the current true pose.
    pub fn capture(&self) -> DetectionFrame {
        let (truth, timestamp) = {
            let world = lock_world(&self.world);
            (world.truth(), world.time())
        };
        let robot = Pose3d::new(truth.x(), truth.y(), 0.0, 0.0, 0.0, truth.heading());
        let camera = robot.compose(&self.mount);
        let to_camera = camera.inverse();

        let landmarks = self
            .map
            .iter()
            .filter_map(|(id, field_pose)| {
                let seen = to_camera.compose(field_pose);
                let distance = seen.translation().norm();
                let bearing = seen.y().atan2(seen.x());
                // Landmarks face along their own +x axis.
                let facing = field_pose.inverse().compose(&camera).x() > 0.0;
                (seen.x() > 0.0 && distance <= self.range && bearing.abs() <= self.half_fov && facing).then_some(
                    LandmarkObservation {
                        id,
                        camera_to_landmark: seen,
                        ambiguity: self.ambiguity,
                    },
                )
            })
            .collect();
        DetectionFrame { timestamp, landmarks }
    }
}

impl CameraFeed for SimCamera {
    fn latest_frame(&mut self) -> Option<DetectionFrame> {
        let frame = self.capture();
        let now = frame.timestamp;
        if self.in_flight.back().is_none_or(|last| last.timestamp < now) {
            self.in_flight.push_back(frame);
        }
        while self.in_flight.front().is_some_and(|f| f.timestamp + self.latency <= now) {
            self.delivered = self.in_flight.pop_front();
        }
        self.delivered.clone()
    }
}
