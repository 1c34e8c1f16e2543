// src/interface/subscriber.rs
// Hand-off slot between an asynchronous camera driver and the control loop.

// Imports necessary dependencies and shared types.
// - DetectionFrame: the detector's completed result for one camera.
use std::sync::{Arc, Mutex, PoisonError};

use super::CameraFeed;
use crate::perception::DetectionFrame;

/// FrameSlot stores the most recent detection frame for one camera.
/// - The driver thread calls `post` whenever a frame completes.
/// - The control loop reads the latest frame each cycle and never blocks on a new one.
#[derive(Clone, Default)]
pub struct FrameSlot {
    latest: Arc<Mutex<Option<DetectionFrame>>>,
}

impl FrameSlot {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces the stored frame.
    pub fn post(&self, frame: DetectionFrame) {
        *self.latest.lock().unwrap_or_else(PoisonError::into_inner) = Some(frame);
    }

    /// Returns the latest frame, if any. Clones so the driver keeps ownership.
    pub fn get_data(&self) -> Option<DetectionFrame> {
        self.latest.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

impl CameraFeed for FrameSlot {
    fn latest_frame(&mut self) -> Option<DetectionFrame> {
        self.get_data()
    }
}
