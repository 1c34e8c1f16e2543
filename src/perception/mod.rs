//! Vision pipeline for FieldPose
//!
//! Each configured camera hands over its latest detection frame once per
//! cycle. Frames are filtered independently (in parallel on the rayon pool)
//! and the admissible pose observations are returned in capture order, ready
//! to be applied to the estimator one by one.
pub mod config;
pub mod filter;
pub mod landmarks;
pub mod solver;

use log::debug;
use rayon::prelude::*;
use std::sync::Arc;

pub use config::{CameraConfig, VisionConfig};
pub use filter::{DetectionFrame, FilterOutcome, LandmarkObservation, ObservationFilter, RejectReason};
pub use landmarks::{LandmarkConfig, LandmarkMap};
pub use solver::{AveragingSolver, PoseSolver, ResolvedLandmark};

use crate::core::geometry::Pose2d;
use crate::core::localization::{CorrectionOutcome, PoseEstimator};
use crate::core::state::PoseObservation;

/// What happened to one camera this cycle.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CameraStatus {
    /// The camera has not produced a frame newer than the last one consumed.
    NoNewFrame,
    NoLandmarks,
    Accepted,
    Rejected(RejectReason),
}

#[derive(Clone, Debug, PartialEq)]
pub struct CameraReport {
    pub camera: String,
    pub status: CameraStatus,
}

/// Everything the vision pipeline produced in one cycle. Consumed by
/// [`CycleObservations::apply_to`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct CycleObservations {
    /// Admissible observations in ascending capture time.
    pub observations: Vec<PoseObservation>,
    pub reports: Vec<CameraReport>,
}

impl CycleObservations {
    pub fn rejected(&self) -> usize {
        self.reports
            .iter()
            .filter(|r| matches!(r.status, CameraStatus::Rejected(_)))
            .count()
    }

    /// Feeds every observation to the estimator in capture order.
    pub fn apply_to(self, estimator: &mut PoseEstimator) -> Vec<CorrectionOutcome> {
        self.observations
            .iter()
            .map(|observation| estimator.correct(observation))
            .collect()
    }
}

/// Runs one observation filter per camera and collects their results.
pub struct VisionAggregator {
    filters: Vec<ObservationFilter>,
    map: Arc<LandmarkMap>,
    solver: Arc<dyn PoseSolver>,
    last_frames: Vec<Option<f64>>, // capture time of the last frame consumed per camera
}

impl VisionAggregator {
    pub fn new(config: &VisionConfig, map: Arc<LandmarkMap>, solver: Arc<dyn PoseSolver>) -> Self {
        let filters: Vec<ObservationFilter> = config
            .cameras
            .iter()
            .map(|camera| ObservationFilter::new(camera.name.clone(), camera.mount, config))
            .collect();
        let last_frames = vec![None; filters.len()];
        VisionAggregator {
            filters,
            map,
            solver,
            last_frames,
        }
    }

    pub fn camera_count(&self) -> usize {
        self.filters.len()
    }

    /// Filters one frame per camera (indexed like the configured cameras).
    /// Missing trailing entries count as "no new frame".
    pub fn process(&mut self, frames: Vec<Option<DetectionFrame>>, reference: Option<Pose2d>) -> CycleObservations {
        let mut frames = frames;
        frames.resize(self.filters.len(), None);

        // A frame is fresh unless it is the one consumed last. Stamps are not
        // ordered here, so a skewed stamp cannot hold back later frames.
        let fresh: Vec<Option<DetectionFrame>> = frames
            .into_iter()
            .zip(self.last_frames.iter_mut())
            .map(|(frame, last)| match frame {
                Some(frame) if *last != Some(frame.timestamp) => {
                    *last = Some(frame.timestamp);
                    Some(frame)
                }
                _ => None,
            })
            .collect();

        let map = self.map.as_ref();
        let solver = self.solver.as_ref();
        let outcomes: Vec<Option<FilterOutcome>> = self
            .filters
            .par_iter()
            .zip(fresh.par_iter())
            .map(|(filter, frame)| {
                frame
                    .as_ref()
                    .map(|frame| filter.filter(frame, map, solver, reference.as_ref()))
            })
            .collect();

        let mut cycle = CycleObservations::default();
        for (filter, outcome) in self.filters.iter().zip(outcomes) {
            let status = match outcome {
                None => CameraStatus::NoNewFrame,
                Some(FilterOutcome::NoLandmarks) => CameraStatus::NoLandmarks,
                Some(FilterOutcome::Rejected(reason)) => CameraStatus::Rejected(reason),
                Some(FilterOutcome::Accepted(observation)) => {
                    cycle.observations.push(observation);
                    CameraStatus::Accepted
                }
            };
            cycle.reports.push(CameraReport {
                camera: filter.camera().to_string(),
                status,
            });
        }

        cycle.observations.sort_by(|a, b| a.timestamp.total_cmp(&b.timestamp));
        debug!(
            "Vision cycle: {} accepted, {} rejected across {} cameras",
            cycle.observations.len(),
            cycle.rejected(),
            self.filters.len()
        );
        cycle
    }
}
