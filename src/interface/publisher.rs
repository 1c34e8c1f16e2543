use log::info;

use crate::core::scheduler::CycleReport;
use crate::core::state::EstimatorSnapshot;

// Telemetry sink fed once per cycle with a value snapshot
pub trait SnapshotPublisher: Send {
    fn publish(&mut self, snapshot: &EstimatorSnapshot, report: &CycleReport);
}

// Publisher that writes the pose to the log every `every` cycles
pub struct LogPublisher {
    every: u64,
}

impl LogPublisher {
    pub fn new(every: u64) -> Self {
        LogPublisher { every: every.max(1) }
    }
}

impl SnapshotPublisher for LogPublisher {
    fn publish(&mut self, snapshot: &EstimatorSnapshot, report: &CycleReport) {
        if report.cycle % self.every != 0 {
            return;
        }
        let pose = snapshot.pose();
        let u = snapshot.uncertainty();
        info!(
            "Robot pose: x={:.3}, y={:.3}, heading={:.1} deg, std=({:.3}, {:.3}, {:.3}), corrections {}/{} applied",
            pose.x(),
            pose.y(),
            pose.rotation.degrees(),
            u.x,
            u.y,
            u.heading,
            snapshot.diagnostics.applied_corrections,
            snapshot.diagnostics.applied_corrections + snapshot.diagnostics.dropped_corrections,
        );
    }
}
