// core/memory.rs

// Bounded pose history for the fusion estimator. Keeps one pose per predict
// step inside a sliding time window so delayed vision samples can be applied
// at the moment they were captured rather than against fresher state.

// Dependencies
use std::collections::VecDeque;
use super::geometry::Pose2d;

// One recorded estimator pose
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct HistoryEntry {
    pub timestamp: f64,
    pub pose: Pose2d,
}

// Pose history: entries ordered by strictly increasing timestamp
#[derive(Clone, Debug)]
pub struct PoseHistory {
    entries: VecDeque<HistoryEntry>,
    window: f64, // seconds retained behind the newest entry
}

impl PoseHistory {
    /// Creates an empty history that retains `window` seconds.
    pub fn new(window: f64) -> Self {
        PoseHistory {
            entries: VecDeque::new(),
            window,
        }
    }

    /// Appends a pose and drops entries that fell out of the window. A
    /// timestamp not newer than the last entry replaces that entry.
    pub fn record(&mut self, timestamp: f64, pose: Pose2d) {
        match self.entries.back_mut() {
            Some(last) if timestamp <= last.timestamp => {
                last.pose = pose;
            }
            _ => self.entries.push_back(HistoryEntry { timestamp, pose }),
        }

        let horizon = timestamp - self.window;
        // Always keep the newest entry, even with a zero window.
        while self.entries.len() > 1 && self.entries.front().is_some_and(|e| e.timestamp < horizon) {
            self.entries.pop_front();
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Oldest timestamp still reconstructable.
    pub fn oldest_timestamp(&self) -> Option<f64> {
        self.entries.front().map(|e| e.timestamp)
    }

    pub fn newest(&self) -> Option<&HistoryEntry> {
        self.entries.back()
    }

    /// Pose at `timestamp`, interpolated between the neighbouring entries.
    /// Returns `None` outside the retained range.
    pub fn sample(&self, timestamp: f64) -> Option<Pose2d> {
        let oldest = self.entries.front()?;
        let newest = self.entries.back()?;
        if timestamp < oldest.timestamp || timestamp > newest.timestamp {
            return None;
        }

        let upper = self.entries.partition_point(|e| e.timestamp < timestamp);
        let after = self.entries.get(upper)?;
        if upper == 0 || after.timestamp == timestamp {
            return Some(after.pose);
        }
        let before = &self.entries[upper - 1];
        let t = (timestamp - before.timestamp) / (after.timestamp - before.timestamp);
        Some(before.pose.interpolate(&after.pose, t))
    }

    /// Re-expresses every entry at or after `from` through `shift`, which maps
    /// an uncorrected pose to its corrected counterpart.
    pub fn apply_from<F>(&mut self, from: f64, shift: F)
    where
        F: Fn(&Pose2d) -> Pose2d,
    {
        for entry in self.entries.iter_mut().filter(|e| e.timestamp >= from) {
            entry.pose = shift(&entry.pose);
        }
    }
}
