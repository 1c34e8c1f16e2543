// src/perception/landmarks.rs
// Read-only landmark map: identifier to known field pose. Loaded once at
// startup and shared by every camera's filter.

use log::info;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::ConfigError;
use crate::core::geometry::{FieldDimensions, Pose3d, PoseConfig};

/// Landmark entry as written in the config file.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct LandmarkConfig {
    pub id: u32,
    pub pose: PoseConfig,
}

/// Immutable landmark table plus the field rectangle it lives in.
#[derive(Clone, Debug)]
pub struct LandmarkMap {
    landmarks: HashMap<u32, Pose3d>,
    field: FieldDimensions,
}

impl LandmarkMap {
    /// Builds the map, rejecting empty, duplicated or non-finite entries.
    pub fn from_config(entries: &[LandmarkConfig], field: FieldDimensions) -> Result<Self, ConfigError> {
        if !(field.length.is_finite() && field.width.is_finite() && field.length > 0.0 && field.width > 0.0) {
            return Err(ConfigError::Invalid(format!(
                "field dimensions must be positive, got {} x {}",
                field.length, field.width
            )));
        }
        if entries.is_empty() {
            return Err(ConfigError::Missing("landmarks".into()));
        }

        let mut landmarks = HashMap::with_capacity(entries.len());
        for entry in entries {
            let pose = Pose3d::from(entry.pose);
            if !pose.is_finite() {
                return Err(ConfigError::Invalid(format!("landmark {} has a non-finite pose", entry.id)));
            }
            if landmarks.insert(entry.id, pose).is_some() {
                return Err(ConfigError::Invalid(format!("duplicate landmark id {}", entry.id)));
            }
        }

        info!("Loaded {} landmarks on a {:.3} x {:.3} m field", landmarks.len(), field.length, field.width);
        Ok(LandmarkMap { landmarks, field })
    }

    pub fn get(&self, id: u32) -> Option<&Pose3d> {
        self.landmarks.get(&id)
    }

    pub fn field(&self) -> &FieldDimensions {
        &self.field
    }

    pub fn len(&self) -> usize {
        self.landmarks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.landmarks.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (u32, &Pose3d)> {
        self.landmarks.iter().map(|(id, pose)| (*id, pose))
    }
}
