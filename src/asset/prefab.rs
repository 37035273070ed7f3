use std::f32::consts::FRAC_PI_2;

use ahash::AHashMap;
use glam::{EulerRot, Quat, Vec3};
use serde::{Deserialize, Serialize};

use crate::record::PrefabRef;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Orientation {
    /// Stands on the floor, facing the placement yaw.
    #[default]
    Upright,
    /// Hangs on a wall; turned a quarter turn away from the placement yaw.
    Vertical,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prefab {
    pub name: String,
    #[serde(default = "unit_scale")]
    pub scale: Vec3,
    #[serde(default)]
    pub orientation: Orientation,
}

fn unit_scale() -> Vec3 {
    Vec3::ONE
}

impl Prefab {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scale: Vec3::ONE,
            orientation: Orientation::Upright,
        }
    }

    pub fn with_scale(mut self, scale: Vec3) -> Self {
        self.scale = scale;
        self
    }

    pub fn with_orientation(mut self, orientation: Orientation) -> Self {
        self.orientation = orientation;
        self
    }

    /// Levels a hit-test rotation to its yaw, the way instances are placed.
    pub fn placement_rotation(&self, rotation: Quat) -> Quat {
        let (yaw, _, _) = rotation.to_euler(EulerRot::YXZ);

        let yaw = match self.orientation {
            Orientation::Upright => yaw,
            Orientation::Vertical if yaw < 0.0 => yaw - FRAC_PI_2,
            Orientation::Vertical => yaw + FRAC_PI_2,
        };

        Quat::from_rotation_y(yaw)
    }
}

#[derive(thiserror::Error, Debug)]
#[non_exhaustive]
pub enum RegistryError {
    #[error("prefab {0} has an empty name")]
    EmptyName(usize),

    #[error("prefab name {0:?} is registered twice")]
    DuplicateName(String),

    #[error("prefab list error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Fixed, ordered list of prefabs that recorded anchors refer to by index.
///
/// The order must stay stable between sessions: an index saved today has to
/// name the same prefab when the ledger is loaded tomorrow.
#[derive(Debug, Clone, Default)]
pub struct PrefabRegistry {
    prefabs: Vec<Prefab>,
    by_name: AHashMap<String, PrefabRef>,
}

#[derive(Deserialize)]
struct PrefabList {
    prefabs: Vec<Prefab>,
}

impl PrefabRegistry {
    pub fn new(prefabs: Vec<Prefab>) -> Result<Self, RegistryError> {
        let mut by_name = AHashMap::with_capacity(prefabs.len());

        for (index, prefab) in prefabs.iter().enumerate() {
            if prefab.name.is_empty() {
                return Err(RegistryError::EmptyName(index));
            }

            if by_name
                .insert(prefab.name.clone(), PrefabRef::new(index))
                .is_some()
            {
                return Err(RegistryError::DuplicateName(prefab.name.clone()));
            }
        }

        Ok(Self { prefabs, by_name })
    }

    /// Reads a `{"prefabs": [...]}` document.
    pub fn import_json(data: &[u8]) -> Result<Self, RegistryError> {
        let list: PrefabList = serde_json::from_slice(data)?;
        Self::new(list.prefabs)
    }

    pub fn get(&self, prefab: PrefabRef) -> Option<&Prefab> {
        self.prefabs.get(prefab.index())
    }

    pub fn contains(&self, prefab: PrefabRef) -> bool {
        prefab.index() < self.prefabs.len()
    }

    pub fn find_by_name(&self, name: &str) -> Option<PrefabRef> {
        self.by_name.get(name).copied()
    }

    pub fn len(&self) -> usize {
        self.prefabs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.prefabs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (PrefabRef, &Prefab)> {
        self.prefabs
            .iter()
            .enumerate()
            .map(|(index, prefab)| (PrefabRef::new(index), prefab))
    }
}
