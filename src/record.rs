use std::fmt;

use glam::Vec3;
use serde::{Deserialize, Serialize};

use crate::core::ArenaHandle;
use crate::service::AnchorHandle;

/// Opaque token produced by the anchor service for a placed anchor.
///
/// The ledger never looks inside it; it is written and read back verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Payload(String);

impl Payload {
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::new(value)
    }
}

/// Index of a prefab in the [`PrefabRegistry`](crate::asset::PrefabRegistry).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PrefabRef(usize);

impl PrefabRef {
    pub const fn new(index: usize) -> Self {
        Self(index)
    }

    pub const fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for PrefabRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnchorRecord {
    pub payload: Payload,
    pub prefab: PrefabRef,
    pub scale: Vec3,
}

impl AnchorRecord {
    pub fn new(payload: Payload, prefab: PrefabRef, scale: Vec3) -> Self {
        Self {
            payload,
            prefab,
            scale,
        }
    }
}

pub type RecordHandle = ArenaHandle<AnchorRecord>;

/// A persisted record that the anchor service brought back to life.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedAnchor {
    /// Position of the record in the persisted ledger.
    pub index: usize,
    pub record: RecordHandle,
    pub anchor: AnchorHandle,
    pub prefab: PrefabRef,
    pub scale: Vec3,
}
