//! Boundary to the positioning service that owns real-world anchors.

mod sim;

use glam::{Quat, Vec3};

use crate::record::Payload;

pub use self::sim::*;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AnchorHandle(u64);

impl AnchorHandle {
    pub const fn from_raw(raw: u64) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u64 {
        self.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AnchorStatus {
    Pending,
    Limited,
    Success,
    Failed,
}

impl AnchorStatus {
    /// Only anchors the service has at least partially located carry a
    /// payload worth persisting.
    pub fn is_saveable(self) -> bool {
        matches!(self, AnchorStatus::Limited | AnchorStatus::Success)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LocalizationState {
    Initializing,
    Localizing,
    Localized,
    Limited,
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Pose {
    pub position: Vec3,
    pub rotation: Quat,
    pub scale: Vec3,
}

impl Default for Pose {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Quat::IDENTITY,
            scale: Vec3::ONE,
        }
    }
}

impl Pose {
    pub fn new(position: Vec3, rotation: Quat) -> Self {
        Self {
            position,
            rotation,
            scale: Vec3::ONE,
        }
    }
}

/// Anchor creation and restoration, as exposed by the AR runtime.
///
/// Empty result lists signal failure; the service reports details through
/// its own channels.
pub trait AnchorService {
    fn localization_state(&self) -> LocalizationState;

    fn create_anchors(&mut self, pose: &Pose) -> Vec<AnchorHandle>;

    fn resolve_anchors(&mut self, payload: &Payload) -> Vec<AnchorHandle>;

    fn status(&self, anchor: AnchorHandle) -> AnchorStatus;

    /// Available once the anchor is saveable.
    fn payload(&self, anchor: AnchorHandle) -> Option<Payload>;

    /// Current world pose of a tracked anchor.
    fn pose(&self, anchor: AnchorHandle) -> Option<Pose>;

    fn destroy_anchors(&mut self, anchors: &[AnchorHandle]);

    fn restart(&mut self);
}
